// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Re-entrancy guard for top-level operations

use std::sync::atomic::{AtomicBool, Ordering};

/// At most one holder at a time; the flag resets when the guard drops
#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when another holder is active
    pub fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                running: &self.running,
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct FlightGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
