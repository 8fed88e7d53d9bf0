// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling
//!
//! Two notions of time are needed: a monotonic [`Instant`] for breaker
//! timeouts and scheduling, and a wall-clock [`DateTime<Utc>`] for persisted
//! timestamps (`created_at`, `failed_at`, archive windows).

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic time
    fn now(&self) -> Instant;

    /// Wall-clock time
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct FakeTime {
    instant: Instant,
    utc: DateTime<Utc>,
}

/// Fake clock for testing with controllable time
///
/// Advancing moves both the monotonic and the wall-clock reading.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<FakeTime>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Create a clock whose wall-clock reading starts at `utc`
    pub fn at(utc: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(FakeTime {
                instant: Instant::now(),
                utc,
            })),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.instant += duration;
        current.utc += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).instant
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).utc
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
