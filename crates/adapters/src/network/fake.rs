// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake network monitor for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{NetworkMonitor, WatchNetworkMonitor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Network monitor that counts connectivity checks
#[derive(Clone)]
pub struct FakeNetworkMonitor {
    inner: WatchNetworkMonitor,
    checks: Arc<AtomicUsize>,
}

impl FakeNetworkMonitor {
    pub fn online() -> Self {
        Self::with_state(true)
    }

    pub fn offline() -> Self {
        Self::with_state(false)
    }

    fn with_state(online: bool) -> Self {
        Self {
            inner: WatchNetworkMonitor::new(online),
            checks: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.inner.set_online(online);
    }

    /// Number of `is_online` calls so far
    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl Default for FakeNetworkMonitor {
    fn default() -> Self {
        Self::online()
    }
}

impl NetworkMonitor for FakeNetworkMonitor {
    fn is_online(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.inner.is_online()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.subscribe()
    }
}
