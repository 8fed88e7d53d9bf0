// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity monitoring

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeNetworkMonitor;

use std::sync::Arc;
use tokio::sync::watch;

/// Source of connectivity state
pub trait NetworkMonitor: Clone + Send + Sync + 'static {
    fn is_online(&self) -> bool;

    /// Receiver that observes every connectivity change
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Monitor fed by the host platform through [`WatchNetworkMonitor::set_online`]
#[derive(Clone)]
pub struct WatchNetworkMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl WatchNetworkMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Publish a connectivity change; no-op when unchanged
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            tracing::info!(online, "connectivity changed");
        }
    }
}

impl NetworkMonitor for WatchNetworkMonitor {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
