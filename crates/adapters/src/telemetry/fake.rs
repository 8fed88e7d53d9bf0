// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake telemetry sink for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::TelemetrySink;
use ms_core::TelemetryEvent;
use std::sync::{Arc, Mutex};

/// Sink that keeps every event in memory
#[derive(Clone, Default)]
pub struct FakeTelemetry {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl FakeTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Names of recorded events, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(TelemetryEvent::name)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl TelemetrySink for FakeTelemetry {
    fn record(&self, event: TelemetryEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
