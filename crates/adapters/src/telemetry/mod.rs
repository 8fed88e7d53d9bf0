// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry sinks

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTelemetry;

use ms_core::TelemetryEvent;

/// Destination for engine telemetry
///
/// Recording never fails; a sink that cannot deliver drops the event.
pub trait TelemetrySink: Clone + Send + Sync + 'static {
    fn record(&self, event: TelemetryEvent);
}

/// Emits each event as a structured `tracing` event
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, event: TelemetryEvent) {
        let name = event.name();
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(target: "ms::telemetry", event = name, %payload),
            Err(e) => tracing::warn!(target: "ms::telemetry", event = name, error = %e, "unserializable event"),
        }
    }
}

/// Sink that discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpTelemetry;

impl TelemetrySink for NoOpTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}
