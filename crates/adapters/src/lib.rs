// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O

pub mod network;
pub mod remote;
pub mod telemetry;
pub mod traced;

pub use network::{NetworkMonitor, WatchNetworkMonitor};
pub use remote::{HttpRemoteApi, RemoteApi, RemoteId};
pub use telemetry::{NoOpTelemetry, TelemetrySink, TracingTelemetry};
pub use traced::TracedRemoteApi;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use network::FakeNetworkMonitor;
#[cfg(any(test, feature = "test-support"))]
pub use remote::{FakeRemoteApi, RemoteCall};
#[cfg(any(test, feature = "test-support"))]
pub use telemetry::FakeTelemetry;
