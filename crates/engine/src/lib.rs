// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Offline sync engine: mutation queue, dead letters, maintenance and
//! reconciliation behind one shared circuit breaker

mod dead_letter;
mod device;
mod engine;
mod error;
mod gate;
mod maintenance;
mod persist;
mod queue;
mod reconcile;
mod scheduler;
mod single_flight;

pub use dead_letter::{DeadLetterQueue, ProcessReport};
pub use device::{DeviceIdentity, DEVICE_IDENTITY_KEY};
pub use engine::{EngineDeps, SyncEngine};
pub use error::{MaintenanceError, QueueError};
pub use gate::{GateOutcome, RemoteGate};
pub use maintenance::{
    CleanupReport, DeadLetterMaintenanceReport, HealthReport, Maintenance, MaintenanceReport,
    EPHEMERAL_PREFIXES,
};
pub use persist::SharedStore;
pub use queue::{DrainReport, MutationQueue};
pub use reconcile::{
    record_key, CachedRecord, FieldMapping, Reconciler, SyncResult, SyncState, RECORD_PREFIX,
    SYNC_SUMMARY_PREFIX,
};
pub use scheduler::{ScheduledItem, ScheduledTask, Scheduler};
pub use single_flight::{FlightGuard, SingleFlight};
