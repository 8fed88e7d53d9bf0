// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry events emitted by the sync engine

use crate::breaker::{CircuitState, HealthMetrics};
use crate::mutation::{EntityType, OperationType};
use serde::Serialize;

/// Observable things that happened inside the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    MutationEnqueued {
        id: String,
        entity_type: EntityType,
        operation_type: OperationType,
    },
    /// The append to durable storage failed; the mutation lives in memory only
    MutationPersistFailed { id: String, error: String },
    MutationDeadLettered {
        id: String,
        entity_type: EntityType,
        error_code: String,
        can_retry: bool,
    },
    QueueDrained {
        applied: usize,
        retried: usize,
        dead_lettered: usize,
        skipped_by_breaker: usize,
    },
    BreakerStateChanged {
        from: CircuitState,
        to: CircuitState,
    },
    DeadLetterProcessed {
        retried: usize,
        recovered: usize,
        failed: usize,
        archived: usize,
        skipped_offline: bool,
    },
    DeadLetterMaintenance {
        archived_count: usize,
        cleaned_count: usize,
    },
    BreakerHealth { metrics: HealthMetrics, healed: bool },
    StorageCleanup {
        removed_keys: usize,
        trimmed_summaries: usize,
        compacted: bool,
    },
    SyncCompleted {
        successful: usize,
        failed: usize,
        conflicts: usize,
    },
    MaintenanceFailed { task: String, error: String },
}

impl TelemetryEvent {
    /// Event name in "category:action" form
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::MutationEnqueued { .. } => "mutation:enqueued",
            TelemetryEvent::MutationPersistFailed { .. } => "mutation:persist_failed",
            TelemetryEvent::MutationDeadLettered { .. } => "mutation:deadlettered",
            TelemetryEvent::QueueDrained { .. } => "queue:drained",
            TelemetryEvent::BreakerStateChanged { .. } => "breaker:state_changed",
            TelemetryEvent::DeadLetterProcessed { .. } => "dlq:processed",
            TelemetryEvent::DeadLetterMaintenance { .. } => "dlq:maintenance",
            TelemetryEvent::BreakerHealth { .. } => "breaker:health",
            TelemetryEvent::StorageCleanup { .. } => "storage:cleanup",
            TelemetryEvent::SyncCompleted { .. } => "sync:completed",
            TelemetryEvent::MaintenanceFailed { .. } => "maintenance:failed",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
