// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the sync engine

use ms_core::{EntityType, OperationType};
use thiserror::Error;

/// Errors returned by `add_mutation`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("unsupported entity type: {0}")]
    UnsupportedEntity(EntityType),
    #[error("{operation} is not allowed on {entity}")]
    UnsupportedOperation {
        entity: EntityType,
        operation: OperationType,
    },
    #[error("mutation queue is full ({capacity} items)")]
    QueueFull { capacity: usize },
}

/// Errors returned by on-demand maintenance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaintenanceError {
    #[error("maintenance is already running")]
    AlreadyRunning,
}
