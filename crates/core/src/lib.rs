// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ms-core: Domain types for the offline sync engine
//!
//! This crate provides:
//! - Mutation, dead letter and allow-list types
//! - The circuit breaker state machine and backoff policy
//! - The remote error taxonomy and retry classification
//! - Configuration, telemetry events and WAL operations

pub mod backoff;
pub mod breaker;
pub mod clock;
pub mod config;
pub mod dead_letter;
pub mod error;
pub mod event;
pub mod id;
pub mod mutation;
pub mod operation;

pub use backoff::backoff_delay;
pub use breaker::{CircuitBreaker, CircuitState, HealthMetrics};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    BackoffConfig, BreakerConfig, ConfigError, DeadLetterConfig, MaintenanceConfig,
    OverflowPolicy, QueueConfig, ReconcileConfig, RemoteConfig, SyncConfig,
};
pub use dead_letter::{DeadLetterItem, DeadLetterReason, DeadLetterStats, QUEUE_OVERFLOW_CODE};
pub use error::{is_retryable, RemoteError};
pub use event::TelemetryEvent;
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use mutation::{AllowList, EntityType, OperationType, QueuedMutation, DEFAULT_ENTITY_TYPES};
pub use operation::Operation;
