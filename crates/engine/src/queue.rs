// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent mutation queue
//!
//! Writes are accepted locally and drained FIFO to the remote through the
//! shared gate. A mutation leaves the queue either applied or dead-lettered.

use crate::error::QueueError;
use crate::gate::{GateOutcome, RemoteGate};
use crate::persist::{self, SharedStore};
use crate::single_flight::SingleFlight;
use ms_adapters::{RemoteApi, TelemetrySink};
use ms_core::{
    is_retryable, Clock, DeadLetterItem, DeadLetterReason, EntityType, IdGen, Operation,
    OperationType, OverflowPolicy, QueueConfig, QueuedMutation, RemoteError, TelemetryEvent,
};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub applied: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    /// Mutations left untouched because the breaker refused calls
    pub skipped_by_breaker: usize,
}

pub struct MutationQueue<R, T, C, I> {
    store: SharedStore,
    gate: RemoteGate<R, T, C>,
    telemetry: T,
    clock: C,
    id_gen: I,
    config: QueueConfig,
    device_id: String,
    draining: SingleFlight,
    /// Id of the mutation currently being sent; never evicted
    sending: Mutex<Option<String>>,
}

/// Clears the in-flight marker when a send finishes or is dropped
struct SendingGuard<'a> {
    sending: &'a Mutex<Option<String>>,
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        *self.sending.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl<R, T, C, I> MutationQueue<R, T, C, I>
where
    R: RemoteApi,
    T: TelemetrySink,
    C: Clock,
    I: IdGen,
{
    pub fn new(
        store: SharedStore,
        gate: RemoteGate<R, T, C>,
        telemetry: T,
        clock: C,
        id_gen: I,
        config: QueueConfig,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gate,
            telemetry,
            clock,
            id_gen,
            config,
            device_id: device_id.into(),
            draining: SingleFlight::new(),
            sending: Mutex::new(None),
        }
    }

    /// Accept a local write
    ///
    /// Never touches the network. A failed log append keeps the mutation in
    /// memory and still returns its id.
    pub fn add_mutation(
        &self,
        operation_type: OperationType,
        entity_type: EntityType,
        payload: serde_json::Value,
    ) -> Result<String, QueueError> {
        let allow_list = self.gate.allow_list();
        if !allow_list.allows_entity(&entity_type) {
            return Err(QueueError::UnsupportedEntity(entity_type));
        }
        if !allow_list.allows(operation_type, &entity_type) {
            return Err(QueueError::UnsupportedOperation {
                entity: entity_type,
                operation: operation_type,
            });
        }

        let evicted = self.make_room()?;

        let mutation = QueuedMutation::new(
            self.id_gen.next(),
            operation_type,
            entity_type,
            payload,
            self.device_id.clone(),
            self.clock.utc_now(),
        );
        let id = mutation.id.clone();
        let entity_type = mutation.entity_type.clone();

        if let Some(item) = evicted {
            self.record_dead_letter(&item);
        }

        let persisted =
            persist::commit_or_keep(&self.store, Operation::MutationEnqueued { mutation });
        if let Err(e) = persisted {
            self.telemetry.record(TelemetryEvent::MutationPersistFailed {
                id: id.clone(),
                error: e.to_string(),
            });
        }

        tracing::debug!(id = %id, entity = %entity_type, op = %operation_type, "mutation queued");
        self.telemetry.record(TelemetryEvent::MutationEnqueued {
            id: id.clone(),
            entity_type,
            operation_type,
        });
        Ok(id)
    }

    /// Enforce the capacity bound before an append
    fn make_room(&self) -> Result<Option<DeadLetterItem>, QueueError> {
        let mut store = persist::lock(&self.store);
        if store.state().queue.len() < self.config.capacity {
            return Ok(None);
        }

        match self.config.overflow {
            OverflowPolicy::RejectNew => Err(QueueError::QueueFull {
                capacity: self.config.capacity,
            }),
            OverflowPolicy::EvictOldest => {
                let sending = self.lock_sending().clone();
                let oldest = store
                    .state()
                    .queue
                    .iter()
                    .find(|m| Some(&m.id) != sending.as_ref())
                    .cloned();
                let Some(oldest) = oldest else {
                    tracing::warn!(
                        capacity = self.config.capacity,
                        "queue full but only the in-flight mutation is queued, admitting"
                    );
                    return Ok(None);
                };
                let item = DeadLetterItem::from_mutation(
                    oldest,
                    DeadLetterReason::queue_overflow(),
                    self.clock.utc_now(),
                );
                let op = Operation::DeadLettered { item: item.clone() };
                if let Err(e) = store.commit(op.clone()) {
                    tracing::warn!(error = %e, "store write failed, keeping change in memory");
                    store.apply_in_memory(op);
                }
                tracing::warn!(id = %item.id, capacity = self.config.capacity, "queue full, evicted oldest mutation");
                Ok(Some(item))
            }
        }
    }

    pub fn pending(&self) -> Vec<QueuedMutation> {
        persist::lock(&self.store).state().queue.clone()
    }

    pub fn len(&self) -> usize {
        persist::lock(&self.store).state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push queued mutations to the remote in FIFO order
    ///
    /// Stops at the first breaker refusal, on HTTP 429, or on cancellation.
    /// A concurrent call returns an empty report immediately.
    pub async fn drain_queue(&self, cancel: &CancellationToken) -> DrainReport {
        let Some(_guard) = self.draining.try_acquire() else {
            tracing::debug!("drain already in progress");
            return DrainReport::default();
        };

        let pending = self.pending();
        let mut report = DrainReport::default();

        for (index, mutation) in pending.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let Some(_sending) = self.begin_send(&mutation.id) else {
                tracing::debug!(id = %mutation.id, "mutation left the queue during the pass");
                continue;
            };

            let outcome = self
                .gate
                .apply(
                    &mutation.entity_type,
                    mutation.operation_type,
                    &mutation.payload,
                    cancel,
                )
                .await;

            match outcome {
                GateOutcome::BreakerOpen => {
                    report.skipped_by_breaker = pending.len() - index;
                    break;
                }
                GateOutcome::Applied(remote_id) => {
                    let remote_id = (!remote_id.is_empty()).then_some(remote_id);
                    let _ = persist::commit_or_keep(
                        &self.store,
                        Operation::MutationApplied {
                            id: mutation.id.clone(),
                            remote_id,
                        },
                    );
                    report.applied += 1;
                }
                GateOutcome::Rejected(RemoteError::Cancelled) => break,
                GateOutcome::Rejected(error) => {
                    let rate_limited = error == RemoteError::RateLimited;
                    if self.record_failure(mutation.clone(), &error) {
                        report.dead_lettered += 1;
                    } else {
                        report.retried += 1;
                    }
                    if rate_limited {
                        tracing::info!("rate limited, ending drain pass");
                        break;
                    }
                }
            }
        }

        if report != DrainReport::default() {
            tracing::info!(
                applied = report.applied,
                retried = report.retried,
                dead_lettered = report.dead_lettered,
                skipped_by_breaker = report.skipped_by_breaker,
                "queue drained"
            );
        }
        self.telemetry.record(TelemetryEvent::QueueDrained {
            applied: report.applied,
            retried: report.retried,
            dead_lettered: report.dead_lettered,
            skipped_by_breaker: report.skipped_by_breaker,
        });
        report
    }

    /// Mark `id` as in flight if it is still queued
    fn begin_send(&self, id: &str) -> Option<SendingGuard<'_>> {
        let store = persist::lock(&self.store);
        store.state().get_mutation(id)?;
        *self.lock_sending() = Some(id.to_string());
        Some(SendingGuard {
            sending: &self.sending,
        })
    }

    fn lock_sending(&self) -> MutexGuard<'_, Option<String>> {
        self.sending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns true when the mutation was dead-lettered
    fn record_failure(&self, mut mutation: QueuedMutation, error: &RemoteError) -> bool {
        if is_retryable(error) {
            mutation.retry_count += 1;
            if mutation.retry_count < self.config.max_attempts {
                let _ = persist::commit_or_keep(
                    &self.store,
                    Operation::MutationRetried {
                        id: mutation.id,
                        retry_count: mutation.retry_count,
                        last_error: error.to_string(),
                    },
                );
                return false;
            }
        }

        let item = DeadLetterItem::from_mutation(
            mutation,
            DeadLetterReason::from(error),
            self.clock.utc_now(),
        );
        let _ = persist::commit_or_keep(&self.store, Operation::DeadLettered { item: item.clone() });
        self.record_dead_letter(&item);
        true
    }

    fn record_dead_letter(&self, item: &DeadLetterItem) {
        tracing::warn!(
            id = %item.id,
            entity = %item.entity_type,
            code = %item.error_code,
            can_retry = item.can_retry,
            "mutation dead-lettered"
        );
        self.telemetry.record(TelemetryEvent::MutationDeadLettered {
            id: item.id.clone(),
            entity_type: item.entity_type.clone(),
            error_code: item.error_code.clone(),
            can_retry: item.can_retry,
        });
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
