// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled maintenance tasks
//!
//! Three idempotent tasks, each safe to run at any time: dead letter
//! reprocessing, breaker self-healing and storage cleanup.

use crate::dead_letter::{DeadLetterQueue, ProcessReport};
use crate::error::MaintenanceError;
use crate::gate::RemoteGate;
use crate::persist::{self, SharedStore};
use crate::reconcile::SYNC_SUMMARY_PREFIX;
use crate::single_flight::SingleFlight;
use ms_adapters::{NetworkMonitor, RemoteApi, TelemetrySink};
use ms_core::{
    CircuitState, Clock, HealthMetrics, MaintenanceConfig, Operation, QueuedMutation,
    TelemetryEvent,
};
use ms_storage::KeyValueStore;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Key prefixes removed by storage cleanup once their timestamp expires
pub const EPHEMERAL_PREFIXES: [&str; 2] = ["temp:", "cache:"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeadLetterMaintenanceReport {
    pub processed: ProcessReport,
    pub archived_count: usize,
    pub cleaned_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub metrics: HealthMetrics,
    /// The breaker was reset by this check
    pub healed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed_keys: usize,
    pub trimmed_summaries: usize,
    pub compacted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub dead_letters: DeadLetterMaintenanceReport,
    pub health: HealthReport,
    pub storage: CleanupReport,
}

pub struct Maintenance<R, N, T, C> {
    dead_letters: Arc<DeadLetterQueue<N, T, C>>,
    gate: RemoteGate<R, T, C>,
    store: SharedStore,
    telemetry: T,
    clock: C,
    config: MaintenanceConfig,
    running: SingleFlight,
}

impl<R, N, T, C> Maintenance<R, N, T, C>
where
    R: RemoteApi,
    N: NetworkMonitor,
    T: TelemetrySink,
    C: Clock,
{
    pub fn new(
        dead_letters: Arc<DeadLetterQueue<N, T, C>>,
        gate: RemoteGate<R, T, C>,
        store: SharedStore,
        telemetry: T,
        clock: C,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            dead_letters,
            gate,
            store,
            telemetry,
            clock,
            config,
            running: SingleFlight::new(),
        }
    }

    /// Reprocess, archive and purge dead letters
    pub async fn run_dead_letter_maintenance(
        &self,
        cancel: &CancellationToken,
    ) -> DeadLetterMaintenanceReport {
        let requeue = |mutation: QueuedMutation| {
            let gate = self.gate.clone();
            let cancel = cancel.clone();
            async move {
                gate.apply(
                    &mutation.entity_type,
                    mutation.operation_type,
                    &mutation.payload,
                    &cancel,
                )
                .await
            }
        };

        let processed = self.dead_letters.process_queue(requeue, cancel).await;
        let archived_count = processed.archived + self.dead_letters.archive_old_items();
        let cleaned_count = self.dead_letters.purge_archived();

        self.telemetry.record(TelemetryEvent::DeadLetterMaintenance {
            archived_count,
            cleaned_count,
        });
        DeadLetterMaintenanceReport {
            processed,
            archived_count,
            cleaned_count,
        }
    }

    /// Reset a breaker that has stayed open past `heal_after`
    pub fn run_health_check(&self) -> HealthReport {
        let heal_after = self.config.heal_after;
        let (metrics, healed) = self.gate.with_breaker(|breaker, clock| {
            let before = breaker.health_metrics(clock);
            let stale = before.state == CircuitState::Open
                && before.since_last_failure.is_some_and(|since| since > heal_after);
            if stale {
                breaker.reset();
            }
            (breaker.health_metrics(clock), stale)
        });

        if healed {
            tracing::info!("circuit breaker open past heal window, reset");
        }
        self.telemetry.record(TelemetryEvent::BreakerHealth {
            metrics: metrics.clone(),
            healed,
        });
        HealthReport { metrics, healed }
    }

    /// Drop expired ephemeral keys, trim sync summaries and compact the log
    pub fn run_storage_cleanup(&self) -> CleanupReport {
        let now_ms = self.clock.utc_now().timestamp_millis();
        let ttl_ms = i64::try_from(self.config.temp_ttl.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_ms.saturating_sub(ttl_ms);

        let (expired, surplus) = {
            let store = persist::lock(&self.store);
            let expired: Vec<String> = EPHEMERAL_PREFIXES
                .iter()
                .flat_map(|prefix| store.list_keys(prefix))
                .filter(|key| key_timestamp(key).map_or(true, |ts| ts < cutoff))
                .collect();

            let mut summaries = store.list_keys(SYNC_SUMMARY_PREFIX);
            summaries.sort_by_key(|key| std::cmp::Reverse(key_timestamp(key).unwrap_or(i64::MIN)));
            let surplus = summaries.split_off(summaries.len().min(self.config.keep_sync_summaries));
            (expired, surplus)
        };

        for key in expired.iter().chain(&surplus) {
            let _ = persist::commit_or_keep(&self.store, Operation::KeyRemoved { key: key.clone() });
        }

        let compacted = self.config.compact_on_cleanup && self.compact();
        let report = CleanupReport {
            removed_keys: expired.len(),
            trimmed_summaries: surplus.len(),
            compacted,
        };
        tracing::info!(
            removed_keys = report.removed_keys,
            trimmed_summaries = report.trimmed_summaries,
            compacted = report.compacted,
            "storage cleanup finished"
        );
        self.telemetry.record(TelemetryEvent::StorageCleanup {
            removed_keys: report.removed_keys,
            trimmed_summaries: report.trimmed_summaries,
            compacted: report.compacted,
        });
        report
    }

    fn compact(&self) -> bool {
        match persist::lock(&self.store).compact() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "WAL compaction failed");
                self.telemetry.record(TelemetryEvent::MaintenanceFailed {
                    task: "storage_cleanup".to_string(),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Run all three tasks back to back
    pub async fn run_full_maintenance_now(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MaintenanceReport, MaintenanceError> {
        let Some(_guard) = self.running.try_acquire() else {
            return Err(MaintenanceError::AlreadyRunning);
        };

        tracing::info!("running full maintenance");
        let dead_letters = self.run_dead_letter_maintenance(cancel).await;
        let health = self.run_health_check();
        let storage = self.run_storage_cleanup();
        Ok(MaintenanceReport {
            dead_letters,
            health,
            storage,
        })
    }
}

/// Unix millis in the last `:`-separated segment of a key
fn key_timestamp(key: &str) -> Option<i64> {
    key.rsplit(':').next()?.parse().ok()
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
