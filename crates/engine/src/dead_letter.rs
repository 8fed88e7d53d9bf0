// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dead letter queue
//!
//! Holds mutations that exhausted their retries or failed permanently.
//! Retryable items are reprocessed with exponential backoff; the rest age
//! into the archive and are eventually purged.

use crate::gate::GateOutcome;
use crate::persist::{self, SharedStore};
use crate::single_flight::SingleFlight;
use ms_adapters::{NetworkMonitor, TelemetrySink};
use ms_core::{
    backoff_delay, is_retryable, AllowList, Clock, DeadLetterConfig, DeadLetterItem,
    DeadLetterReason, DeadLetterStats, Operation, QueuedMutation, RemoteError, TelemetryEvent,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of one reprocessing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    /// Items handed back to the remote
    pub retried: usize,
    /// Retried items the remote accepted
    pub recovered: usize,
    /// Retried items that failed again
    pub failed: usize,
    pub archived: usize,
    pub skipped_offline: bool,
}

pub struct DeadLetterQueue<N, T, C> {
    store: SharedStore,
    network: N,
    telemetry: T,
    clock: C,
    allow_list: Arc<AllowList>,
    config: DeadLetterConfig,
    processing: SingleFlight,
}

impl<N, T, C> DeadLetterQueue<N, T, C>
where
    N: NetworkMonitor,
    T: TelemetrySink,
    C: Clock,
{
    pub fn new(
        store: SharedStore,
        network: N,
        telemetry: T,
        clock: C,
        allow_list: Arc<AllowList>,
        config: DeadLetterConfig,
    ) -> Self {
        Self {
            store,
            network,
            telemetry,
            clock,
            allow_list,
            config,
            processing: SingleFlight::new(),
        }
    }

    /// Park a mutation that failed with `error`
    pub fn add_item(&self, mutation: QueuedMutation, error: &RemoteError) -> DeadLetterItem {
        let item = DeadLetterItem::from_mutation(
            mutation,
            DeadLetterReason::from(error),
            self.clock.utc_now(),
        );
        let _ = persist::commit_or_keep(&self.store, Operation::DeadLettered { item: item.clone() });
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
        item
    }

    pub fn items(&self) -> Vec<DeadLetterItem> {
        persist::lock(&self.store).state().dead_letters.clone()
    }

    pub fn get_statistics(&self) -> DeadLetterStats {
        DeadLetterStats::collect(&persist::lock(&self.store).state().dead_letters)
    }

    /// Archive every live item older than `archive_after`
    ///
    /// Returns how many items were newly archived.
    pub fn archive_old_items(&self) -> usize {
        let now = self.clock.utc_now();
        let Some(cutoff) = chrono::Duration::from_std(self.config.archive_after)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
        else {
            return 0;
        };

        let stale: Vec<String> = persist::lock(&self.store)
            .state()
            .dead_letters
            .iter()
            .filter(|item| !item.archived && item.failed_at < cutoff)
            .map(|item| item.id.clone())
            .collect();

        for id in &stale {
            self.archive(id);
        }
        if !stale.is_empty() {
            tracing::info!(count = stale.len(), "archived stale dead letters");
        }
        stale.len()
    }

    /// Delete archived items past the purge window
    pub fn purge_archived(&self) -> usize {
        let now = self.clock.utc_now();
        let Some(cutoff) = chrono::Duration::from_std(self.config.purge_after)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
        else {
            return 0;
        };

        let expired: Vec<String> = persist::lock(&self.store)
            .state()
            .dead_letters
            .iter()
            .filter(|item| item.archived && item.archived_at.is_some_and(|at| at < cutoff))
            .map(|item| item.id.clone())
            .collect();

        for id in &expired {
            let _ = persist::commit_or_keep(
                &self.store,
                Operation::DeadLetterPurged { id: id.clone() },
            );
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "purged archived dead letters");
        }
        expired.len()
    }

    /// Reprocess retryable items through `requeue`
    ///
    /// `requeue` performs the breaker-gated remote apply. Connectivity is
    /// checked once; an offline pass does nothing. The pass stops when the
    /// breaker refuses or `cancel` fires.
    pub async fn process_queue<F, Fut>(
        &self,
        mut requeue: F,
        cancel: &CancellationToken,
    ) -> ProcessReport
    where
        F: FnMut(QueuedMutation) -> Fut,
        Fut: Future<Output = GateOutcome>,
    {
        let Some(_guard) = self.processing.try_acquire() else {
            tracing::debug!("dead letter processing already in progress");
            return ProcessReport::default();
        };

        let mut report = ProcessReport::default();
        if !self.network.is_online() {
            tracing::debug!("offline, skipping dead letter processing");
            report.skipped_offline = true;
            self.emit_processed(&report);
            return report;
        }

        let live: Vec<DeadLetterItem> = self
            .items()
            .into_iter()
            .filter(|item| !item.archived)
            .collect();

        for item in live {
            if cancel.is_cancelled() {
                break;
            }

            if !self.allow_list.allows(item.operation_type, &item.entity_type) {
                tracing::info!(id = %item.id, entity = %item.entity_type, "archiving unsupported dead letter");
                self.archive(&item.id);
                report.archived += 1;
                continue;
            }

            if !item.can_retry || item.retry_count >= self.config.max_retries {
                continue;
            }

            let delay = {
                let mut rng = rand::thread_rng();
                backoff_delay(&self.config.backoff, item.retry_count, &mut rng)
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            match requeue(item.to_mutation()).await {
                GateOutcome::BreakerOpen => break,
                GateOutcome::Rejected(RemoteError::Cancelled) => break,
                GateOutcome::Applied(_) => {
                    let _ = persist::commit_or_keep(
                        &self.store,
                        Operation::DeadLetterResolved {
                            id: item.id.clone(),
                        },
                    );
                    tracing::info!(id = %item.id, "dead letter recovered");
                    report.retried += 1;
                    report.recovered += 1;
                }
                GateOutcome::Rejected(error) => {
                    let retry_count = item.retry_count + 1;
                    let _ = persist::commit_or_keep(
                        &self.store,
                        Operation::DeadLetterRetryFailed {
                            id: item.id.clone(),
                            retry_count,
                            error_message: error.to_string(),
                            error_code: error.code(),
                            can_retry: is_retryable(&error),
                        },
                    );
                    tracing::debug!(id = %item.id, retry_count, code = %error.code(), "dead letter retry failed");
                    report.retried += 1;
                    report.failed += 1;
                }
            }
        }

        report.archived += self.archive_old_items();

        tracing::info!(
            retried = report.retried,
            recovered = report.recovered,
            failed = report.failed,
            archived = report.archived,
            "dead letter queue processed"
        );
        self.emit_processed(&report);
        report
    }

    fn archive(&self, id: &str) {
        let _ = persist::commit_or_keep(
            &self.store,
            Operation::DeadLetterArchived {
                id: id.to_string(),
                archived_at: self.clock.utc_now(),
            },
        );
    }

    fn emit_processed(&self, report: &ProcessReport) {
        self.telemetry.record(TelemetryEvent::DeadLetterProcessed {
            retried: report.retried,
            recovered: report.recovered,
            failed: report.failed,
            archived: report.archived,
            skipped_offline: report.skipped_offline,
        });
    }
}

#[cfg(test)]
#[path = "dead_letter_tests.rs"]
mod tests;
