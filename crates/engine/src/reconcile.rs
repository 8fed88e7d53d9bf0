// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-device reconciliation
//!
//! Sweeps locally cached records that never reached the remote and uploads
//! them through the shared gate. Delivery is at-least-once; the remote
//! dedupes by id and answers 409 for records it already holds.

use crate::gate::{GateOutcome, RemoteGate};
use crate::persist::{self, SharedStore};
use crate::single_flight::SingleFlight;
use chrono::{DateTime, Utc};
use ms_adapters::{RemoteApi, TelemetrySink};
use ms_core::{Clock, EntityType, Operation, OperationType, RemoteError, TelemetryEvent};
use ms_storage::{KeyValueStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Key prefix for cached records: `record:<entity_type>:<local_id>`
pub const RECORD_PREFIX: &str = "record:";
/// Key prefix for persisted sync summaries: `sync_summary:<unix_millis>`
pub const SYNC_SUMMARY_PREFIX: &str = "sync_summary:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Pending,
    Synced,
}

/// A locally cached record as the host app stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRecord {
    pub local_id: String,
    pub entity_type: EntityType,
    /// Record body in local (camelCase) field naming
    pub fields: Value,
    #[serde(default)]
    pub remote_id: Option<String>,
    /// Absent on records written before sync tracking existed
    #[serde(default)]
    pub sync_state: Option<SyncState>,
    #[serde(default)]
    pub device_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CachedRecord {
    pub fn key(&self) -> String {
        record_key(&self.entity_type, &self.local_id)
    }

    /// Legacy records without a sync state are pending only when they
    /// have no remote id
    pub fn effective_state(&self) -> SyncState {
        match (self.sync_state, &self.remote_id) {
            (Some(state), _) => state,
            (None, Some(_)) => SyncState::Synced,
            (None, None) => SyncState::Pending,
        }
    }

    pub fn needs_upload(&self) -> bool {
        self.effective_state() == SyncState::Pending && self.remote_id.is_none()
    }
}

pub fn record_key(entity_type: &EntityType, local_id: &str) -> String {
    format!("{}{}:{}", RECORD_PREFIX, entity_type, local_id)
}

/// Local to remote field naming for one entity type
///
/// Explicit overrides win; every other top-level field is converted from
/// camelCase to snake_case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    overrides: BTreeMap<String, String>,
}

impl FieldMapping {
    pub fn new(overrides: BTreeMap<String, String>) -> Self {
        Self { overrides }
    }

    pub fn remote_name(&self, local: &str) -> String {
        self.overrides
            .get(local)
            .cloned()
            .unwrap_or_else(|| camel_to_snake(local))
    }

    /// Rename the top-level fields of an object; other values pass through
    pub fn translate(&self, fields: &Value) -> Value {
        match fields {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (self.remote_name(key), value.clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Outcome of one reconciliation sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub successful: usize,
    pub failed: usize,
    pub conflicts: usize,
    pub last_sync_time: DateTime<Utc>,
}

pub struct Reconciler<R, T, C> {
    store: SharedStore,
    gate: RemoteGate<R, T, C>,
    telemetry: T,
    clock: C,
    mappings: BTreeMap<EntityType, FieldMapping>,
    device_id: String,
    running: SingleFlight,
}

impl<R, T, C> Reconciler<R, T, C>
where
    R: RemoteApi,
    T: TelemetrySink,
    C: Clock,
{
    pub fn new(
        store: SharedStore,
        gate: RemoteGate<R, T, C>,
        telemetry: T,
        clock: C,
        field_mappings: &BTreeMap<EntityType, BTreeMap<String, String>>,
        device_id: impl Into<String>,
    ) -> Self {
        let mappings = field_mappings
            .iter()
            .map(|(entity, overrides)| (entity.clone(), FieldMapping::new(overrides.clone())))
            .collect();
        Self {
            store,
            gate,
            telemetry,
            clock,
            mappings,
            device_id: device_id.into(),
            running: SingleFlight::new(),
        }
    }

    /// Store or replace a cached record
    pub fn put_record(&self, record: &CachedRecord) -> Result<(), StoreError> {
        let value = serde_json::to_string(record)?;
        persist::commit_or_keep(
            &self.store,
            Operation::KeySet {
                key: record.key(),
                value,
            },
        )
    }

    pub fn get_record(&self, entity_type: &EntityType, local_id: &str) -> Option<CachedRecord> {
        let store = persist::lock(&self.store);
        let text = store.get(&record_key(entity_type, local_id))?;
        serde_json::from_str(text).ok()
    }

    /// Cached records of one entity type; unreadable entries are skipped
    pub fn records(&self, entity_type: &EntityType) -> Vec<CachedRecord> {
        let prefix = format!("{}{}:", RECORD_PREFIX, entity_type);
        let store = persist::lock(&self.store);
        store
            .list_keys(&prefix)
            .iter()
            .filter_map(|key| {
                let text = store.get(key)?;
                serde_json::from_str(text)
                    .map_err(|e| tracing::warn!(key = %key, error = %e, "skipping unreadable cached record"))
                    .ok()
            })
            .collect()
    }

    /// Upload every pending record
    ///
    /// Returns `None` when a sweep is already running.
    pub async fn reconcile(&self, cancel: &CancellationToken) -> Option<SyncResult> {
        let Some(_guard) = self.running.try_acquire() else {
            tracing::debug!("reconciliation already in progress");
            return None;
        };

        let mut successful = 0;
        let mut failed = 0;
        let mut conflicts = 0;

        let entity_types: Vec<EntityType> = self.gate.allow_list().entity_types().cloned().collect();
        'sweep: for entity_type in entity_types {
            let pending: Vec<CachedRecord> = self
                .records(&entity_type)
                .into_iter()
                .filter(CachedRecord::needs_upload)
                .collect();
            if pending.is_empty() {
                continue;
            }

            let mapping = self.mappings.get(&entity_type).cloned().unwrap_or_default();
            for record in pending {
                if cancel.is_cancelled() {
                    break 'sweep;
                }

                let body = mapping.translate(&record.fields);
                let outcome = self
                    .gate
                    .apply(&entity_type, OperationType::Create, &body, cancel)
                    .await;

                match outcome {
                    GateOutcome::Applied(remote_id) => {
                        let remote_id = (!remote_id.is_empty()).then_some(remote_id);
                        self.mark_synced(record, remote_id);
                        successful += 1;
                    }
                    GateOutcome::Rejected(error) if error.is_conflict() => {
                        tracing::info!(entity = %entity_type, local_id = %record.local_id, "record already on remote");
                        let remote_id = record.remote_id.clone();
                        self.mark_synced(record, remote_id);
                        conflicts += 1;
                    }
                    GateOutcome::BreakerOpen | GateOutcome::Rejected(RemoteError::Cancelled) => {
                        break 'sweep;
                    }
                    GateOutcome::Rejected(error) => {
                        tracing::warn!(
                            entity = %entity_type,
                            local_id = %record.local_id,
                            code = %error.code(),
                            "record upload failed"
                        );
                        failed += 1;
                    }
                }
            }
        }

        let result = SyncResult {
            successful,
            failed,
            conflicts,
            last_sync_time: self.clock.utc_now(),
        };
        self.write_summary(&result);
        tracing::info!(successful, failed, conflicts, "reconciliation completed");
        self.telemetry.record(TelemetryEvent::SyncCompleted {
            successful,
            failed,
            conflicts,
        });
        Some(result)
    }

    fn mark_synced(&self, mut record: CachedRecord, remote_id: Option<String>) {
        record.remote_id = remote_id;
        record.sync_state = Some(SyncState::Synced);
        record.device_id = Some(self.device_id.clone());
        let _ = self.put_record(&record);
    }

    /// Keys are unique; a sweep in an already used millisecond takes the
    /// next free one
    fn write_summary(&self, result: &SyncResult) {
        let key = {
            let store = persist::lock(&self.store);
            let mut millis = result.last_sync_time.timestamp_millis();
            loop {
                let key = format!("{}{:013}", SYNC_SUMMARY_PREFIX, millis);
                if store.get(&key).is_none() {
                    break key;
                }
                millis += 1;
            }
        };
        match serde_json::to_string(result) {
            Ok(value) => {
                let _ = persist::commit_or_keep(&self.store, Operation::KeySet { key, value });
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode sync summary"),
        }
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
