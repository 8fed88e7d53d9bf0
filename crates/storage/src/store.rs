// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable store: WAL plus the state it materializes

use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use ms_core::Operation;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

/// Result of a compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionResult {
    pub entries_before: u64,
    pub entries_after: u64,
}

/// Key-value view of the store
///
/// Values are JSON text. Well-known prefixes: `device_identity`, `record:`,
/// `temp:`, `cache:`, `sync_summary:`.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<&str>;

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;

    /// Returns whether the key existed
    fn remove(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Keys starting with `prefix`, in lexical order
    fn list_keys(&self, prefix: &str) -> Vec<String>;
}

/// WAL-backed store
///
/// Every change is committed to the log first and then applied to the
/// in-memory state. Without a log (`in_memory`) changes are only applied.
pub struct Store {
    wal: Option<Wal>,
    state: MaterializedState,
    fail_writes: bool,
}

impl Store {
    /// Open or create a store backed by the log at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let (wal, replay) = Wal::open(path)?;
        if let Some(line) = replay.corrupted_at {
            tracing::warn!(
                path = %path.display(),
                line,
                recovered = replay.ops.len(),
                "discarded torn WAL tail"
            );
        }

        let mut state = MaterializedState::default();
        for op in &replay.ops {
            state.apply(op);
        }
        tracing::info!(
            path = %path.display(),
            entries = replay.ops.len(),
            queued = state.queue.len(),
            dead_letters = state.dead_letters.len(),
            "store opened"
        );

        Ok(Self {
            wal: Some(wal),
            state,
            fail_writes: false,
        })
    }

    /// Store with no durable backing
    pub fn in_memory() -> Self {
        Self {
            wal: None,
            state: MaterializedState::default(),
            fail_writes: false,
        }
    }

    pub fn state(&self) -> &MaterializedState {
        &self.state
    }

    /// Persist `op` and apply it
    ///
    /// On error the in-memory state is left untouched.
    pub fn commit(&mut self, op: Operation) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::WriteRejected("writes disabled".to_string()));
        }
        if let Some(wal) = self.wal.as_mut() {
            wal.append(&op)?;
        }
        self.state.apply(&op);
        Ok(())
    }

    /// Apply `op` without persisting it
    ///
    /// Used when a commit failed but the change must not be lost for the
    /// lifetime of the process.
    pub fn apply_in_memory(&mut self, op: Operation) {
        self.state.apply(&op);
    }

    /// Rewrite the log from the current state
    pub fn compact(&mut self) -> Result<CompactionResult, StoreError> {
        let ops = self.state.to_operations();
        let Some(wal) = self.wal.as_mut() else {
            return Ok(CompactionResult {
                entries_before: 0,
                entries_after: 0,
            });
        };

        let entries_before = wal.sequence();
        wal.rewrite(&ops)?;
        let result = CompactionResult {
            entries_before,
            entries_after: wal.sequence(),
        };
        tracing::info!(
            entries_before = result.entries_before,
            entries_after = result.entries_after,
            "WAL compacted"
        );
        Ok(result)
    }

    /// Make every subsequent `commit` fail
    #[cfg(any(test, feature = "test-support"))]
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl KeyValueStore for Store {
    fn get(&self, key: &str) -> Option<&str> {
        self.state.kv.get(key).map(String::as_str)
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.commit(Operation::KeySet {
            key: key.to_string(),
            value,
        })
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        if !self.state.kv.contains_key(key) {
            return Ok(false);
        }
        self.commit(Operation::KeyRemoved {
            key: key.to_string(),
        })?;
        Ok(true)
    }

    fn list_keys(&self, prefix: &str) -> Vec<String> {
        self.state
            .kv
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
