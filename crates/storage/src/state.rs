// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

use ms_core::{DeadLetterItem, Operation, QueuedMutation};
use std::collections::BTreeMap;

/// Materialized state built from WAL operations
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MaterializedState {
    /// Pending mutations in FIFO order
    pub queue: Vec<QueuedMutation>,
    /// Dead letter items in insertion order
    pub dead_letters: Vec<DeadLetterItem>,
    pub kv: BTreeMap<String, String>,
}

impl MaterializedState {
    pub fn get_mutation(&self, id: &str) -> Option<&QueuedMutation> {
        self.queue.iter().find(|m| m.id == id)
    }

    pub fn get_dead_letter(&self, id: &str) -> Option<&DeadLetterItem> {
        self.dead_letters.iter().find(|item| item.id == id)
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::MutationEnqueued { mutation } => {
                self.queue.retain(|m| m.id != mutation.id);
                self.queue.push(mutation.clone());
            }

            Operation::MutationRetried {
                id,
                retry_count,
                last_error,
            } => {
                if let Some(mutation) = self.queue.iter_mut().find(|m| &m.id == id) {
                    mutation.retry_count = *retry_count;
                    mutation.last_error = Some(last_error.clone());
                }
            }

            // An applied mutation is never also dead-lettered
            Operation::MutationApplied { id, .. } => {
                self.queue.retain(|m| &m.id != id);
                self.dead_letters.retain(|d| &d.id != id);
            }

            // Leaving the queue and entering the DLQ is one record
            Operation::DeadLettered { item } => {
                self.queue.retain(|m| m.id != item.id);
                match self.dead_letters.iter_mut().find(|d| d.id == item.id) {
                    Some(existing) => *existing = item.clone(),
                    None => self.dead_letters.push(item.clone()),
                }
            }

            Operation::DeadLetterRetryFailed {
                id,
                retry_count,
                error_message,
                error_code,
                can_retry,
            } => {
                if let Some(item) = self.dead_letters.iter_mut().find(|d| &d.id == id) {
                    item.retry_count = *retry_count;
                    item.error_message = error_message.clone();
                    item.error_code = error_code.clone();
                    item.can_retry = *can_retry;
                }
            }

            Operation::DeadLetterResolved { id } | Operation::DeadLetterPurged { id } => {
                self.dead_letters.retain(|d| &d.id != id);
            }

            Operation::DeadLetterArchived { id, archived_at } => {
                if let Some(item) = self.dead_letters.iter_mut().find(|d| &d.id == id) {
                    if !item.archived {
                        item.archived = true;
                        item.archived_at = Some(*archived_at);
                    }
                }
            }

            Operation::KeySet { key, value } => {
                self.kv.insert(key.clone(), value.clone());
            }

            Operation::KeyRemoved { key } => {
                self.kv.remove(key);
            }
        }
    }

    /// Minimal operation sequence that rebuilds this state
    pub fn to_operations(&self) -> Vec<Operation> {
        let queue = self.queue.iter().map(|mutation| Operation::MutationEnqueued {
            mutation: mutation.clone(),
        });
        let dead_letters = self
            .dead_letters
            .iter()
            .map(|item| Operation::DeadLettered { item: item.clone() });
        let kv = self.kv.iter().map(|(key, value)| Operation::KeySet {
            key: key.clone(),
            value: value.clone(),
        });
        dead_letters.chain(queue).chain(kv).collect()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
