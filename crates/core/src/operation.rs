// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations for the write-ahead log

use crate::dead_letter::DeadLetterItem;
use crate::mutation::QueuedMutation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operations that can be persisted to the WAL
///
/// Each operation touches exactly one queue item, dead letter item or key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Append a mutation to the tail of the queue
    MutationEnqueued { mutation: QueuedMutation },

    /// A retryable failure was recorded against a queued mutation
    MutationRetried {
        id: String,
        retry_count: u32,
        last_error: String,
    },

    /// The remote accepted the mutation; it leaves the queue
    MutationApplied {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remote_id: Option<String>,
    },

    /// Add a dead letter item, removing the queued mutation with the same id
    DeadLettered { item: DeadLetterItem },

    /// A reprocessing attempt for a dead letter item failed
    DeadLetterRetryFailed {
        id: String,
        retry_count: u32,
        error_message: String,
        error_code: String,
        can_retry: bool,
    },

    /// A reprocessing attempt succeeded; the item is removed
    DeadLetterResolved { id: String },

    /// Mark a dead letter item archived
    DeadLetterArchived {
        id: String,
        archived_at: DateTime<Utc>,
    },

    /// Delete an archived dead letter item
    DeadLetterPurged { id: String },

    /// Set a key in the key-value namespace
    KeySet { key: String, value: String },

    /// Remove a key from the key-value namespace
    KeyRemoved { key: String },
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
