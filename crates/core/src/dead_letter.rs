// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dead letter items: mutations that could not be applied

use crate::error::{is_retryable, RemoteError};
use crate::mutation::{EntityType, OperationType, QueuedMutation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error code for mutations evicted from a full queue
pub const QUEUE_OVERFLOW_CODE: &str = "QUEUE_OVERFLOW";

/// Why a mutation is being dead-lettered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterReason {
    pub message: String,
    pub code: String,
    pub can_retry: bool,
}

impl DeadLetterReason {
    /// The oldest queued mutation was pushed out by a full queue
    pub fn queue_overflow() -> Self {
        Self {
            message: "evicted from full mutation queue".to_string(),
            code: QUEUE_OVERFLOW_CODE.to_string(),
            can_retry: true,
        }
    }
}

impl From<&RemoteError> for DeadLetterReason {
    fn from(error: &RemoteError) -> Self {
        Self {
            message: error.to_string(),
            code: error.code(),
            can_retry: is_retryable(error),
        }
    }
}

/// A mutation parked after exhausting retries or failing permanently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterItem {
    pub id: String,
    pub operation_type: OperationType,
    pub entity_type: EntityType,
    pub payload: serde_json::Value,
    pub device_id: String,
    pub failed_at: DateTime<Utc>,
    pub error_message: String,
    pub error_code: String,
    pub can_retry: bool,
    /// Never reverts to false once set
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    /// Reprocessing attempts made from the dead letter queue
    pub retry_count: u32,
    /// Attempts spent in the mutation queue before dead-lettering
    #[serde(default)]
    pub queue_attempts: u32,
}

impl DeadLetterItem {
    pub fn from_mutation(
        mutation: QueuedMutation,
        reason: DeadLetterReason,
        failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: mutation.id,
            operation_type: mutation.operation_type,
            entity_type: mutation.entity_type,
            payload: mutation.payload,
            device_id: mutation.device_id,
            failed_at,
            error_message: reason.message,
            error_code: reason.code,
            can_retry: reason.can_retry,
            archived: false,
            archived_at: None,
            retry_count: 0,
            queue_attempts: mutation.retry_count,
        }
    }

    /// Rebuild the mutation for another remote apply attempt
    pub fn to_mutation(&self) -> QueuedMutation {
        QueuedMutation {
            id: self.id.clone(),
            operation_type: self.operation_type,
            entity_type: self.entity_type.clone(),
            payload: self.payload.clone(),
            created_at: self.failed_at,
            retry_count: self.retry_count,
            device_id: self.device_id.clone(),
            last_error: Some(self.error_message.clone()),
        }
    }
}

/// Aggregate view of the dead letter queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeadLetterStats {
    pub total: usize,
    pub retryable: usize,
    pub archived: usize,
    pub by_entity_type: BTreeMap<String, usize>,
    pub by_error_code: BTreeMap<String, usize>,
}

impl DeadLetterStats {
    pub fn collect<'a>(items: impl IntoIterator<Item = &'a DeadLetterItem>) -> Self {
        let mut stats = DeadLetterStats::default();
        for item in items {
            stats.total += 1;
            if item.archived {
                stats.archived += 1;
            } else if item.can_retry {
                stats.retryable += 1;
            }
            *stats
                .by_entity_type
                .entry(item.entity_type.to_string())
                .or_default() += 1;
            *stats
                .by_error_code
                .entry(item.error_code.clone())
                .or_default() += 1;
        }
        stats
    }
}

#[cfg(test)]
#[path = "dead_letter_tests.rs"]
mod tests;
