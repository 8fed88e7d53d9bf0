// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote failure taxonomy and retry classification

use crate::mutation::{EntityType, OperationType};
use thiserror::Error;

/// A failed attempt to apply a record remotely
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited (HTTP 429)")]
    RateLimited,
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("unsupported {operation} on entity type {entity}")]
    Unsupported {
        entity: EntityType,
        operation: OperationType,
    },
    #[error("request cancelled")]
    Cancelled,
}

impl RemoteError {
    /// Build an error from an HTTP status, folding 429 into `RateLimited`
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        if status == 429 {
            RemoteError::RateLimited
        } else {
            RemoteError::Http {
                status,
                message: message.into(),
            }
        }
    }

    /// Stable code recorded on dead letter items and used for grouping
    pub fn code(&self) -> String {
        match self {
            RemoteError::Network(_) => "NETWORK".to_string(),
            RemoteError::Timeout => "TIMEOUT".to_string(),
            RemoteError::RateLimited => "HTTP_429".to_string(),
            RemoteError::Http { status, .. } => format!("HTTP_{}", status),
            RemoteError::Unsupported { .. } => "UNSUPPORTED".to_string(),
            RemoteError::Cancelled => "CANCELLED".to_string(),
        }
    }

    /// HTTP 409: the remote already holds this record
    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Http { status: 409, .. })
    }
}

/// Whether a failed attempt is worth repeating
///
/// Network errors, timeouts, 429 and 5xx are transient. Other 4xx responses
/// and unsupported entity/operation pairs will fail the same way every time.
pub fn is_retryable(error: &RemoteError) -> bool {
    match error {
        RemoteError::Network(_) | RemoteError::Timeout | RemoteError::RateLimited => true,
        RemoteError::Http { status, .. } => *status >= 500,
        RemoteError::Unsupported { .. } => false,
        // Shutdown interrupted the attempt; the mutation itself is fine
        RemoteError::Cancelled => true,
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
