// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote backend adapters

mod http;

pub use http::HttpRemoteApi;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRemoteApi, RemoteCall};

use async_trait::async_trait;
use ms_core::{EntityType, OperationType, RemoteError};

/// Identifier the backend assigned to a saved record
pub type RemoteId = String;

/// Adapter for applying a record change to the remote backend
#[async_trait]
pub trait RemoteApi: Clone + Send + Sync + 'static {
    /// Apply `op` on `entity` with the record in remote field naming
    ///
    /// Callers cancel by dropping the future. Implementations need not stop
    /// an in-flight request; delivery is at least once.
    async fn save(
        &self,
        entity: &EntityType,
        op: OperationType,
        record: &serde_json::Value,
    ) -> Result<RemoteId, RemoteError>;
}
