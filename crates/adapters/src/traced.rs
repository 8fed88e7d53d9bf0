// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::remote::{RemoteApi, RemoteId};
use async_trait::async_trait;
use ms_core::{is_retryable, EntityType, OperationType, RemoteError};
use tracing::Instrument;

/// Wrapper that adds tracing to any RemoteApi
#[derive(Clone)]
pub struct TracedRemoteApi<R> {
    inner: R,
}

impl<R> TracedRemoteApi<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: RemoteApi> RemoteApi for TracedRemoteApi<R> {
    async fn save(
        &self,
        entity: &EntityType,
        op: OperationType,
        record: &serde_json::Value,
    ) -> Result<RemoteId, RemoteError> {
        let span = tracing::info_span!("remote.save", entity = %entity, op = %op);

        async {
            tracing::debug!("sending");

            let start = std::time::Instant::now();
            let result = self.inner.save(entity, op, record).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(remote_id) => tracing::info!(remote_id = %remote_id, elapsed_ms, "saved"),
                Err(e) if is_retryable(e) => tracing::warn!(
                    elapsed_ms,
                    code = %e.code(),
                    error = %e,
                    "save failed (retryable)"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms,
                    code = %e.code(),
                    error = %e,
                    "save rejected"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
