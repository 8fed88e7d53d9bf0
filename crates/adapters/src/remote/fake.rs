// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake remote adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{RemoteApi, RemoteId};
use async_trait::async_trait;
use ms_core::{EntityType, OperationType, RemoteError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded remote call
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub entity_type: EntityType,
    pub operation_type: OperationType,
    pub record: serde_json::Value,
}

#[derive(Default)]
struct FakeRemoteState {
    calls: Vec<RemoteCall>,
    /// Results handed out before falling back to `fallback`
    scripted: VecDeque<Result<RemoteId, RemoteError>>,
    /// `None` means succeed with a generated id
    fallback: Option<RemoteError>,
    next_id: u64,
    delay: Option<Duration>,
}

/// Fake remote adapter for testing
///
/// Succeeds with `remote-N` ids unless scripted otherwise.
#[derive(Clone, Default)]
pub struct FakeRemoteApi {
    inner: Arc<Mutex<FakeRemoteState>>,
}

impl FakeRemoteApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote that fails every call with `error`
    pub fn failing(error: RemoteError) -> Self {
        let fake = Self::new();
        fake.fail_always(error);
        fake
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Queue a result for the next unscripted call
    pub fn push_result(&self, result: Result<RemoteId, RemoteError>) {
        self.lock().scripted.push_back(result);
    }

    pub fn fail_always(&self, error: RemoteError) {
        self.lock().fallback = Some(error);
    }

    pub fn succeed_always(&self) {
        self.lock().fallback = None;
    }

    /// Make every call sleep before answering
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeRemoteState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RemoteApi for FakeRemoteApi {
    async fn save(
        &self,
        entity: &EntityType,
        op: OperationType,
        record: &serde_json::Value,
    ) -> Result<RemoteId, RemoteError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(RemoteCall {
                entity_type: entity.clone(),
                operation_type: op,
                record: record.clone(),
            });
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(result) = state.scripted.pop_front() {
            return result;
        }
        match &state.fallback {
            Some(error) => Err(error.clone()),
            None => {
                state.next_id += 1;
                Ok(format!("remote-{}", state.next_id))
            }
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
