// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Breaker-gated remote apply
//!
//! Every remote write from the queue, the DLQ and reconciliation goes
//! through [`RemoteGate::apply`], so they all share one breaker and one
//! allow-list.

use ms_adapters::{RemoteApi, RemoteId, TelemetrySink};
use ms_core::{
    is_retryable, AllowList, CircuitBreaker, CircuitState, Clock, EntityType, OperationType,
    RemoteError, TelemetryEvent,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Result of one gated remote call
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Applied(RemoteId),
    Rejected(RemoteError),
    /// The breaker refused the call; nothing was sent
    BreakerOpen,
}

#[derive(Clone)]
pub struct RemoteGate<R, T, C> {
    remote: R,
    breaker: Arc<Mutex<CircuitBreaker>>,
    allow_list: Arc<AllowList>,
    telemetry: T,
    clock: C,
}

impl<R, T, C> RemoteGate<R, T, C>
where
    R: RemoteApi,
    T: TelemetrySink,
    C: Clock,
{
    pub fn new(
        remote: R,
        breaker: Arc<Mutex<CircuitBreaker>>,
        allow_list: Arc<AllowList>,
        telemetry: T,
        clock: C,
    ) -> Self {
        Self {
            remote,
            breaker,
            allow_list,
            telemetry,
            clock,
        }
    }

    pub fn breaker(&self) -> &Arc<Mutex<CircuitBreaker>> {
        &self.breaker
    }

    pub fn allow_list(&self) -> &Arc<AllowList> {
        &self.allow_list
    }

    /// Send one record change to the remote
    ///
    /// Pairs outside the allow-list are rejected without touching the breaker
    /// or the network. Retryable errors count as breaker failures; other
    /// responses prove the remote is reachable and count as successes. A
    /// cancelled call releases its breaker slot without a verdict.
    pub async fn apply(
        &self,
        entity: &EntityType,
        op: OperationType,
        record: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> GateOutcome {
        if !self.allow_list.allows(op, entity) {
            return GateOutcome::Rejected(RemoteError::Unsupported {
                entity: entity.clone(),
                operation: op,
            });
        }

        let allowed = self.with_breaker(|breaker, clock| breaker.allow_request(clock));
        if !allowed {
            return GateOutcome::BreakerOpen;
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.remote.save(entity, op, record) => Some(result),
        };

        match result {
            None => {
                self.with_breaker(|breaker, _| breaker.record_abandoned());
                GateOutcome::Rejected(RemoteError::Cancelled)
            }
            Some(Ok(remote_id)) => {
                self.with_breaker(|breaker, _| breaker.record_success());
                GateOutcome::Applied(remote_id)
            }
            Some(Err(error)) if is_retryable(&error) => {
                self.with_breaker(|breaker, clock| breaker.record_failure(clock));
                GateOutcome::Rejected(error)
            }
            Some(Err(error)) => {
                self.with_breaker(|breaker, _| breaker.record_success());
                GateOutcome::Rejected(error)
            }
        }
    }

    /// Run `f` on the breaker and report any state transition
    pub fn with_breaker<V>(&self, f: impl FnOnce(&mut CircuitBreaker, &C) -> V) -> V {
        let (value, from, to) = {
            let mut breaker = self.lock_breaker();
            let from = breaker.state();
            let value = f(&mut breaker, &self.clock);
            (value, from, breaker.state())
        };
        if from != to {
            match to {
                CircuitState::Open => tracing::warn!(%from, %to, "circuit breaker opened"),
                _ => tracing::info!(%from, %to, "circuit breaker state changed"),
            }
            self.telemetry
                .record(TelemetryEvent::BreakerStateChanged { from, to });
        }
        value
    }

    fn lock_breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
