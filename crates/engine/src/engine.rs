// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine wiring and the background run loop

use crate::dead_letter::DeadLetterQueue;
use crate::device::DeviceIdentity;
use crate::error::QueueError;
use crate::gate::RemoteGate;
use crate::maintenance::Maintenance;
use crate::persist::SharedStore;
use crate::queue::MutationQueue;
use crate::reconcile::Reconciler;
use crate::scheduler::{ScheduledTask, Scheduler};
use ms_adapters::{NetworkMonitor, RemoteApi, TelemetrySink};
use ms_core::{
    CircuitBreaker, Clock, EntityType, HealthMetrics, IdGen, OperationType, SyncConfig,
    UuidIdGen,
};
use ms_storage::StoreError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Idle wait when nothing is scheduled
const IDLE_POLL: Duration = Duration::from_secs(60);

/// Adapter dependencies for the engine
pub struct EngineDeps<R, N, T> {
    pub remote: R,
    pub network: N,
    pub telemetry: T,
    pub store: SharedStore,
}

/// The sync engine: one instance per process, no global state
pub struct SyncEngine<R, N, T, C, I> {
    config: SyncConfig,
    device: DeviceIdentity,
    network: N,
    clock: C,
    gate: RemoteGate<R, T, C>,
    queue: MutationQueue<R, T, C, I>,
    dead_letters: Arc<DeadLetterQueue<N, T, C>>,
    maintenance: Maintenance<R, N, T, C>,
    reconciler: Reconciler<R, T, C>,
}

impl<R, N, T, C, I> SyncEngine<R, N, T, C, I>
where
    R: RemoteApi,
    N: NetworkMonitor,
    T: TelemetrySink,
    C: Clock,
    I: IdGen,
{
    /// Wire every component around one store, breaker and allow-list
    ///
    /// Fails only when a new device identity cannot be persisted.
    pub fn new(
        config: SyncConfig,
        deps: EngineDeps<R, N, T>,
        clock: C,
        id_gen: I,
    ) -> Result<Self, StoreError> {
        let EngineDeps {
            remote,
            network,
            telemetry,
            store,
        } = deps;

        let device = DeviceIdentity::load_or_create(
            &store,
            &UuidIdGen,
            &clock,
            config.device_name.as_deref(),
        )?;

        let allow_list = Arc::new(config.allow_list.clone());
        let breaker = Arc::new(Mutex::new(CircuitBreaker::new(config.breaker.clone())));
        let gate = RemoteGate::new(
            remote,
            breaker,
            Arc::clone(&allow_list),
            telemetry.clone(),
            clock.clone(),
        );

        let queue = MutationQueue::new(
            Arc::clone(&store),
            gate.clone(),
            telemetry.clone(),
            clock.clone(),
            id_gen,
            config.queue.clone(),
            device.device_id.clone(),
        );
        let dead_letters = Arc::new(DeadLetterQueue::new(
            Arc::clone(&store),
            network.clone(),
            telemetry.clone(),
            clock.clone(),
            allow_list,
            config.dead_letter.clone(),
        ));
        let maintenance = Maintenance::new(
            Arc::clone(&dead_letters),
            gate.clone(),
            Arc::clone(&store),
            telemetry.clone(),
            clock.clone(),
            config.maintenance.clone(),
        );
        let reconciler = Reconciler::new(
            store,
            gate.clone(),
            telemetry,
            clock.clone(),
            &config.reconcile.field_mappings,
            device.device_id.clone(),
        );

        tracing::info!(device_id = %device.device_id, "sync engine ready");
        Ok(Self {
            config,
            device,
            network,
            clock,
            gate,
            queue,
            dead_letters,
            maintenance,
            reconciler,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn queue(&self) -> &MutationQueue<R, T, C, I> {
        &self.queue
    }

    pub fn dead_letters(&self) -> &DeadLetterQueue<N, T, C> {
        &self.dead_letters
    }

    pub fn maintenance(&self) -> &Maintenance<R, N, T, C> {
        &self.maintenance
    }

    pub fn reconciler(&self) -> &Reconciler<R, T, C> {
        &self.reconciler
    }

    pub fn add_mutation(
        &self,
        operation_type: OperationType,
        entity_type: EntityType,
        payload: serde_json::Value,
    ) -> Result<String, QueueError> {
        self.queue.add_mutation(operation_type, entity_type, payload)
    }

    pub fn health_metrics(&self) -> HealthMetrics {
        self.gate
            .with_breaker(|breaker, clock| breaker.health_metrics(clock))
    }

    /// Drive scheduled work and connectivity reactions until `cancel` fires
    ///
    /// Regaining connectivity triggers a drain followed by reconciliation.
    /// Drain and reconciliation timers are skipped while offline.
    pub async fn run(&self, cancel: &CancellationToken) {
        let mut scheduler = Scheduler::new();
        scheduler.init_from_config(&self.config, &self.clock);

        let mut connectivity = self.network.subscribe();
        let mut watching = true;
        let mut was_online = *connectivity.borrow_and_update();
        tracing::info!(online = was_online, "sync engine started");

        if was_online {
            self.sync_now(cancel).await;
        }

        loop {
            let wait = scheduler
                .next_fire_time()
                .map(|at| at.saturating_duration_since(self.clock.now()))
                .unwrap_or(IDLE_POLL);

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = connectivity.changed(), if watching => {
                    if changed.is_err() {
                        tracing::warn!("network monitor closed, relying on timers");
                        watching = false;
                        continue;
                    }
                    let online = *connectivity.borrow_and_update();
                    if online && !was_online {
                        tracing::info!("connectivity regained, syncing");
                        self.sync_now(cancel).await;
                    }
                    was_online = online;
                }
                _ = tokio::time::sleep(wait) => {
                    for item in scheduler.poll(self.clock.now()) {
                        if cancel.is_cancelled() {
                            break;
                        }
                        self.run_task(item.task, cancel).await;
                    }
                }
            }
        }

        tracing::info!("sync engine stopped");
    }

    /// Drain the queue, then reconcile cached records
    pub async fn sync_now(&self, cancel: &CancellationToken) {
        self.queue.drain_queue(cancel).await;
        self.reconciler.reconcile(cancel).await;
    }

    async fn run_task(&self, task: ScheduledTask, cancel: &CancellationToken) {
        tracing::debug!(%task, "scheduled task due");
        match task {
            ScheduledTask::Drain | ScheduledTask::Reconcile if !self.network.is_online() => {
                tracing::debug!(%task, "offline, skipping");
            }
            ScheduledTask::Drain => {
                self.queue.drain_queue(cancel).await;
            }
            ScheduledTask::Reconcile => {
                self.reconciler.reconcile(cancel).await;
            }
            ScheduledTask::DeadLetterMaintenance => {
                self.maintenance.run_dead_letter_maintenance(cancel).await;
            }
            ScheduledTask::HealthCheck => {
                self.maintenance.run_health_check();
            }
            ScheduledTask::StorageCleanup => {
                self.maintenance.run_storage_cleanup();
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
