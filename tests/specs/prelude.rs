//! Shared harness for engine specs

pub use ms_adapters::{FakeNetworkMonitor, FakeRemoteApi, FakeTelemetry};
pub use ms_core::{
    CircuitState, Clock, EntityType, FakeClock, OperationType, RemoteError, SequentialIdGen,
    SyncConfig, TelemetryEvent,
};
pub use ms_engine::{EngineDeps, SharedStore, SyncEngine};
pub use ms_storage::{KeyValueStore, Store};
pub use serde_json::json;
pub use std::sync::{Arc, Mutex};
pub use std::time::Duration;
pub use tokio_util::sync::CancellationToken;

pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

pub type Engine =
    SyncEngine<FakeRemoteApi, FakeNetworkMonitor, FakeTelemetry, FakeClock, SequentialIdGen>;

/// A fully wired engine plus handles on its fakes
pub struct Harness {
    pub engine: Engine,
    pub remote: FakeRemoteApi,
    pub network: FakeNetworkMonitor,
    pub telemetry: FakeTelemetry,
    pub clock: FakeClock,
    pub store: SharedStore,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new(config: SyncConfig) -> Self {
        Self::with_store(config, Store::in_memory())
    }

    pub fn with_store(config: SyncConfig, store: Store) -> Self {
        let remote = FakeRemoteApi::new();
        let network = FakeNetworkMonitor::online();
        let telemetry = FakeTelemetry::new();
        let clock = FakeClock::new();
        let store = Arc::new(Mutex::new(store));
        let engine = SyncEngine::new(
            config,
            EngineDeps {
                remote: remote.clone(),
                network: network.clone(),
                telemetry: telemetry.clone(),
                store: Arc::clone(&store),
            },
            clock.clone(),
            SequentialIdGen::default(),
        )
        .unwrap();
        Self {
            engine,
            remote,
            network,
            telemetry,
            clock,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Config with no backoff delays so DLQ passes run instantly
    pub fn fast_config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.dead_letter.backoff.base = Duration::ZERO;
        config.dead_letter.backoff.cap = Duration::ZERO;
        config.dead_letter.backoff.max_jitter = Duration::ZERO;
        config
    }

    pub fn add(&self, entity: &str, payload: serde_json::Value) -> String {
        self.engine
            .add_mutation(OperationType::Create, EntityType::new(entity), payload)
            .unwrap()
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.engine.health_metrics().state
    }
}
