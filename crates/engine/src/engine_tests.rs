// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ms_adapters::{FakeNetworkMonitor, FakeRemoteApi, FakeTelemetry};
use ms_core::{AllowList, FakeClock, RemoteError, SequentialIdGen};
use ms_storage::Store;
use serde_json::json;

type TestEngine =
    SyncEngine<FakeRemoteApi, FakeNetworkMonitor, FakeTelemetry, FakeClock, SequentialIdGen>;

fn build(config: SyncConfig, store: SharedStore, network: FakeNetworkMonitor) -> (TestEngine, FakeRemoteApi) {
    let remote = FakeRemoteApi::new();
    let deps = EngineDeps {
        remote: remote.clone(),
        network,
        telemetry: FakeTelemetry::new(),
        store,
    };
    let engine = SyncEngine::new(config, deps, FakeClock::new(), SequentialIdGen::default()).unwrap();
    (engine, remote)
}

fn memory_store() -> SharedStore {
    Arc::new(Mutex::new(Store::in_memory()))
}

fn mood() -> EntityType {
    EntityType::new("mood_entry")
}

#[test]
fn device_identity_is_reused_across_engines() {
    let store = memory_store();
    let config = SyncConfig {
        device_name: Some("phone".to_string()),
        ..SyncConfig::default()
    };

    let (first, _) = build(config.clone(), Arc::clone(&store), FakeNetworkMonitor::online());
    let (second, _) = build(config, store, FakeNetworkMonitor::online());

    assert_eq!(first.device().device_id, second.device().device_id);
    assert_eq!(second.device().device_name.as_deref(), Some("phone"));
}

#[test]
fn queued_mutations_carry_device_id() {
    let (engine, _) = build(SyncConfig::default(), memory_store(), FakeNetworkMonitor::online());

    engine
        .add_mutation(OperationType::Create, mood(), json!({}))
        .unwrap();

    assert_eq!(engine.queue().pending()[0].device_id, engine.device().device_id);
}

#[tokio::test]
async fn configured_allow_list_is_shared_by_queue_and_dead_letters() {
    let config = SyncConfig {
        allow_list: AllowList::empty().with_entity("achievement", &OperationType::ALL),
        ..SyncConfig::default()
    };
    let (engine, remote) = build(config, memory_store(), FakeNetworkMonitor::online());

    let rejected = engine.add_mutation(OperationType::Create, mood(), json!({}));
    assert_eq!(rejected, Err(QueueError::UnsupportedEntity(mood())));

    let mutation = ms_core::QueuedMutation::new(
        "legacy",
        OperationType::Create,
        mood(),
        json!({}),
        "device-1",
        chrono::Utc::now(),
    );
    engine
        .dead_letters()
        .add_item(mutation, &RemoteError::Timeout);
    let report = engine
        .maintenance()
        .run_dead_letter_maintenance(&CancellationToken::new())
        .await;

    assert_eq!(report.archived_count, 1);
    assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn run_syncs_at_startup_when_online() {
    let (engine, remote) = build(SyncConfig::default(), memory_store(), FakeNetworkMonitor::online());
    engine
        .add_mutation(OperationType::Create, mood(), json!({}))
        .unwrap();
    let cancel = CancellationToken::new();

    let stop = async {
        while !engine.queue().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(engine.run(&cancel), stop)
    })
    .await
    .unwrap();

    assert_eq!(remote.call_count(), 1);
}

#[tokio::test]
async fn regaining_connectivity_drains_queue() {
    let network = FakeNetworkMonitor::offline();
    let (engine, remote) = build(SyncConfig::default(), memory_store(), network.clone());
    engine
        .add_mutation(OperationType::Update, mood(), json!({ "id": "a" }))
        .unwrap();
    let cancel = CancellationToken::new();

    let driver = async {
        tokio::task::yield_now().await;
        assert_eq!(remote.call_count(), 0);
        network.set_online(true);
        while !engine.queue().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(engine.run(&cancel), driver)
    })
    .await
    .unwrap();

    assert_eq!(remote.call_count(), 1);
    assert!(engine.health_metrics().is_healthy);
}

#[tokio::test]
async fn cancelled_engine_stops_immediately() {
    let network = FakeNetworkMonitor::offline();
    let (engine, remote) = build(SyncConfig::default(), memory_store(), network);
    let cancel = CancellationToken::new();
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), engine.run(&cancel))
        .await
        .unwrap();

    assert_eq!(remote.call_count(), 0);
}
