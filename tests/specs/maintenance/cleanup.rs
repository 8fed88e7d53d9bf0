//! Scheduled maintenance specs

use crate::prelude::*;

fn seed(h: &Harness, key: String) {
    h.store.lock().unwrap().set(&key, "{}".to_string()).unwrap();
}

fn millis(h: &Harness) -> i64 {
    h.clock.utc_now().timestamp_millis()
}

#[test]
fn storage_cleanup_removes_only_stale_ephemeral_keys() {
    let h = Harness::new(SyncConfig::default());
    let stale_ts = millis(&h) - 8 * 24 * 60 * 60 * 1000;
    let fresh_ts = millis(&h) - 60 * 60 * 1000;
    for i in 0..25 {
        seed(&h, format!("temp:upload-{i}:{stale_ts}"));
        seed(&h, format!("cache:thumb-{i}:{stale_ts}"));
    }
    for i in 0..5 {
        seed(&h, format!("temp:draft-{i}:{fresh_ts}"));
        seed(&h, format!("cache:avatar-{i}:{fresh_ts}"));
    }
    seed(&h, "settings:theme".to_string());

    let report = h.engine.maintenance().run_storage_cleanup();

    assert_eq!(report.removed_keys, 50);
    let store = h.store.lock().unwrap();
    assert_eq!(store.list_keys("temp:").len() + store.list_keys("cache:").len(), 10);
    assert!(store.get("settings:theme").is_some());
}

#[test]
fn storage_cleanup_keeps_newest_sync_summaries() {
    let mut config = SyncConfig::default();
    config.maintenance.keep_sync_summaries = 2;
    let h = Harness::new(config);
    let now = millis(&h);
    for age in 0..5 {
        seed(&h, format!("sync_summary:{:013}", now - age * 1000));
    }

    let report = h.engine.maintenance().run_storage_cleanup();

    assert_eq!(report.trimmed_summaries, 3);
    let kept = h.store.lock().unwrap().list_keys("sync_summary:");
    assert_eq!(
        kept,
        vec![
            format!("sync_summary:{:013}", now - 1000),
            format!("sync_summary:{:013}", now),
        ]
    );
}

#[tokio::test]
async fn full_maintenance_heals_a_stale_open_breaker() {
    let mut config = Harness::fast_config();
    config.breaker.failure_threshold = 1;
    let h = Harness::new(config);
    h.remote.fail_always(RemoteError::Timeout);
    h.add("mood_entry", json!({}));
    h.engine.queue().drain_queue(&h.cancel).await;
    assert_eq!(h.breaker_state(), CircuitState::Open);

    h.clock.advance(DAY + Duration::from_secs(1));
    let report = h
        .engine
        .maintenance()
        .run_full_maintenance_now(&h.cancel)
        .await
        .unwrap();

    assert!(report.health.healed);
    assert_eq!(h.breaker_state(), CircuitState::Closed);
    assert!(h
        .telemetry
        .events()
        .iter()
        .any(|e| matches!(e, TelemetryEvent::StorageCleanup { .. })));
}
