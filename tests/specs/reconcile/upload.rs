//! Cross-device reconciliation specs

use crate::prelude::*;
use ms_engine::{CachedRecord, SyncState};

fn mood_record(h: &Harness, local_id: &str, state: Option<SyncState>) -> CachedRecord {
    CachedRecord {
        local_id: local_id.to_string(),
        entity_type: EntityType::new("mood_entry"),
        fields: json!({ "moodScore": 4, "localId": local_id }),
        remote_id: (state == Some(SyncState::Synced)).then(|| format!("srv-{local_id}")),
        sync_state: state,
        device_id: None,
        updated_at: h.clock.utc_now(),
    }
}

#[tokio::test]
async fn only_unsynced_records_are_uploaded() {
    let h = Harness::new(SyncConfig::default());
    let reconciler = h.engine.reconciler();
    reconciler
        .put_record(&mood_record(&h, "m1", Some(SyncState::Pending)))
        .unwrap();
    reconciler.put_record(&mood_record(&h, "m2", None)).unwrap();
    reconciler
        .put_record(&mood_record(&h, "m3", Some(SyncState::Synced)))
        .unwrap();

    let result = reconciler.reconcile(&h.cancel).await.unwrap();

    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 0);
    let calls = h.remote.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.record["mood_score"] == 4));

    let mood = EntityType::new("mood_entry");
    for id in ["m1", "m2"] {
        let record = reconciler.get_record(&mood, id).unwrap();
        assert_eq!(record.sync_state, Some(SyncState::Synced));
        assert!(record.remote_id.is_some());
        assert_eq!(record.device_id.as_deref(), Some(h.engine.device().device_id.as_str()));
    }

    let again = reconciler.reconcile(&h.cancel).await.unwrap();
    assert_eq!(again.successful, 0);
    assert_eq!(h.remote.call_count(), 2);
}

#[tokio::test]
async fn conflicts_are_counted_and_not_retried() {
    let h = Harness::new(SyncConfig::default());
    let reconciler = h.engine.reconciler();
    reconciler
        .put_record(&mood_record(&h, "dup", Some(SyncState::Pending)))
        .unwrap();
    h.remote.push_result(Err(RemoteError::http(409, "exists")));

    let result = reconciler.reconcile(&h.cancel).await.unwrap();

    assert_eq!(result.conflicts, 1);
    assert_eq!(result.successful, 0);
    let again = reconciler.reconcile(&h.cancel).await.unwrap();
    assert_eq!(again.conflicts, 0);
    assert_eq!(h.remote.call_count(), 1);
}

#[tokio::test]
async fn reconciliation_writes_a_sync_summary() {
    let h = Harness::new(SyncConfig::default());

    h.engine.reconciler().reconcile(&h.cancel).await.unwrap();

    let keys = h.store.lock().unwrap().list_keys("sync_summary:");
    assert_eq!(keys.len(), 1);
    assert!(h
        .telemetry
        .events()
        .iter()
        .any(|e| matches!(e, TelemetryEvent::SyncCompleted { successful: 0, .. })));
}
