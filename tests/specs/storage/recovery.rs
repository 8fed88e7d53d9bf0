//! Durability specs: state survives a restart from the WAL

use crate::prelude::*;
use tempfile::tempdir;

#[tokio::test]
async fn moved_mutations_are_in_exactly_one_queue_after_restart() {
    let dir = tempdir().unwrap();
    let wal = dir.path().join("sync.wal");

    let (device_id, failed_id, kept_id) = {
        let h = Harness::with_store(SyncConfig::default(), Store::open(&wal).unwrap());
        let failed_id = h.add("mood_entry", json!({ "score": 1 }));
        h.remote.push_result(Err(RemoteError::http(400, "invalid")));
        let kept_id = h.add("voice_checkin", json!({ "duration": 12 }));
        h.remote.push_result(Err(RemoteError::Timeout));

        let report = h.engine.queue().drain_queue(&h.cancel).await;
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(report.retried, 1);
        (h.engine.device().device_id.clone(), failed_id, kept_id)
    };

    let store = Store::open(&wal).unwrap();
    let state = store.state();
    assert!(state.get_mutation(&failed_id).is_none());
    assert!(state.get_dead_letter(&failed_id).is_some());
    assert_eq!(state.get_mutation(&kept_id).map(|m| m.retry_count), Some(1));
    assert!(state.get_dead_letter(&kept_id).is_none());

    let h = Harness::with_store(SyncConfig::default(), store);
    assert_eq!(h.engine.device().device_id, device_id);
    assert_eq!(h.engine.queue().len(), 1);
    assert_eq!(h.engine.dead_letters().items().len(), 1);
}

#[test]
fn compaction_preserves_state_across_restart() {
    let dir = tempdir().unwrap();
    let wal = dir.path().join("sync.wal");

    let pending = {
        let h = Harness::with_store(SyncConfig::default(), Store::open(&wal).unwrap());
        for i in 0..5 {
            h.add("mood_entry", json!({ "score": i }));
        }
        h.store
            .lock()
            .unwrap()
            .set("temp:upload:0", "{}".to_string())
            .unwrap();

        let report = h.engine.maintenance().run_storage_cleanup();
        assert!(report.compacted);
        assert_eq!(report.removed_keys, 1);
        h.engine.queue().pending()
    };

    let h = Harness::with_store(SyncConfig::default(), Store::open(&wal).unwrap());
    similar_asserts::assert_eq!(h.engine.queue().pending(), pending);
    assert!(h.store.lock().unwrap().list_keys("temp:").is_empty());
}
