// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use ms_core::{EntityType, OperationType, QueuedMutation};

fn enqueue(id: &str) -> Operation {
    Operation::MutationEnqueued {
        mutation: QueuedMutation::new(
            id,
            OperationType::Create,
            EntityType::new("mood_entry"),
            serde_json::json!({}),
            "dev-1",
            Utc::now(),
        ),
    }
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal").join("sync.wal");

    {
        let mut store = Store::open(&path).unwrap();
        store.commit(enqueue("a")).unwrap();
        store.commit(enqueue("b")).unwrap();
        store.set("device_identity", "{}".to_string()).unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.state().queue.len(), 2);
    assert_eq!(store.get("device_identity"), Some("{}"));
}

#[test]
fn failed_commit_leaves_state_untouched() {
    let mut store = Store::in_memory();
    store.set_fail_writes(true);

    let err = store.commit(enqueue("a")).unwrap_err();

    assert!(matches!(err, StoreError::WriteRejected(_)));
    assert!(store.state().queue.is_empty());

    store.apply_in_memory(enqueue("a"));
    assert_eq!(store.state().queue.len(), 1);
}

#[test]
fn list_keys_filters_by_prefix() {
    let mut store = Store::in_memory();
    for key in ["cache:a:1", "temp:b:2", "cache:c:3", "cachet", "record:mood_entry:1"] {
        store.set(key, "{}".to_string()).unwrap();
    }

    assert_eq!(store.list_keys("cache:"), vec!["cache:a:1", "cache:c:3"]);
    assert_eq!(store.list_keys("").len(), 5);
}

#[test]
fn remove_reports_presence() {
    let mut store = Store::in_memory();
    store.set("temp:x:1", "{}".to_string()).unwrap();

    assert!(store.remove("temp:x:1").unwrap());
    assert!(!store.remove("temp:x:1").unwrap());
}

#[test]
fn compact_shrinks_log_and_preserves_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sync.wal");

    let mut store = Store::open(&path).unwrap();
    for i in 0..20 {
        store.set(&format!("temp:k:{i}"), "{}".to_string()).unwrap();
    }
    for i in 0..18 {
        store.remove(&format!("temp:k:{i}")).unwrap();
    }
    store.commit(enqueue("a")).unwrap();
    let before = store.state().clone();

    let result = store.compact().unwrap();
    assert_eq!(result.entries_before, 39);
    assert_eq!(result.entries_after, 3);
    drop(store);

    let reopened = Store::open(&path).unwrap();
    assert_eq!(reopened.state(), &before);
}

#[test]
fn in_memory_compact_is_a_noop() {
    let mut store = Store::in_memory();
    store.commit(enqueue("a")).unwrap();

    let result = store.compact().unwrap();

    assert_eq!(result.entries_before, 0);
    assert_eq!(store.state().queue.len(), 1);
}
