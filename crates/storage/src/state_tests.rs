// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{TimeZone, Utc};
use ms_core::{DeadLetterReason, EntityType, OperationType, RemoteError};

fn mutation(id: &str) -> QueuedMutation {
    QueuedMutation::new(
        id,
        OperationType::Create,
        EntityType::new("mood_entry"),
        serde_json::json!({"moodScore": 3}),
        "dev-1",
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    )
}

fn dead_letter(id: &str) -> DeadLetterItem {
    DeadLetterItem::from_mutation(
        mutation(id),
        DeadLetterReason::from(&RemoteError::http(503, "unavailable")),
        Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(),
    )
}

#[test]
fn queue_keeps_fifo_order() {
    let mut state = MaterializedState::default();
    for id in ["a", "b", "c"] {
        state.apply(&Operation::MutationEnqueued {
            mutation: mutation(id),
        });
    }
    state.apply(&Operation::MutationApplied {
        id: "b".to_string(),
        remote_id: Some("r-1".to_string()),
    });

    let ids: Vec<_> = state.queue.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[test]
fn retried_updates_count_and_error() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::MutationEnqueued {
        mutation: mutation("a"),
    });
    state.apply(&Operation::MutationRetried {
        id: "a".to_string(),
        retry_count: 2,
        last_error: "timeout".to_string(),
    });

    let m = state.get_mutation("a").unwrap();
    assert_eq!(m.retry_count, 2);
    assert_eq!(m.last_error.as_deref(), Some("timeout"));
}

#[test]
fn dead_lettering_moves_out_of_queue() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::MutationEnqueued {
        mutation: mutation("a"),
    });
    state.apply(&Operation::DeadLettered {
        item: dead_letter("a"),
    });

    assert!(state.queue.is_empty());
    assert_eq!(state.dead_letters.len(), 1);
    assert!(state.get_dead_letter("a").unwrap().can_retry);
}

#[test]
fn applied_mutation_leaves_no_dead_letter() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::DeadLettered {
        item: dead_letter("a"),
    });
    state.apply(&Operation::MutationApplied {
        id: "a".to_string(),
        remote_id: None,
    });

    assert!(state.get_dead_letter("a").is_none());
    assert!(state.queue.is_empty());
}

#[test]
fn archive_is_monotonic() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::DeadLettered {
        item: dead_letter("a"),
    });
    let first = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();

    state.apply(&Operation::DeadLetterArchived {
        id: "a".to_string(),
        archived_at: first,
    });
    state.apply(&Operation::DeadLetterArchived {
        id: "a".to_string(),
        archived_at: second,
    });

    let item = state.get_dead_letter("a").unwrap();
    assert!(item.archived);
    assert_eq!(item.archived_at, Some(first));
}

#[test]
fn retry_failed_refreshes_error_fields() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::DeadLettered {
        item: dead_letter("a"),
    });
    state.apply(&Operation::DeadLetterRetryFailed {
        id: "a".to_string(),
        retry_count: 1,
        error_message: "HTTP 400: bad".to_string(),
        error_code: "HTTP_400".to_string(),
        can_retry: false,
    });

    let item = state.get_dead_letter("a").unwrap();
    assert_eq!(item.retry_count, 1);
    assert_eq!(item.error_code, "HTTP_400");
    assert!(!item.can_retry);
}

#[test]
fn resolved_and_purged_remove_items() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::DeadLettered {
        item: dead_letter("a"),
    });
    state.apply(&Operation::DeadLettered {
        item: dead_letter("b"),
    });

    state.apply(&Operation::DeadLetterResolved {
        id: "a".to_string(),
    });
    state.apply(&Operation::DeadLetterPurged {
        id: "b".to_string(),
    });

    assert!(state.dead_letters.is_empty());
}

#[test]
fn key_set_and_remove() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::KeySet {
        key: "device_identity".to_string(),
        value: "{}".to_string(),
    });
    assert_eq!(state.kv.get("device_identity").map(String::as_str), Some("{}"));

    state.apply(&Operation::KeyRemoved {
        key: "device_identity".to_string(),
    });
    assert!(state.kv.is_empty());
}

#[test]
fn to_operations_rebuilds_identical_state() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::MutationEnqueued {
        mutation: mutation("a"),
    });
    state.apply(&Operation::MutationEnqueued {
        mutation: mutation("b"),
    });
    state.apply(&Operation::DeadLettered {
        item: dead_letter("a"),
    });
    state.apply(&Operation::KeySet {
        key: "cache:x:1".to_string(),
        value: "1".to_string(),
    });

    let mut rebuilt = MaterializedState::default();
    for op in state.to_operations() {
        rebuilt.apply(&op);
    }

    assert_eq!(rebuilt, state);
}
