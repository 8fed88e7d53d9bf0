//! Dead letter queue specs

use crate::prelude::*;
use ms_core::QueuedMutation;

fn legacy_mutation(h: &Harness, id: &str, entity: &str) -> QueuedMutation {
    QueuedMutation::new(
        id,
        OperationType::Create,
        EntityType::new(entity),
        json!({ "id": id }),
        "device-old",
        h.clock.utc_now(),
    )
}

#[tokio::test]
async fn unknown_entity_is_archived_without_a_network_call() {
    let h = Harness::new(Harness::fast_config());
    h.engine.dead_letters().add_item(
        legacy_mutation(&h, "x", "unknown_entity"),
        &RemoteError::Network("down".into()),
    );

    let report = h
        .engine
        .maintenance()
        .run_dead_letter_maintenance(&h.cancel)
        .await;

    assert_eq!(report.archived_count, 1);
    assert_eq!(h.remote.call_count(), 0);
    let item = &h.engine.dead_letters().items()[0];
    assert!(item.archived);
    assert_eq!(item.retry_count, 0);
}

#[test]
fn archive_old_items_is_idempotent() {
    let h = Harness::new(SyncConfig::default());
    h.engine
        .dead_letters()
        .add_item(legacy_mutation(&h, "a", "mood_entry"), &RemoteError::Timeout);
    h.engine
        .dead_letters()
        .add_item(legacy_mutation(&h, "b", "mood_entry"), &RemoteError::http(400, "bad"));
    h.clock.advance(DAY * 30 + Duration::from_secs(1));

    let first = h.engine.dead_letters().archive_old_items();
    let snapshot = h.engine.dead_letters().items();
    let second = h.engine.dead_letters().archive_old_items();

    assert_eq!(first, 2);
    assert_eq!(second, 0);
    similar_asserts::assert_eq!(h.engine.dead_letters().items(), snapshot);
}

#[tokio::test]
async fn offline_processing_is_skipped_entirely() {
    let h = Harness::new(Harness::fast_config());
    h.engine
        .dead_letters()
        .add_item(legacy_mutation(&h, "a", "mood_entry"), &RemoteError::Timeout);
    h.network.set_online(false);

    let report = h
        .engine
        .maintenance()
        .run_dead_letter_maintenance(&h.cancel)
        .await;

    assert!(report.processed.skipped_offline);
    assert_eq!(h.remote.call_count(), 0);
    assert_eq!(h.engine.dead_letters().items()[0].retry_count, 0);
}

#[tokio::test]
async fn retryable_items_recover_through_the_shared_breaker() {
    let h = Harness::new(Harness::fast_config());
    h.engine
        .dead_letters()
        .add_item(legacy_mutation(&h, "a", "mood_entry"), &RemoteError::Timeout);
    h.engine
        .dead_letters()
        .add_item(legacy_mutation(&h, "b", "mood_entry"), &RemoteError::http(400, "bad"));

    let report = h
        .engine
        .maintenance()
        .run_dead_letter_maintenance(&h.cancel)
        .await;

    assert_eq!(report.processed.recovered, 1);
    assert_eq!(h.remote.call_count(), 1);
    let stats = h.engine.dead_letters().get_statistics();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.retryable, 0);
    assert_eq!(stats.by_error_code["HTTP_400"], 1);
}
