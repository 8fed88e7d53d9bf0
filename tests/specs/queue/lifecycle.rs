//! Mutation lifecycle specs
//!
//! Every accepted mutation ends applied or archived in the dead letter
//! queue, never both and never lost.

use crate::prelude::*;
use std::collections::HashSet;

#[test]
fn add_mutation_rejects_unknown_entity_without_enqueueing() {
    let h = Harness::new(SyncConfig::default());

    let result = h.engine.add_mutation(
        OperationType::Create,
        EntityType::new("unknown_entity"),
        json!({}),
    );

    assert!(result.is_err());
    assert!(h.engine.queue().is_empty());
}

#[tokio::test]
async fn add_mutation_never_touches_the_network() {
    let h = Harness::new(SyncConfig::default());

    h.add("mood_entry", json!({ "score": 2 }));
    h.add("voice_checkin", json!({ "seconds": 30 }));

    assert_eq!(h.remote.call_count(), 0);
    assert_eq!(h.engine.queue().len(), 2);
}

#[tokio::test]
async fn every_mutation_reaches_exactly_one_terminal_state() {
    let h = Harness::new(Harness::fast_config());
    let ids: Vec<String> = (0..8)
        .map(|i| h.add("mood_entry", json!({ "n": i })))
        .collect();

    h.remote.push_result(Ok("r-a".into()));
    h.remote.push_result(Err(RemoteError::http(422, "invalid")));
    h.remote.push_result(Err(RemoteError::http(503, "down")));
    h.remote.push_result(Err(RemoteError::http(400, "bad")));
    h.remote.push_result(Ok("r-b".into()));
    h.remote.fail_always(RemoteError::Timeout);

    // Queue phase: drain until every mutation has left the queue
    for _ in 0..100 {
        if h.engine.queue().is_empty() {
            break;
        }
        h.engine.queue().drain_queue(&h.cancel).await;
        h.clock.advance(Duration::from_secs(61));
    }
    assert!(h.engine.queue().is_empty());

    // DLQ phase: recover what can be recovered, archive the rest
    h.remote.succeed_always();
    h.clock.advance(DAY);
    h.engine.maintenance().run_health_check();
    h.engine
        .maintenance()
        .run_dead_letter_maintenance(&h.cancel)
        .await;
    h.clock.advance(DAY * 31);
    h.engine.dead_letters().archive_old_items();

    let dead: Vec<_> = h.engine.dead_letters().items();
    let dead_ids: HashSet<&str> = dead.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(dead_ids.len(), dead.len(), "duplicate dead letter ids");
    assert!(dead.iter().all(|item| item.archived));
    assert!(!dead.is_empty());
    for id in &ids {
        let queued = h.engine.queue().pending().iter().any(|m| &m.id == id);
        assert!(!queued, "{} still queued", id);
    }
}
