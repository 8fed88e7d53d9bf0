//! Breaker-gated drain specs

use crate::prelude::*;

fn config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.breaker.failure_threshold = 3;
    config.queue.max_attempts = 5;
    config
}

#[tokio::test]
async fn always_failing_remote_opens_breaker_then_dead_letters_each_mutation() {
    let h = Harness::new(config());
    h.remote.fail_always(RemoteError::Network("unreachable".into()));
    for i in 0..3 {
        h.add("mood_entry", json!({ "n": i }));
    }

    let first = h.engine.queue().drain_queue(&h.cancel).await;
    assert_eq!(first.retried, 3);
    assert_eq!(h.breaker_state(), CircuitState::Open);
    assert!(h.engine.queue().pending().iter().all(|m| m.retry_count == 1));

    // Breaker stays open: nothing is sent
    let blocked = h.engine.queue().drain_queue(&h.cancel).await;
    assert_eq!(blocked.skipped_by_breaker, 3);
    assert_eq!(h.remote.call_count(), 3);

    for _ in 0..50 {
        if h.engine.queue().is_empty() {
            break;
        }
        h.clock.advance(Duration::from_secs(60));
        h.engine.queue().drain_queue(&h.cancel).await;
        for mutation in h.engine.queue().pending() {
            assert!(mutation.retry_count < 5);
        }
    }

    assert!(h.engine.queue().is_empty());
    let dead = h.engine.dead_letters().items();
    assert_eq!(dead.len(), 3);
    for item in &dead {
        assert!(item.can_retry);
        assert_eq!(item.queue_attempts, 5);
        assert_eq!(item.error_code, "NETWORK");
    }
    assert_eq!(h.remote.call_count(), 15);
}

#[tokio::test]
async fn half_open_successes_close_the_breaker() {
    let h = Harness::new(config());
    h.remote.fail_always(RemoteError::Timeout);
    for i in 0..4 {
        h.add("achievement", json!({ "n": i }));
    }
    h.engine.queue().drain_queue(&h.cancel).await;
    assert_eq!(h.breaker_state(), CircuitState::Open);

    h.remote.succeed_always();
    h.clock.advance(Duration::from_secs(60));
    let report = h.engine.queue().drain_queue(&h.cancel).await;

    assert_eq!(report.applied, 4);
    assert_eq!(h.breaker_state(), CircuitState::Closed);
    assert!(h.engine.queue().is_empty());
    let transitions: Vec<_> = h
        .telemetry
        .events()
        .into_iter()
        .filter_map(|event| match event {
            TelemetryEvent::BreakerStateChanged { from, to } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}
