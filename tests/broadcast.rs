// Integration tests driving the broadcaster through a scripted source.

use reachcast::broadcaster::{ChangeBroadcaster, Subscription};
use reachcast::error::ReachcastError;
use reachcast::events::ChangeEvent;
use reachcast::source::{ChangeSource, ObservationToken, ScriptedSource, StateSink};
use reachcast::types::ConnectionState::{Cellular, Unavailable, WiFi};
use reachcast::views::{ConnectedPulse, DisconnectedPulse};
use std::sync::Arc;

fn broadcaster_over(source: &Arc<ScriptedSource>) -> ChangeBroadcaster {
    ChangeBroadcaster::new(source.clone() as Arc<dyn ChangeSource>)
}

/// Drains a subscription until the source's terminal signal.
async fn collect_events(mut sub: Subscription) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    loop {
        match sub.recv().await {
            Ok(event) => events.push(event),
            Err(ReachcastError::SourceUnavailable { .. }) => break,
            Err(e) => panic!("unexpected recv error: {e}"),
        }
    }
    events
}

async fn count_connected_pulses(mut view: ConnectedPulse) -> usize {
    let mut pulses = 0;
    while view.recv().await.is_ok() {
        pulses += 1;
    }
    pulses
}

async fn count_disconnected_pulses(mut view: DisconnectedPulse) -> usize {
    let mut pulses = 0;
    while view.recv().await.is_ok() {
        pulses += 1;
    }
    pulses
}

#[tokio::test]
async fn scenario_collapses_duplicates_and_pulses_once_per_edge() {
    let source = ScriptedSource::new();
    let broadcaster = broadcaster_over(&source);

    let mut status = broadcaster.status().unwrap();
    let connected = broadcaster.connected().unwrap();
    let disconnected = broadcaster.disconnected().unwrap();

    for state in [Unavailable, WiFi, WiFi, Cellular, Unavailable] {
        assert!(source.emit(state));
    }

    let mut observed = Vec::new();
    for _ in 0..4 {
        observed.push(status.recv().await.unwrap());
    }
    assert_eq!(observed, vec![Unavailable, WiFi, Cellular, Unavailable]);

    source.fail("end of script");
    assert!(matches!(
        status.recv().await,
        Err(ReachcastError::SourceUnavailable { .. })
    ));
    assert_eq!(count_connected_pulses(connected).await, 1);
    assert_eq!(count_disconnected_pulses(disconnected).await, 1);

    let health = broadcaster.health();
    assert_eq!(health.changes_broadcast, 4);
    assert_eq!(health.duplicates_collapsed, 1);
}

#[tokio::test]
async fn never_emits_consecutive_equal_states() {
    let source = ScriptedSource::new();
    let broadcaster = broadcaster_over(&source);
    let sub = broadcaster.subscribe().unwrap();

    for state in [
        WiFi, WiFi, WiFi, Unavailable, Cellular, Cellular, WiFi, WiFi, Unavailable, Unavailable,
    ] {
        source.emit(state);
    }
    source.fail("end of script");

    let events = collect_events(sub).await;
    assert_eq!(
        events.iter().map(|e| e.current).collect::<Vec<_>>(),
        vec![WiFi, Unavailable, Cellular, WiFi, Unavailable]
    );
    for pair in events.windows(2) {
        assert_ne!(pair[0].current, pair[1].current);
        assert_eq!(pair[1].previous, Some(pair[0].current));
    }
    assert_eq!(events[0].previous, None);
}

#[tokio::test]
async fn reachable_view_mirrors_status_one_to_one() {
    let source = ScriptedSource::new();
    let broadcaster = broadcaster_over(&source);

    let raw = broadcaster.subscribe().unwrap();
    let mut reachable = broadcaster.is_reachable().unwrap();

    for state in [WiFi, Unavailable, Cellular, WiFi] {
        source.emit(state);
    }
    source.fail("end of script");

    let events = collect_events(raw).await;
    let mut booleans = Vec::new();
    loop {
        match reachable.recv().await {
            Ok(b) => booleans.push(b),
            Err(ReachcastError::SourceUnavailable { .. }) => break,
            Err(e) => panic!("unexpected recv error: {e}"),
        }
    }

    assert_eq!(booleans.len(), events.len());
    let expected: Vec<bool> = events.iter().map(|e| e.current.is_reachable()).collect();
    assert_eq!(booleans, expected);
}

#[tokio::test]
async fn first_event_never_pulses_even_when_reachable() {
    let source = ScriptedSource::new();
    let broadcaster = broadcaster_over(&source);
    let connected = broadcaster.connected().unwrap();

    // First observed state is already reachable; only the later
    // unavailable -> wifi edge counts.
    for state in [WiFi, Unavailable, WiFi] {
        source.emit(state);
    }
    source.fail("end of script");

    assert_eq!(count_connected_pulses(connected).await, 1);
}

#[tokio::test]
async fn late_subscriber_receives_nothing_historical() {
    let source = ScriptedSource::new();
    let broadcaster = broadcaster_over(&source);

    let mut first = broadcaster.subscribe().unwrap();
    source.emit(Unavailable);
    source.emit(WiFi);
    assert_eq!(first.recv().await.unwrap().current, Unavailable);
    assert_eq!(first.recv().await.unwrap().current, WiFi);

    // Both prior events are fully delivered; a new subscriber starts blind.
    let mut late = broadcaster.subscribe().unwrap();
    source.emit(Cellular);

    let event = late.recv().await.unwrap();
    assert_eq!(event.current, Cellular);
    assert_eq!(event.previous, Some(WiFi));
}

#[tokio::test]
async fn observation_is_reference_counted() {
    let source = ScriptedSource::new();
    let broadcaster = broadcaster_over(&source);

    assert!(!source.is_observed());
    assert_eq!(broadcaster.subscriber_count(), 0);

    let sub_a = broadcaster.subscribe().unwrap();
    let sub_b = broadcaster.subscribe().unwrap();
    assert!(source.is_observed());
    assert_eq!(source.start_count(), 1);
    assert_eq!(broadcaster.subscriber_count(), 2);

    drop(sub_a);
    assert!(source.is_observed());

    drop(sub_b);
    assert!(!source.is_observed());
    assert_eq!(source.stop_count(), 1);
    assert_eq!(broadcaster.subscriber_count(), 0);
    assert!(!broadcaster.is_active());
}

#[tokio::test]
async fn reactivation_starts_with_a_clean_slate() {
    let source = ScriptedSource::new();
    let broadcaster = broadcaster_over(&source);

    let mut sub = broadcaster.subscribe().unwrap();
    source.emit(WiFi);
    assert_eq!(
        sub.recv().await.unwrap(),
        ChangeEvent {
            previous: None,
            current: WiFi
        }
    );
    drop(sub);

    let mut sub = broadcaster.subscribe().unwrap();
    assert_eq!(source.start_count(), 2);

    // Same state as before detaching; the de-dup memory must not survive
    // the deactivation, so this is a fresh first event.
    source.emit(WiFi);
    assert_eq!(
        sub.recv().await.unwrap(),
        ChangeEvent {
            previous: None,
            current: WiFi
        }
    );
}

#[tokio::test]
async fn source_failure_terminates_all_subscribers() {
    let source = ScriptedSource::new();
    let broadcaster = broadcaster_over(&source);

    let mut sub = broadcaster.subscribe().unwrap();
    let mut other = broadcaster.subscribe().unwrap();
    source.emit(WiFi);
    sub.recv().await.unwrap();
    other.recv().await.unwrap();

    source.fail("detector crashed");

    match sub.recv().await {
        Err(ReachcastError::SourceUnavailable { reason }) => {
            assert!(reason.contains("detector crashed"))
        }
        unexpected => panic!("expected SourceUnavailable, got {unexpected:?}"),
    }
    assert!(matches!(
        other.recv().await,
        Err(ReachcastError::SourceUnavailable { .. })
    ));

    // Terminal: the stream stays closed for these handles.
    assert!(matches!(sub.recv().await, Err(ReachcastError::StreamClosed)));
    assert!(!broadcaster.is_active());
    assert_eq!(broadcaster.health().source_failures, 1);

    // Retry is the subscriber's call: a fresh subscribe re-registers.
    let mut retry = broadcaster.subscribe().unwrap();
    assert_eq!(source.start_count(), 2);
    source.emit(Cellular);
    assert_eq!(
        retry.recv().await.unwrap(),
        ChangeEvent {
            previous: None,
            current: Cellular
        }
    );
}

#[tokio::test]
async fn source_registration_is_released_after_failure() {
    let source = ScriptedSource::new();
    let broadcaster = broadcaster_over(&source);

    let mut sub = broadcaster.subscribe().unwrap();
    source.emit(WiFi);
    sub.recv().await.unwrap();

    source.fail("detector crashed");
    assert!(matches!(
        sub.recv().await,
        Err(ReachcastError::SourceUnavailable { .. })
    ));

    // The dead registration is released at termination, not left for the
    // detach path to find.
    assert!(!source.is_observed());
    assert_eq!(source.stop_count(), 1);

    // Detaching the last subscriber afterwards must not stop it twice.
    drop(sub);
    assert_eq!(source.stop_count(), 1);
    assert_eq!(broadcaster.subscriber_count(), 0);
}

#[tokio::test]
async fn resubscriber_after_failure_never_sees_the_old_terminal() {
    let source = ScriptedSource::new();
    let broadcaster = broadcaster_over(&source);

    let mut doomed = broadcaster.subscribe().unwrap();
    source.fail("detector crashed");
    assert!(matches!(
        doomed.recv().await,
        Err(ReachcastError::SourceUnavailable { .. })
    ));

    // A subscriber attached to the replacement observation only ever sees
    // its own stream; the first thing it receives is a transition, not the
    // previous stream's terminal signal.
    let mut fresh = broadcaster.subscribe().unwrap();
    assert_eq!(source.start_count(), 2);
    source.emit(WiFi);
    assert_eq!(
        fresh.recv().await.unwrap(),
        ChangeEvent {
            previous: None,
            current: WiFi
        }
    );
}

#[tokio::test]
async fn lagging_subscriber_does_not_affect_others() {
    let source = ScriptedSource::new();
    let broadcaster =
        ChangeBroadcaster::with_capacity(source.clone() as Arc<dyn ChangeSource>, 2);

    let mut fast = broadcaster.subscribe().unwrap();
    let mut slow = broadcaster.subscribe().unwrap();

    // The fast reader keeps up with every event; the slow one never polls.
    for state in [WiFi, Unavailable, WiFi, Unavailable, WiFi, Unavailable] {
        source.emit(state);
        assert_eq!(fast.recv().await.unwrap().current, state);
    }

    // The slow reader overflowed its ring and lost the oldest four events,
    // without the fast reader noticing.
    assert!(matches!(slow.recv().await, Err(ReachcastError::Lagged(4))));
    assert_eq!(slow.recv().await.unwrap().current, WiFi);
    assert_eq!(slow.recv().await.unwrap().current, Unavailable);
}

struct FailingSource;

impl ChangeSource for FailingSource {
    fn start_observing(&self, _sink: StateSink) -> Result<ObservationToken, ReachcastError> {
        Err(ReachcastError::SourceUnavailable {
            reason: "detector offline".to_string(),
        })
    }

    fn stop_observing(&self, _token: ObservationToken) {}
}

#[tokio::test]
async fn activation_failure_surfaces_to_the_subscriber() {
    let broadcaster = ChangeBroadcaster::new(Arc::new(FailingSource));

    match broadcaster.subscribe() {
        Err(ReachcastError::SourceUnavailable { reason }) => {
            assert!(reason.contains("detector offline"))
        }
        Err(e) => panic!("expected SourceUnavailable, got {e}"),
        Ok(_) => panic!("subscribe should fail when the source cannot start"),
    }
    assert_eq!(broadcaster.subscriber_count(), 0);
    assert!(!broadcaster.is_active());
}
