//! Integration tests for reconnect handling and the reconnect timeout.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use call_engine::errors::RECONNECT_TIMEOUT_CODE;
use call_engine::events::CallEvent;
use call_engine::provider::ProviderEvent;
use call_engine::session::SessionState;
use call_test_utils::fixtures::*;
use call_test_utils::TestEngine;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_reconnect_preserves_session() {
    let mut engine = TestEngine::spawn(test_config());
    engine
        .connect_with(
            "standup",
            vec![
                participant_with_camera("alice", "TA"),
                participant_with_camera("bob", "TB"),
            ],
        )
        .await;
    let before = engine.snapshot().await;

    engine.emit(reconnecting());
    let during = engine.snapshot().await;
    assert_eq!(during.session.state, SessionState::Reconnecting);
    assert_eq!(during.session.roster, before.session.roster);
    assert_eq!(during.session.assignment, before.session.assignment);
    assert!(during.local_video.is_some());

    tokio::time::advance(Duration::from_secs(2)).await;
    engine.emit(ProviderEvent::Reconnected);
    let after = engine.snapshot().await;
    assert_eq!(after.session.state, SessionState::Connected);
    assert_eq!(after.session.assignment, before.session.assignment);

    // The cancelled timer never fires.
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(engine.snapshot().await.session.state, SessionState::Connected);

    assert_eq!(
        engine.observer.event_names(),
        vec!["OPENED", "CONNECTED", "RECONNECTING", "RECONNECTED"]
    );
    assert_eq!(engine.handle.metrics().teardowns(), 0);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_roster_changes_while_reconnecting() {
    let mut engine = TestEngine::spawn(test_config());
    engine
        .connect_with("standup", vec![participant_with_camera("alice", "TA")])
        .await;

    engine.emit(reconnecting());
    engine.emit(joined(participant("bob")));
    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.session.state, SessionState::Reconnecting);
    assert_eq!(snapshot.session.roster.len(), 2);
    assert_eq!(snapshot.session.assignment.side.len(), 2);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_timeout_disconnects() {
    let mut engine = TestEngine::spawn(test_config());
    engine
        .connect_with("standup", vec![participant_with_camera("alice", "TA")])
        .await;

    engine.emit(reconnecting());
    assert_eq!(
        engine.snapshot().await.session.state,
        SessionState::Reconnecting
    );

    tokio::time::advance(Duration::from_secs(test_config().reconnect_timeout_seconds + 1)).await;
    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.session.state, SessionState::Disconnected);
    assert!(snapshot.session.teardown_done);
    assert!(snapshot.session.roster.is_empty());

    let events = engine.observer.events();
    let Some(CallEvent::DisconnectedWithError(payload)) = events.last() else {
        unreachable!("timeout must end with DISCONNECTED_WITH_ERROR");
    };
    assert_eq!(payload.code, RECONNECT_TIMEOUT_CODE.to_string());
    assert_eq!(engine.observer.notices().len(), 1);

    // The provider was still trying, so the engine leaves the room itself.
    assert_eq!(engine.provider.disconnects(), 1);
    assert_eq!(engine.devices.live_tracks(), 0);
    assert_eq!(engine.handle.metrics().teardowns(), 1);

    // A reconnect that lands after the timeout changes nothing.
    engine.emit(ProviderEvent::Reconnected);
    assert_eq!(
        engine.snapshot().await.session.state,
        SessionState::Disconnected
    );
    assert_eq!(engine.observer.count("RECONNECTED"), 0);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_timeout_fires_without_requests() {
    let mut engine = TestEngine::spawn(test_config());
    engine.connect_with("standup", vec![]).await;
    engine.emit(reconnecting());
    engine.snapshot().await;

    // Let the actor's own timer fire while nothing else is happening.
    tokio::time::sleep(Duration::from_secs(test_config().reconnect_timeout_seconds + 1)).await;
    assert_eq!(engine.observer.count("DISCONNECTED_WITH_ERROR"), 1);

    engine.shutdown().await;
}
