//! Integration tests for local camera and microphone control.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use call_engine::media::TrackKind;
use call_engine::provider::LocalTracks;
use call_engine::session::SessionState;
use call_test_utils::fixtures::*;
use call_test_utils::TestEngine;
use common::types::RoomId;

#[tokio::test]
async fn test_release_and_restore_local_video() {
    let mut engine = TestEngine::spawn(test_config());
    engine.connect_with("standup", vec![]).await;

    assert!(engine.handle.release_local_video().await.unwrap());
    assert_eq!(engine.provider.room_log().unpublished, vec!["camera"]);
    assert_eq!(engine.devices.tracks_released(), 1);
    assert!(engine.snapshot().await.local_video.is_none());

    // Nothing left to release.
    assert!(!engine.handle.release_local_video().await.unwrap());

    assert!(engine.handle.restore_local_video().await.unwrap());
    assert_eq!(engine.provider.room_log().published, vec!["camera"]);
    assert_eq!(engine.devices.tracks_created(), 3);
    let video = engine.snapshot().await.local_video.unwrap();
    assert_eq!(video.name, "camera");
    assert!(video.enabled);

    // Already live: no second capture.
    assert!(!engine.handle.restore_local_video().await.unwrap());
    assert_eq!(engine.devices.tracks_created(), 3);

    engine.shutdown().await;
    assert_eq!(engine.devices.live_tracks(), 0);
}

#[tokio::test]
async fn test_restore_refused_after_session_ended() {
    let mut engine = TestEngine::spawn(test_config());
    engine.connect_with("standup", vec![]).await;
    engine.handle.disconnect().await.unwrap();

    assert!(!engine.handle.restore_local_video().await.unwrap());
    assert!(engine.provider.room_log().published.is_empty());
    assert_eq!(engine.devices.live_tracks(), 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_toggle_local_tracks() {
    let mut engine = TestEngine::spawn(test_config());
    engine.connect_with("standup", vec![]).await;

    assert_eq!(engine.handle.toggle_local_audio().await.unwrap(), Some(false));
    assert_eq!(engine.handle.toggle_local_audio().await.unwrap(), Some(true));
    assert_eq!(engine.handle.toggle_local_video().await.unwrap(), Some(false));

    let snapshot = engine.snapshot().await;
    assert!(snapshot.local_audio.unwrap().enabled);
    assert!(!snapshot.local_video.unwrap().enabled);

    // Tracks are gone once the session ends.
    engine.handle.disconnect().await.unwrap();
    assert_eq!(engine.handle.toggle_local_audio().await.unwrap(), None);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_connect_with_caller_tracks() {
    let mut engine = TestEngine::spawn(test_config());
    let tracks = LocalTracks {
        audio: Some(engine.devices.track(TrackKind::Audio, "microphone")),
        video: None,
    };

    engine
        .handle
        .connect(test_token(), RoomId::from("audio-only"), tracks)
        .await
        .unwrap();
    engine.emit(connected(vec![]));

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.session.state, SessionState::Connected);
    assert!(snapshot.local_audio.is_some());
    assert!(snapshot.local_video.is_none());
    assert_eq!(engine.provider.rooms(), vec![RoomId::from("audio-only")]);

    engine.shutdown().await;
    assert_eq!(engine.devices.live_tracks(), 0);
}
