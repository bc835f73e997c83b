//! Pre-configured test data.
//!
//! Provides:
//! - Remote track descriptions (camera, screen, microphone)
//! - Participant snapshots
//! - Provider events in the shapes tests use most
//! - Engine configuration and access tokens

use call_engine::config::Config;
use call_engine::errors::ConnectionError;
use call_engine::media::tracks::SCREEN_SHARE_TRACK_NAME;
use call_engine::media::{TrackInfo, TrackKind, TrackRef};
use call_engine::provider::{ParticipantSnapshot, ProviderEvent, TrackEvent};
use common::secret::SecretString;

/// Identity the mock provider assigns to the local participant.
pub const LOCAL_IDENTITY: &str = "local-user";

/// Remote camera track.
#[must_use]
pub fn camera(id: &str) -> TrackInfo {
    TrackInfo::new(id, TrackKind::Video, "camera")
}

/// Remote screen share track.
#[must_use]
pub fn screen(id: &str) -> TrackInfo {
    TrackInfo::new(id, TrackKind::Video, SCREEN_SHARE_TRACK_NAME)
}

/// Remote microphone track.
#[must_use]
pub fn microphone(id: &str) -> TrackInfo {
    TrackInfo::new(id, TrackKind::Audio, "microphone")
}

#[must_use]
pub fn track_ref(participant: &str, id: &str) -> TrackRef {
    TrackRef::new(participant, id)
}

/// Participant with no tracks.
#[must_use]
pub fn participant(identity: &str) -> ParticipantSnapshot {
    ParticipantSnapshot::new(identity)
}

/// Participant with one subscribed camera track.
#[must_use]
pub fn participant_with_camera(identity: &str, track_id: &str) -> ParticipantSnapshot {
    ParticipantSnapshot::new(identity).with_track(camera(track_id), true)
}

/// The room accepted the connect.
#[must_use]
pub fn connected(participants: Vec<ParticipantSnapshot>) -> ProviderEvent {
    ProviderEvent::Connected {
        local_participant_id: LOCAL_IDENTITY.to_string(),
        participants,
    }
}

#[must_use]
pub fn joined(participant: ParticipantSnapshot) -> ProviderEvent {
    ProviderEvent::ParticipantConnected { participant }
}

#[must_use]
pub fn left(identity: &str) -> ProviderEvent {
    ProviderEvent::ParticipantDisconnected {
        identity: identity.to_string(),
    }
}

#[must_use]
pub fn subscribed(participant: &str, track: TrackInfo) -> ProviderEvent {
    track_event(participant, TrackEvent::Subscribed { track })
}

#[must_use]
pub fn unsubscribed(participant: &str, track_id: &str) -> ProviderEvent {
    track_event(
        participant,
        TrackEvent::Unsubscribed {
            track_id: track_id.into(),
        },
    )
}

#[must_use]
pub fn disabled(participant: &str, track_id: &str) -> ProviderEvent {
    track_event(
        participant,
        TrackEvent::Disabled {
            track_id: track_id.into(),
        },
    )
}

#[must_use]
pub fn enabled(participant: &str, track_id: &str) -> ProviderEvent {
    track_event(
        participant,
        TrackEvent::Enabled {
            track_id: track_id.into(),
        },
    )
}

#[must_use]
pub fn track_event(participant: &str, event: TrackEvent) -> ProviderEvent {
    ProviderEvent::Track {
        participant: participant.to_string(),
        event,
    }
}

/// Network dropped; provider is retrying.
#[must_use]
pub fn reconnecting() -> ProviderEvent {
    ProviderEvent::Reconnecting {
        error: network_error(),
    }
}

#[must_use]
pub fn network_error() -> ConnectionError {
    ConnectionError::new(53001, "Signaling connection disconnected")
}

#[must_use]
pub fn room_full_error() -> ConnectionError {
    ConnectionError::new(53105, "Room contains too many participants")
}

/// Default configuration with a short reconnect timeout.
#[must_use]
pub fn test_config() -> Config {
    Config {
        reconnect_timeout_seconds: 5,
        ..Config::default()
    }
}

#[must_use]
pub fn test_token() -> SecretString {
    SecretString::from("test-access-token")
}
