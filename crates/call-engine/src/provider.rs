//! Media provider boundary.
//!
//! The provider owns the actual transport. It reports everything that
//! happens in the room through a [`ProviderEventSink`]; the engine
//! applies those events one at a time, in delivery order. Local capture
//! goes through [`MediaDevices`], which is only driven from request paths.

use crate::errors::{CallError, ConnectionError};
use crate::media::tracks::TrackInfo;
use async_trait::async_trait;
use common::secret::SecretString;
use common::types::{RoomId, SessionId, TrackId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

/// A track as seen at join time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedTrack {
    #[serde(flatten)]
    pub info: TrackInfo,
    #[serde(default)]
    pub subscribed: bool,
}

/// A remote participant and the tracks it had published when first seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub identity: String,
    #[serde(default)]
    pub tracks: Vec<PublishedTrack>,
}

impl ParticipantSnapshot {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            tracks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_track(mut self, info: TrackInfo, subscribed: bool) -> Self {
        self.tracks.push(PublishedTrack { info, subscribed });
        self
    }
}

/// Per-track notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackEvent {
    Published { track: TrackInfo },
    Unpublished { track_id: TrackId },
    Subscribed { track: TrackInfo },
    Unsubscribed { track_id: TrackId },
    Enabled { track_id: TrackId },
    Disabled { track_id: TrackId },
    SubscriptionFailed { track: TrackInfo, error: ConnectionError },
}

/// Everything a provider can report about a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    Connected {
        local_participant_id: String,
        #[serde(default)]
        participants: Vec<ParticipantSnapshot>,
    },
    ConnectFailure {
        error: ConnectionError,
    },
    Reconnecting {
        error: ConnectionError,
    },
    Reconnected,
    Disconnected {
        #[serde(default)]
        error: Option<ConnectionError>,
    },
    ParticipantConnected {
        participant: ParticipantSnapshot,
    },
    ParticipantDisconnected {
        identity: String,
    },
    Track {
        participant: String,
        event: TrackEvent,
    },
}

impl ProviderEvent {
    /// Bounded label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderEvent::Connected { .. } => "connected",
            ProviderEvent::ConnectFailure { .. } => "connect_failure",
            ProviderEvent::Reconnecting { .. } => "reconnecting",
            ProviderEvent::Reconnected => "reconnected",
            ProviderEvent::Disconnected { .. } => "disconnected",
            ProviderEvent::ParticipantConnected { .. } => "participant_connected",
            ProviderEvent::ParticipantDisconnected { .. } => "participant_disconnected",
            ProviderEvent::Track { .. } => "track",
        }
    }
}

/// Channel the provider uses to report room events.
///
/// Each sink is bound to one session; events from an earlier session that
/// arrive late are discarded by the engine.
#[derive(Debug, Clone)]
pub struct ProviderEventSink {
    session_id: SessionId,
    sender: mpsc::UnboundedSender<(SessionId, ProviderEvent)>,
}

impl ProviderEventSink {
    pub fn new(
        session_id: SessionId,
        sender: mpsc::UnboundedSender<(SessionId, ProviderEvent)>,
    ) -> Self {
        Self { session_id, sender }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Queue an event. Returns `false` once the engine has stopped.
    pub fn emit(&self, event: ProviderEvent) -> bool {
        let kind = event.kind();
        if self.sender.send((self.session_id, event)).is_err() {
            debug!(
                target: "call.session",
                session_id = %self.session_id,
                event_type = kind,
                "Engine gone, provider event discarded"
            );
            return false;
        }
        true
    }
}

/// Parameters of a connect call.
#[derive(Debug)]
pub struct ConnectRequest {
    pub token: SecretString,
    pub room_id: RoomId,
    pub audio_track: Option<TrackInfo>,
    pub video_track: Option<TrackInfo>,
}

/// Establishes rooms.
pub trait MediaSessionProvider: Send + Sync {
    /// Begin connecting. Returns immediately with a room handle; the
    /// outcome is reported later through `events`.
    fn connect(
        &self,
        request: ConnectRequest,
        events: ProviderEventSink,
    ) -> Result<Box<dyn RoomHandle>, ConnectionError>;
}

/// A live (or connecting) room.
pub trait RoomHandle: Send {
    fn publish_track(&mut self, track: &TrackInfo);
    fn unpublish_track(&mut self, track: &TrackInfo);
    fn disconnect(&mut self);
}

/// A locally captured track.
pub trait LocalTrack: Send + fmt::Debug {
    fn info(&self) -> &TrackInfo;
    fn set_enabled(&mut self, enabled: bool);
    /// Stop capture and free the device.
    fn release(self: Box<Self>);
}

/// Local capture devices and their permissions.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    fn has_permissions(&self) -> bool;

    /// Ask the user for camera and microphone access.
    async fn request_permissions(&self) -> bool;

    fn create_microphone_track(&self, name: &str) -> Result<Box<dyn LocalTrack>, CallError>;

    fn create_camera_track(&self, name: &str) -> Result<Box<dyn LocalTrack>, CallError>;
}

/// Local tracks owned by the engine for the life of a session.
#[derive(Debug, Default)]
pub struct LocalTracks {
    pub audio: Option<Box<dyn LocalTrack>>,
    pub video: Option<Box<dyn LocalTrack>>,
}

impl LocalTracks {
    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }

    /// Release every held track.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for track in [self.audio.take(), self.video.take()].into_iter().flatten() {
            debug!(target: "call.session", track = %track.info().name, "Releasing local track");
            track.release();
            released += 1;
        }
        released
    }
}
