//! Requests accepted by the engine actor.

use crate::errors::CallError;
use crate::provider::{LocalTrack, LocalTracks};
use crate::session::SessionSnapshot;
use common::secret::SecretString;
use common::types::{RoomId, SessionId};
use serde::Serialize;
use tokio::sync::oneshot;

/// A connect the engine refused. The caller gets its tracks back to release.
#[derive(Debug)]
pub struct ConnectRejected {
    pub error: CallError,
    pub tracks: LocalTracks,
}

/// What `hang_up` did under the configured policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HangUpOutcome {
    /// `HANG_UP` was emitted; the host owns the decision.
    DelegatedToHost,
    /// The engine disconnected the session.
    Disconnected,
}

/// State of one local track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalTrackState {
    pub name: String,
    pub enabled: bool,
}

/// Session snapshot plus engine-owned local media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    #[serde(flatten)]
    pub session: SessionSnapshot,
    pub local_audio: Option<LocalTrackState>,
    pub local_video: Option<LocalTrackState>,
    pub audio_route_active: bool,
}

#[derive(Debug)]
pub enum EngineMessage {
    /// Start a session with already-acquired local tracks.
    Connect {
        token: SecretString,
        room_id: RoomId,
        tracks: LocalTracks,
        respond_to: oneshot::Sender<Result<SessionId, ConnectRejected>>,
    },

    /// Local capture permission was refused.
    PermissionsDenied { respond_to: oneshot::Sender<()> },

    Disconnect { respond_to: oneshot::Sender<()> },

    HangUp {
        respond_to: oneshot::Sender<HangUpOutcome>,
    },

    Reset {
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },

    /// Unpublish the camera and hand the track back for release.
    ReleaseLocalVideo {
        respond_to: oneshot::Sender<Option<Box<dyn LocalTrack>>>,
    },

    /// Install a freshly created camera track; returned on refusal.
    RestoreLocalVideo {
        track: Box<dyn LocalTrack>,
        respond_to: oneshot::Sender<Result<(), Box<dyn LocalTrack>>>,
    },

    ToggleLocalAudio {
        respond_to: oneshot::Sender<Option<bool>>,
    },

    ToggleLocalVideo {
        respond_to: oneshot::Sender<Option<bool>>,
    },

    GetSnapshot {
        respond_to: oneshot::Sender<EngineSnapshot>,
    },
}

impl EngineMessage {
    /// Bounded label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineMessage::Connect { .. } => "connect",
            EngineMessage::PermissionsDenied { .. } => "permissions_denied",
            EngineMessage::Disconnect { .. } => "disconnect",
            EngineMessage::HangUp { .. } => "hang_up",
            EngineMessage::Reset { .. } => "reset",
            EngineMessage::ReleaseLocalVideo { .. } => "release_local_video",
            EngineMessage::RestoreLocalVideo { .. } => "restore_local_video",
            EngineMessage::ToggleLocalAudio { .. } => "toggle_local_audio",
            EngineMessage::ToggleLocalVideo { .. } => "toggle_local_video",
            EngineMessage::GetSnapshot { .. } => "get_snapshot",
        }
    }
}
