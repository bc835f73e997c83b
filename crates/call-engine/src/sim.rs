//! Loopback provider and script replay.
//!
//! Used by the `call-engine` binary to exercise the engine without a real
//! media backend. A [`Script`] lists provider events and host requests; the
//! [`LoopbackProvider`] injects the events into the running session.

use crate::actors::{CallEngineHandle, EngineSnapshot};
use crate::errors::{CallError, ConnectionError};
use crate::media::tracks::{TrackInfo, TrackKind, LOCAL_AUDIO_TRACK_NAME};
use crate::provider::{
    ConnectRequest, LocalTrack, MediaDevices, MediaSessionProvider, ProviderEvent,
    ProviderEventSink, RoomHandle,
};
use async_trait::async_trait;
use common::secret::SecretString;
use common::types::RoomId;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Provider error code used when the loopback itself is unusable.
const LOOPBACK_FAILURE_CODE: i32 = 53000;

/// In-process provider. Events are injected with [`LoopbackProvider::emit`].
#[derive(Debug, Clone, Default)]
pub struct LoopbackProvider {
    sink: Arc<Mutex<Option<ProviderEventSink>>>,
}

impl LoopbackProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to the most recent session. Returns `false` if
    /// there is none or the engine has stopped.
    pub fn emit(&self, event: ProviderEvent) -> bool {
        let Ok(guard) = self.sink.lock() else {
            warn!(target: "call.sim", "Loopback sink lock poisoned");
            return false;
        };
        match guard.as_ref() {
            Some(sink) => sink.emit(event),
            None => {
                debug!(target: "call.sim", "No session connected, event not delivered");
                false
            }
        }
    }
}

impl MediaSessionProvider for LoopbackProvider {
    fn connect(
        &self,
        request: ConnectRequest,
        events: ProviderEventSink,
    ) -> Result<Box<dyn RoomHandle>, ConnectionError> {
        let mut guard = self
            .sink
            .lock()
            .map_err(|_| ConnectionError::new(LOOPBACK_FAILURE_CODE, "loopback state unavailable"))?;
        info!(
            target: "call.sim",
            room_id = %request.room_id,
            session_id = %events.session_id(),
            has_audio = request.audio_track.is_some(),
            has_video = request.video_track.is_some(),
            "Loopback connect"
        );
        *guard = Some(events);
        Ok(Box::new(LoopbackRoom {
            room_id: request.room_id,
        }))
    }
}

#[derive(Debug)]
struct LoopbackRoom {
    room_id: RoomId,
}

impl RoomHandle for LoopbackRoom {
    fn publish_track(&mut self, track: &TrackInfo) {
        info!(target: "call.sim", room_id = %self.room_id, track = %track.name, "Publish local track");
    }

    fn unpublish_track(&mut self, track: &TrackInfo) {
        info!(target: "call.sim", room_id = %self.room_id, track = %track.name, "Unpublish local track");
    }

    fn disconnect(&mut self) {
        info!(target: "call.sim", room_id = %self.room_id, "Leave room");
    }
}

/// Capture devices that always succeed once permission is granted.
#[derive(Debug, Clone, Copy)]
pub struct SimDevices {
    granted: bool,
}

impl SimDevices {
    #[must_use]
    pub fn new(granted: bool) -> Self {
        Self { granted }
    }

    fn create(&self, kind: TrackKind, name: &str) -> Result<Box<dyn LocalTrack>, CallError> {
        if !self.granted {
            return Err(CallError::PermissionsRequired);
        }
        Ok(Box::new(SimLocalTrack {
            info: TrackInfo::new(format!("local-{name}"), kind, name),
        }))
    }
}

#[async_trait]
impl MediaDevices for SimDevices {
    fn has_permissions(&self) -> bool {
        self.granted
    }

    async fn request_permissions(&self) -> bool {
        self.granted
    }

    fn create_microphone_track(&self, name: &str) -> Result<Box<dyn LocalTrack>, CallError> {
        self.create(TrackKind::Audio, name)
    }

    fn create_camera_track(&self, name: &str) -> Result<Box<dyn LocalTrack>, CallError> {
        self.create(TrackKind::Video, name)
    }
}

#[derive(Debug)]
struct SimLocalTrack {
    info: TrackInfo,
}

impl LocalTrack for SimLocalTrack {
    fn info(&self) -> &TrackInfo {
        &self.info
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.info.enabled = enabled;
    }

    fn release(self: Box<Self>) {
        let capture = if self.info.name == LOCAL_AUDIO_TRACK_NAME {
            "microphone"
        } else {
            "camera"
        };
        debug!(target: "call.sim", capture, "Capture stopped");
    }
}

/// A scripted call.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub room: String,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptStep {
    /// Delay before this step runs.
    #[serde(default)]
    pub after_ms: u64,
    #[serde(flatten)]
    pub action: StepAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    /// Inject a provider event into the current session.
    Provider { event: ProviderEvent },
    Disconnect,
    HangUp,
    Reset,
    /// Start a new session in the script's room (after a reset).
    Start,
    ReleaseLocalVideo,
    RestoreLocalVideo,
    ToggleLocalAudio,
    ToggleLocalVideo,
}

/// Start a session and replay `script` against it.
///
/// Returns the engine snapshot after the last step.
pub async fn run_script(
    handle: &CallEngineHandle,
    provider: &LoopbackProvider,
    script: &Script,
    token: SecretString,
) -> Result<EngineSnapshot, CallError> {
    let room = RoomId::from(script.room.as_str());
    handle.start(token.clone(), room.clone()).await?;

    for (index, step) in script.steps.iter().enumerate() {
        if step.after_ms > 0 {
            tokio::time::sleep(Duration::from_millis(step.after_ms)).await;
        }
        debug!(target: "call.sim", step = index, action = ?step.action, "Running step");

        match &step.action {
            StepAction::Provider { event } => {
                if !provider.emit(event.clone()) {
                    warn!(target: "call.sim", step = index, "Provider event not delivered");
                }
            }
            StepAction::Disconnect => handle.disconnect().await?,
            StepAction::HangUp => {
                let outcome = handle.hang_up().await?;
                info!(target: "call.sim", ?outcome, "Hang up");
            }
            StepAction::Reset => handle.reset().await?,
            StepAction::Start => {
                handle.start(token.clone(), room.clone()).await?;
            }
            StepAction::ReleaseLocalVideo => {
                handle.release_local_video().await?;
            }
            StepAction::RestoreLocalVideo => {
                handle.restore_local_video().await?;
            }
            StepAction::ToggleLocalAudio => {
                let enabled = handle.toggle_local_audio().await?;
                info!(target: "call.sim", ?enabled, "Microphone toggled");
            }
            StepAction::ToggleLocalVideo => {
                let enabled = handle.toggle_local_video().await?;
                info!(target: "call.sim", ?enabled, "Camera toggled");
            }
        }
    }

    handle.snapshot().await
}
