//! Host-facing lifecycle events and the observer seam.
//!
//! Every state change the host may care about is published as a
//! [`CallEvent`]. Event names are the stable `SCREAMING_SNAKE_CASE`
//! contract the host matches on.

use crate::errors::ConnectionError;
use crate::observability;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Error details attached to failure events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub description: String,
}

impl From<&ConnectionError> for ErrorPayload {
    fn from(error: &ConnectionError) -> Self {
        Self {
            code: error.code.to_string(),
            description: error.explanation.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallEvent {
    Opened,
    Connected,
    ConnectFailure(ErrorPayload),
    Reconnecting,
    Reconnected,
    Disconnected,
    DisconnectedWithError(ErrorPayload),
    ParticipantConnected { identity: String },
    ParticipantDisconnected { identity: String },
    AudioTrackAdded { participant: String, track_id: String },
    AudioTrackRemoved { participant: String, track_id: String },
    VideoTrackAdded { participant: String, track_id: String },
    VideoTrackRemoved { participant: String, track_id: String },
    PermissionsRequired,
    HangUp,
    Closed,
}

impl CallEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CallEvent::Opened => "OPENED",
            CallEvent::Connected => "CONNECTED",
            CallEvent::ConnectFailure(_) => "CONNECT_FAILURE",
            CallEvent::Reconnecting => "RECONNECTING",
            CallEvent::Reconnected => "RECONNECTED",
            CallEvent::Disconnected => "DISCONNECTED",
            CallEvent::DisconnectedWithError(_) => "DISCONNECTED_WITH_ERROR",
            CallEvent::ParticipantConnected { .. } => "PARTICIPANT_CONNECTED",
            CallEvent::ParticipantDisconnected { .. } => "PARTICIPANT_DISCONNECTED",
            CallEvent::AudioTrackAdded { .. } => "AUDIO_TRACK_ADDED",
            CallEvent::AudioTrackRemoved { .. } => "AUDIO_TRACK_REMOVED",
            CallEvent::VideoTrackAdded { .. } => "VIDEO_TRACK_ADDED",
            CallEvent::VideoTrackRemoved { .. } => "VIDEO_TRACK_REMOVED",
            CallEvent::PermissionsRequired => "PERMISSIONS_REQUIRED",
            CallEvent::HangUp => "HANG_UP",
            CallEvent::Closed => "CLOSED",
        }
    }

    /// Event data as JSON, or `None` for events without a payload.
    pub fn payload(&self) -> Option<serde_json::Value> {
        let mut value = serde_json::to_value(self).ok()?;
        value.get_mut("data").map(serde_json::Value::take)
    }
}

/// User-facing error notice, raised when the host has not taken over error UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorNotice {
    pub message: String,
    pub accept_label: String,
}

/// Receives host events from the engine.
///
/// Called from the engine actor; implementations must not block.
pub trait CallObserver: Send + Sync {
    fn on_event(&self, event: &CallEvent);

    fn on_error_notice(&self, notice: &ErrorNotice) {
        info!(target: "call.events", message = %notice.message, "Error notice raised");
    }
}

/// Everything an observer channel can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostNotification {
    Event(CallEvent),
    Notice(ErrorNotice),
}

/// Forwards events into a bounded channel without blocking the engine.
///
/// When the host falls behind, events are dropped and counted.
#[derive(Debug)]
pub struct ChannelObserver {
    sender: mpsc::Sender<HostNotification>,
    dropped: AtomicU64,
}

impl ChannelObserver {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<HostNotification>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (
            Self {
                sender,
                dropped: AtomicU64::new(0),
            },
            receiver,
        )
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn forward(&self, notification: HostNotification) {
        if let Err(e) = self.sender.try_send(notification) {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            observability::record_event_dropped();
            warn!(
                target: "call.events",
                error = %e,
                dropped_total = total,
                "Host notification dropped"
            );
        }
    }
}

impl CallObserver for ChannelObserver {
    fn on_event(&self, event: &CallEvent) {
        self.forward(HostNotification::Event(event.clone()));
    }

    fn on_error_notice(&self, notice: &ErrorNotice) {
        self.forward(HostNotification::Notice(notice.clone()));
    }
}
