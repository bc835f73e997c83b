//! Call engine error types.
//!
//! Errors carry a stable numeric code for the host and a client-safe message.
//! Internal details are logged but not shown to end users.

use crate::media::slots::SlotId;
use crate::session::SessionState;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Code reported when a reconnect does not complete within the configured timeout.
pub const RECONNECT_TIMEOUT_CODE: i32 = 1001;

/// Error reported by the media provider, or synthesized by the engine.
///
/// `code` and `explanation` are passed through verbatim to the host in
/// `CONNECT_FAILURE` and `DISCONNECTED_WITH_ERROR` payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("connection error {code}: {explanation}")]
pub struct ConnectionError {
    pub code: i32,
    pub explanation: String,
}

impl ConnectionError {
    pub fn new(code: i32, explanation: impl Into<String>) -> Self {
        Self {
            code,
            explanation: explanation.into(),
        }
    }

    /// Synthesized when a `RECONNECTING` session outlives the reconnect timeout.
    pub fn reconnect_timeout(after: Duration) -> Self {
        Self::new(
            RECONNECT_TIMEOUT_CODE,
            format!("reconnect did not complete within {}s", after.as_secs()),
        )
    }
}

/// Slot pool invariant violations.
///
/// These indicate a composition bug and never occur in correct operation;
/// they are surfaced rather than swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("side slot {index} out of range (pool has {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("slot {0} has no attached track")]
    NotAttached(SlotId),
}

/// Call engine error type.
///
/// Maps to host error codes:
/// - `AlreadyConnecting`, `InvalidState`: 1 (`BAD_REQUEST`)
/// - `PermissionsRequired`: 3 (`FORBIDDEN`)
/// - `Connection`: 4 (`CONNECTION_ERROR`)
/// - `Media`: 5 (`MEDIA_ERROR`)
/// - `Slot`, `Closed`, `Internal`: 6 (`INTERNAL_ERROR`)
#[derive(Debug, Error)]
pub enum CallError {
    /// A connect is already in flight for this engine.
    #[error("connect already in progress")]
    AlreadyConnecting,

    /// Operation is not valid from the current session state.
    #[error("operation {operation} is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// The provider refused or dropped the connection.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Camera or microphone permission was refused.
    #[error("camera and microphone permissions required")]
    PermissionsRequired,

    /// Local media capture failed.
    #[error("local media error: {0}")]
    Media(String),

    /// Slot pool invariant violated.
    #[error("slot invariant violated: {0}")]
    Slot(#[from] SlotError),

    /// The engine actor has stopped.
    #[error("call engine is closed")]
    Closed,

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CallError {
    /// Returns the host-facing error code for this error.
    pub fn error_code(&self) -> i32 {
        match self {
            CallError::AlreadyConnecting | CallError::InvalidState { .. } => 1, // BAD_REQUEST
            CallError::PermissionsRequired => 3,                                // FORBIDDEN
            CallError::Connection(_) => 4,                                      // CONNECTION_ERROR
            CallError::Media(_) => 5,                                           // MEDIA_ERROR
            CallError::Slot(_) | CallError::Closed | CallError::Internal(_) => 6, // INTERNAL_ERROR
        }
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            CallError::AlreadyConnecting => "A call is already being joined".to_string(),
            CallError::InvalidState { .. } => "That action is not available right now".to_string(),
            CallError::Connection(e) => e.explanation.clone(),
            CallError::PermissionsRequired => {
                "Camera and microphone access is required to join".to_string()
            }
            CallError::Media(_) => "Camera or microphone could not be started".to_string(),
            CallError::Slot(_) | CallError::Closed | CallError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}
