//! Call session lifecycle.
//!
//! [`CallSession`] is the single owner of session state, the roster, the
//! track registry, and the slot pool. It performs no I/O: each input
//! returns a [`Transition`] describing the events to publish and whether
//! teardown must run, and the engine actor carries those out.

mod machine;

pub use machine::{CallSession, NoticeKind, Teardown, TeardownReason, Transition};

use crate::media::{Assignment, RosterEntry, TrackRecord};
use chrono::{DateTime, Utc};
use common::types::{RoomId, SessionId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Connection state of a session.
///
/// ```text
/// IDLE -> CONNECTING -> CONNECTED <-> RECONNECTING
///              |            |              |
///              v            v              v
///           FAILED     DISCONNECTED   DISCONNECTED
/// ```
///
/// `FAILED` is only entered when a connect attempt is rejected. A fault
/// after the room was joined ends in `DISCONNECTED` carrying the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    Failed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::Connecting => "CONNECTING",
            SessionState::Connected => "CONNECTED",
            SessionState::Reconnecting => "RECONNECTING",
            SessionState::Disconnected => "DISCONNECTED",
            SessionState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Disconnected | SessionState::Failed)
    }

    /// Connecting, connected, or reconnecting.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Connected | SessionState::Reconnecting
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one call attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub room_id: RoomId,
    pub local_participant_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a session, for hosts and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session: Option<SessionInfo>,
    pub roster: Vec<RosterEntry>,
    pub tracks: BTreeMap<String, Vec<TrackRecord>>,
    pub assignment: Assignment,
    pub teardown_done: bool,
}
