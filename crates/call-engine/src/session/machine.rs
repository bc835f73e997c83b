use super::{SessionInfo, SessionSnapshot, SessionState};
use crate::errors::{CallError, ConnectionError};
use crate::events::{CallEvent, ErrorPayload};
use crate::media::{
    Assignment, Composer, CompositionPolicy, Roster, SlotPool, TrackKind, TrackRef, TrackRegistry,
};
use crate::observability;
use crate::provider::{ParticipantSnapshot, ProviderEvent, PublishedTrack, TrackEvent};
use chrono::Utc;
use common::types::{RoomId, SessionId, TrackId};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Which localized notice text an error maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    ConnectionError,
    DisconnectedWithError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    Local,
    ProviderDisconnect,
    ConnectFailure,
    ReconnectTimeout,
    Shutdown,
}

impl TeardownReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TeardownReason::Local => "local",
            TeardownReason::ProviderDisconnect => "provider",
            TeardownReason::ConnectFailure => "connect_failure",
            TeardownReason::ReconnectTimeout => "reconnect_timeout",
            TeardownReason::Shutdown => "shutdown",
        }
    }
}

/// Side effects the caller must run for a teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Teardown {
    pub reason: TeardownReason,
    /// The room is still live on the provider side and must be disconnected.
    pub disconnect_room: bool,
}

/// Outcome of one input to the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub events: Vec<CallEvent>,
    pub notice: Option<NoticeKind>,
    pub teardown: Option<Teardown>,
    pub assignment_changed: bool,
}

impl Transition {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.notice.is_none()
            && self.teardown.is_none()
            && !self.assignment_changed
    }
}

/// Session state machine plus the participant, track, and slot model.
#[derive(Debug)]
pub struct CallSession {
    state: SessionState,
    session: Option<SessionInfo>,
    roster: Roster,
    registry: TrackRegistry,
    pool: SlotPool,
    composer: Composer,
    teardown_done: bool,
}

impl CallSession {
    pub fn new(policy: CompositionPolicy) -> Self {
        Self {
            state: SessionState::Idle,
            session: None,
            roster: Roster::new(),
            registry: TrackRegistry::new(),
            pool: SlotPool::new(),
            composer: Composer::new(policy),
            teardown_done: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    pub fn assignment(&self) -> Assignment {
        self.pool.assignment()
    }

    pub fn teardown_done(&self) -> bool {
        self.teardown_done
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let tracks = self
            .roster
            .identities()
            .map(|identity| (identity.to_string(), self.registry.tracks(identity).to_vec()))
            .collect::<BTreeMap<_, _>>();
        SessionSnapshot {
            state: self.state,
            session: self.session.clone(),
            roster: self.roster.entries().to_vec(),
            tracks,
            assignment: self.pool.assignment(),
            teardown_done: self.teardown_done,
        }
    }

    fn transition_to(&mut self, next: SessionState) {
        let from = self.state;
        if from == next {
            return;
        }
        self.state = next;
        observability::record_state_transition(from.as_str(), next.as_str());
        info!(
            target: "call.session",
            session_id = ?self.session_id().map(|id| id.to_string()),
            from = %from,
            to = %next,
            "Session state changed"
        );
    }

    /// Start a new call attempt. Only valid from `IDLE`.
    pub fn begin_connect(&mut self, room_id: RoomId) -> Result<SessionId, CallError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Connecting => return Err(CallError::AlreadyConnecting),
            state => {
                return Err(CallError::InvalidState {
                    operation: "connect",
                    state,
                })
            }
        }

        let id = SessionId::new();
        self.session = Some(SessionInfo {
            id,
            room_id,
            local_participant_id: None,
            started_at: Utc::now(),
            connected_at: None,
        });
        self.teardown_done = false;
        self.transition_to(SessionState::Connecting);
        Ok(id)
    }

    /// Apply one provider event.
    pub fn apply(&mut self, event: ProviderEvent) -> Result<Transition, CallError> {
        let mut t = Transition::default();
        match event {
            ProviderEvent::Connected {
                local_participant_id,
                participants,
            } => self.on_connected(local_participant_id, participants, &mut t)?,
            ProviderEvent::ConnectFailure { error } => self.on_connect_failure(&error, &mut t),
            ProviderEvent::Reconnecting { error } => {
                if self.state == SessionState::Connected {
                    warn!(
                        target: "call.session",
                        code = error.code,
                        explanation = %error.explanation,
                        "Connection interrupted, reconnecting"
                    );
                    self.transition_to(SessionState::Reconnecting);
                    t.events.push(CallEvent::Reconnecting);
                } else {
                    self.ignore("reconnecting");
                }
            }
            ProviderEvent::Reconnected => {
                if self.state == SessionState::Reconnecting {
                    self.transition_to(SessionState::Connected);
                    t.events.push(CallEvent::Reconnected);
                } else {
                    self.ignore("reconnected");
                }
            }
            ProviderEvent::Disconnected { error } => self.on_disconnected(error, &mut t),
            ProviderEvent::ParticipantConnected { participant } => {
                self.on_participant_connected(participant, &mut t)?;
            }
            ProviderEvent::ParticipantDisconnected { identity } => {
                self.on_participant_disconnected(&identity, &mut t)?;
            }
            ProviderEvent::Track { participant, event } => {
                self.on_track(&participant, event, &mut t)?;
            }
        }
        Ok(t)
    }

    /// Local hang-up or disconnect request. Idempotent once terminal.
    pub fn disconnect(&mut self) -> Transition {
        self.end_locally(TeardownReason::Local)
    }

    /// Engine shutdown. Same as a local disconnect.
    pub fn shutdown(&mut self) -> Transition {
        self.end_locally(TeardownReason::Shutdown)
    }

    /// The provider failed to reconnect in time.
    pub fn reconnect_timed_out(&mut self, error: &ConnectionError) -> Transition {
        let mut t = Transition::default();
        if self.state != SessionState::Reconnecting {
            return t;
        }
        warn!(
            target: "call.session",
            code = error.code,
            explanation = %error.explanation,
            "Reconnect timed out"
        );
        self.transition_to(SessionState::Disconnected);
        t.events
            .push(CallEvent::DisconnectedWithError(ErrorPayload::from(error)));
        t.notice = Some(NoticeKind::DisconnectedWithError);
        self.run_teardown(TeardownReason::ReconnectTimeout, true, &mut t);
        t
    }

    /// Return a terminal session to `IDLE` so a new call can start.
    pub fn reset(&mut self) -> Result<(), CallError> {
        if !self.state.is_terminal() {
            return Err(CallError::InvalidState {
                operation: "reset",
                state: self.state,
            });
        }
        self.session = None;
        self.teardown_done = false;
        self.composer.reset();
        self.transition_to(SessionState::Idle);
        Ok(())
    }

    fn end_locally(&mut self, reason: TeardownReason) -> Transition {
        let mut t = Transition::default();
        if self.state.is_terminal() {
            debug!(
                target: "call.session",
                state = %self.state,
                reason = reason.as_str(),
                "Session already ended"
            );
            return t;
        }
        let was_active = self.state.is_active();
        self.transition_to(SessionState::Disconnected);
        if was_active {
            t.events.push(CallEvent::Disconnected);
        }
        self.run_teardown(reason, was_active, &mut t);
        t
    }

    fn ignore(&self, event_type: &'static str) {
        debug!(
            target: "call.session",
            state = %self.state,
            event_type,
            "Provider event not applicable in current state"
        );
    }

    /// Clears the model and requests external teardown at most once per session.
    fn run_teardown(&mut self, reason: TeardownReason, disconnect_room: bool, t: &mut Transition) {
        if self.teardown_done {
            return;
        }
        self.teardown_done = true;

        self.roster.clear();
        self.registry.clear();
        self.composer.reset();
        self.pool.clear_all();
        self.pool.resize(0);
        observability::set_remote_participants(0);
        observability::set_side_slots(0);

        t.assignment_changed = true;
        t.teardown = Some(Teardown {
            reason,
            disconnect_room,
        });
        info!(
            target: "call.session",
            reason = reason.as_str(),
            "Session torn down"
        );
    }

    fn on_connected(
        &mut self,
        local_participant_id: String,
        participants: Vec<ParticipantSnapshot>,
        t: &mut Transition,
    ) -> Result<(), CallError> {
        if self.state != SessionState::Connecting {
            self.ignore("connected");
            return Ok(());
        }
        self.transition_to(SessionState::Connected);
        if let Some(session) = self.session.as_mut() {
            session.local_participant_id = Some(local_participant_id);
            session.connected_at = Some(Utc::now());
        }
        t.events.push(CallEvent::Connected);

        for participant in participants {
            self.admit(participant);
        }
        observability::set_remote_participants(self.roster.len());
        self.recompose(t)
    }

    fn on_connect_failure(&mut self, error: &ConnectionError, t: &mut Transition) {
        if self.state != SessionState::Connecting {
            self.ignore("connect_failure");
            return;
        }
        warn!(
            target: "call.session",
            code = error.code,
            explanation = %error.explanation,
            "Connect failed"
        );
        self.transition_to(SessionState::Failed);
        t.events
            .push(CallEvent::ConnectFailure(ErrorPayload::from(error)));
        t.notice = Some(NoticeKind::ConnectionError);
        self.run_teardown(TeardownReason::ConnectFailure, false, t);
    }

    fn on_disconnected(&mut self, error: Option<ConnectionError>, t: &mut Transition) {
        if !self.state.is_active() {
            self.ignore("disconnected");
            return;
        }
        self.transition_to(SessionState::Disconnected);
        match error {
            Some(error) => {
                warn!(
                    target: "call.session",
                    code = error.code,
                    explanation = %error.explanation,
                    "Disconnected with error"
                );
                t.events
                    .push(CallEvent::DisconnectedWithError(ErrorPayload::from(&error)));
                t.notice = Some(NoticeKind::DisconnectedWithError);
            }
            None => t.events.push(CallEvent::Disconnected),
        }
        self.run_teardown(TeardownReason::ProviderDisconnect, false, t);
    }

    fn accepts_room_events(&self) -> bool {
        matches!(
            self.state,
            SessionState::Connected | SessionState::Reconnecting
        )
    }

    /// Adds a participant and its initial tracks. Returns `false` for duplicates.
    fn admit(&mut self, snapshot: ParticipantSnapshot) -> bool {
        let is_local = self
            .session
            .as_ref()
            .and_then(|s| s.local_participant_id.as_deref())
            == Some(snapshot.identity.as_str());
        if is_local {
            warn!(
                target: "call.session",
                identity = %snapshot.identity,
                "Local participant reported as remote, ignored"
            );
            return false;
        }
        if !self.roster.add(&snapshot.identity) {
            debug!(
                target: "call.session",
                identity = %snapshot.identity,
                "Duplicate participant arrival ignored"
            );
            return false;
        }
        for PublishedTrack { info, subscribed } in snapshot.tracks {
            if subscribed {
                self.registry.subscribe(&snapshot.identity, info);
            } else {
                self.registry.publish(&snapshot.identity, info);
            }
        }
        true
    }

    fn on_participant_connected(
        &mut self,
        snapshot: ParticipantSnapshot,
        t: &mut Transition,
    ) -> Result<(), CallError> {
        if !self.accepts_room_events() {
            self.ignore("participant_connected");
            return Ok(());
        }
        let identity = snapshot.identity.clone();
        if !self.admit(snapshot) {
            return Ok(());
        }
        info!(target: "call.session", identity = %identity, "Participant joined");
        observability::set_remote_participants(self.roster.len());
        t.events.push(CallEvent::ParticipantConnected { identity });
        self.recompose(t)
    }

    fn on_participant_disconnected(
        &mut self,
        identity: &str,
        t: &mut Transition,
    ) -> Result<(), CallError> {
        if !self.roster.remove(identity) {
            debug!(
                target: "call.session",
                identity = %identity,
                "Departure of unknown participant ignored"
            );
            return Ok(());
        }
        let dropped = self.registry.remove_participant(identity);
        info!(
            target: "call.session",
            identity = %identity,
            tracks = dropped.len(),
            "Participant left"
        );
        observability::set_remote_participants(self.roster.len());
        t.events.push(CallEvent::ParticipantDisconnected {
            identity: identity.to_string(),
        });
        self.recompose(t)
    }

    fn on_track(
        &mut self,
        participant: &str,
        event: TrackEvent,
        t: &mut Transition,
    ) -> Result<(), CallError> {
        if !self.roster.contains(participant) {
            debug!(
                target: "call.session",
                participant = %participant,
                "Track event for participant not in roster ignored"
            );
            return Ok(());
        }

        match event {
            TrackEvent::Published { track } => {
                let is_video = track.kind == TrackKind::Video;
                self.registry.publish(participant, track);
                if is_video {
                    self.recompose(t)?;
                }
            }
            TrackEvent::Unpublished { track_id } => {
                let removed = self.registry.unpublish(participant, &track_id);
                if let Some(record) = removed {
                    if record.subscribed {
                        push_track_event(t, participant, &track_id, record.info.kind, false);
                    }
                    if record.info.kind == TrackKind::Video {
                        self.recompose(t)?;
                    }
                }
            }
            TrackEvent::Subscribed { track } => {
                let kind = track.kind;
                let track_id = track.id.clone();
                if self.registry.subscribe(participant, track) {
                    push_track_event(t, participant, &track_id, kind, true);
                    if kind == TrackKind::Video {
                        self.recompose(t)?;
                    }
                }
            }
            TrackEvent::Unsubscribed { track_id } => {
                if let Some(kind) = self.registry.unsubscribe(participant, &track_id) {
                    push_track_event(t, participant, &track_id, kind, false);
                    if kind == TrackKind::Video {
                        self.recompose(t)?;
                    }
                }
            }
            TrackEvent::Enabled { track_id } => {
                self.refresh_placeholder(participant, track_id, true, t);
            }
            TrackEvent::Disabled { track_id } => {
                self.refresh_placeholder(participant, track_id, false, t);
            }
            TrackEvent::SubscriptionFailed { track, error } => {
                warn!(
                    target: "call.session",
                    participant = %participant,
                    track_id = %track.id,
                    kind = track.kind.as_str(),
                    code = error.code,
                    explanation = %error.explanation,
                    "Track subscription failed"
                );
            }
        }
        Ok(())
    }

    /// Placeholder-only update; slot membership is untouched.
    fn refresh_placeholder(
        &mut self,
        participant: &str,
        track_id: TrackId,
        enabled: bool,
        t: &mut Transition,
    ) {
        let renderable = self
            .registry
            .set_enabled(participant, &track_id, enabled)
            .is_some_and(|r| r.subscribed && r.info.kind == TrackKind::Video);
        if !renderable {
            return;
        }
        let track = TrackRef::new(participant, track_id);
        if let Some(slot) = self.pool.set_placeholder(&track, enabled) {
            observability::record_recomposition("placeholder");
            debug!(
                target: "call.compose",
                track = %track,
                slot = %slot,
                enabled,
                "Placeholder updated"
            );
            t.assignment_changed = true;
        }
    }

    fn recompose(&mut self, t: &mut Transition) -> Result<(), CallError> {
        let composition = self
            .composer
            .recompose(&self.roster, &self.registry, &mut self.pool)?;
        observability::record_recomposition("full");
        observability::set_side_slots(composition.assignment.side.len());
        if !composition.unassigned.is_empty() || !composition.held_screens.is_empty() {
            debug!(
                target: "call.compose",
                unassigned = composition.unassigned.len(),
                held_screens = composition.held_screens.len(),
                "Tracks without a slot"
            );
        }
        t.assignment_changed = true;
        Ok(())
    }
}

fn push_track_event(
    t: &mut Transition,
    participant: &str,
    track_id: &TrackId,
    kind: TrackKind,
    added: bool,
) {
    let participant = participant.to_string();
    let track_id = track_id.to_string();
    let event = match (kind, added) {
        (TrackKind::Audio, true) => CallEvent::AudioTrackAdded {
            participant,
            track_id,
        },
        (TrackKind::Audio, false) => CallEvent::AudioTrackRemoved {
            participant,
            track_id,
        },
        (TrackKind::Video, true) => CallEvent::VideoTrackAdded {
            participant,
            track_id,
        },
        (TrackKind::Video, false) => CallEvent::VideoTrackRemoved {
            participant,
            track_id,
        },
        (TrackKind::Data, _) => return,
    };
    t.events.push(event);
}
