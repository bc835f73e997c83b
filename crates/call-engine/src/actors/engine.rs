//! `CallEngine` - the actor that owns one call.
//!
//! The actor is the only writer of session state. It consumes two inputs
//! from a single loop:
//! - host requests on a bounded mailbox, answered via `oneshot`;
//! - provider room events on an unbounded queue, tagged with the session
//!   they belong to.
//!
//! Provider events already queued, and a reconnect deadline that has
//! passed, are applied before the next host request.
//!
//! Local capture (permission prompts, camera and microphone creation,
//! releasing a paused camera) runs in the caller's task through
//! [`CallEngineHandle`], never inside the actor loop.

use super::messages::{
    ConnectRejected, EngineMessage, EngineSnapshot, HangUpOutcome, LocalTrackState,
};
use super::metrics::{EngineMetrics, MailboxMonitor, QueueKind};
use crate::audio::{AudioPlatform, AudioRouteController};
use crate::config::Config;
use crate::errors::{CallError, ConnectionError};
use crate::events::{CallEvent, CallObserver, ErrorNotice};
use crate::media::tracks::{LOCAL_AUDIO_TRACK_NAME, LOCAL_VIDEO_TRACK_NAME};
use crate::media::Assignment;
use crate::observability;
use crate::provider::{
    ConnectRequest, LocalTrack, LocalTracks, MediaDevices, MediaSessionProvider, ProviderEvent,
    ProviderEventSink, RoomHandle,
};
use crate::session::{CallSession, NoticeKind, SessionState, Teardown, Transition};

use common::secret::SecretString;
use common::types::{RoomId, SessionId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Capacity of the host request mailbox.
const ENGINE_CHANNEL_BUFFER: usize = 64;

/// External systems the engine drives.
pub struct Collaborators {
    pub provider: Arc<dyn MediaSessionProvider>,
    pub devices: Arc<dyn MediaDevices>,
    pub audio: Box<dyn AudioPlatform>,
    pub observer: Arc<dyn CallObserver>,
}

/// Handle to a running [`CallEngine`].
#[derive(Clone)]
pub struct CallEngineHandle {
    sender: mpsc::Sender<EngineMessage>,
    cancel_token: CancellationToken,
    devices: Arc<dyn MediaDevices>,
    assignments: watch::Receiver<Assignment>,
    metrics: Arc<EngineMetrics>,
    engine_id: String,
}

impl CallEngineHandle {
    #[must_use]
    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineMessage,
    ) -> Result<T, CallError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| CallError::Closed)?;
        rx.await.map_err(|_| CallError::Closed)
    }

    /// Check permissions, capture local media, and connect to `room_id`.
    ///
    /// On permission refusal `PERMISSIONS_REQUIRED` is emitted and no
    /// connect is attempted.
    pub async fn start(&self, token: SecretString, room_id: RoomId) -> Result<SessionId, CallError> {
        if !self.devices.has_permissions() && !self.devices.request_permissions().await {
            warn!(
                target: "call.actor.engine",
                engine_id = %self.engine_id,
                "Camera and microphone permissions refused"
            );
            self.request(|respond_to| EngineMessage::PermissionsDenied { respond_to })
                .await?;
            return Err(CallError::PermissionsRequired);
        }

        let tracks = self.acquire_local_tracks()?;
        self.connect(token, room_id, tracks).await
    }

    fn acquire_local_tracks(&self) -> Result<LocalTracks, CallError> {
        let audio = self.devices.create_microphone_track(LOCAL_AUDIO_TRACK_NAME)?;
        let video = match self.devices.create_camera_track(LOCAL_VIDEO_TRACK_NAME) {
            Ok(video) => video,
            Err(e) => {
                audio.release();
                return Err(e);
            }
        };
        Ok(LocalTracks {
            audio: Some(audio),
            video: Some(video),
        })
    }

    /// Connect with caller-supplied local tracks.
    ///
    /// The engine owns the tracks from here on; if the connect is refused
    /// they are released before this returns.
    pub async fn connect(
        &self,
        token: SecretString,
        room_id: RoomId,
        tracks: LocalTracks,
    ) -> Result<SessionId, CallError> {
        let (tx, rx) = oneshot::channel();
        let message = EngineMessage::Connect {
            token,
            room_id,
            tracks,
            respond_to: tx,
        };
        if let Err(mpsc::error::SendError(message)) = self.sender.send(message).await {
            if let EngineMessage::Connect { mut tracks, .. } = message {
                tracks.release_all();
            }
            return Err(CallError::Closed);
        }

        match rx.await.map_err(|_| CallError::Closed)? {
            Ok(session_id) => Ok(session_id),
            Err(ConnectRejected { error, mut tracks }) => {
                tracks.release_all();
                Err(error)
            }
        }
    }

    /// Leave the room. Valid from any state; a no-op once ended.
    pub async fn disconnect(&self) -> Result<(), CallError> {
        self.request(|respond_to| EngineMessage::Disconnect { respond_to })
            .await
    }

    /// Hang up according to the configured policy.
    pub async fn hang_up(&self) -> Result<HangUpOutcome, CallError> {
        self.request(|respond_to| EngineMessage::HangUp { respond_to })
            .await
    }

    /// Return an ended session to `IDLE`.
    pub async fn reset(&self) -> Result<(), CallError> {
        self.request(|respond_to| EngineMessage::Reset { respond_to })
            .await?
    }

    /// Stop publishing and release the camera (host went to background).
    ///
    /// Returns `false` if there was no camera track.
    pub async fn release_local_video(&self) -> Result<bool, CallError> {
        let track = self
            .request(|respond_to| EngineMessage::ReleaseLocalVideo { respond_to })
            .await?;
        Ok(match track {
            Some(track) => {
                track.release();
                true
            }
            None => false,
        })
    }

    /// Recreate and publish the camera after [`Self::release_local_video`].
    ///
    /// Returns `false` if a camera track is already live or the session
    /// cannot take one.
    pub async fn restore_local_video(&self) -> Result<bool, CallError> {
        if self.snapshot().await?.local_video.is_some() {
            return Ok(false);
        }
        if !self.devices.has_permissions() {
            return Err(CallError::PermissionsRequired);
        }
        let track = self.devices.create_camera_track(LOCAL_VIDEO_TRACK_NAME)?;
        let outcome = self
            .request(|respond_to| EngineMessage::RestoreLocalVideo { track, respond_to })
            .await?;
        Ok(match outcome {
            Ok(()) => true,
            Err(track) => {
                track.release();
                false
            }
        })
    }

    /// Flip the microphone. Returns the new enabled state, or `None` without a track.
    pub async fn toggle_local_audio(&self) -> Result<Option<bool>, CallError> {
        self.request(|respond_to| EngineMessage::ToggleLocalAudio { respond_to })
            .await
    }

    /// Flip the camera. Returns the new enabled state, or `None` without a track.
    pub async fn toggle_local_video(&self) -> Result<Option<bool>, CallError> {
        self.request(|respond_to| EngineMessage::ToggleLocalVideo { respond_to })
            .await
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot, CallError> {
        self.request(|respond_to| EngineMessage::GetSnapshot { respond_to })
            .await
    }

    /// Subscribe to slot assignments. Renderers bind views from these snapshots.
    #[must_use]
    pub fn assignments(&self) -> watch::Receiver<Assignment> {
        self.assignments.clone()
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Shut the engine down. Any live session is torn down and `CLOSED` is emitted.
    pub fn close(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The engine actor.
pub struct CallEngine {
    engine_id: String,
    config: Config,
    receiver: mpsc::Receiver<EngineMessage>,
    provider_tx: mpsc::UnboundedSender<(SessionId, ProviderEvent)>,
    provider_rx: mpsc::UnboundedReceiver<(SessionId, ProviderEvent)>,
    cancel_token: CancellationToken,
    provider: Arc<dyn MediaSessionProvider>,
    observer: Arc<dyn CallObserver>,
    audio: AudioRouteController,
    session: CallSession,
    room: Option<Box<dyn RoomHandle>>,
    local: LocalTracks,
    reconnect_deadline: Option<Instant>,
    assignments: watch::Sender<Assignment>,
    metrics: Arc<EngineMetrics>,
    control_mailbox: MailboxMonitor,
    provider_mailbox: MailboxMonitor,
}

impl CallEngine {
    /// Spawn the engine actor.
    ///
    /// Returns a handle and the task join handle. `OPENED` is emitted once
    /// the actor starts.
    pub fn spawn(
        config: Config,
        collaborators: Collaborators,
        cancel_token: CancellationToken,
    ) -> (CallEngineHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ENGINE_CHANNEL_BUFFER);
        let (provider_tx, provider_rx) = mpsc::unbounded_channel();
        let (assignments_tx, assignments_rx) = watch::channel(Assignment::default());
        let engine_id = format!("engine-{}", Uuid::new_v4());
        let metrics = EngineMetrics::new();

        let Collaborators {
            provider,
            devices,
            audio,
            observer,
        } = collaborators;

        let actor = Self {
            engine_id: engine_id.clone(),
            session: CallSession::new(config.composition_policy()),
            audio: AudioRouteController::new(audio, config.speakerphone),
            config,
            receiver,
            provider_tx,
            provider_rx,
            cancel_token: cancel_token.clone(),
            provider,
            observer,
            room: None,
            local: LocalTracks::default(),
            reconnect_deadline: None,
            assignments: assignments_tx,
            metrics: Arc::clone(&metrics),
            control_mailbox: MailboxMonitor::new(QueueKind::Control),
            provider_mailbox: MailboxMonitor::new(QueueKind::Provider),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = CallEngineHandle {
            sender,
            cancel_token,
            devices,
            assignments: assignments_rx,
            metrics,
            engine_id,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "call.actor.engine", fields(engine_id = %self.engine_id))]
    async fn run(mut self) {
        info!(
            target: "call.actor.engine",
            engine_id = %self.engine_id,
            "CallEngine started"
        );
        self.publish(&CallEvent::Opened);

        loop {
            let deadline = self.reconnect_deadline;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "call.actor.engine",
                        engine_id = %self.engine_id,
                        "CallEngine received cancellation signal"
                    );
                    break;
                }

                () = sleep_until_deadline(deadline) => {
                    self.handle_reconnect_timeout();
                }

                Some((session_id, event)) = self.provider_rx.recv() => {
                    self.provider_mailbox.record_dequeue(self.provider_rx.len());
                    self.handle_provider_event(session_id, event);
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.control_mailbox.record_dequeue(self.receiver.len());
                            self.catch_up();
                            self.handle_message(message);
                            self.metrics.record_request();
                        }
                        None => {
                            info!(
                                target: "call.actor.engine",
                                engine_id = %self.engine_id,
                                "All handles dropped, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.graceful_shutdown();
        info!(
            target: "call.actor.engine",
            engine_id = %self.engine_id,
            requests_processed = self.control_mailbox.messages_processed(),
            provider_events_processed = self.provider_mailbox.messages_processed(),
            "CallEngine stopped"
        );
    }

    fn graceful_shutdown(&mut self) {
        self.drain_provider_events();
        let transition = self.session.shutdown();
        self.commit(transition);
        self.publish(&CallEvent::Closed);
    }

    /// Apply queued provider events and an expired reconnect deadline so a
    /// request never observes stale state.
    fn catch_up(&mut self) {
        self.drain_provider_events();
        if self
            .reconnect_deadline
            .is_some_and(|deadline| deadline <= Instant::now())
        {
            self.handle_reconnect_timeout();
        }
    }

    fn drain_provider_events(&mut self) {
        while let Ok((session_id, event)) = self.provider_rx.try_recv() {
            self.provider_mailbox.record_dequeue(self.provider_rx.len());
            self.handle_provider_event(session_id, event);
        }
    }

    fn handle_message(&mut self, message: EngineMessage) {
        debug!(
            target: "call.actor.engine",
            request = message.kind(),
            state = %self.session.state(),
            "Handling request"
        );
        match message {
            EngineMessage::Connect {
                token,
                room_id,
                tracks,
                respond_to,
            } => {
                let result = self.handle_connect(token, room_id, tracks);
                if let Err(Err(rejected)) = respond_to.send(result) {
                    // Caller went away; release what it handed over.
                    let mut tracks = rejected.tracks;
                    tracks.release_all();
                }
            }
            EngineMessage::PermissionsDenied { respond_to } => {
                self.publish(&CallEvent::PermissionsRequired);
                self.raise_notice(NoticeKind::ConnectionError);
                let _ = respond_to.send(());
            }
            EngineMessage::Disconnect { respond_to } => {
                let transition = self.session.disconnect();
                self.commit(transition);
                let _ = respond_to.send(());
            }
            EngineMessage::HangUp { respond_to } => {
                let outcome = if self.config.hang_up_in_app {
                    self.publish(&CallEvent::HangUp);
                    HangUpOutcome::DelegatedToHost
                } else {
                    let transition = self.session.disconnect();
                    self.commit(transition);
                    HangUpOutcome::Disconnected
                };
                let _ = respond_to.send(outcome);
            }
            EngineMessage::Reset { respond_to } => {
                let result = self.session.reset();
                if result.is_ok() {
                    self.publish_assignment();
                }
                let _ = respond_to.send(result);
            }
            EngineMessage::ReleaseLocalVideo { respond_to } => {
                let track = self.take_local_video();
                if let Err(Some(track)) = respond_to.send(track) {
                    track.release();
                }
            }
            EngineMessage::RestoreLocalVideo { track, respond_to } => {
                let result = self.install_local_video(track);
                if let Err(Err(track)) = respond_to.send(result) {
                    track.release();
                }
            }
            EngineMessage::ToggleLocalAudio { respond_to } => {
                let _ = respond_to.send(toggle(self.local.audio.as_mut()));
            }
            EngineMessage::ToggleLocalVideo { respond_to } => {
                let _ = respond_to.send(toggle(self.local.video.as_mut()));
            }
            EngineMessage::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    #[instrument(skip_all, fields(engine_id = %self.engine_id, room_id = %room_id))]
    fn handle_connect(
        &mut self,
        token: SecretString,
        room_id: RoomId,
        tracks: LocalTracks,
    ) -> Result<SessionId, ConnectRejected> {
        let session_id = match self.session.begin_connect(room_id.clone()) {
            Ok(id) => id,
            Err(error) => {
                warn!(
                    target: "call.actor.engine",
                    error = %error,
                    state = %self.session.state(),
                    "Connect refused"
                );
                return Err(ConnectRejected { error, tracks });
            }
        };

        self.audio.enter();
        let request = ConnectRequest {
            token,
            room_id,
            audio_track: tracks.audio.as_ref().map(|t| t.info().clone()),
            video_track: tracks.video.as_ref().map(|t| t.info().clone()),
        };
        self.local = tracks;
        let sink = ProviderEventSink::new(session_id, self.provider_tx.clone());

        match self.provider.connect(request, sink) {
            Ok(room) => {
                self.room = Some(room);
                info!(
                    target: "call.actor.engine",
                    session_id = %session_id,
                    "Connect issued"
                );
                Ok(session_id)
            }
            Err(error) => {
                self.apply(ProviderEvent::ConnectFailure {
                    error: error.clone(),
                });
                Err(ConnectRejected {
                    error: CallError::Connection(error),
                    tracks: LocalTracks::default(),
                })
            }
        }
    }

    fn handle_provider_event(&mut self, session_id: SessionId, event: ProviderEvent) {
        self.metrics.record_provider_event();
        if self.session.session_id() != Some(session_id) {
            self.metrics.record_stale_event();
            debug!(
                target: "call.actor.engine",
                event_session_id = %session_id,
                event_type = event.kind(),
                "Dropping event from a previous session"
            );
            return;
        }

        let event_type = event.kind();
        let started = Instant::now();
        self.apply(event);
        observability::record_event_latency(event_type, started.elapsed());
    }

    fn apply(&mut self, event: ProviderEvent) {
        let event_type = event.kind();
        match self.session.apply(event) {
            Ok(transition) => self.commit(transition),
            Err(e) => {
                error!(
                    target: "call.actor.engine",
                    error = %e,
                    event_type,
                    "Failed to apply provider event"
                );
            }
        }
    }

    fn handle_reconnect_timeout(&mut self) {
        self.reconnect_deadline = None;
        let error = ConnectionError::reconnect_timeout(self.config.reconnect_timeout());
        let transition = self.session.reconnect_timed_out(&error);
        self.commit(transition);
    }

    /// Carry out a transition's side effects.
    fn commit(&mut self, transition: Transition) {
        for event in &transition.events {
            self.publish(event);
        }
        if let Some(kind) = transition.notice {
            self.raise_notice(kind);
        }
        if let Some(teardown) = transition.teardown {
            self.teardown(teardown);
        }
        self.sync_reconnect_deadline();
        if transition.assignment_changed {
            self.publish_assignment();
        }
    }

    fn teardown(&mut self, teardown: Teardown) {
        if let Some(mut room) = self.room.take() {
            if teardown.disconnect_room {
                room.disconnect();
            }
        }
        let released = self.local.release_all();
        self.audio.exit();
        self.reconnect_deadline = None;

        self.metrics.record_teardown();
        observability::record_teardown(teardown.reason.as_str());
        info!(
            target: "call.actor.engine",
            reason = teardown.reason.as_str(),
            released_tracks = released,
            "Teardown complete"
        );
    }

    fn sync_reconnect_deadline(&mut self) {
        let reconnecting = self.session.state() == SessionState::Reconnecting;
        match (reconnecting, self.reconnect_deadline) {
            (true, None) => {
                let timeout = self.config.reconnect_timeout();
                self.reconnect_deadline = Some(Instant::now() + timeout);
                debug!(
                    target: "call.actor.engine",
                    timeout_seconds = timeout.as_secs(),
                    "Reconnect timer armed"
                );
            }
            (false, Some(_)) => self.reconnect_deadline = None,
            _ => {}
        }
    }

    fn publish(&self, event: &CallEvent) {
        debug!(target: "call.events", event = event.name(), "Publishing host event");
        self.observer.on_event(event);
    }

    fn raise_notice(&self, kind: NoticeKind) {
        if self.config.handle_error_in_app {
            debug!(target: "call.events", "Host handles errors, notice suppressed");
            return;
        }
        let message = match kind {
            NoticeKind::ConnectionError => &self.config.i18n_connection_error,
            NoticeKind::DisconnectedWithError => &self.config.i18n_disconnected_with_error,
        };
        self.observer.on_error_notice(&ErrorNotice {
            message: message.clone(),
            accept_label: self.config.i18n_accept.clone(),
        });
    }

    fn publish_assignment(&self) {
        let next = self.session.assignment();
        let changed = self.assignments.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            self.metrics.record_assignment_published();
        }
    }

    fn take_local_video(&mut self) -> Option<Box<dyn LocalTrack>> {
        let track = self.local.video.take()?;
        if let Some(room) = self.room.as_mut() {
            room.unpublish_track(track.info());
        }
        info!(target: "call.actor.engine", "Local video unpublished for release");
        Some(track)
    }

    fn install_local_video(
        &mut self,
        track: Box<dyn LocalTrack>,
    ) -> Result<(), Box<dyn LocalTrack>> {
        let live = matches!(
            self.session.state(),
            SessionState::Connected | SessionState::Reconnecting
        );
        if self.local.video.is_some() || !live {
            debug!(
                target: "call.actor.engine",
                state = %self.session.state(),
                has_video = self.local.video.is_some(),
                "Local video restore refused"
            );
            return Err(track);
        }
        if let Some(room) = self.room.as_mut() {
            room.publish_track(track.info());
        }
        self.local.video = Some(track);
        info!(target: "call.actor.engine", "Local video restored");
        Ok(())
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            session: self.session.snapshot(),
            local_audio: self.local.audio.as_ref().map(|t| local_state(t.as_ref())),
            local_video: self.local.video.as_ref().map(|t| local_state(t.as_ref())),
            audio_route_active: self.audio.is_active(),
        }
    }
}

fn local_state(track: &dyn LocalTrack) -> LocalTrackState {
    LocalTrackState {
        name: track.info().name.clone(),
        enabled: track.info().enabled,
    }
}

fn toggle(track: Option<&mut Box<dyn LocalTrack>>) -> Option<bool> {
    let track = track?;
    let enabled = !track.info().enabled;
    track.set_enabled(enabled);
    debug!(
        target: "call.actor.engine",
        track = %track.info().name,
        enabled,
        "Local track toggled"
    );
    Some(enabled)
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
