//! Mock media provider.
//!
//! Captures the event sink of every connect so tests can inject room
//! events, and records what the engine asked of each room.
//!
//! # Example
//!
//! ```rust,ignore
//! let provider = MockProvider::new();
//! // ... engine connects ...
//! provider.emit(ProviderEvent::Reconnected);
//! assert_eq!(provider.connect_count(), 1);
//! ```

use call_engine::errors::ConnectionError;
use call_engine::media::TrackInfo;
use call_engine::provider::{
    ConnectRequest, MediaSessionProvider, ProviderEvent, ProviderEventSink, RoomHandle,
};
use common::types::{RoomId, SessionId};
use std::sync::{Arc, Mutex};

/// Calls the engine made on rooms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomLog {
    pub published: Vec<String>,
    pub unpublished: Vec<String>,
    pub disconnects: usize,
}

#[derive(Debug, Default)]
struct ProviderState {
    connects: usize,
    sinks: Vec<ProviderEventSink>,
    rooms: Vec<RoomId>,
    offered: Vec<(Option<TrackInfo>, Option<TrackInfo>)>,
    fail_with: Option<ConnectionError>,
}

/// Provider double. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<ProviderState>>,
    rooms: Arc<Mutex<RoomLog>>,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every connect fail synchronously with `error`.
    #[must_use]
    pub fn failing(error: ConnectionError) -> Self {
        let provider = Self::default();
        provider.state.lock().unwrap().fail_with = Some(error);
        provider
    }

    /// Number of connect calls, including failed ones.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    /// Sink of the most recent connect.
    #[must_use]
    pub fn sink(&self) -> Option<ProviderEventSink> {
        self.state.lock().unwrap().sinks.last().cloned()
    }

    /// Sink of the connect for `session_id`.
    #[must_use]
    pub fn sink_for(&self, session_id: SessionId) -> Option<ProviderEventSink> {
        self.state
            .lock()
            .unwrap()
            .sinks
            .iter()
            .find(|s| s.session_id() == session_id)
            .cloned()
    }

    /// Deliver an event to the most recent session.
    ///
    /// # Panics
    ///
    /// Panics if nothing has connected yet.
    pub fn emit(&self, event: ProviderEvent) -> bool {
        self.sink()
            .expect("emit before any connect")
            .emit(event)
    }

    #[must_use]
    pub fn rooms(&self) -> Vec<RoomId> {
        self.state.lock().unwrap().rooms.clone()
    }

    /// Local tracks offered with each connect (audio, video).
    #[must_use]
    pub fn offered_tracks(&self) -> Vec<(Option<TrackInfo>, Option<TrackInfo>)> {
        self.state.lock().unwrap().offered.clone()
    }

    #[must_use]
    pub fn room_log(&self) -> RoomLog {
        self.rooms.lock().unwrap().clone()
    }

    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.rooms.lock().unwrap().disconnects
    }
}

impl MediaSessionProvider for MockProvider {
    fn connect(
        &self,
        request: ConnectRequest,
        events: ProviderEventSink,
    ) -> Result<Box<dyn RoomHandle>, ConnectionError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        state.rooms.push(request.room_id);
        state
            .offered
            .push((request.audio_track, request.video_track));
        if let Some(error) = state.fail_with.clone() {
            return Err(error);
        }
        state.sinks.push(events);
        Ok(Box::new(MockRoom {
            log: Arc::clone(&self.rooms),
        }))
    }
}

struct MockRoom {
    log: Arc<Mutex<RoomLog>>,
}

impl RoomHandle for MockRoom {
    fn publish_track(&mut self, track: &TrackInfo) {
        self.log.lock().unwrap().published.push(track.name.clone());
    }

    fn unpublish_track(&mut self, track: &TrackInfo) {
        self.log.lock().unwrap().unpublished.push(track.name.clone());
    }

    fn disconnect(&mut self) {
        self.log.lock().unwrap().disconnects += 1;
    }
}
