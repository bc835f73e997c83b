//! Observer that records everything the engine publishes.

use call_engine::events::{CallEvent, CallObserver, ErrorNotice};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<CallEvent>>,
    notices: Mutex<Vec<ErrorNotice>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Event names in publication order.
    #[must_use]
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(CallEvent::name).collect()
    }

    /// How many times an event with `name` was published.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }

    #[must_use]
    pub fn notices(&self) -> Vec<ErrorNotice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
        self.notices.lock().unwrap().clear();
    }
}

impl CallObserver for RecordingObserver {
    fn on_event(&self, event: &CallEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_error_notice(&self, notice: &ErrorNotice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}
