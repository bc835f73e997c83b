//! Mock audio platform that records routing changes.

use call_engine::audio::{AudioMode, AudioPlatform};
use std::sync::{Arc, Mutex};

/// Observable platform state plus call counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioLog {
    pub mode: AudioMode,
    pub microphone_mute: bool,
    pub focused: bool,
    pub speakerphone: bool,
    pub focus_requests: usize,
    pub focus_abandons: usize,
    /// Every mode set, in order.
    pub modes_set: Vec<AudioMode>,
}

/// Audio platform double. Clones share state.
#[derive(Debug, Clone)]
pub struct MockAudioPlatform {
    log: Arc<Mutex<AudioLog>>,
    grant_focus: bool,
}

impl Default for MockAudioPlatform {
    fn default() -> Self {
        Self::new(AudioMode::Normal, false)
    }
}

impl MockAudioPlatform {
    /// Platform starting in `mode` with the given microphone mute state.
    #[must_use]
    pub fn new(mode: AudioMode, microphone_mute: bool) -> Self {
        Self {
            log: Arc::new(Mutex::new(AudioLog {
                mode,
                microphone_mute,
                focused: false,
                speakerphone: false,
                focus_requests: 0,
                focus_abandons: 0,
                modes_set: Vec::new(),
            })),
            grant_focus: true,
        }
    }

    /// Refuse audio focus requests.
    #[must_use]
    pub fn refusing_focus(mut self) -> Self {
        self.grant_focus = false;
        self
    }

    #[must_use]
    pub fn log(&self) -> AudioLog {
        self.log.lock().unwrap().clone()
    }
}

impl AudioPlatform for MockAudioPlatform {
    fn mode(&self) -> AudioMode {
        self.log.lock().unwrap().mode
    }

    fn set_mode(&mut self, mode: AudioMode) {
        let mut log = self.log.lock().unwrap();
        log.mode = mode;
        log.modes_set.push(mode);
    }

    fn is_microphone_mute(&self) -> bool {
        self.log.lock().unwrap().microphone_mute
    }

    fn set_microphone_mute(&mut self, muted: bool) {
        self.log.lock().unwrap().microphone_mute = muted;
    }

    fn request_communication_focus(&mut self) -> bool {
        let mut log = self.log.lock().unwrap();
        log.focus_requests += 1;
        log.focused = self.grant_focus;
        self.grant_focus
    }

    fn abandon_focus(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.focus_abandons += 1;
        log.focused = false;
    }

    fn set_speakerphone(&mut self, on: bool) {
        self.log.lock().unwrap().speakerphone = on;
    }
}
