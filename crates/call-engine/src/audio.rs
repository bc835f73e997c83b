//! Communication audio routing.
//!
//! Entering a call captures the platform's audio mode and microphone mute
//! state, takes audio focus, and switches to communication mode. Exiting
//! restores exactly what was captured. Exit without a matching enter is a
//! no-op, so teardown paths may call it unconditionally.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    Normal,
    Ringtone,
    InCall,
    InCommunication,
}

/// Platform audio controls.
pub trait AudioPlatform: Send {
    fn mode(&self) -> AudioMode;
    fn set_mode(&mut self, mode: AudioMode);
    fn is_microphone_mute(&self) -> bool;
    fn set_microphone_mute(&mut self, muted: bool);
    /// Request exclusive voice-communication focus. Returns `false` if refused.
    fn request_communication_focus(&mut self) -> bool;
    fn abandon_focus(&mut self);
    fn set_speakerphone(&mut self, on: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedAudioState {
    pub mode: AudioMode,
    pub microphone_mute: bool,
}

pub struct AudioRouteController {
    platform: Box<dyn AudioPlatform>,
    speakerphone: bool,
    saved: Option<SavedAudioState>,
}

impl AudioRouteController {
    pub fn new(platform: Box<dyn AudioPlatform>, speakerphone: bool) -> Self {
        Self {
            platform,
            speakerphone,
            saved: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.saved.is_some()
    }

    pub fn saved_state(&self) -> Option<SavedAudioState> {
        self.saved
    }

    /// Switch into communication mode. Returns `false` if already active.
    pub fn enter(&mut self) -> bool {
        if self.saved.is_some() {
            debug!(target: "call.audio", "Communication audio already active");
            return false;
        }

        let mode = self.platform.mode();
        if !self.platform.request_communication_focus() {
            warn!(target: "call.audio", "Audio focus refused, continuing without it");
        }
        self.platform.set_speakerphone(self.speakerphone);
        self.platform.set_mode(AudioMode::InCommunication);
        let microphone_mute = self.platform.is_microphone_mute();
        self.platform.set_microphone_mute(false);

        self.saved = Some(SavedAudioState {
            mode,
            microphone_mute,
        });
        info!(
            target: "call.audio",
            previous_mode = ?mode,
            previous_microphone_mute = microphone_mute,
            speakerphone = self.speakerphone,
            "Entered communication audio"
        );
        true
    }

    /// Restore the captured state. Returns `false` if nothing was captured.
    pub fn exit(&mut self) -> bool {
        let Some(saved) = self.saved.take() else {
            debug!(target: "call.audio", "No captured audio state to restore");
            return false;
        };

        self.platform.set_mode(saved.mode);
        self.platform.abandon_focus();
        self.platform.set_microphone_mute(saved.microphone_mute);
        info!(
            target: "call.audio",
            mode = ?saved.mode,
            microphone_mute = saved.microphone_mute,
            "Restored audio state"
        );
        true
    }
}

impl std::fmt::Debug for AudioRouteController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioRouteController")
            .field("speakerphone", &self.speakerphone)
            .field("saved", &self.saved)
            .finish_non_exhaustive()
    }
}

/// In-memory platform with no side effects, used where no real device exists.
#[derive(Debug, Clone)]
pub struct NullAudioPlatform {
    mode: AudioMode,
    microphone_mute: bool,
    focused: bool,
    speakerphone: bool,
}

impl Default for NullAudioPlatform {
    fn default() -> Self {
        Self {
            mode: AudioMode::Normal,
            microphone_mute: false,
            focused: false,
            speakerphone: false,
        }
    }
}

impl AudioPlatform for NullAudioPlatform {
    fn mode(&self) -> AudioMode {
        self.mode
    }

    fn set_mode(&mut self, mode: AudioMode) {
        self.mode = mode;
    }

    fn is_microphone_mute(&self) -> bool {
        self.microphone_mute
    }

    fn set_microphone_mute(&mut self, muted: bool) {
        self.microphone_mute = muted;
    }

    fn request_communication_focus(&mut self) -> bool {
        self.focused = true;
        true
    }

    fn abandon_focus(&mut self) {
        self.focused = false;
    }

    fn set_speakerphone(&mut self, on: bool) {
        self.speakerphone = on;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Default)]
    struct Shared {
        mode: Option<AudioMode>,
        mute: bool,
        focus_requests: u32,
        focus_abandons: u32,
        speakerphone: Option<bool>,
    }

    struct Probe(Arc<Mutex<Shared>>);

    impl AudioPlatform for Probe {
        fn mode(&self) -> AudioMode {
            self.0.lock().unwrap().mode.unwrap_or(AudioMode::Normal)
        }
        fn set_mode(&mut self, mode: AudioMode) {
            self.0.lock().unwrap().mode = Some(mode);
        }
        fn is_microphone_mute(&self) -> bool {
            self.0.lock().unwrap().mute
        }
        fn set_microphone_mute(&mut self, muted: bool) {
            self.0.lock().unwrap().mute = muted;
        }
        fn request_communication_focus(&mut self) -> bool {
            self.0.lock().unwrap().focus_requests += 1;
            false
        }
        fn abandon_focus(&mut self) {
            self.0.lock().unwrap().focus_abandons += 1;
        }
        fn set_speakerphone(&mut self, on: bool) {
            self.0.lock().unwrap().speakerphone = Some(on);
        }
    }

    fn controller(initial: Shared, speakerphone: bool) -> (AudioRouteController, Arc<Mutex<Shared>>) {
        let shared = Arc::new(Mutex::new(initial));
        let controller = AudioRouteController::new(Box::new(Probe(shared.clone())), speakerphone);
        (controller, shared)
    }

    #[test]
    fn test_enter_then_exit_restores_state() {
        let (mut audio, shared) = controller(
            Shared {
                mode: Some(AudioMode::Ringtone),
                mute: true,
                ..Shared::default()
            },
            true,
        );

        assert!(audio.enter());
        {
            let s = shared.lock().unwrap();
            assert_eq!(s.mode, Some(AudioMode::InCommunication));
            assert!(!s.mute);
            assert_eq!(s.speakerphone, Some(true));
            assert_eq!(s.focus_requests, 1);
        }

        assert!(audio.exit());
        let s = shared.lock().unwrap();
        assert_eq!(s.mode, Some(AudioMode::Ringtone));
        assert!(s.mute);
        assert_eq!(s.focus_abandons, 1);
        assert!(!audio.is_active());
    }

    #[test]
    fn test_exit_without_enter_is_noop() {
        let (mut audio, shared) = controller(Shared::default(), false);
        assert!(!audio.exit());
        let s = shared.lock().unwrap();
        assert_eq!(s.focus_abandons, 0);
        assert!(s.mode.is_none());
    }

    #[test]
    fn test_double_enter_keeps_first_capture() {
        let (mut audio, _shared) = controller(
            Shared {
                mode: Some(AudioMode::InCall),
                ..Shared::default()
            },
            false,
        );
        assert!(audio.enter());
        assert!(!audio.enter());
        assert_eq!(audio.saved_state().unwrap().mode, AudioMode::InCall);
    }

    #[test]
    fn test_double_exit_restores_once() {
        let (mut audio, shared) = controller(Shared::default(), false);
        audio.enter();
        assert!(audio.exit());
        assert!(!audio.exit());
        assert_eq!(shared.lock().unwrap().focus_abandons, 1);
    }

    #[test]
    fn test_null_platform_round_trip() {
        let mut audio = AudioRouteController::new(Box::new(NullAudioPlatform::default()), true);
        assert!(audio.enter());
        assert!(audio.exit());
    }
}
