//! Mock capture devices.
//!
//! Counts created and released tracks so tests can assert that every
//! captured device is freed exactly once.

use async_trait::async_trait;
use call_engine::errors::CallError;
use call_engine::media::{TrackInfo, TrackKind};
use call_engine::provider::{LocalTrack, MediaDevices};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct DeviceCounters {
    created: AtomicUsize,
    released: AtomicUsize,
    permission_requests: AtomicUsize,
}

/// Devices double. Clones share state.
#[derive(Debug, Clone)]
pub struct MockMediaDevices {
    permitted: Arc<AtomicBool>,
    grant_on_request: bool,
    fail_camera: bool,
    counters: Arc<DeviceCounters>,
}

impl Default for MockMediaDevices {
    fn default() -> Self {
        Self::granted()
    }
}

impl MockMediaDevices {
    /// Permissions already held.
    #[must_use]
    pub fn granted() -> Self {
        Self {
            permitted: Arc::new(AtomicBool::new(true)),
            grant_on_request: true,
            fail_camera: false,
            counters: Arc::default(),
        }
    }

    /// Permissions not held; the user grants them when asked.
    #[must_use]
    pub fn grant_on_request() -> Self {
        Self {
            permitted: Arc::new(AtomicBool::new(false)),
            ..Self::granted()
        }
    }

    /// Permissions not held; the user refuses.
    #[must_use]
    pub fn denied() -> Self {
        Self {
            permitted: Arc::new(AtomicBool::new(false)),
            grant_on_request: false,
            ..Self::granted()
        }
    }

    /// Camera creation fails (device busy).
    #[must_use]
    pub fn with_failing_camera(mut self) -> Self {
        self.fail_camera = true;
        self
    }

    #[must_use]
    pub fn tracks_created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn tracks_released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Tracks created and not yet released.
    #[must_use]
    pub fn live_tracks(&self) -> usize {
        self.tracks_created() - self.tracks_released()
    }

    #[must_use]
    pub fn permission_requests(&self) -> usize {
        self.counters.permission_requests.load(Ordering::SeqCst)
    }

    /// Create a track outside the engine, e.g. for `CallEngineHandle::connect`.
    #[must_use]
    pub fn track(&self, kind: TrackKind, name: &str) -> Box<dyn LocalTrack> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Box::new(MockLocalTrack {
            info: TrackInfo::new(format!("local-{name}"), kind, name),
            counters: Arc::clone(&self.counters),
        })
    }
}

#[async_trait]
impl MediaDevices for MockMediaDevices {
    fn has_permissions(&self) -> bool {
        self.permitted.load(Ordering::SeqCst)
    }

    async fn request_permissions(&self) -> bool {
        self.counters
            .permission_requests
            .fetch_add(1, Ordering::SeqCst);
        if self.grant_on_request {
            self.permitted.store(true, Ordering::SeqCst);
        }
        self.grant_on_request
    }

    fn create_microphone_track(&self, name: &str) -> Result<Box<dyn LocalTrack>, CallError> {
        Ok(self.track(TrackKind::Audio, name))
    }

    fn create_camera_track(&self, name: &str) -> Result<Box<dyn LocalTrack>, CallError> {
        if self.fail_camera {
            return Err(CallError::Media("camera busy".to_string()));
        }
        Ok(self.track(TrackKind::Video, name))
    }
}

/// Local track that reports its release to the owning devices.
#[derive(Debug)]
pub struct MockLocalTrack {
    info: TrackInfo,
    counters: Arc<DeviceCounters>,
}

impl LocalTrack for MockLocalTrack {
    fn info(&self) -> &TrackInfo {
        &self.info
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.info.enabled = enabled;
    }

    fn release(self: Box<Self>) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}
