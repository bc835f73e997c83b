//! Engine wired to mocks.

use crate::fixtures::{connected, test_token};
use crate::mock_audio::MockAudioPlatform;
use crate::mock_devices::MockMediaDevices;
use crate::mock_provider::MockProvider;
use crate::observer::RecordingObserver;
use call_engine::actors::{CallEngine, CallEngineHandle, Collaborators, EngineSnapshot};
use call_engine::config::Config;
use call_engine::errors::CallError;
use call_engine::provider::{ParticipantSnapshot, ProviderEvent};
use common::types::{RoomId, SessionId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running engine plus handles on every mock it uses.
pub struct TestEngine {
    pub handle: CallEngineHandle,
    pub task: JoinHandle<()>,
    pub provider: MockProvider,
    pub devices: MockMediaDevices,
    pub audio: MockAudioPlatform,
    pub observer: Arc<RecordingObserver>,
}

impl TestEngine {
    /// Spawn with default mocks (permissions granted, connects succeed).
    #[must_use]
    pub fn spawn(config: Config) -> Self {
        Self::spawn_with(
            config,
            MockProvider::new(),
            MockMediaDevices::granted(),
            MockAudioPlatform::default(),
        )
    }

    #[must_use]
    pub fn spawn_with(
        config: Config,
        provider: MockProvider,
        devices: MockMediaDevices,
        audio: MockAudioPlatform,
    ) -> Self {
        let observer = Arc::new(RecordingObserver::new());
        let (handle, task) = CallEngine::spawn(
            config,
            Collaborators {
                provider: Arc::new(provider.clone()),
                devices: Arc::new(devices.clone()),
                audio: Box::new(audio.clone()),
                observer: observer.clone(),
            },
            CancellationToken::new(),
        );
        Self {
            handle,
            task,
            provider,
            devices,
            audio,
            observer,
        }
    }

    /// Start a session in `room` with the test token.
    pub async fn start(&self, room: &str) -> Result<SessionId, CallError> {
        self.handle.start(test_token(), RoomId::from(room)).await
    }

    /// Inject a provider event into the latest session.
    pub fn emit(&self, event: ProviderEvent) {
        assert!(self.provider.emit(event), "engine stopped");
    }

    /// Snapshot after every event emitted so far has been applied.
    pub async fn snapshot(&self) -> EngineSnapshot {
        self.handle.snapshot().await.expect("engine alive")
    }

    /// Start and complete a connect with the given remote participants.
    pub async fn connect_with(
        &self,
        room: &str,
        participants: Vec<ParticipantSnapshot>,
    ) -> SessionId {
        let session_id = self.start(room).await.expect("start");
        self.emit(connected(participants));
        self.snapshot().await;
        session_id
    }

    /// Close the engine and wait for the actor to finish.
    pub async fn shutdown(&mut self) {
        self.handle.close();
        (&mut self.task).await.expect("engine task panicked");
    }
}
