//! # Call Test Utilities
//!
//! Mocks and fixtures for driving a `CallEngine` in tests without a real
//! media backend, audio hardware, or cameras.
//!
//! ## Modules
//!
//! - `mock_provider` - Provider that captures the event sink and logs room calls
//! - `mock_devices` - Capture devices with permission switches and release counting
//! - `mock_audio` - Audio platform that records every routing change
//! - `observer` - Observer that records host events and notices
//! - `harness` - Spawns an engine wired to all of the above
//! - `fixtures` - Tracks, participants, provider events, config
//!
//! ## Usage
//!
//! ```rust,ignore
//! use call_test_utils::fixtures::*;
//! use call_test_utils::TestEngine;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let engine = TestEngine::spawn(test_config());
//!     engine.start("standup").await.unwrap();
//!     engine.emit(connected(vec![participant_with_camera("alice", "TA")]));
//!
//!     let snapshot = engine.handle.snapshot().await.unwrap();
//!     assert_eq!(snapshot.session.roster.len(), 1);
//! }
//! ```

pub mod fixtures;
pub mod harness;
pub mod mock_audio;
pub mod mock_devices;
pub mod mock_provider;
pub mod observer;

pub use harness::TestEngine;
pub use mock_audio::{AudioLog, MockAudioPlatform};
pub use mock_devices::MockMediaDevices;
pub use mock_provider::{MockProvider, RoomLog};
pub use observer::RecordingObserver;
