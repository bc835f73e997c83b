//! Call Engine Library
//!
//! Drives one real-time video call for a host application:
//!
//! - Session lifecycle over an external media provider (connect, reconnect,
//!   disconnect, failure) with exactly-once teardown
//! - Participant roster and per-participant track registry
//! - View composition: one primary slot plus a side-slot pool sized to the
//!   roster, with screen shares taking the primary slot
//! - Communication audio routing with save/restore of the platform state
//! - Host lifecycle events (`OPENED` .. `CLOSED`) through an observer
//!
//! # Architecture
//!
//! ```text
//! CallEngineHandle ──requests──▶ CallEngine actor ◀──events── MediaSessionProvider
//!                                  │
//!                                  ├── CallSession (pure state machine)
//!                                  │     ├── Roster
//!                                  │     ├── TrackRegistry
//!                                  │     └── Composer + SlotPool
//!                                  ├── AudioRouteController
//!                                  ├── CallObserver (host events, notices)
//!                                  └── watch<Assignment> (renderer)
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Engine actor and its handle
//! - [`session`] - Session state machine
//! - [`media`] - Roster, tracks, slots, composition
//! - [`provider`] - Media provider and device boundary
//! - [`audio`] - Audio route controller
//! - [`events`] - Host events and observers
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types with error codes
//! - [`sim`] - Loopback provider and script runner for the simulation binary

pub mod actors;
pub mod audio;
pub mod config;
pub mod errors;
pub mod events;
pub mod media;
pub mod observability;
pub mod provider;
pub mod session;
pub mod sim;

pub use actors::{CallEngine, CallEngineHandle, Collaborators};
pub use config::Config;
pub use errors::{CallError, ConnectionError, SlotError};
pub use events::{CallEvent, CallObserver};
pub use session::{CallSession, SessionState};
