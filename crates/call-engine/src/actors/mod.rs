//! Actor that owns a call.
//!
//! ```text
//! CallEngineHandle (cloneable, held by the host)
//! └── CallEngine (one task per call surface)
//!     ├── owns CallSession (state, roster, tracks, slots)
//!     ├── owns the room handle, local tracks, audio routing
//!     └── reads provider events tagged with their session id
//! ```
//!
//! Host requests and provider events are processed by the same task, one at
//! a time, so no state is shared behind locks.

pub mod engine;
pub mod messages;
pub mod metrics;

pub use engine::{CallEngine, CallEngineHandle, Collaborators};
pub use messages::{ConnectRejected, EngineMessage, EngineSnapshot, HangUpOutcome, LocalTrackState};
pub use metrics::{EngineMetrics, EngineMetricsSnapshot, MailboxLevel, MailboxMonitor, QueueKind};
