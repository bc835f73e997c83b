//! Observability for the call engine.
//!
//! Logging uses `tracing` with fixed targets per concern (`call.session`,
//! `call.actor.engine`, `call.compose`, `call.slots`, `call.audio`,
//! `call.events`). Fields carry identities and track ids, never tokens.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `call_session_transitions_total` | Counter | `from`, `to` | Session state machine activity |
//! | `call_recompositions_total` | Counter | `path` | Full vs placeholder-only recomposition |
//! | `call_remote_participants` | Gauge | none | Current roster size |
//! | `call_side_slots` | Gauge | none | Current side slot count |
//! | `call_teardowns_total` | Counter | `reason` | Completed teardowns |
//! | `call_events_dropped_total` | Counter | none | Host events lost to a full observer channel |
//! | `call_actor_mailbox_depth` | Gauge | `queue` | Backpressure on the engine actor |
//! | `call_event_processing_seconds` | Histogram | `event_type` | Provider event handling latency |

pub mod metrics;

pub use metrics::{
    init_metrics_recorder, record_event_dropped, record_event_latency, record_recomposition,
    record_state_transition, record_teardown, set_mailbox_depth, set_remote_participants,
    set_side_slots,
};
