//! Metrics definitions for the call engine.
//!
//! All metrics follow Prometheus naming conventions:
//! - `call_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `from`/`to`: the six session states
//! - `path`: `full` or `placeholder`
//! - `queue`: `control` or `provider`
//! - `event_type`: provider event kinds (~10 values)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return its handle.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("call_event".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250,
            ],
        )
        .map_err(|e| format!("Failed to set event latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Session lifecycle
// ============================================================================

/// Record a session state transition.
///
/// Metric: `call_session_transitions_total`
/// Labels: `from`, `to`
pub fn record_state_transition(from: &'static str, to: &'static str) {
    counter!("call_session_transitions_total", "from" => from, "to" => to).increment(1);
}

/// Record a completed teardown.
///
/// Metric: `call_teardowns_total`
/// Labels: `reason`
pub fn record_teardown(reason: &'static str) {
    counter!("call_teardowns_total", "reason" => reason).increment(1);
}

// ============================================================================
// Composition
// ============================================================================

/// Record a recomposition pass.
///
/// Metric: `call_recompositions_total`
/// Labels: `path` (`full` for slot membership changes, `placeholder` for enable toggles)
pub fn record_recomposition(path: &'static str) {
    counter!("call_recompositions_total", "path" => path).increment(1);
}

/// Set the current number of remote participants.
///
/// Metric: `call_remote_participants`
#[allow(clippy::cast_precision_loss)]
pub fn set_remote_participants(count: usize) {
    gauge!("call_remote_participants").set(count as f64);
}

/// Set the current number of side slots.
///
/// Metric: `call_side_slots`
#[allow(clippy::cast_precision_loss)]
pub fn set_side_slots(count: usize) {
    gauge!("call_side_slots").set(count as f64);
}

// ============================================================================
// Event delivery
// ============================================================================

/// Record time spent applying one provider event.
///
/// Metric: `call_event_processing_seconds`
/// Labels: `event_type`
pub fn record_event_latency(event_type: &'static str, duration: Duration) {
    histogram!("call_event_processing_seconds", "event_type" => event_type)
        .record(duration.as_secs_f64());
}

/// Record a host event dropped because the observer channel was full or closed.
///
/// Metric: `call_events_dropped_total`
pub fn record_event_dropped() {
    counter!("call_events_dropped_total").increment(1);
}

/// Set the current engine mailbox depth.
///
/// Metric: `call_actor_mailbox_depth`
/// Labels: `queue`
#[allow(clippy::cast_precision_loss)]
pub fn set_mailbox_depth(queue: &'static str, depth: usize) {
    gauge!("call_actor_mailbox_depth", "queue" => queue).set(depth as f64);
}
