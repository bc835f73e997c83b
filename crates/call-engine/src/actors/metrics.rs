//! Engine actor counters and mailbox monitoring.
//!
//! | Queue    | Normal | Warning | Critical |
//! |----------|--------|---------|----------|
//! | Control  | < 16   | 16-64   | > 64     |
//! | Provider | < 100  | 100-500 | > 500    |

use crate::observability;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub const CONTROL_MAILBOX_NORMAL: usize = 16;
pub const CONTROL_MAILBOX_WARNING: usize = 64;

pub const PROVIDER_MAILBOX_NORMAL: usize = 100;
pub const PROVIDER_MAILBOX_WARNING: usize = 500;

/// The two inputs of the engine actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Host requests (connect, disconnect, snapshot, ...).
    Control,
    /// Room events reported by the media provider.
    Provider,
}

impl QueueKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Control => "control",
            QueueKind::Provider => "provider",
        }
    }

    #[must_use]
    pub const fn normal_threshold(&self) -> usize {
        match self {
            QueueKind::Control => CONTROL_MAILBOX_NORMAL,
            QueueKind::Provider => PROVIDER_MAILBOX_NORMAL,
        }
    }

    #[must_use]
    pub const fn warning_threshold(&self) -> usize {
        match self {
            QueueKind::Control => CONTROL_MAILBOX_WARNING,
            QueueKind::Provider => PROVIDER_MAILBOX_WARNING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks queue depth observed at each dequeue.
#[derive(Debug)]
pub struct MailboxMonitor {
    queue: QueueKind,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(queue: QueueKind) -> Self {
        Self {
            queue,
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            processed: AtomicU64::new(0),
        }
    }

    /// Record one dequeued message and the backlog left behind it.
    pub fn record_dequeue(&self, remaining: usize) {
        self.depth.store(remaining, Ordering::Relaxed);
        self.peak_depth.fetch_max(remaining, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
        observability::set_mailbox_depth(self.queue.as_str(), remaining);

        match self.level_for_depth(remaining) {
            MailboxLevel::Critical => warn!(
                target: "call.actor.mailbox",
                queue = self.queue.as_str(),
                depth = remaining,
                threshold = self.queue.warning_threshold(),
                "Mailbox depth critical"
            ),
            MailboxLevel::Warning if remaining == self.queue.normal_threshold() + 1 => debug!(
                target: "call.actor.mailbox",
                queue = self.queue.as_str(),
                depth = remaining,
                "Mailbox depth elevated"
            ),
            _ => {}
        }
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        self.level_for_depth(self.current_depth())
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > self.queue.warning_threshold() {
            MailboxLevel::Critical
        } else if depth > self.queue.normal_threshold() {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Counters shared between the engine actor and its handles.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    provider_events: AtomicU64,
    stale_events: AtomicU64,
    requests: AtomicU64,
    teardowns: AtomicU64,
    assignments_published: AtomicU64,
}

/// Point-in-time copy of [`EngineMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineMetricsSnapshot {
    pub provider_events: u64,
    pub stale_events: u64,
    pub requests: u64,
    pub teardowns: u64,
    pub assignments_published: u64,
}

impl EngineMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_provider_event(&self) {
        self.provider_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_event(&self) {
        self.stale_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_assignment_published(&self) {
        self.assignments_published.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn teardowns(&self) -> u64 {
        self.teardowns.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            provider_events: self.provider_events.load(Ordering::Relaxed),
            stale_events: self.stale_events.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::SeqCst),
            assignments_published: self.assignments_published.load(Ordering::Relaxed),
        }
    }
}
