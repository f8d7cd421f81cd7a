//! Lock-free counters for event bus traffic

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Shared between every clone of one bus
#[derive(Debug, Clone, Default)]
pub struct EventBusMetrics {
    published: Arc<AtomicU64>,
    /// Sent while nobody was subscribed
    unobserved: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
    active_subscribers: Arc<AtomicUsize>,
    peak_subscribers: Arc<AtomicUsize>,
}

impl EventBusMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_sent(&self, subscribers: usize) {
        self.published.fetch_add(1, Ordering::SeqCst);
        if subscribers == 0 {
            self.unobserved.fetch_add(1, Ordering::SeqCst);
        }
        self.record_subscribers(subscribers);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_subscribers(&self, count: usize) {
        self.active_subscribers.store(count, Ordering::SeqCst);
        self.peak_subscribers.fetch_max(count, Ordering::SeqCst);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_published: self.published.load(Ordering::SeqCst),
            events_unobserved: self.unobserved.load(Ordering::SeqCst),
            events_rejected: self.rejected.load(Ordering::SeqCst),
            active_subscribers: self.active_subscribers.load(Ordering::SeqCst),
            peak_subscribers: self.peak_subscribers.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_published: u64,
    pub events_unobserved: u64,
    pub events_rejected: u64,
    pub active_subscribers: usize,
    pub peak_subscribers: usize,
}

impl MetricsSnapshot {
    /// Share of publish attempts that reached at least one subscriber
    #[must_use]
    pub fn delivery_rate(&self) -> f64 {
        let attempts = self.events_published + self.events_rejected;
        if attempts == 0 {
            return 1.0;
        }
        (self.events_published - self.events_unobserved) as f64 / attempts as f64
    }
}
