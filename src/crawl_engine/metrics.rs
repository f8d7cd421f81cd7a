//! Engine-wide task counters

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Shared between the core and every engine handle
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    stale_dropped: AtomicU64,
    items_accepted: AtomicU64,
    duplicates_dropped: AtomicU64,
    splits: AtomicU64,
}

impl EngineMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_dispatch(&self) {
        self.inner.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completion(&self, failed: bool) {
        self.inner.completed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.inner.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_stale(&self) {
        self.inner.stale_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_items(&self, accepted: usize, duplicates: usize) {
        self.inner.items_accepted.fetch_add(accepted as u64, Ordering::Relaxed);
        self.inner
            .duplicates_dropped
            .fetch_add(duplicates as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_split(&self) {
        self.inner.splits.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        let c = &self.inner;
        EngineMetricsSnapshot {
            dispatched: c.dispatched.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            stale_dropped: c.stale_dropped.load(Ordering::Relaxed),
            items_accepted: c.items_accepted.load(Ordering::Relaxed),
            duplicates_dropped: c.duplicates_dropped.load(Ordering::Relaxed),
            splits: c.splits.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMetricsSnapshot {
    pub dispatched: u64,
    /// Includes failures and stale completions
    pub completed: u64,
    pub failed: u64,
    pub stale_dropped: u64,
    pub items_accepted: u64,
    pub duplicates_dropped: u64,
    pub splits: u64,
}

impl EngineMetricsSnapshot {
    /// Dispatched but not yet completed
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.dispatched.saturating_sub(self.completed)
    }
}
