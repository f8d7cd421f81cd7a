//! Event types pushed to crawl subscribers
//!
//! Every session-scoped event carries its [`SessionId`] so one bus can serve
//! all connected clients; see [`CrawlEventBus::subscribe_session`].
//!
//! [`CrawlEventBus::subscribe_session`]: super::CrawlEventBus::subscribe_session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::HexId;
use crate::provider::{ErrorDescriptor, TermId};
use crate::session::{HexProgress, SessionId};

/// Reason for event bus shutdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownReason {
    /// Engine stopped on request
    Requested,
    /// Every engine handle was dropped
    HandlesDropped,
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrawlEvent {
    /// A mesh was built and installed as the session target
    TargetBuilt {
        session_id: SessionId,
        hexes: usize,
        triangles: usize,
        categories: usize,
        timestamp: DateTime<Utc>,
    },
    CrawlStarted {
        session_id: SessionId,
        provider_id: String,
        initial_tasks: usize,
        timestamp: DateTime<Utc>,
    },
    /// Counters for one hex after a completion was applied
    HexProgress {
        session_id: SessionId,
        progress: HexProgress,
        timestamp: DateTime<Utc>,
    },
    /// A lineage was split into child lineages
    TermSplit {
        session_id: SessionId,
        hex_id: HexId,
        category: String,
        term_id: TermId,
        children: Vec<TermId>,
        timestamp: DateTime<Utc>,
    },
    /// A provider call failed terminally; the lineage was closed
    TaskFailed {
        session_id: SessionId,
        hex_id: HexId,
        category: String,
        term_id: TermId,
        error: ErrorDescriptor,
        timestamp: DateTime<Utc>,
    },
    CategoryFinished {
        session_id: SessionId,
        hex_id: HexId,
        category: String,
        crawled: usize,
        timestamp: DateTime<Utc>,
    },
    /// Emitted once per crawl, when every pair is final and nothing is in flight
    SessionFinished {
        session_id: SessionId,
        total_items: usize,
        duration: std::time::Duration,
        timestamp: DateTime<Utc>,
    },
    SessionDisposed {
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    },
    /// Signals that the event bus is shutting down
    ///
    /// Subscribers should exit their event loops when receiving this event.
    Shutdown {
        reason: ShutdownReason,
        timestamp: DateTime<Utc>,
    },
}

impl CrawlEvent {
    /// Session this event belongs to; `None` for engine-wide events
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::TargetBuilt { session_id, .. }
            | Self::CrawlStarted { session_id, .. }
            | Self::HexProgress { session_id, .. }
            | Self::TermSplit { session_id, .. }
            | Self::TaskFailed { session_id, .. }
            | Self::CategoryFinished { session_id, .. }
            | Self::SessionFinished { session_id, .. }
            | Self::SessionDisposed { session_id, .. } => Some(*session_id),
            Self::Shutdown { .. } => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TargetBuilt { .. } => "target_built",
            Self::CrawlStarted { .. } => "crawl_started",
            Self::HexProgress { .. } => "hex_progress",
            Self::TermSplit { .. } => "term_split",
            Self::TaskFailed { .. } => "task_failed",
            Self::CategoryFinished { .. } => "category_finished",
            Self::SessionFinished { .. } => "session_finished",
            Self::SessionDisposed { .. } => "session_disposed",
            Self::Shutdown { .. } => "shutdown",
        }
    }

    #[must_use]
    pub fn target_built(session_id: SessionId, hexes: usize, triangles: usize, categories: usize) -> Self {
        Self::TargetBuilt {
            session_id,
            hexes,
            triangles,
            categories,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn crawl_started(session_id: SessionId, provider_id: String, initial_tasks: usize) -> Self {
        Self::CrawlStarted {
            session_id,
            provider_id,
            initial_tasks,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn hex_progress(session_id: SessionId, progress: HexProgress) -> Self {
        Self::HexProgress {
            session_id,
            progress,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn term_split(
        session_id: SessionId,
        hex_id: HexId,
        category: String,
        term_id: TermId,
        children: Vec<TermId>,
    ) -> Self {
        Self::TermSplit {
            session_id,
            hex_id,
            category,
            term_id,
            children,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn task_failed(
        session_id: SessionId,
        hex_id: HexId,
        category: String,
        term_id: TermId,
        error: ErrorDescriptor,
    ) -> Self {
        Self::TaskFailed {
            session_id,
            hex_id,
            category,
            term_id,
            error,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn category_finished(session_id: SessionId, hex_id: HexId, category: String, crawled: usize) -> Self {
        Self::CategoryFinished {
            session_id,
            hex_id,
            category,
            crawled,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn session_finished(session_id: SessionId, total_items: usize, duration: std::time::Duration) -> Self {
        Self::SessionFinished {
            session_id,
            total_items,
            duration,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn session_disposed(session_id: SessionId) -> Self {
        Self::SessionDisposed {
            session_id,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn shutdown(reason: ShutdownReason) -> Self {
        Self::Shutdown {
            reason,
            timestamp: Utc::now(),
        }
    }
}
