//! Session identifiers and progress snapshots

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::HexId;

/// Connection-scoped session id (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Progress of one term lineage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermProgress {
    pub remaining: u64,
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl TermProgress {
    /// Lineage dispatched but not yet reported
    #[must_use]
    pub const fn open() -> Self {
        Self {
            remaining: 0,
            is_final: false,
        }
    }
}

/// Aggregated counters for one hex × category pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryProgress {
    /// Distinct item ids collected
    pub crawled: usize,
    /// Sum of term remaining estimates
    pub remaining: u64,
    /// `crawled + remaining`
    pub total: u64,
    pub percent: f64,
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl CategoryProgress {
    #[must_use]
    pub fn new(crawled: usize, remaining: u64, is_final: bool) -> Self {
        let total = crawled as u64 + remaining;
        Self {
            crawled,
            remaining,
            total,
            percent: ratio(crawled as u64, total),
            is_final,
        }
    }
}

/// Per-hex counters pushed to clients after every completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HexProgress {
    pub hex_id: HexId,
    pub categories: BTreeMap<String, CategoryProgress>,
    pub crawled: usize,
    pub total: u64,
    pub percent: f64,
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl HexProgress {
    #[must_use]
    pub fn from_categories(hex_id: HexId, categories: BTreeMap<String, CategoryProgress>) -> Self {
        let crawled = categories.values().map(|c| c.crawled).sum::<usize>();
        let total = categories.values().map(|c| c.total).sum::<u64>();
        let is_final = categories.values().all(|c| c.is_final);
        Self {
            hex_id,
            categories,
            crawled,
            total,
            percent: ratio(crawled as u64, total),
            is_final,
        }
    }
}

/// Whole-session snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub session_id: SessionId,
    pub epoch: u64,
    pub hexes: Vec<HexProgress>,
    pub in_flight: usize,
    pub final_pairs: usize,
    pub total_pairs: usize,
    pub complete: bool,
}

fn ratio(done: u64, total: u64) -> f64 {
    if total == 0 {
        1.0
    } else {
        done as f64 / total as f64
    }
}
