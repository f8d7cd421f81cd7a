//! Time-window bisection for paginated, time-sorted providers
//!
//! Providers that page newest-first through a time window call
//! [`TimeWindowBisection::decide`] after each page. Deep result sets are split
//! at the window midpoint into two child lineages (`{term}a` for the newer
//! half, `{term}b` for the older half); shallow ones walk the upper edge down
//! below the oldest item seen. Single-author bulk uploads would otherwise
//! pin the walk to one second, so those skip ahead instead.

use serde::{Deserialize, Serialize};

use super::types::{ContinuationState, TimeWindow};
use crate::config::ConfigError;
use crate::utils::{
    BURST_LONG_SKIP_SECS, BURST_SHORT_SKIP_SECS, BURST_SHORT_SPAN_SECS, BURST_WINDOW_SECS,
    DEFAULT_PER_PAGE, DEFAULT_SPLIT_PAGE_THRESHOLD,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BisectionConfig {
    /// Allow splitting; when off, deep windows are only walked linearly
    pub enable_split: bool,
    /// Split once the provider reports more pages than this
    pub split_page_threshold: u32,
    /// Page size; a burst must fill a whole page
    pub per_page: u32,
    pub burst_window_secs: i64,
    pub burst_short_span_secs: i64,
    pub burst_short_skip_secs: i64,
    pub burst_long_skip_secs: i64,
}

impl Default for BisectionConfig {
    fn default() -> Self {
        Self {
            enable_split: true,
            split_page_threshold: DEFAULT_SPLIT_PAGE_THRESHOLD,
            per_page: DEFAULT_PER_PAGE,
            burst_window_secs: BURST_WINDOW_SECS,
            burst_short_span_secs: BURST_SHORT_SPAN_SECS,
            burst_short_skip_secs: BURST_SHORT_SKIP_SECS,
            burst_long_skip_secs: BURST_LONG_SKIP_SECS,
        }
    }
}

impl BisectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_page == 0 {
            return Err(ConfigError::option("per_page", "must be >= 1"));
        }
        if self.burst_short_skip_secs <= 0 || self.burst_long_skip_secs <= 0 {
            return Err(ConfigError::option("burst_skip", "skip durations must be positive"));
        }
        Ok(())
    }
}

/// What one page of results looked like
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageObservation {
    /// Items on the page before hex filtering
    pub returned: usize,
    /// Provider-reported matches for the whole window
    pub total: u64,
    /// Provider-reported page count for the whole window
    pub pages: u32,
    pub min_ts: Option<i64>,
    pub max_ts: Option<i64>,
    pub distinct_authors: usize,
}

impl PageObservation {
    /// Items in the window not covered by this page
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.returned as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BisectionDecision {
    Split {
        upper: ContinuationState,
        lower: ContinuationState,
    },
    Continue(ContinuationState),
    Final,
}

impl BisectionDecision {
    #[must_use]
    pub fn into_states(self) -> Vec<ContinuationState> {
        match self {
            Self::Split { upper, lower } => vec![upper, lower],
            Self::Continue(next) => vec![next],
            Self::Final => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimeWindowBisection {
    config: BisectionConfig,
}

impl TimeWindowBisection {
    #[must_use]
    pub fn new(config: BisectionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &BisectionConfig {
        &self.config
    }

    /// Decide the next step for a lineage after one page
    #[must_use]
    pub fn decide(&self, state: &ContinuationState, page: &PageObservation) -> BisectionDecision {
        let term = &state.term_id;
        if page.returned == 0 {
            log::debug!("Final({term}): empty page");
            return BisectionDecision::Final;
        }
        if page.remaining() == 0 {
            log::debug!("Final({term}): exhausted after {} items", page.returned);
            return BisectionDecision::Final;
        }
        let Some(window) = state.window else {
            log::warn!("Final({term}): provider reported more results but state has no window");
            return BisectionDecision::Final;
        };

        if let (Some(lo), Some(hi)) = (page.min_ts, page.max_ts) {
            let span = hi.saturating_sub(lo);
            if page.distinct_authors == 1
                && page.returned >= self.config.per_page as usize
                && span < self.config.burst_window_secs
            {
                let skip = if span < self.config.burst_short_span_secs {
                    self.config.burst_short_skip_secs
                } else {
                    self.config.burst_long_skip_secs
                };
                log::warn!(
                    "Burst({term}): single author filled a page within {span}s; skipping {skip}s below {lo}"
                );
                return Self::narrow(state, window, lo.saturating_sub(skip));
            }
        }

        if self.config.enable_split && page.pages > self.config.split_page_threshold {
            if let Some((upper, lower)) = window.bisect() {
                log::debug!(
                    "Split({term}): {} pages over [{}, {}) at {}",
                    page.pages,
                    window.min,
                    window.max,
                    upper.min
                );
                return BisectionDecision::Split {
                    upper: ContinuationState::windowed(term.child('a'), upper),
                    lower: ContinuationState::windowed(term.child('b'), lower),
                };
            }
        }

        match page.min_ts {
            Some(lo) => {
                let all_same = page.max_ts == Some(lo);
                let next_max = if all_same { lo } else { lo.saturating_add(1) };
                Self::narrow(state, window, next_max)
            }
            None => {
                log::warn!("Final({term}): page carried no timestamps, cannot narrow window");
                BisectionDecision::Final
            }
        }
    }

    fn narrow(state: &ContinuationState, window: TimeWindow, next_max: i64) -> BisectionDecision {
        // always strictly shrink so every lineage terminates
        let next_max = next_max.min(window.max.saturating_sub(1));
        let next = TimeWindow::new(window.min, next_max);
        if next.is_empty() {
            log::debug!("Final({}): window [{}, {}) exhausted", state.term_id, window.min, window.max);
            return BisectionDecision::Final;
        }
        log::debug!(
            "Continue({}): [{}, {}) -> [{}, {})",
            state.term_id,
            window.min,
            window.max,
            next.min,
            next.max
        );
        BisectionDecision::Continue(ContinuationState {
            term_id: state.term_id.clone(),
            window: Some(next),
            cursor: None,
        })
    }
}
