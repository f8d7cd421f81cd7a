//! Per-session crawl state
//!
//! Tracks term lineages, deduplicated items and errors for every
//! hex × category pair, plus the number of tasks still in flight. All
//! mutation happens on the engine's core task, so nothing here locks.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use super::results::{CategoryResult, CrawlResults};
use super::target::CrawlTarget;
use super::types::{CategoryProgress, HexProgress, SessionId, SessionProgress, TermProgress};
use crate::crawl_engine::{CrawlError, CrawlTask};
use crate::geo::HexId;
use crate::provider::{ContinuationState, CrawledItem, ErrorDescriptor, ProviderResult, TermId};

/// Accumulated state of one hex × category pair
#[derive(Debug, Default)]
pub(crate) struct CategoryState {
    terms: BTreeMap<TermId, TermProgress>,
    ids: HashSet<String>,
    items: Vec<CrawledItem>,
    errors: Vec<ErrorDescriptor>,
    outside: usize,
}

impl CategoryState {
    fn remaining(&self) -> u64 {
        self.terms.values().map(|t| t.remaining).sum()
    }

    /// Every known lineage final and nothing left to fetch
    fn is_final(&self) -> bool {
        !self.terms.is_empty() && self.terms.values().all(|t| t.is_final) && self.remaining() == 0
    }

    fn progress(&self) -> CategoryProgress {
        CategoryProgress::new(self.ids.len(), self.remaining(), self.is_final())
    }
}

/// What applying one completion changed
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub follow_ups: Vec<CrawlTask>,
    pub added: usize,
    pub duplicates: usize,
    /// Child lineages created by a split
    pub split_children: Vec<TermId>,
    /// The pair turned final with this completion
    pub category_finished: bool,
    pub hex_progress: Option<HexProgress>,
}

#[derive(Debug)]
pub struct SessionState {
    id: SessionId,
    epoch: u64,
    target: Option<Arc<CrawlTarget>>,
    provider_id: Option<String>,
    cells: BTreeMap<HexId, BTreeMap<String, CategoryState>>,
    in_flight: usize,
    finished: bool,
    started_at: Option<Instant>,
}

impl SessionState {
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            epoch: 0,
            target: None,
            provider_id: None,
            cells: BTreeMap::new(),
            in_flight: 0,
            finished: false,
            started_at: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Bumped whenever outstanding work becomes meaningless
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn target(&self) -> Option<&Arc<CrawlTarget>> {
        self.target.as_ref()
    }

    #[must_use]
    pub fn provider_id(&self) -> Option<&str> {
        self.provider_id.as_deref()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// Replace the target and discard all progress
    pub fn set_target(&mut self, target: Arc<CrawlTarget>) {
        if self.in_flight > 0 {
            log::warn!(
                "Session {}: target replaced with {} tasks in flight; their results will be dropped",
                self.id,
                self.in_flight
            );
        }
        self.reset();
        self.target = Some(target);
    }

    /// Start a crawl over every hex × category pair
    ///
    /// Restarting discards earlier progress. Returns exactly one task per
    /// pair, each carrying `initial`.
    pub fn begin_crawl(
        &mut self,
        provider_id: &str,
        initial: &ContinuationState,
    ) -> Result<Vec<CrawlTask>, CrawlError> {
        let target = self.target.clone().ok_or(CrawlError::NoTarget(self.id))?;
        if self.provider_id.is_some() {
            log::info!("Session {}: restarting crawl, previous progress discarded", self.id);
        }
        self.reset();
        self.target = Some(Arc::clone(&target));
        self.provider_id = Some(provider_id.to_string());
        self.started_at = Some(Instant::now());

        let mut tasks = Vec::with_capacity(target.pair_count());
        for hex_id in target.hex_ids() {
            let per_hex = self.cells.entry(hex_id).or_default();
            for name in target.categories().names() {
                let mut cell = CategoryState::default();
                cell.terms.insert(initial.term_id.clone(), TermProgress::open());
                per_hex.insert(name.to_string(), cell);
                tasks.push(CrawlTask {
                    session_id: self.id,
                    epoch: self.epoch,
                    hex_id,
                    category: name.to_string(),
                    state: initial.clone(),
                });
            }
        }
        Ok(tasks)
    }

    pub fn mark_dispatched(&mut self) {
        self.in_flight += 1;
    }

    pub fn mark_completed(&mut self) {
        if self.in_flight == 0 {
            log::warn!("Session {}: completion with no task in flight", self.id);
            return;
        }
        self.in_flight -= 1;
    }

    /// Fold one provider result into the pair it belongs to
    ///
    /// Items are deduplicated by id, so applying the same result twice
    /// changes nothing but the term bookkeeping.
    pub fn apply(&mut self, task: &CrawlTask, result: ProviderResult) -> ApplyOutcome {
        let session_id = self.id;
        let epoch = self.epoch;
        let Some(cell) = self
            .cells
            .get_mut(&task.hex_id)
            .and_then(|per_hex| per_hex.get_mut(&task.category))
        else {
            log::warn!(
                "Session {session_id}: no state for hex {} / {}, result dropped",
                task.hex_id,
                task.category
            );
            return ApplyOutcome::default();
        };
        let was_final = cell.is_final();
        let mut outcome = ApplyOutcome::default();

        let ProviderResult {
            items,
            outside_count,
            remaining,
            is_final,
            next_states,
            error,
        } = result;

        for item in items {
            if cell.ids.insert(item.id.clone()) {
                cell.items.push(item);
                outcome.added += 1;
            } else {
                outcome.duplicates += 1;
            }
        }
        cell.outside += outside_count;
        if let Some(err) = error {
            cell.errors.push(err);
        }

        let term_id = &task.state.term_id;
        let is_final = is_final || next_states.is_empty();
        let remaining = if is_final {
            if remaining > 0 {
                log::debug!(
                    "Session {session_id}: term {term_id} final with {remaining} uncollected in hex {}",
                    task.hex_id
                );
            }
            0
        } else {
            remaining
        };
        cell.terms.insert(term_id.clone(), TermProgress { remaining, is_final });

        if let Some(parent) = term_id.parent() {
            if let Some(p) = cell.terms.get_mut(&parent) {
                if !p.is_final {
                    log::debug!("Session {session_id}: closing lineage {parent} after child {term_id}");
                    *p = TermProgress {
                        remaining: 0,
                        is_final: true,
                    };
                }
            }
        }

        if !is_final {
            for state in next_states {
                if state.term_id != *term_id {
                    outcome.split_children.push(state.term_id.clone());
                }
                cell.terms
                    .entry(state.term_id.clone())
                    .or_insert_with(TermProgress::open);
                outcome.follow_ups.push(CrawlTask {
                    session_id,
                    epoch,
                    hex_id: task.hex_id,
                    category: task.category.clone(),
                    state,
                });
            }
        }

        outcome.category_finished = !was_final && cell.is_final();
        outcome.hex_progress = self.hex_progress(task.hex_id);
        outcome
    }

    #[must_use]
    pub fn hex_progress(&self, hex_id: HexId) -> Option<HexProgress> {
        let per_hex = self.cells.get(&hex_id)?;
        let categories = per_hex
            .iter()
            .map(|(name, cell)| (name.clone(), cell.progress()))
            .collect();
        Some(HexProgress::from_categories(hex_id, categories))
    }

    /// All pairs final and nothing in flight
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.cells.is_empty()
            && self.in_flight == 0
            && self
                .cells
                .values()
                .flat_map(BTreeMap::values)
                .all(CategoryState::is_final)
    }

    /// Returns `true` exactly once, the first time the session is complete
    pub fn try_finish(&mut self) -> bool {
        if self.finished || !self.is_complete() {
            return false;
        }
        self.finished = true;
        true
    }

    #[must_use]
    pub fn total_items(&self) -> usize {
        self.cells
            .values()
            .flat_map(BTreeMap::values)
            .map(|c| c.ids.len())
            .sum()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let hexes: Vec<HexProgress> = self
            .cells
            .keys()
            .filter_map(|id| self.hex_progress(*id))
            .collect();
        let pairs = self.cells.values().flat_map(BTreeMap::values);
        let (final_pairs, total_pairs) =
            pairs.fold((0, 0), |(f, t), c| (f + usize::from(c.is_final()), t + 1));
        SessionProgress {
            session_id: self.id,
            epoch: self.epoch,
            hexes,
            in_flight: self.in_flight,
            final_pairs,
            total_pairs,
            complete: self.is_complete(),
        }
    }

    /// Snapshot of everything collected so far
    pub fn results(&self) -> Result<CrawlResults, CrawlError> {
        let target = self.target.clone().ok_or(CrawlError::NoTarget(self.id))?;
        let cells = self
            .cells
            .iter()
            .map(|(hex_id, per_hex)| {
                let per_hex = per_hex
                    .iter()
                    .map(|(name, cell)| {
                        (
                            name.clone(),
                            CategoryResult {
                                items: cell.items.clone(),
                                errors: cell.errors.clone(),
                                outside_count: cell.outside,
                                progress: cell.progress(),
                            },
                        )
                    })
                    .collect();
                (*hex_id, per_hex)
            })
            .collect();
        Ok(CrawlResults {
            session_id: self.id,
            provider_id: self.provider_id.clone().unwrap_or_default(),
            target,
            cells,
        })
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.cells.clear();
        self.in_flight = 0;
        self.finished = false;
        self.provider_id = None;
        self.started_at = None;
    }
}
