//! Collected items, grouped for output and visualizers

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::target::CrawlTarget;
use super::types::{CategoryProgress, SessionId};
use crate::geo::{FeatureCollection, HexId, TriangleId};
use crate::provider::{CrawledItem, ErrorDescriptor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub items: Vec<CrawledItem>,
    pub errors: Vec<ErrorDescriptor>,
    /// Items the provider returned that fell outside the hex
    pub outside_count: usize,
    pub progress: CategoryProgress,
}

/// Item counts inside one triangle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriangleStats {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct CrawlResults {
    pub session_id: SessionId,
    pub provider_id: String,
    pub target: Arc<CrawlTarget>,
    pub cells: BTreeMap<HexId, BTreeMap<String, CategoryResult>>,
}

impl CrawlResults {
    pub fn items(&self) -> impl Iterator<Item = (HexId, &str, &CrawledItem)> {
        self.cells.iter().flat_map(|(hex, per_hex)| {
            per_hex
                .iter()
                .flat_map(move |(name, r)| r.items.iter().map(move |item| (*hex, name.as_str(), item)))
        })
    }

    #[must_use]
    pub fn total_items(&self) -> usize {
        self.cells
            .values()
            .flat_map(BTreeMap::values)
            .map(|r| r.items.len())
            .sum()
    }

    /// One point collection per category across all hexes
    #[must_use]
    pub fn to_feature_collections(&self) -> BTreeMap<String, FeatureCollection> {
        let mut out: BTreeMap<String, FeatureCollection> = self
            .target
            .categories()
            .names()
            .map(|n| (n.to_string(), FeatureCollection::default()))
            .collect();
        for (hex, category, item) in self.items() {
            out.entry(category.to_string())
                .or_default()
                .features
                .push(item.to_feature(&self.provider_id, hex, category));
        }
        out
    }

    /// Item counts per hex and triangle index, skipping unlocalized items
    #[must_use]
    pub fn triangle_stats(&self) -> BTreeMap<HexId, BTreeMap<u32, TriangleStats>> {
        let mut stats: BTreeMap<HexId, BTreeMap<u32, TriangleStats>> = BTreeMap::new();
        for (_, category, item) in self.items() {
            let Some(TriangleId { hex, index }) = item.triangle else {
                continue;
            };
            let entry = stats.entry(hex).or_default().entry(index).or_default();
            entry.total += 1;
            *entry.by_category.entry(category.to_string()).or_default() += 1;
        }
        stats
    }
}
