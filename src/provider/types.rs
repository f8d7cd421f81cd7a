//! Provider request/response types and continuation state

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{ErrorDescriptor, ProviderError};
use crate::category::Category;
use crate::geo::{Coord, Feature, HexContext, HexId, TriangleId};

/// Hierarchical term lineage label
///
/// The root lineage is `"a"`; a split appends `'a'` or `'b'`, so a term's
/// parent is always its id minus the last character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(String);

impl TermId {
    #[must_use]
    pub fn root() -> Self {
        Self("a".to_string())
    }

    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn child(&self, suffix: char) -> Self {
        let mut id = self.0.clone();
        id.push(suffix);
        Self(id)
    }

    /// Lineage this term was split from, `None` for single-character ids
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let mut chars = self.0.chars();
        chars.next_back()?;
        let parent = chars.as_str();
        (!parent.is_empty()).then(|| Self(parent.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Half-open time range `[min, max)` in unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub min: i64,
    pub max: i64,
}

impl TimeWindow {
    #[must_use]
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn width(&self) -> i64 {
        self.max.saturating_sub(self.min)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max <= self.min
    }

    #[must_use]
    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.min && ts < self.max
    }

    /// Split at the midpoint into `(upper, lower)` halves
    ///
    /// The halves partition the window exactly. Windows narrower than two
    /// seconds cannot be split.
    #[must_use]
    pub fn bisect(&self) -> Option<(Self, Self)> {
        if self.width() < 2 {
            return None;
        }
        let mid = self.min + self.width() / 2;
        Some((Self::new(mid, self.max), Self::new(self.min, mid)))
    }
}

/// Opaque provider cursor for one term lineage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationState {
    pub term_id: TermId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeWindow>,
    /// Provider-specific page token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl ContinuationState {
    #[must_use]
    pub fn root() -> Self {
        Self {
            term_id: TermId::root(),
            window: None,
            cursor: None,
        }
    }

    #[must_use]
    pub fn windowed(term_id: TermId, window: TimeWindow) -> Self {
        Self {
            term_id,
            window: Some(window),
            cursor: None,
        }
    }
}

/// A discovered item, already localized to its hex and triangle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawledItem {
    pub id: String,
    pub coord: Coord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triangle: Option<TriangleId>,
    /// Unix seconds, when the provider reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub properties: Value,
}

impl CrawledItem {
    /// GeoJSON point carrying provider properties plus crawl placement
    #[must_use]
    pub fn to_feature(&self, provider: &str, hex: HexId, category: &str) -> Feature {
        let mut properties = match &self.properties {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        properties.insert("id".to_string(), Value::String(self.id.clone()));
        properties.insert("provider".to_string(), Value::String(provider.to_string()));
        properties.insert("hexId".to_string(), Value::from(hex.0));
        properties.insert("category".to_string(), Value::String(category.to_string()));
        properties.insert(
            "triangleId".to_string(),
            self.triangle
                .map_or(Value::Null, |t| Value::String(t.to_string())),
        );
        Feature::point(self.coord, Value::Object(properties))
    }
}

/// Everything a provider needs for one call
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub hex: Arc<HexContext>,
    pub category: Arc<Category>,
    pub state: ContinuationState,
}

impl SearchRequest {
    /// Keep items inside the exact hex polygon and tag each with its
    /// triangle; returns the kept items and the number dropped
    #[must_use]
    pub fn localize(&self, items: Vec<CrawledItem>) -> (Vec<CrawledItem>, usize) {
        let total = items.len();
        let kept: Vec<CrawledItem> = items
            .into_iter()
            .filter(|item| self.hex.contains(&item.coord))
            .map(|mut item| {
                item.triangle = self.hex.localize(&item.coord);
                item
            })
            .collect();
        let outside = total - kept.len();
        (kept, outside)
    }
}

/// Outcome of one provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub items: Vec<CrawledItem>,
    pub outside_count: usize,
    /// Provider's estimate of items still uncollected for this lineage
    pub remaining: u64,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub next_states: Vec<ContinuationState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

impl ProviderResult {
    /// Terminal page with nothing left to fetch
    #[must_use]
    pub fn complete(items: Vec<CrawledItem>, outside_count: usize) -> Self {
        Self {
            items,
            outside_count,
            remaining: 0,
            is_final: true,
            next_states: Vec::new(),
            error: None,
        }
    }

    /// Non-terminal page with follow-up cursors
    #[must_use]
    pub fn partial(
        items: Vec<CrawledItem>,
        outside_count: usize,
        remaining: u64,
        next_states: Vec<ContinuationState>,
    ) -> Self {
        Self {
            items,
            outside_count,
            remaining,
            is_final: next_states.is_empty(),
            next_states,
            error: None,
        }
    }

    /// Terminal, empty result describing a failure
    #[must_use]
    pub fn failed(err: &ProviderError) -> Self {
        Self {
            items: Vec::new(),
            outside_count: 0,
            remaining: 0,
            is_final: true,
            next_states: Vec::new(),
            error: Some(err.descriptor()),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.id.as_str())
    }
}
