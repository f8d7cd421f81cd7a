//! OpenStreetMap adapter backed by the Overpass API
//!
//! Category terms are tag filters of the form `[node|way|relation:]key[op value]`
//! with `op` one of `=`, `!=`, `=~`, `!~`. All terms of a category go into
//! one union query per task. Overpass returns everything in a single
//! response, so every result is final.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::common::{build_client, parse_endpoint, read_body};
use crate::config::ConfigError;
use crate::crawl_engine::ThrottleConfig;
use crate::geo::{BBox, Coord};
use crate::plugin::{OptionKind, OptionSpec, Plugin, check_against_schema};
use crate::provider::{
    CrawledItem, Provider, ProviderError, ProviderResult, RetryPolicy, SearchRequest, with_backoff,
};
use crate::utils::DEFAULT_PROVIDER_TIMEOUT_SECS;

pub const OVERPASS_PROVIDER_ID: &str = "overpass";

const OVERPASS_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";
/// Preferred tag keys for an element's display name
const NAME_KEYS: [&str; 7] = ["name:ja", "name", "name:en", "brand", "operator", "amenity", "shop"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsmType {
    Node,
    Way,
    Relation,
}

impl OsmType {
    const ALL: [Self; 3] = [Self::Node, Self::Way, Self::Relation];

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "node" => Some(Self::Node),
            "way" => Some(Self::Way),
            "relation" => Some(Self::Relation),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOp {
    Eq,
    NotEq,
    Matches,
    NotMatches,
}

impl TagOp {
    // longest first so "!=" is not read as "="
    const SYMBOLS: [(&'static str, Self); 4] = [
        ("!=", Self::NotEq),
        ("=~", Self::Matches),
        ("!~", Self::NotMatches),
        ("=", Self::Eq),
    ];

    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Matches => "=~",
            Self::NotMatches => "!~",
        }
    }
}

/// One parsed category term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagQuery {
    pub types: Vec<OsmType>,
    pub key: String,
    pub filter: Option<(TagOp, String)>,
}

impl TagQuery {
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(ConfigError::InvalidCategorySpec("empty Overpass tag query".to_string()));
        }
        let (types, rest) = match spec.split_once(':') {
            Some((head, rest)) => match OsmType::parse(head.trim()) {
                Some(t) => (vec![t], rest.trim()),
                None => (OsmType::ALL.to_vec(), spec),
            },
            None => (OsmType::ALL.to_vec(), spec),
        };
        let op = rest
            .char_indices()
            .find_map(|(i, _)| {
                TagOp::SYMBOLS
                    .iter()
                    .find(|(sym, _)| rest[i..].starts_with(*sym))
                    .map(|(sym, op)| (i, *sym, *op))
            });
        let (key, filter) = match op {
            Some((idx, sym, op)) => {
                let value = rest[idx + sym.len()..].trim();
                if value.is_empty() {
                    return Err(ConfigError::InvalidCategorySpec(format!("'{spec}' has no value after '{sym}'")));
                }
                (rest[..idx].trim(), Some((op, value.to_string())))
            }
            None => (rest.trim(), None),
        };
        if key.is_empty() {
            return Err(ConfigError::InvalidCategorySpec(format!("'{spec}' has no tag key")));
        }
        Ok(Self {
            types,
            key: key.to_string(),
            filter,
        })
    }

    fn filter_clause(&self) -> String {
        match &self.filter {
            Some((op, value)) => format!("[\"{}\"{}\"{}\"]", escape(&self.key), op.symbol(), escape(value)),
            None => format!("[\"{}\"]", escape(&self.key)),
        }
    }
}

impl fmt::Display for TagQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filter_clause())
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Overpass QL union over every query, restricted to `bbox`
#[must_use]
pub fn build_query(queries: &[TagQuery], bbox: &BBox, timeout_secs: u64) -> String {
    let bbox_clause = format!("({},{},{},{})", bbox.south, bbox.west, bbox.north, bbox.east);
    let statements: String = queries
        .iter()
        .flat_map(|q| {
            let clause = q.filter_clause();
            let bbox_clause = &bbox_clause;
            q.types
                .iter()
                .map(move |t| format!("{}{clause}{bbox_clause};", t.as_str()))
        })
        .collect();
    format!("[out:json][timeout:{}];({statements});out center tags;", timeout_secs.max(1))
}

fn default_overpass_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 4,
        base_delay_ms: 1_000,
        max_delay_ms: 10_000,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverpassOptions {
    pub endpoint: String,
    /// Server-side query timeout, also used for the HTTP timeout
    pub timeout_secs: u64,
    pub throttle: ThrottleConfig,
    pub retry: RetryPolicy,
}

impl Default for OverpassOptions {
    fn default() -> Self {
        Self {
            endpoint: OVERPASS_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            throttle: ThrottleConfig::new(1, 1_500),
            retry: default_overpass_retry(),
        }
    }
}

impl OverpassOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_endpoint(&self.endpoint)?;
        if self.timeout_secs == 0 {
            return Err(ConfigError::option("timeout_secs", "must be >= 1"));
        }
        self.throttle.validate()?;
        self.retry.validate()
    }
}

pub struct OverpassProvider {
    options: OverpassOptions,
    client: reqwest::Client,
}

impl OverpassProvider {
    pub fn new(options: OverpassOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        // leave the server its full query timeout before giving up locally
        let client = build_client(options.timeout_secs + 5)?;
        Ok(Self { options, client })
    }

    pub fn from_value(raw: &Value) -> Result<Self, ConfigError> {
        check_against_schema(&Self::schema(), raw)?;
        let raw = if raw.is_null() { json!({}) } else { raw.clone() };
        let options: OverpassOptions =
            serde_json::from_value(raw).map_err(|e| ConfigError::option("<root>", e.to_string()))?;
        Self::new(options)
    }

    fn schema() -> Vec<OptionSpec> {
        let d = OverpassOptions::default();
        vec![
            OptionSpec::new("endpoint", OptionKind::String, json!(d.endpoint), "Overpass interpreter URL"),
            OptionSpec::new("timeout_secs", OptionKind::Integer, json!(d.timeout_secs), "Query timeout"),
            OptionSpec::new("throttle", OptionKind::Object, json!(d.throttle), "Concurrency and spacing"),
            OptionSpec::new("retry", OptionKind::Object, json!(d.retry), "Transient failure retry policy"),
        ]
    }

    async fn post(&self, query: &str) -> Result<Vec<Map<String, Value>>, ProviderError> {
        let response = self
            .client
            .post(&self.options.endpoint)
            .form(&[("data", query)])
            .send()
            .await?;
        let body = read_body(response).await?;
        let parsed: OverpassResponse = serde_json::from_str(&body)?;
        parsed.elements.ok_or_else(|| {
            ProviderError::fatal(
                "Overpass response missing elements array",
                Some("INVALID_RESPONSE".to_string()),
            )
        })
    }
}

impl Plugin for OverpassProvider {
    fn id(&self) -> &str {
        OVERPASS_PROVIDER_ID
    }

    fn option_schema(&self) -> Vec<OptionSpec> {
        Self::schema()
    }
}

#[async_trait]
impl Provider for OverpassProvider {
    fn throttle(&self) -> ThrottleConfig {
        self.options.throttle
    }

    async fn search(&self, request: SearchRequest) -> Result<ProviderResult, ProviderError> {
        let label = format!(
            "overpass hex {} '{}'",
            request.hex.hex_id, request.category.name
        );
        let queries = match request
            .category
            .terms
            .iter()
            .map(|t| TagQuery::parse(t.as_str()))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(q) => q,
            Err(e) => {
                log::error!("{label}: {e}");
                return Ok(ProviderResult::failed(&ProviderError::fatal(
                    e.to_string(),
                    Some("INVALID_QUERY".to_string()),
                )));
            }
        };
        let query = build_query(&queries, &request.hex.bbox, self.options.timeout_secs);
        log::debug!("{label}: {query}");

        let elements = match with_backoff(&self.options.retry, &label, || self.post(&query)).await {
            Ok(elements) => elements,
            Err(e) => {
                log::error!("{label}: {e}");
                return Ok(ProviderResult::failed(&e));
            }
        };
        let returned = elements.len();
        let query_text = request.category.query();
        let items: Vec<CrawledItem> = elements
            .into_iter()
            .filter_map(|el| element_item(el, &query_text))
            .collect();
        let unplaced = returned - items.len();
        let (kept, outside) = request.localize(items);
        log::debug!("{label}: {returned} elements, {} kept", kept.len());
        Ok(ProviderResult::complete(kept, outside + unplaced))
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Option<Vec<Map<String, Value>>>,
}

fn lon_lat(v: &Value) -> Option<Coord> {
    Some(Coord::new(v.get("lon")?.as_f64()?, v.get("lat")?.as_f64()?))
}

/// Node position, way/relation center, or the middle geometry vertex
fn resolve_coord(el: &Map<String, Value>) -> Option<Coord> {
    if let (Some(lon), Some(lat)) = (
        el.get("lon").and_then(Value::as_f64),
        el.get("lat").and_then(Value::as_f64),
    ) {
        return Some(Coord::new(lon, lat));
    }
    if let Some(c) = el.get("center").and_then(lon_lat) {
        return Some(c);
    }
    let geometry = el.get("geometry")?.as_array()?;
    geometry.get(geometry.len() / 2).and_then(lon_lat)
}

fn element_item(el: Map<String, Value>, query_text: &str) -> Option<CrawledItem> {
    let coord = resolve_coord(&el)?;
    let osm_type = el.get("type")?.as_str()?.to_string();
    let osm_id = el.get("id")?.clone();
    let tags = el.get("tags").cloned().unwrap_or_else(|| json!({}));
    let name = NAME_KEYS
        .iter()
        .find_map(|k| tags.get(*k).and_then(Value::as_str))
        .map(str::to_string);
    let id = format!("{osm_type}/{osm_id}");
    Some(CrawledItem {
        id: id.clone(),
        coord,
        triangle: None,
        timestamp: None,
        properties: json!({
            "osm_id": osm_id,
            "osm_type": osm_type,
            "tags": tags,
            "name": name,
            "query": query_text,
            "osm_url": format!("https://www.openstreetmap.org/{id}"),
        }),
    })
}
