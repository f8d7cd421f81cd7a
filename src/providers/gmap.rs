//! Google Places text search adapter
//!
//! Every term of a category is searched as its own query. A task for the
//! root lineage of a multi-term category fans out into one child lineage per
//! term; each lineage then walks up to `max_pages` result pages by carrying
//! the API's `next_page_token` in its continuation cursor.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::common::{build_client, lenient_f64, parse_endpoint, read_body};
use crate::config::ConfigError;
use crate::crawl_engine::ThrottleConfig;
use crate::geo::measure::{haversine_distance, open_ring, ring_centroid};
use crate::geo::{Coord, DistanceUnit, HexContext};
use crate::plugin::{OptionKind, OptionSpec, Plugin, check_against_schema};
use crate::provider::{
    ContinuationState, CrawledItem, FailureKind, Provider, ProviderError, ProviderResult, RetryPolicy,
    SearchRequest, TermId, with_backoff,
};
use crate::utils::{
    DEFAULT_PROVIDER_TIMEOUT_SECS, PLACES_EXPECTED_PER_HEX, PLACES_MAX_PAGES, PLACES_MAX_RADIUS_M,
    PLACES_PAGE_TOKEN_DELAY_MS,
};

pub const GMAP_PROVIDER_ID: &str = "gmap";

const PLACES_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";
const PLACE_URL_PREFIX: &str = "https://www.google.com/maps/place/?q=place_id:";
/// Copied from the place record into each item's properties
const PLACE_FIELDS: [&str; 8] = [
    "place_id",
    "name",
    "formatted_address",
    "rating",
    "user_ratings_total",
    "price_level",
    "business_status",
    "types",
];

static API_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^AIza[0-9A-Za-z_-]{10,}$").expect("Invalid API key regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmapOptions {
    pub api_key: String,
    pub language: String,
    /// Pages fetched per query, 1..=3
    pub max_pages: u32,
    /// Fixed search radius; derived from the hex extent when unset
    pub radius_m: Option<u32>,
    /// Wait before a page token is used
    pub page_token_delay_ms: u64,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub throttle: ThrottleConfig,
    pub retry: RetryPolicy,
}

impl Default for GmapOptions {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            language: "ja".to_string(),
            max_pages: PLACES_MAX_PAGES,
            radius_m: None,
            page_token_delay_ms: PLACES_PAGE_TOKEN_DELAY_MS,
            endpoint: PLACES_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            throttle: ThrottleConfig::default(),
            retry: RetryPolicy {
                max_attempts: 3,
                ..RetryPolicy::default()
            },
        }
    }
}

impl GmapOptions {
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !API_KEY.is_match(&self.api_key) {
            return Err(ConfigError::option("api_key", "Google API keys start with 'AIza'"));
        }
        if !(1..=PLACES_MAX_PAGES).contains(&self.max_pages) {
            return Err(ConfigError::option("max_pages", format!("must be within 1..={PLACES_MAX_PAGES}")));
        }
        if let Some(radius) = self.radius_m {
            if !(1..=PLACES_MAX_RADIUS_M).contains(&radius) {
                return Err(ConfigError::option("radius_m", format!("must be within 1..={PLACES_MAX_RADIUS_M}")));
            }
        }
        if self.language.trim().is_empty() {
            return Err(ConfigError::option("language", "must not be empty"));
        }
        parse_endpoint(&self.endpoint)?;
        self.throttle.validate()?;
        self.retry.validate()
    }
}

/// Position of one term lineage in its page walk, kept in
/// [`ContinuationState::cursor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PageCursor {
    /// Index into the category's terms
    term: usize,
    page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    /// In-hex places collected by earlier pages
    seen: u64,
}

impl PageCursor {
    fn first(term: usize) -> Self {
        Self {
            term,
            page: 0,
            token: None,
            seen: 0,
        }
    }

    fn decode(raw: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(raw)
            .map_err(|e| ProviderError::fatal(format!("unreadable page cursor: {e}"), Some("INVALID_CURSOR".to_string())))
    }

    fn into_state(self, term_id: TermId) -> Result<ContinuationState, ProviderError> {
        Ok(ContinuationState {
            term_id,
            window: None,
            cursor: Some(serde_json::to_string(&self)?),
        })
    }
}

/// Lineage label for the `index`-th term under `parent`
fn term_lineage(parent: &TermId, index: usize) -> TermId {
    let suffix = u32::try_from(index)
        .ok()
        .and_then(|i| char::from_u32(u32::from(b'a') + i))
        .unwrap_or('z');
    parent.child(suffix)
}

/// Search radius covering the hex from its centroid, in meters
fn hex_radius_m(hex: &HexContext) -> u32 {
    let Some(center) = ring_centroid(&hex.ring) else {
        return PLACES_MAX_RADIUS_M;
    };
    let reach = open_ring(&hex.ring)
        .iter()
        .map(|v| haversine_distance(&center, v, DistanceUnit::Meters))
        .fold(0.0_f64, f64::max);
    if !reach.is_finite() {
        return PLACES_MAX_RADIUS_M;
    }
    (reach.ceil() as u32).clamp(1, PLACES_MAX_RADIUS_M)
}

pub struct GmapProvider {
    options: GmapOptions,
    client: reqwest::Client,
}

impl GmapProvider {
    pub fn new(options: GmapOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let client = build_client(options.timeout_secs)?;
        log::info!(
            "Places provider ready: language={}, max_pages={}, radius={}",
            options.language,
            options.max_pages,
            options.radius_m.map_or_else(|| "per hex".to_string(), |r| format!("{r}m"))
        );
        Ok(Self { options, client })
    }

    /// Build from a raw option bag, checked against the declared schema
    pub fn from_value(raw: &Value) -> Result<Self, ConfigError> {
        check_against_schema(&Self::schema(), raw)?;
        let raw = if raw.is_null() { json!({}) } else { raw.clone() };
        let options: GmapOptions =
            serde_json::from_value(raw).map_err(|e| ConfigError::option("<root>", e.to_string()))?;
        Self::new(options)
    }

    #[must_use]
    pub fn options(&self) -> &GmapOptions {
        &self.options
    }

    fn schema() -> Vec<OptionSpec> {
        let d = GmapOptions::default();
        vec![
            OptionSpec::new("api_key", OptionKind::String, Value::Null, "Google Maps Platform API key"),
            OptionSpec::new("language", OptionKind::String, json!(d.language), "Result language"),
            OptionSpec::new("max_pages", OptionKind::Integer, json!(d.max_pages), "Pages per query (1-3)"),
            OptionSpec::new("radius_m", OptionKind::Integer, Value::Null, "Search radius; defaults to the hex extent"),
            OptionSpec::new(
                "page_token_delay_ms",
                OptionKind::Integer,
                json!(d.page_token_delay_ms),
                "Wait before requesting the next page",
            ),
            OptionSpec::new("endpoint", OptionKind::String, json!(d.endpoint), "Text search endpoint"),
            OptionSpec::new("timeout_secs", OptionKind::Integer, json!(d.timeout_secs), "HTTP timeout"),
            OptionSpec::new("throttle", OptionKind::Object, json!(d.throttle), "Concurrency and spacing"),
            OptionSpec::new("retry", OptionKind::Object, json!(d.retry), "Transient failure retry policy"),
        ]
    }

    async fn fetch_page(
        &self,
        hex: &HexContext,
        query: &str,
        token: Option<&str>,
    ) -> Result<PlacesResponse, ProviderError> {
        let radius = self.options.radius_m.unwrap_or_else(|| hex_radius_m(hex));
        let mut params = vec![
            ("key", self.options.api_key.clone()),
            ("query", query.to_string()),
            ("language", self.options.language.clone()),
            ("radius", radius.to_string()),
        ];
        if let Some(center) = ring_centroid(&hex.ring).filter(Coord::is_finite) {
            params.push(("location", format!("{},{}", center.lat, center.lon)));
        }
        let b = &hex.bbox;
        if b.west < b.east && b.south < b.north {
            params.push((
                "locationbias",
                format!("rectangle:{},{}|{},{}", b.south, b.west, b.north, b.east),
            ));
        }
        if let Some(token) = token {
            params.push(("pagetoken", token.to_string()));
        }

        let response = self.client.get(&self.options.endpoint).query(&params).send().await?;
        let body = read_body(response).await?;
        let parsed: PlacesResponse = serde_json::from_str(&body)?;
        match parsed.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(parsed),
            // a fresh page token is rejected until the server has caught up
            "UNKNOWN_ERROR" | "INVALID_REQUEST" if token.is_some() => Err(ProviderError::transient(
                FailureKind::Upstream,
                format!("page token not ready: {}", parsed.status),
            )),
            status => {
                let detail = match &parsed.error_message {
                    Some(msg) => format!("{status}: {msg}"),
                    None => status.to_string(),
                };
                Err(ProviderError::fatal(
                    format!("Places API error: {detail}"),
                    Some(format!("GMAP_{status}")),
                ))
            }
        }
    }

    /// Split a multi-term root task into one page walk per term
    fn fan_out(&self, request: &SearchRequest) -> Result<ProviderResult, ProviderError> {
        let terms = request.category.terms.len();
        let states = (0..terms)
            .map(|i| PageCursor::first(i).into_state(term_lineage(&request.state.term_id, i)))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "gmap hex {} '{}': {terms} queries",
            request.hex.hex_id,
            request.category.name
        );
        Ok(ProviderResult::partial(
            Vec::new(),
            0,
            PLACES_EXPECTED_PER_HEX * terms as u64,
            states,
        ))
    }

    async fn walk_page(&self, request: &SearchRequest, cursor: PageCursor) -> Result<ProviderResult, ProviderError> {
        let state = &request.state;
        let query = request.category.terms.get(cursor.term).ok_or_else(|| {
            ProviderError::fatal(
                format!("term {} out of range for '{}'", cursor.term, request.category.name),
                Some("INVALID_CURSOR".to_string()),
            )
        })?;
        let label = format!(
            "gmap hex {} '{}' term {} page {}",
            request.hex.hex_id, request.category.name, state.term_id, cursor.page
        );
        if cursor.token.is_some() && self.options.page_token_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.options.page_token_delay_ms)).await;
        }
        let response = with_backoff(&self.options.retry, &label, || {
            self.fetch_page(&request.hex, query, cursor.token.as_deref())
        })
        .await?;

        let returned = response.results.len();
        let mut items = Vec::with_capacity(returned);
        let mut unplaced = 0;
        for place in response.results {
            match place_item(&place, query) {
                Some(item) => items.push(item),
                None => unplaced += 1,
            }
        }
        let (kept, outside) = request.localize(items);
        let seen = cursor.seen + kept.len() as u64;
        log::debug!("{label}: {returned} places, {} kept", kept.len());

        let next_token = response
            .next_page_token
            .filter(|t| !t.is_empty() && cursor.page + 1 < self.options.max_pages);
        let Some(token) = next_token else {
            return Ok(ProviderResult::complete(kept, outside + unplaced));
        };
        let next = PageCursor {
            term: cursor.term,
            page: cursor.page + 1,
            token: Some(token),
            seen,
        };
        Ok(ProviderResult::partial(
            kept,
            outside + unplaced,
            PLACES_EXPECTED_PER_HEX.saturating_sub(seen),
            vec![next.into_state(state.term_id.clone())?],
        ))
    }
}

impl Plugin for GmapProvider {
    fn id(&self) -> &str {
        GMAP_PROVIDER_ID
    }

    fn option_schema(&self) -> Vec<OptionSpec> {
        Self::schema()
    }
}

#[async_trait]
impl Provider for GmapProvider {
    fn throttle(&self) -> ThrottleConfig {
        self.options.throttle
    }

    async fn search(&self, request: SearchRequest) -> Result<ProviderResult, ProviderError> {
        let outcome = if request.category.terms.is_empty() {
            Err(ProviderError::fatal(
                format!("category '{}' has no query terms", request.category.name),
                Some("EMPTY_QUERY".to_string()),
            ))
        } else {
            match request.state.cursor.as_deref() {
                Some(raw) => match PageCursor::decode(raw) {
                    Ok(cursor) => self.walk_page(&request, cursor).await,
                    Err(e) => Err(e),
                },
                None if request.category.terms.len() > 1 => self.fan_out(&request),
                None => self.walk_page(&request, PageCursor::first(0)).await,
            }
        };
        outcome.or_else(|e| {
            log::error!(
                "gmap hex {} '{}' term {}: {e}",
                request.hex.hex_id,
                request.category.name,
                request.state.term_id
            );
            Ok(ProviderResult::failed(&e))
        })
    }
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    status: String,
    #[serde(default)]
    results: Vec<Map<String, Value>>,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

fn place_item(place: &Map<String, Value>, query: &str) -> Option<CrawledItem> {
    let id = place.get("place_id").and_then(Value::as_str)?.to_string();
    let location = place.get("geometry")?.get("location")?;
    let lat = location.get("lat").and_then(lenient_f64)?;
    let lon = location.get("lng").and_then(lenient_f64)?;
    let coord = Coord::new(lon, lat);
    if !coord.is_finite() {
        return None;
    }
    let mut properties = Map::new();
    for key in PLACE_FIELDS {
        properties.insert(key.to_string(), place.get(key).cloned().unwrap_or(Value::Null));
    }
    properties.insert("text_query".to_string(), json!(query));
    properties.insert("gmap_url".to_string(), json!(format!("{PLACE_URL_PREFIX}{id}")));
    Some(CrawledItem {
        id,
        coord,
        triangle: None,
        timestamp: None,
        properties: Value::Object(properties),
    })
}
