//! Flickr photo search adapter
//!
//! Each call fetches one page (newest first) of geotagged photos inside the
//! hex's bounding box and time window, keeps the ones inside the hex, and
//! hands the page statistics to [`TimeWindowBisection`] to decide whether
//! the lineage splits, continues below the oldest photo, or ends.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::common::{DateBound, build_client, lenient_f64, lenient_i64, parse_endpoint, read_body};
use crate::config::ConfigError;
use crate::crawl_engine::ThrottleConfig;
use crate::geo::{BBox, Coord};
use crate::plugin::{OptionKind, OptionSpec, Plugin};
use crate::provider::{
    BisectionConfig, ContinuationState, CrawledItem, PageObservation, Provider, ProviderError,
    ProviderResult, RetryPolicy, SearchRequest, TermId, TimeWindow, TimeWindowBisection, with_backoff,
};
use crate::utils::{DEFAULT_PER_PAGE, DEFAULT_PROVIDER_TIMEOUT_SECS};

pub const FLICKR_PROVIDER_ID: &str = "flickr";

const FLICKR_ENDPOINT: &str = "https://api.flickr.com/services/rest/";
const DEFAULT_EXTRAS: &str = "date_upload,date_taken,owner_name,geo,url_s,tags";
/// 2004-01-01T00:00:00Z, before the first Flickr upload
const DEFAULT_DATE_MIN: i64 = 1_072_915_200;
/// Upper bound default sits this far behind "now"
const DATE_MAX_LAG_SECS: i64 = 360;

/// Which timestamp windows and sorting use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateMode {
    #[default]
    Upload,
    Taken,
}

impl DateMode {
    fn sort(self) -> &'static str {
        match self {
            Self::Upload => "date-posted-desc",
            Self::Taken => "date-taken-desc",
        }
    }

    fn bound_keys(self) -> (&'static str, &'static str) {
        match self {
            Self::Upload => ("min_upload_date", "max_upload_date"),
            Self::Taken => ("min_taken_date", "max_taken_date"),
        }
    }

    /// Photo timestamp in unix seconds
    fn timestamp(self, photo: &Map<String, Value>) -> Option<i64> {
        match self {
            Self::Upload => photo.get("dateupload").and_then(lenient_i64),
            Self::Taken => photo
                .get("datetaken")
                .and_then(Value::as_str)
                .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
                .map(|dt| dt.and_utc().timestamp()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlickrOptions {
    /// 32 hex digits
    pub api_key: String,
    pub date_mode: DateMode,
    pub date_min: DateBound,
    /// Defaults to a few minutes before now
    pub date_max: Option<DateBound>,
    pub per_page: u32,
    /// Split deep windows instead of only walking them
    pub haste: bool,
    pub extras: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub throttle: ThrottleConfig,
    pub retry: RetryPolicy,
}

impl Default for FlickrOptions {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            date_mode: DateMode::default(),
            date_min: DateBound::Unix(DEFAULT_DATE_MIN),
            date_max: None,
            per_page: DEFAULT_PER_PAGE,
            haste: true,
            extras: DEFAULT_EXTRAS.to_string(),
            endpoint: FLICKR_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            throttle: ThrottleConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl FlickrOptions {
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Resolved crawl window `[date_min, date_max + 1)`
    pub fn window(&self) -> Result<TimeWindow, ConfigError> {
        let min = self.date_min.resolve("date_min")?;
        let max = match &self.date_max {
            Some(bound) => bound.resolve("date_max")?,
            None => chrono::Utc::now().timestamp() - DATE_MAX_LAG_SECS,
        };
        let window = TimeWindow::new(min, max.saturating_add(1));
        if window.is_empty() {
            return Err(ConfigError::option("date_min", format!("date_min {min} is after date_max {max}")));
        }
        Ok(window)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.len() != 32 || !self.api_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::option("api_key", "Flickr API keys are 32 hexadecimal digits"));
        }
        if self.per_page == 0 || self.per_page > 500 {
            return Err(ConfigError::option("per_page", "must be within 1..=500"));
        }
        self.window()?;
        parse_endpoint(&self.endpoint)?;
        self.throttle.validate()?;
        self.retry.validate()
    }
}

pub struct FlickrProvider {
    options: FlickrOptions,
    window: TimeWindow,
    bisection: TimeWindowBisection,
    client: reqwest::Client,
}

impl FlickrProvider {
    pub fn new(options: FlickrOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let window = options.window()?;
        let bisection = TimeWindowBisection::new(BisectionConfig {
            enable_split: options.haste,
            per_page: options.per_page,
            ..BisectionConfig::default()
        });
        let client = build_client(options.timeout_secs)?;
        log::info!(
            "Flickr provider ready: {:?} dates [{}, {}), haste={}",
            options.date_mode,
            window.min,
            window.max,
            options.haste
        );
        Ok(Self {
            options,
            window,
            bisection,
            client,
        })
    }

    /// Build from a raw option bag, checked against the declared schema
    pub fn from_value(raw: &Value) -> Result<Self, ConfigError> {
        crate::plugin::check_against_schema(&Self::schema(), raw)?;
        let raw = if raw.is_null() { json!({}) } else { raw.clone() };
        let options: FlickrOptions =
            serde_json::from_value(raw).map_err(|e| ConfigError::option("<root>", e.to_string()))?;
        Self::new(options)
    }

    #[must_use]
    pub fn options(&self) -> &FlickrOptions {
        &self.options
    }

    fn schema() -> Vec<OptionSpec> {
        let d = FlickrOptions::default();
        vec![
            OptionSpec::new("api_key", OptionKind::String, Value::Null, "Flickr API key (32 hex digits)"),
            OptionSpec::new("date_mode", OptionKind::String, json!("upload"), "Window on upload or taken dates"),
            OptionSpec::new("date_min", OptionKind::Date, json!(DEFAULT_DATE_MIN), "Oldest date crawled"),
            OptionSpec::new("date_max", OptionKind::Date, Value::Null, "Newest date crawled; defaults to now"),
            OptionSpec::new("per_page", OptionKind::Integer, json!(d.per_page), "Photos per request"),
            OptionSpec::new("haste", OptionKind::Boolean, json!(d.haste), "Split deep time windows"),
            OptionSpec::new("extras", OptionKind::String, json!(d.extras), "Extra photo fields requested"),
            OptionSpec::new("endpoint", OptionKind::String, json!(d.endpoint), "REST endpoint"),
            OptionSpec::new("timeout_secs", OptionKind::Integer, json!(d.timeout_secs), "HTTP timeout"),
            OptionSpec::new("throttle", OptionKind::Object, json!(d.throttle), "Concurrency and spacing"),
            OptionSpec::new("retry", OptionKind::Object, json!(d.retry), "Transient failure retry policy"),
        ]
    }

    async fn fetch_page(&self, bbox: &BBox, tags: &str, window: TimeWindow) -> Result<PhotoPage, ProviderError> {
        let (min_key, max_key) = self.options.date_mode.bound_keys();
        let params = [
            ("method", "flickr.photos.search".to_string()),
            ("api_key", self.options.api_key.clone()),
            ("format", "json".to_string()),
            ("nojsoncallback", "1".to_string()),
            ("bbox", format!("{},{},{},{}", bbox.west, bbox.south, bbox.east, bbox.north)),
            ("tags", tags.to_string()),
            ("extras", self.options.extras.clone()),
            ("sort", self.options.date_mode.sort().to_string()),
            ("has_geo", "1".to_string()),
            ("per_page", self.options.per_page.to_string()),
            ("page", "1".to_string()),
            (min_key, window.min.to_string()),
            // the API bound is inclusive
            (max_key, (window.max - 1).to_string()),
        ];
        let response = self.client.get(&self.options.endpoint).query(&params).send().await?;
        let body = read_body(response).await?;
        let parsed: SearchResponse = serde_json::from_str(&body)?;
        if parsed.stat != "ok" {
            let code = parsed.code.as_ref().and_then(lenient_i64);
            return Err(ProviderError::fatal(
                format!("Flickr API error: {}", parsed.message.unwrap_or_else(|| parsed.stat.clone())),
                Some(code.map_or_else(|| "FLICKR".to_string(), |c| format!("FLICKR_{c}"))),
            ));
        }
        parsed
            .photos
            .ok_or_else(|| ProviderError::fatal("Flickr response has no photos", Some("INVALID_RESPONSE".to_string())))
    }
}

impl Plugin for FlickrProvider {
    fn id(&self) -> &str {
        FLICKR_PROVIDER_ID
    }

    fn option_schema(&self) -> Vec<OptionSpec> {
        Self::schema()
    }
}

#[async_trait]
impl Provider for FlickrProvider {
    fn initial_state(&self) -> ContinuationState {
        ContinuationState::windowed(TermId::root(), self.window)
    }

    fn throttle(&self) -> ThrottleConfig {
        self.options.throttle
    }

    async fn search(&self, request: SearchRequest) -> Result<ProviderResult, ProviderError> {
        let state = &request.state;
        let window = state.window.unwrap_or(self.window);
        let tags = request.category.query();
        let label = format!(
            "flickr hex {} '{}' term {}",
            request.hex.hex_id, request.category.name, state.term_id
        );
        let page = match with_backoff(&self.options.retry, &label, || {
            self.fetch_page(&request.hex.bbox, &tags, window)
        })
        .await
        {
            Ok(page) => page,
            Err(e) => {
                log::error!("{label}: {e}");
                return Ok(ProviderResult::failed(&e));
            }
        };

        let mode = self.options.date_mode;
        let mut observation = PageObservation {
            returned: page.photo.len(),
            total: page.total.as_ref().and_then(lenient_i64).unwrap_or(0).max(0) as u64,
            pages: page.pages.as_ref().and_then(lenient_i64).unwrap_or(0).clamp(0, i64::from(u32::MAX)) as u32,
            ..PageObservation::default()
        };
        let mut authors = HashSet::new();
        let mut items = Vec::with_capacity(page.photo.len());
        let mut unplaced = 0;
        for photo in page.photo {
            if let Some(owner) = photo.get("owner").and_then(Value::as_str) {
                authors.insert(owner.to_string());
            }
            let timestamp = mode.timestamp(&photo);
            if let Some(ts) = timestamp {
                observation.min_ts = Some(observation.min_ts.map_or(ts, |m| m.min(ts)));
                observation.max_ts = Some(observation.max_ts.map_or(ts, |m| m.max(ts)));
            }
            match photo_item(photo, timestamp) {
                Some(item) => items.push(item),
                None => unplaced += 1,
            }
        }
        observation.distinct_authors = authors.len();

        let (kept, outside) = request.localize(items);
        let decision = self.bisection.decide(state, &observation);
        log::debug!(
            "{label}: {} photos, {} kept, total {}, {} pages",
            observation.returned,
            kept.len(),
            observation.total,
            observation.pages
        );
        Ok(ProviderResult::partial(
            kept,
            outside + unplaced,
            observation.remaining(),
            decision.into_states(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    stat: String,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    photos: Option<PhotoPage>,
}

#[derive(Debug, Deserialize)]
struct PhotoPage {
    #[serde(default)]
    pages: Option<Value>,
    #[serde(default)]
    total: Option<Value>,
    #[serde(default)]
    photo: Vec<Map<String, Value>>,
}

fn photo_item(photo: Map<String, Value>, timestamp: Option<i64>) -> Option<CrawledItem> {
    let id = match photo.get("id")? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let lon = photo.get("longitude").and_then(lenient_f64)?;
    let lat = photo.get("latitude").and_then(lenient_f64)?;
    let coord = Coord::new(lon, lat);
    if !coord.is_finite() || (lon == 0.0 && lat == 0.0) {
        return None;
    }
    Some(CrawledItem {
        id,
        coord,
        triangle: None,
        timestamp,
        properties: Value::Object(photo),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_options_validation() {
        assert!(FlickrOptions::with_api_key(KEY).validate().is_ok());
        assert!(FlickrOptions::with_api_key("short").validate().is_err());
        let inverted = FlickrOptions {
            date_min: DateBound::Text("2020-01-01".into()),
            date_max: Some(DateBound::Text("2019-01-01".into())),
            ..FlickrOptions::with_api_key(KEY)
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_window_is_inclusive_of_date_max() {
        let opts = FlickrOptions {
            date_min: DateBound::Unix(100),
            date_max: Some(DateBound::Unix(200)),
            ..FlickrOptions::with_api_key(KEY)
        };
        assert_eq!(opts.window().unwrap(), TimeWindow::new(100, 201));
    }

    #[test]
    fn test_taken_timestamp_parsing() {
        let mut photo = Map::new();
        photo.insert("datetaken".into(), json!("2004-01-01 00:00:10"));
        photo.insert("dateupload".into(), json!("1700000000"));
        assert_eq!(DateMode::Taken.timestamp(&photo), Some(DEFAULT_DATE_MIN + 10));
        assert_eq!(DateMode::Upload.timestamp(&photo), Some(1_700_000_000));
    }

    #[test]
    fn test_photo_without_geo_is_unplaced() {
        let mut photo = Map::new();
        photo.insert("id".into(), json!("1"));
        assert!(photo_item(photo.clone(), None).is_none());
        photo.insert("latitude".into(), json!("35.6"));
        photo.insert("longitude".into(), json!(139.7));
        let item = photo_item(photo, Some(5)).unwrap();
        assert_eq!(item.id, "1");
        assert_eq!(item.coord, Coord::new(139.7, 35.6));
    }
}
