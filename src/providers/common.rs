//! Helpers shared by the HTTP provider adapters

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::ConfigError;
use crate::provider::ProviderError;
use crate::utils::HEXCRAWL_USER_AGENT;

/// A date option given as unix seconds or `YYYY-MM-DD` (UTC midnight)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateBound {
    Unix(i64),
    Text(String),
}

impl DateBound {
    pub fn resolve(&self, key: &str) -> Result<i64, ConfigError> {
        match self {
            Self::Unix(ts) => Ok(*ts),
            Self::Text(text) => {
                let text = text.trim();
                if let Ok(ts) = text.parse::<i64>() {
                    return Ok(ts);
                }
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc().timestamp())
                    .ok_or_else(|| {
                        ConfigError::option(key, format!("'{text}' is neither unix seconds nor YYYY-MM-DD"))
                    })
            }
        }
    }
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .user_agent(HEXCRAWL_USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))
}

pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(endpoint).map_err(|e| ConfigError::option("endpoint", format!("{endpoint}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::option("endpoint", format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(url)
}

/// Body of a successful response, or a classified failure
pub(crate) async fn read_body(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(status.as_u16(), &body));
    }
    Ok(response.text().await?)
}

/// Integer that may arrive as a JSON number or numeric string
pub(crate) fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_date_bound_forms() {
        assert_eq!(DateBound::Unix(1_700_000_000).resolve("d").unwrap(), 1_700_000_000);
        assert_eq!(DateBound::Text("2004-01-01".into()).resolve("d").unwrap(), 1_072_915_200);
        assert_eq!(DateBound::Text(" 42 ".into()).resolve("d").unwrap(), 42);
        assert!(DateBound::Text("2004-13-01".into()).resolve("d").is_err());
    }

    #[test]
    fn test_lenient_numbers() {
        assert_eq!(lenient_i64(&json!("9250")), Some(9250));
        assert_eq!(lenient_i64(&json!(37)), Some(37));
        assert_eq!(lenient_f64(&json!("35.65")), Some(35.65));
        assert_eq!(lenient_f64(&json!(null)), None);
    }

    #[test]
    fn test_endpoint_scheme() {
        assert!(parse_endpoint("https://api.flickr.com/services/rest/").is_ok());
        assert!(parse_endpoint("ftp://example.com").is_err());
        assert!(parse_endpoint("not a url").is_err());
    }
}
