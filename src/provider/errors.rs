//! Provider failure classification
//!
//! Failures are split into transient (retried inside the adapter) and fatal
//! (returned to the scheduler as a terminal result carrying an
//! [`ErrorDescriptor`]). Nothing here ever crosses the worker boundary as a
//! panic or an `Err`.

use serde::{Deserialize, Serialize};

/// Categorizes provider failures for retry decisions
///
/// Different failure types have different retry characteristics:
/// - Network errors are usually transient → retry
/// - Rate limiting recovers with a longer backoff
/// - Upstream 5xx gateways usually recover → retry
/// - Rejected requests and malformed responses are permanent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Timeout, connection refused or reset
    Network,
    /// HTTP 429
    RateLimited,
    /// HTTP 502/503/504
    Upstream,
    /// Other 4xx/5xx or an API-level failure response
    Rejected,
    /// Response body did not match the expected shape
    InvalidResponse,
}

impl FailureKind {
    /// Classify an HTTP status code; `None` for success codes
    #[must_use]
    pub const fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=399 => None,
            429 => Some(Self::RateLimited),
            502..=504 => Some(Self::Upstream),
            _ => Some(Self::Rejected),
        }
    }

    /// Classify a transport-level error
    #[must_use]
    pub fn classify(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status().and_then(|s| Self::from_status(s.as_u16())) {
            return status;
        }
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            return Self::Network;
        }
        if err.is_decode() {
            return Self::InvalidResponse;
        }
        Self::Network
    }

    /// Whether this failure kind should be retried by default
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network | Self::RateLimited | Self::Upstream => true,
            Self::Rejected | Self::InvalidResponse => false,
        }
    }

    /// Base delay multiplier for this failure kind
    #[must_use]
    pub const fn delay_multiplier(&self) -> f64 {
        match self {
            Self::Network | Self::Upstream => 1.0,
            Self::RateLimited => 3.0,
            Self::Rejected | Self::InvalidResponse => 1.0,
        }
    }

    /// Short machine-readable code carried in error descriptors
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::RateLimited => "HTTP_429",
            Self::Upstream => "UPSTREAM",
            Self::Rejected => "REJECTED",
            Self::InvalidResponse => "INVALID_RESPONSE",
        }
    }
}

/// Error details attached to a terminal provider result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Failure raised inside a provider adapter
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Transient provider failure: {message}")]
    Transient {
        kind: FailureKind,
        message: String,
        code: Option<String>,
    },

    #[error("Provider failure: {message}")]
    Fatal {
        message: String,
        code: Option<String>,
    },
}

impl ProviderError {
    pub fn transient(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Transient {
            kind,
            message: message.into(),
            code: Some(kind.code().to_string()),
        }
    }

    pub fn fatal(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Fatal {
            message: message.into(),
            code,
        }
    }

    /// Build an error from a non-success HTTP response
    pub fn from_status(status: u16, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        let message = format!("HTTP {status}: {snippet}");
        match FailureKind::from_status(status) {
            Some(kind) if kind.is_retryable() => Self::transient(kind, message),
            _ => Self::fatal(message, Some(format!("HTTP_{status}"))),
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Delay multiplier for the next retry; 1.0 for fatal errors
    #[must_use]
    pub fn delay_multiplier(&self) -> f64 {
        match self {
            Self::Transient { kind, .. } => kind.delay_multiplier(),
            Self::Fatal { .. } => 1.0,
        }
    }

    /// Convert into the terminal form once retries are exhausted
    #[must_use]
    pub fn into_fatal(self) -> Self {
        match self {
            Self::Transient { message, code, .. } => Self::Fatal { message, code },
            fatal @ Self::Fatal { .. } => fatal,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> ErrorDescriptor {
        let (message, code) = match self {
            Self::Transient { message, code, .. } | Self::Fatal { message, code } => {
                (message.clone(), code.clone())
            }
        };
        ErrorDescriptor { message, code }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        let kind = FailureKind::classify(&err);
        if kind.is_retryable() {
            Self::transient(kind, err.to_string())
        } else {
            Self::fatal(err.to_string(), Some(kind.code().to_string()))
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::fatal(
            format!("malformed provider response: {err}"),
            Some(FailureKind::InvalidResponse.code().to_string()),
        )
    }
}
