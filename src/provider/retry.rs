//! Bounded exponential backoff for provider calls
//!
//! Only transient failures are retried. The final failure is always
//! returned in its fatal form so adapters can turn it straight into a
//! terminal `ProviderResult`.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::errors::ProviderError;
use crate::config::ConfigError;
use crate::utils::{
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total calls including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::option("max_attempts", "must be >= 1"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::option(
                "max_delay_ms",
                format!("must be >= base_delay_ms ({})", self.base_delay_ms),
            ));
        }
        Ok(())
    }

    /// Backoff before retry number `attempt` (1-based), without jitter
    #[must_use]
    pub fn delay_for(&self, attempt: u32, multiplier: f64) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        let raw = self.base_delay_ms.saturating_mul(exp) as f64 * multiplier.max(1.0);
        Duration::from_millis((raw as u64).min(self.max_delay_ms))
    }
}

/// Run `op` until it succeeds, fails fatally or exhausts the policy
///
/// # Errors
///
/// Returns the last failure, converted to `ProviderError::Fatal`.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let base = policy.delay_for(attempt, err.delay_multiplier());
                let jitter = rand::rng().random_range(0..=base.as_millis() as u64 / 10);
                let wait = base + Duration::from_millis(jitter);
                log::warn!(
                    "{label}: attempt {attempt}/{} failed ({err}), retrying in {wait:?}",
                    policy.max_attempts
                );
                tokio::time::sleep(wait).await;
            }
            Err(err) => {
                if err.is_transient() {
                    log::error!("{label}: giving up after {attempt} attempts: {err}");
                }
                return Err(err.into_fatal());
            }
        }
    }
}
