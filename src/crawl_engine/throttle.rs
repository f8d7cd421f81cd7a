//! Per-provider rate limiting
//!
//! Each provider gets a throttle combining a concurrency cap with a minimum
//! spacing between call starts. Throttles are created lazily per provider id
//! in a lock-free `DashMap` and shared by every session using that provider.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::config::ConfigError;
use crate::utils::{DEFAULT_THROTTLE_MAX_CONCURRENT, DEFAULT_THROTTLE_MIN_SPACING_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Calls allowed in flight at once
    pub max_concurrent: usize,
    /// Minimum gap between consecutive call starts
    pub min_spacing_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_THROTTLE_MAX_CONCURRENT,
            min_spacing_ms: DEFAULT_THROTTLE_MIN_SPACING_MS,
        }
    }
}

impl ThrottleConfig {
    #[must_use]
    pub const fn new(max_concurrent: usize, min_spacing_ms: u64) -> Self {
        Self {
            max_concurrent,
            min_spacing_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::option("throttle.max_concurrent", "must be >= 1"));
        }
        Ok(())
    }

    #[must_use]
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Throttle for provider '{0}' is closed")]
pub struct ThrottleClosed(pub String);

/// Slot held for the duration of one provider call
#[derive(Debug)]
pub struct ThrottlePermit {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug)]
pub struct ProviderThrottle {
    provider_id: String,
    config: ThrottleConfig,
    semaphore: Arc<Semaphore>,
    next_slot: Mutex<Instant>,
}

impl ProviderThrottle {
    #[must_use]
    pub fn new(provider_id: impl Into<String>, config: ThrottleConfig) -> Self {
        Self {
            provider_id: provider_id.into(),
            config,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    #[must_use]
    pub fn config(&self) -> ThrottleConfig {
        self.config
    }

    /// Wait for a concurrency slot, then for the next spacing slot
    ///
    /// # Errors
    ///
    /// `ThrottleClosed` once [`ProviderThrottle::close`] has been called.
    pub async fn acquire(&self) -> Result<ThrottlePermit, ThrottleClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ThrottleClosed(self.provider_id.clone()))?;

        let spacing = self.config.min_spacing();
        if !spacing.is_zero() {
            let start = {
                let mut next = self.next_slot.lock().await;
                let slot = (*next).max(Instant::now());
                *next = slot + spacing;
                slot
            };
            tokio::time::sleep_until(start).await;
        }
        Ok(ThrottlePermit { _permit: permit })
    }

    /// Calls currently holding a slot
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.config.max_concurrent.max(1) - self.semaphore.available_permits()
    }

    /// Fail all pending and future acquisitions
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// Throttles keyed by provider id
#[derive(Debug, Default)]
pub struct ThrottleRegistry {
    throttles: DashMap<String, Arc<ProviderThrottle>>,
}

impl ThrottleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Throttle for a provider, replacing it if the configuration changed
    pub fn throttle_for(&self, provider_id: &str, config: ThrottleConfig) -> Arc<ProviderThrottle> {
        let mut entry = self
            .throttles
            .entry(provider_id.to_string())
            .or_insert_with(|| Arc::new(ProviderThrottle::new(provider_id, config)));
        if entry.config() != config {
            log::info!("Throttle for provider '{provider_id}' reconfigured to {config:?}");
            *entry = Arc::new(ProviderThrottle::new(provider_id, config));
        }
        entry.clone()
    }

    pub fn close_all(&self) {
        for entry in self.throttles.iter() {
            entry.value().close();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.throttles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.throttles.is_empty()
    }
}
