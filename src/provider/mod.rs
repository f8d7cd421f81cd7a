//! Provider contract
//!
//! A provider answers one (hex, category, continuation state) query with a
//! page of localized items and either a terminal flag or follow-up states.
//! Adapters retry transient failures internally and report anything else as
//! data; the scheduler additionally converts an `Err` or a panic into a
//! terminal failed result, so every dispatched task completes exactly once.

pub mod bisection;
pub mod errors;
pub mod retry;
pub mod types;

pub use bisection::{BisectionConfig, BisectionDecision, PageObservation, TimeWindowBisection};
pub use errors::{ErrorDescriptor, FailureKind, ProviderError};
pub use retry::{RetryPolicy, with_backoff};
pub use types::{
    ContinuationState, CrawledItem, ProviderResult, SearchRequest, TermId, TimeWindow,
};

use async_trait::async_trait;

use crate::crawl_engine::throttle::ThrottleConfig;
use crate::plugin::{Plugin, PluginRegistry};

#[async_trait]
pub trait Provider: Plugin {
    /// State for the first task of every hex × category pair
    fn initial_state(&self) -> ContinuationState {
        ContinuationState::root()
    }

    /// Concurrency and spacing applied to this provider's calls
    fn throttle(&self) -> ThrottleConfig {
        ThrottleConfig::default()
    }

    /// Run one query
    ///
    /// Fatal failures should be returned as `Ok(ProviderResult::failed(..))`;
    /// an `Err` is tolerated and handled the same way by the scheduler.
    async fn search(&self, request: SearchRequest) -> Result<ProviderResult, ProviderError>;
}

pub type ProviderRegistry = PluginRegistry<dyn Provider>;
