//! Crawl engine: scheduler core, worker pool and provider throttles
//!
//! [`CrawlEngine`] is the client handle. It forwards commands to a single
//! core task that owns every session; the core expands provider results
//! into follow-up tasks and hands them to the [`WorkerPool`], which admits
//! each task through its provider's [`ProviderThrottle`] before running it.

pub(crate) mod core;
pub mod crawl_types;
pub mod engine;
pub mod metrics;
pub mod throttle;
pub mod worker_pool;

pub use crawl_types::{CrawlError, CrawlResult, CrawlTask, TaskCompletion};
pub use engine::CrawlEngine;
pub use metrics::{EngineMetrics, EngineMetricsSnapshot};
pub use throttle::{ProviderThrottle, ThrottleClosed, ThrottleConfig, ThrottlePermit, ThrottleRegistry};
pub use worker_pool::WorkerPool;
