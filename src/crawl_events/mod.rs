//! Event system for crawl progress
//!
//! The engine core publishes [`CrawlEvent`]s on a broadcast [`CrawlEventBus`];
//! clients subscribe to all events or to a single session's.

pub mod bus;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod streaming;
pub mod types;

pub use bus::CrawlEventBus;
pub use config::{BackpressureMode, EventBusConfig};
pub use errors::EventBusError;
pub use metrics::{EventBusMetrics, MetricsSnapshot};
pub use streaming::FilteredReceiver;
pub use types::{CrawlEvent, ShutdownReason};
