//! Configuration module for the crawl engine
//!
//! This module provides the `CrawlConfig` struct and its builder for
//! configuring the engine with validation and sensible defaults, plus the
//! `ConfigError` shared by every validation step in the crate.

// Sub-modules
pub mod builder;
pub mod errors;
pub mod getters;
pub mod types;

// Re-exports for public API
pub use builder::CrawlConfigBuilder;
pub use errors::ConfigError;
pub use types::CrawlConfig;
