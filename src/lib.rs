//! Hex-mesh partitioned, rate-limited geo content crawler
//!
//! A target region is tessellated into hexagons (each fanned into six
//! triangles). Every hex × category pair is crawled through a pluggable
//! [`Provider`]; deep result sets are split into term lineages until each
//! lineage is exhausted. Progress is aggregated per hex and streamed as
//! [`CrawlEvent`]s.

pub mod category;
pub mod config;
pub mod crawl_engine;
pub mod crawl_events;
pub mod geo;
pub mod plugin;
pub mod provider;
pub mod providers;
pub mod session;
pub mod utils;
pub mod visualizer;

pub use category::{Category, CategorySet, Palette, PaletteEntry, build_palette, parse_category_spec};
pub use config::{ConfigError, CrawlConfig, CrawlConfigBuilder};
pub use crawl_engine::{CrawlEngine, CrawlError, CrawlResult, CrawlTask, EngineMetricsSnapshot, ThrottleConfig};
pub use crawl_events::{CrawlEvent, CrawlEventBus, EventBusError, ShutdownReason};
pub use geo::{
    BBox, Boundary, Coord, DistanceUnit, Feature, FeatureCollection, GeoMesh, HexContext, HexId, MeshSpec,
    Polygon, TriangleId,
};
pub use plugin::{OptionKind, OptionSpec, Plugin, PluginRegistry, RegistryError};
pub use provider::{
    ContinuationState, CrawledItem, ErrorDescriptor, Provider, ProviderError, ProviderRegistry, ProviderResult,
    RetryPolicy, SearchRequest, TermId, TimeWindow,
};
pub use session::{
    CrawlResults, CrawlTarget, HexProgress, MeshRequest, SessionId, SessionProgress, TargetSummary,
};
pub use visualizer::{Visualizer, VisualizerRegistry};
