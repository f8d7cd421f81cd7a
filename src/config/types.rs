//! Core configuration types for the crawl engine

use serde::{Deserialize, Serialize};

/// Engine-wide configuration
///
/// Built through [`CrawlConfig::builder`]; every instance has passed
/// validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Number of long-lived workers executing provider calls
    ///
    /// Independent of, and usually larger than, any provider's own
    /// concurrency limit.
    pub(crate) worker_pool_size: usize,

    /// Broadcast capacity of the engine's event bus
    pub(crate) event_bus_capacity: usize,

    /// Decimal digits kept when keying shared mesh edges
    pub(crate) edge_precision: u32,

    /// Hex count targeted when a mesh request asks for auto-sizing
    pub(crate) auto_target_cells: usize,

    /// Floor for auto-sized cells, in kilometers
    pub(crate) min_auto_cell_km: f64,

    /// Mesh builds estimated to exceed this many hexes are rejected
    pub(crate) max_mesh_cells: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        let builder = super::builder::CrawlConfigBuilder::default();
        Self {
            worker_pool_size: builder.worker_pool_size,
            event_bus_capacity: builder.event_bus_capacity,
            edge_precision: builder.edge_precision,
            auto_target_cells: builder.auto_target_cells,
            min_auto_cell_km: builder.min_auto_cell_km,
            max_mesh_cells: builder.max_mesh_cells,
        }
    }
}
