//! Fluent builder for `CrawlConfig`

use crate::utils::{
    AUTO_CELL_TARGET_COUNT, DEFAULT_EVENT_BUS_CAPACITY, DEFAULT_WORKER_POOL_CAP,
    EDGE_KEY_PRECISION, MAX_MESH_CELLS, MIN_AUTO_CELL_SIZE_KM,
};

use super::errors::ConfigError;
use super::types::CrawlConfig;

/// Default pool size: hardware parallelism, clamped to `1..=12`
#[must_use]
pub fn default_worker_pool_size() -> usize {
    num_cpus::get().clamp(1, DEFAULT_WORKER_POOL_CAP)
}

#[derive(Debug, Clone)]
pub struct CrawlConfigBuilder {
    pub(crate) worker_pool_size: usize,
    pub(crate) event_bus_capacity: usize,
    pub(crate) edge_precision: u32,
    pub(crate) auto_target_cells: usize,
    pub(crate) min_auto_cell_km: f64,
    pub(crate) max_mesh_cells: usize,
}

impl Default for CrawlConfigBuilder {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            event_bus_capacity: DEFAULT_EVENT_BUS_CAPACITY,
            edge_precision: EDGE_KEY_PRECISION,
            auto_target_cells: AUTO_CELL_TARGET_COUNT,
            min_auto_cell_km: MIN_AUTO_CELL_SIZE_KM,
            max_mesh_cells: MAX_MESH_CELLS,
        }
    }
}

impl CrawlConfig {
    /// Create a builder for configuring a `CrawlConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> CrawlConfigBuilder {
        CrawlConfigBuilder::default()
    }
}

impl CrawlConfigBuilder {
    #[must_use]
    pub fn worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    #[must_use]
    pub fn event_bus_capacity(mut self, capacity: usize) -> Self {
        self.event_bus_capacity = capacity;
        self
    }

    #[must_use]
    pub fn edge_precision(mut self, digits: u32) -> Self {
        self.edge_precision = digits;
        self
    }

    #[must_use]
    pub fn auto_target_cells(mut self, cells: usize) -> Self {
        self.auto_target_cells = cells;
        self
    }

    #[must_use]
    pub fn min_auto_cell_km(mut self, km: f64) -> Self {
        self.min_auto_cell_km = km;
        self
    }

    #[must_use]
    pub fn max_mesh_cells(mut self, cells: usize) -> Self {
        self.max_mesh_cells = cells;
        self
    }

    /// Validate and produce the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a size is zero, the edge precision
    /// exceeds 12 digits or the auto-size floor is not a positive number.
    pub fn build(self) -> Result<CrawlConfig, ConfigError> {
        if self.worker_pool_size == 0 {
            return Err(ConfigError::Invalid("worker pool size must be >= 1".into()));
        }
        if self.event_bus_capacity == 0 {
            return Err(ConfigError::Invalid("event bus capacity must be >= 1".into()));
        }
        if self.edge_precision > 12 {
            return Err(ConfigError::Invalid(format!(
                "edge precision {} exceeds 12 digits",
                self.edge_precision
            )));
        }
        if self.auto_target_cells == 0 || self.max_mesh_cells == 0 {
            return Err(ConfigError::Invalid("mesh cell counts must be >= 1".into()));
        }
        if !(self.min_auto_cell_km.is_finite() && self.min_auto_cell_km > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "minimum auto cell size must be positive, got {}",
                self.min_auto_cell_km
            )));
        }

        Ok(CrawlConfig {
            worker_pool_size: self.worker_pool_size,
            event_bus_capacity: self.event_bus_capacity,
            edge_precision: self.edge_precision,
            auto_target_cells: self.auto_target_cells,
            min_auto_cell_km: self.min_auto_cell_km,
            max_mesh_cells: self.max_mesh_cells,
        })
    }
}
