//! Getter methods for `CrawlConfig`

use crate::geo::{DistanceUnit, MeshSpec};

use super::types::CrawlConfig;

impl CrawlConfig {
    #[must_use]
    pub fn worker_pool_size(&self) -> usize {
        self.worker_pool_size
    }

    #[must_use]
    pub fn event_bus_capacity(&self) -> usize {
        self.event_bus_capacity
    }

    #[must_use]
    pub fn edge_precision(&self) -> u32 {
        self.edge_precision
    }

    #[must_use]
    pub fn auto_target_cells(&self) -> usize {
        self.auto_target_cells
    }

    #[must_use]
    pub fn min_auto_cell_km(&self) -> f64 {
        self.min_auto_cell_km
    }

    #[must_use]
    pub fn max_mesh_cells(&self) -> usize {
        self.max_mesh_cells
    }

    /// Mesh parameters for a request, carrying the engine's mesh settings
    #[must_use]
    pub fn mesh_spec(&self, cell_size: f64, unit: DistanceUnit) -> MeshSpec {
        MeshSpec {
            cell_size,
            unit,
            edge_precision: self.edge_precision,
            auto_target_cells: self.auto_target_cells,
            min_auto_cell_km: self.min_auto_cell_km,
            max_cells: self.max_mesh_cells,
        }
    }
}
