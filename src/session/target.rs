//! The geographic target a session crawls: mesh, categories and colors

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::category::{Category, CategorySet, Palette, build_palette, parse_category_spec};
use crate::config::{ConfigError, CrawlConfig};
use crate::geo::{Boundary, DistanceUnit, FeatureCollection, GeoMesh, HexContext, HexId};

/// Client request for a new target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshRequest {
    pub boundary: Boundary,
    /// Hex side length; `0` picks one automatically
    #[serde(default)]
    pub cell_size: f64,
    #[serde(default)]
    pub unit: DistanceUnit,
    /// Category grammar, e.g. `cafe=coffee,espresso|park#22aa44=park`
    pub categories: String,
}

impl MeshRequest {
    #[must_use]
    pub fn new(boundary: Boundary, cell_size: f64, unit: DistanceUnit, categories: impl Into<String>) -> Self {
        Self {
            boundary,
            cell_size,
            unit,
            categories: categories.into(),
        }
    }
}

/// Built mesh plus parsed categories, shared read-only with workers
#[derive(Debug)]
pub struct CrawlTarget {
    mesh: GeoMesh,
    categories: CategorySet,
    palette: Palette,
    hexes: BTreeMap<HexId, Arc<HexContext>>,
    category_refs: BTreeMap<String, Arc<Category>>,
}

impl CrawlTarget {
    /// Parse categories, then build the mesh
    ///
    /// Category errors are reported before any geometry work happens.
    pub fn build(request: &MeshRequest, config: &CrawlConfig) -> Result<Self, ConfigError> {
        let categories = parse_category_spec(&request.categories)?;
        let spec = config.mesh_spec(request.cell_size, request.unit);
        let mesh = GeoMesh::build(&request.boundary, &spec)?;
        Ok(Self::new(mesh, categories))
    }

    #[must_use]
    pub fn new(mesh: GeoMesh, categories: CategorySet) -> Self {
        let palette = build_palette(&categories);
        let hexes = mesh
            .hexes()
            .iter()
            .filter_map(|h| mesh.hex_context(h.id).map(|ctx| (h.id, Arc::new(ctx))))
            .collect();
        let category_refs = categories
            .iter()
            .map(|c| (c.name.clone(), Arc::new(c.clone())))
            .collect();
        Self {
            mesh,
            categories,
            palette,
            hexes,
            category_refs,
        }
    }

    #[must_use]
    pub fn mesh(&self) -> &GeoMesh {
        &self.mesh
    }

    #[must_use]
    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    #[must_use]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn hex_ids(&self) -> impl Iterator<Item = HexId> + '_ {
        self.hexes.keys().copied()
    }

    #[must_use]
    pub fn hex_context(&self, id: HexId) -> Option<Arc<HexContext>> {
        self.hexes.get(&id).cloned()
    }

    #[must_use]
    pub fn category(&self, name: &str) -> Option<Arc<Category>> {
        self.category_refs.get(name).cloned()
    }

    /// Number of hex × category pairs a crawl covers
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.hexes.len() * self.categories.len()
    }

    #[must_use]
    pub fn summary(&self) -> TargetSummary {
        TargetSummary {
            hexes: self.mesh.hex_features(),
            triangles: self.mesh.triangle_features(),
            palette: self.palette.clone(),
            categories: self.categories.names().map(str::to_string).collect(),
            cell_size: self.mesh.cell_size(),
            unit: self.mesh.unit(),
        }
    }
}

/// What a client receives after setting a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub hexes: FeatureCollection,
    pub triangles: FeatureCollection,
    pub palette: Palette,
    pub categories: Vec<String>,
    pub cell_size: f64,
    pub unit: DistanceUnit,
}
