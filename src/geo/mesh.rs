//! Hex/triangle mesh with cross-hex triangle adjacency
//!
//! Each hex is fanned into one triangle per boundary edge around its
//! centroid. Boundary edges are keyed by their rounded, unordered endpoints;
//! an edge shared by triangles of two different hexes links them as cross
//! neighbours. Centroid spokes are never hex boundary edges, so triangles of
//! the same hex are never linked.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;

use super::geojson::{Feature, FeatureCollection};
use super::hexgrid::{auto_cell_size, hex_grid};
use super::measure::{bbox_area_km2, open_ring, ring_centroid};
use super::predicates::{point_in_ring, ring_intersects_polygon};
use super::types::{BBox, Boundary, Coord, DistanceUnit};
use crate::config::ConfigError;
use crate::utils::{
    AUTO_CELL_TARGET_COUNT, EDGE_KEY_PRECISION, MAX_MESH_CELLS, MIN_AUTO_CELL_SIZE_KM,
};

/// 1-based hex identifier, unique within a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexId(pub u32);

impl fmt::Display for HexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Triangle identifier `{hexId}-{indexInHex}`, index 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriangleId {
    pub hex: HexId,
    pub index: u32,
}

impl TriangleId {
    #[must_use]
    pub const fn new(hex: HexId, index: u32) -> Self {
        Self { hex, index }
    }
}

impl fmt::Display for TriangleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.hex, self.index)
    }
}

impl FromStr for TriangleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hex, index) = s
            .split_once('-')
            .ok_or_else(|| format!("triangle id '{s}' is not of the form hex-index"))?;
        let hex = hex
            .parse()
            .map_err(|e| format!("bad hex id in triangle id '{s}': {e}"))?;
        let index = index
            .parse()
            .map_err(|e| format!("bad index in triangle id '{s}': {e}"))?;
        Ok(Self::new(HexId(hex), index))
    }
}

impl Serialize for TriangleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TriangleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HexCell {
    pub id: HexId,
    pub ring: Vec<Coord>,
    pub triangle_ids: Vec<TriangleId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriangleCell {
    pub id: TriangleId,
    /// Closed ring `[a, b, centroid, a]`
    pub ring: Vec<Coord>,
    pub cross_neighbors: Vec<TriangleId>,
    pub neighbor_hex_ids: Vec<HexId>,
}

impl TriangleCell {
    #[must_use]
    pub fn parent_hex(&self) -> HexId {
        self.id.hex
    }
}

/// Mesh build parameters
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSpec {
    /// Hex cell side in `unit`; 0 auto-sizes from the boundary area
    pub cell_size: f64,
    pub unit: DistanceUnit,
    pub edge_precision: u32,
    pub auto_target_cells: usize,
    pub min_auto_cell_km: f64,
    pub max_cells: usize,
}

impl Default for MeshSpec {
    fn default() -> Self {
        Self {
            cell_size: 0.0,
            unit: DistanceUnit::Kilometers,
            edge_precision: EDGE_KEY_PRECISION,
            auto_target_cells: AUTO_CELL_TARGET_COUNT,
            min_auto_cell_km: MIN_AUTO_CELL_SIZE_KM,
            max_cells: MAX_MESH_CELLS,
        }
    }
}

impl MeshSpec {
    #[must_use]
    pub fn with_cell_size(mut self, cell_size: f64, unit: DistanceUnit) -> Self {
        self.cell_size = cell_size;
        self.unit = unit;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cell_size.is_finite() || self.cell_size < 0.0 {
            return Err(ConfigError::InvalidCellSize(format!(
                "cell size must be a finite number >= 0, got {}",
                self.cell_size
            )));
        }
        if self.edge_precision > 12 {
            return Err(ConfigError::Invalid(format!(
                "edge precision {} exceeds 12 digits",
                self.edge_precision
            )));
        }
        Ok(())
    }
}

/// Undirected edge key over rounded endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EdgeKey((i64, i64), (i64, i64));

impl EdgeKey {
    fn new(a: &Coord, b: &Coord, scale: f64) -> Self {
        let p = vertex_key(a, scale);
        let q = vertex_key(b, scale);
        if p <= q { Self(p, q) } else { Self(q, p) }
    }
}

fn vertex_key(c: &Coord, scale: f64) -> (i64, i64) {
    ((c.lon * scale).round() as i64, (c.lat * scale).round() as i64)
}

/// Tessellated target region
#[derive(Debug, Clone)]
pub struct GeoMesh {
    hexes: Vec<HexCell>,
    triangles: Vec<TriangleCell>,
    triangle_index: HashMap<TriangleId, usize>,
    hex_index: HashMap<HexId, usize>,
    degenerate: Vec<HexId>,
    cell_size: f64,
    unit: DistanceUnit,
}

impl GeoMesh {
    /// Tessellate a boundary into hexes and triangles
    ///
    /// The boundary's bounding box is buffered by one cell side before
    /// tessellating; hexes that do not touch the boundary are discarded and
    /// the survivors are numbered from 1.
    pub fn build(boundary: &Boundary, spec: &MeshSpec) -> Result<Self, ConfigError> {
        boundary.validate()?;
        spec.validate()?;
        let bbox = boundary
            .bbox()
            .ok_or_else(|| ConfigError::InvalidBoundary("boundary has no extent".to_string()))?;

        let cell_size = if spec.cell_size == 0.0 {
            auto_cell_size(&bbox, spec.auto_target_cells, spec.min_auto_cell_km, spec.unit)
        } else {
            spec.cell_size
        };

        let side_km = spec.unit.to_km(cell_size);
        let estimated = bbox_area_km2(&bbox) / (3.0 * 3f64.sqrt() / 2.0 * side_km * side_km);
        if estimated > spec.max_cells as f64 {
            return Err(ConfigError::InvalidCellSize(format!(
                "cell size {cell_size} {:?} would produce ~{estimated:.0} hexes (max {})",
                spec.unit, spec.max_cells
            )));
        }

        let region = boundary.to_polygon();
        let candidates = hex_grid(&bbox.buffered(cell_size, spec.unit), cell_size, spec.unit);
        let candidate_count = candidates.len();
        let rings: Vec<Vec<Coord>> = candidates
            .into_iter()
            .filter(|ring| ring_intersects_polygon(ring, &region))
            .collect();

        let mut mesh = Self::from_hex_rings(rings, spec.edge_precision);
        mesh.cell_size = cell_size;
        mesh.unit = spec.unit;

        if mesh.hexes.is_empty() {
            return Err(ConfigError::InvalidCellSize(format!(
                "no hex cells of size {cell_size} {:?} intersect the boundary",
                spec.unit
            )));
        }

        log::info!(
            "Built mesh: {} hexes ({} candidates), {} triangles, cell size {:.4} {:?}, {} degenerate",
            mesh.hexes.len(),
            candidate_count,
            mesh.triangles.len(),
            cell_size,
            spec.unit,
            mesh.degenerate.len()
        );
        Ok(mesh)
    }

    /// Build a mesh from pre-computed hex rings, numbering them from 1
    ///
    /// Rings with fewer than 4 coordinates are recorded as degenerate and
    /// left out; the remaining hexes keep their positional ids.
    #[must_use]
    pub fn from_hex_rings(rings: Vec<Vec<Coord>>, edge_precision: u32) -> Self {
        let mut hexes = Vec::with_capacity(rings.len());
        let mut triangles = Vec::with_capacity(rings.len() * 6);
        let mut degenerate = Vec::new();

        for (i, ring) in rings.into_iter().enumerate() {
            let id = HexId(i as u32 + 1);
            let centroid = match ring_centroid(&ring) {
                Some(c) if ring.len() >= 4 => c,
                _ => {
                    log::warn!("Skipping degenerate hex {id}: ring has {} coordinates", ring.len());
                    degenerate.push(id);
                    continue;
                }
            };

            let open = open_ring(&ring);
            let n = open.len();
            let mut triangle_ids = Vec::with_capacity(n);
            for k in 0..n {
                let a = open[k];
                let b = open[(k + 1) % n];
                let tri_id = TriangleId::new(id, k as u32 + 1);
                triangle_ids.push(tri_id);
                triangles.push(TriangleCell {
                    id: tri_id,
                    ring: vec![a, b, centroid, a],
                    cross_neighbors: Vec::new(),
                    neighbor_hex_ids: Vec::new(),
                });
            }
            hexes.push(HexCell {
                id,
                ring,
                triangle_ids,
            });
        }

        link_cross_neighbors(&mut triangles, edge_precision);

        let triangle_index = triangles
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id, i))
            .collect();
        let hex_index = hexes.iter().enumerate().map(|(i, h)| (h.id, i)).collect();

        Self {
            hexes,
            triangles,
            triangle_index,
            hex_index,
            degenerate,
            cell_size: 0.0,
            unit: DistanceUnit::default(),
        }
    }

    #[must_use]
    pub fn hexes(&self) -> &[HexCell] {
        &self.hexes
    }

    #[must_use]
    pub fn triangles(&self) -> &[TriangleCell] {
        &self.triangles
    }

    #[must_use]
    pub fn hex(&self, id: HexId) -> Option<&HexCell> {
        self.hex_index.get(&id).map(|&i| &self.hexes[i])
    }

    #[must_use]
    pub fn triangle(&self, id: TriangleId) -> Option<&TriangleCell> {
        self.triangle_index.get(&id).map(|&i| &self.triangles[i])
    }

    /// Triangles owned by a hex, in fan order
    pub fn triangles_of(&self, id: HexId) -> impl Iterator<Item = &TriangleCell> {
        self.hex(id)
            .into_iter()
            .flat_map(|h| h.triangle_ids.iter())
            .filter_map(|t| self.triangle(*t))
    }

    #[must_use]
    pub fn degenerate_hexes(&self) -> &[HexId] {
        &self.degenerate
    }

    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    #[must_use]
    pub fn unit(&self) -> DistanceUnit {
        self.unit
    }

    /// Geometry a provider needs to filter and localize items for one hex
    #[must_use]
    pub fn hex_context(&self, id: HexId) -> Option<HexContext> {
        let hex = self.hex(id)?;
        let bbox = BBox::from_coords(&hex.ring)?;
        Some(HexContext {
            hex_id: id,
            ring: hex.ring.clone(),
            bbox,
            triangles: self
                .triangles_of(id)
                .map(|t| (t.id, t.ring.clone()))
                .collect(),
        })
    }

    #[must_use]
    pub fn hex_features(&self) -> FeatureCollection {
        self.hexes
            .iter()
            .map(|h| {
                let tri_ids: Vec<String> = h.triangle_ids.iter().map(ToString::to_string).collect();
                Feature::polygon(h.ring.clone(), json!({ "hexId": h.id, "triIds": tri_ids }))
            })
            .collect()
    }

    #[must_use]
    pub fn triangle_features(&self) -> FeatureCollection {
        self.triangles
            .iter()
            .map(|t| {
                Feature::polygon(
                    t.ring.clone(),
                    json!({
                        "triangleId": t.id,
                        "parentHexId": t.id.hex,
                        "triInHex": t.id.index,
                        "crossNeighbors": t.cross_neighbors,
                        "neighborHexIds": t.neighbor_hex_ids,
                    }),
                )
            })
            .collect()
    }
}

fn link_cross_neighbors(triangles: &mut [TriangleCell], precision: u32) {
    let scale = 10f64.powi(precision as i32);
    let mut edges: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
    for (i, tri) in triangles.iter().enumerate() {
        // ring is [a, b, centroid, a]; only a-b lies on the hex boundary
        let key = EdgeKey::new(&tri.ring[0], &tri.ring[1], scale);
        edges.entry(key).or_default().push(i);
    }

    for members in edges.values().filter(|m| m.len() > 1) {
        for &i in members {
            for &j in members {
                if triangles[i].id.hex == triangles[j].id.hex {
                    continue;
                }
                let (other_id, other_hex) = (triangles[j].id, triangles[j].id.hex);
                let tri = &mut triangles[i];
                if !tri.cross_neighbors.contains(&other_id) {
                    tri.cross_neighbors.push(other_id);
                }
                if !tri.neighbor_hex_ids.contains(&other_hex) {
                    tri.neighbor_hex_ids.push(other_hex);
                }
            }
        }
    }

    for tri in triangles.iter_mut() {
        tri.cross_neighbors.sort();
        tri.neighbor_hex_ids.sort();
    }
}

/// One hex's geometry, shared with provider calls for that hex
#[derive(Debug, Clone, PartialEq)]
pub struct HexContext {
    pub hex_id: HexId,
    pub ring: Vec<Coord>,
    pub bbox: BBox,
    pub triangles: Vec<(TriangleId, Vec<Coord>)>,
}

impl HexContext {
    /// Whether a coordinate lies inside the exact hex polygon
    #[must_use]
    pub fn contains(&self, c: &Coord) -> bool {
        self.bbox.contains(c) && point_in_ring(c, &self.ring)
    }

    /// Triangle of this hex containing the coordinate
    #[must_use]
    pub fn localize(&self, c: &Coord) -> Option<TriangleId> {
        self.triangles
            .iter()
            .find(|(_, ring)| point_in_ring(c, ring))
            .map(|(id, _)| *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_key_is_order_independent() {
        let scale = 1e6;
        let a = Coord::new(139.7000001, 35.65);
        let b = Coord::new(139.71, 35.66);
        assert_eq!(EdgeKey::new(&a, &b, scale), EdgeKey::new(&b, &a, scale));
        // sub-precision jitter collapses to the same key
        let a2 = Coord::new(139.70000012, 35.6500000004);
        assert_eq!(EdgeKey::new(&a, &b, scale), EdgeKey::new(&b, &a2, scale));
    }

    #[test]
    fn test_triangle_id_round_trips_through_string() {
        let id = TriangleId::new(HexId(12), 3);
        assert_eq!(id.to_string(), "12-3");
        assert_eq!("12-3".parse::<TriangleId>().unwrap(), id);
        assert!("12".parse::<TriangleId>().is_err());
    }

    #[test]
    fn test_degenerate_ring_is_skipped() {
        let good = BBox::new(0.0, 0.0, 1.0, 1.0).to_ring();
        let bad = vec![Coord::new(2.0, 2.0), Coord::new(3.0, 3.0), Coord::new(2.0, 2.0)];
        let mesh = GeoMesh::from_hex_rings(vec![bad, good], 6);
        assert_eq!(mesh.degenerate_hexes(), &[HexId(1)]);
        assert_eq!(mesh.hexes().len(), 1);
        assert_eq!(mesh.hexes()[0].id, HexId(2));
        assert_eq!(mesh.triangles().len(), 4);
    }

    #[test]
    fn test_adjacent_squares_link_across_shared_edge() {
        let left = BBox::new(0.0, 0.0, 1.0, 1.0).to_ring();
        let right = BBox::new(1.0, 0.0, 2.0, 1.0).to_ring();
        let mesh = GeoMesh::from_hex_rings(vec![left, right], 6);
        let linked: Vec<_> = mesh
            .triangles()
            .iter()
            .filter(|t| !t.cross_neighbors.is_empty())
            .collect();
        assert_eq!(linked.len(), 2);
        for t in linked {
            assert_eq!(t.cross_neighbors.len(), 1);
            assert_ne!(t.cross_neighbors[0].hex, t.id.hex);
        }
    }

    #[test]
    fn test_localize_picks_triangle_in_hex() {
        let mesh = GeoMesh::from_hex_rings(vec![BBox::new(0.0, 0.0, 2.0, 2.0).to_ring()], 6);
        let ctx = mesh.hex_context(HexId(1)).unwrap();
        // south edge triangle of the fan
        let south = ctx.localize(&Coord::new(1.0, 0.2)).unwrap();
        assert_eq!(south, TriangleId::new(HexId(1), 1));
        assert!(ctx.contains(&Coord::new(1.0, 0.2)));
        assert!(!ctx.contains(&Coord::new(3.0, 0.2)));
        assert!(ctx.localize(&Coord::new(3.0, 0.2)).is_none());
    }
}
