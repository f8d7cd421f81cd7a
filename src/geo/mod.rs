//! Spatial mesh: hex tessellation, centroid-fan triangles and adjacency
//!
//! Geometry is computed on lon/lat degrees with spherical ground distances;
//! no projection library is involved.

pub mod geojson;
pub mod hexgrid;
pub mod measure;
pub mod mesh;
pub mod predicates;
pub mod types;

pub use geojson::{Feature, FeatureCollection, Geometry};
pub use mesh::{GeoMesh, HexCell, HexContext, HexId, MeshSpec, TriangleCell, TriangleId};
pub use types::{BBox, Boundary, Coord, DistanceUnit, Polygon};
