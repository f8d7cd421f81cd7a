//! Mesh construction over real-world boundaries

use std::collections::HashSet;

use kodegen_tools_hexcrawl::geo::{BBox, Boundary, Coord, DistanceUnit, GeoMesh, HexId, MeshSpec, Polygon};
use kodegen_tools_hexcrawl::{ConfigError, TriangleId};
use proptest::prelude::*;

mod common;

fn spec(cell_size: f64) -> MeshSpec {
    MeshSpec::default().with_cell_size(cell_size, DistanceUnit::Kilometers)
}

fn assert_mesh_invariants(mesh: &GeoMesh) {
    let hex_ids: Vec<HexId> = mesh.hexes().iter().map(|h| h.id).collect();
    let expected: Vec<HexId> = (1..=hex_ids.len() as u32).map(HexId).collect();
    assert_eq!(hex_ids, expected, "hex ids are numbered from 1 without gaps");

    assert_eq!(mesh.triangles().len(), mesh.hexes().len() * 6);
    let mut seen = HashSet::new();
    for hex in mesh.hexes() {
        assert_eq!(hex.triangle_ids.len(), 6);
        for (i, tri) in hex.triangle_ids.iter().enumerate() {
            assert_eq!(*tri, TriangleId::new(hex.id, i as u32 + 1));
            assert!(seen.insert(*tri), "duplicate triangle id {tri}");
        }
    }

    for tri in mesh.triangles() {
        assert_eq!(tri.parent_hex(), tri.id.hex);
        assert!(tri.cross_neighbors.len() <= 1, "a hex edge borders at most one other hex");
        for other in &tri.cross_neighbors {
            assert_ne!(other.hex, tri.id.hex);
            assert!(tri.neighbor_hex_ids.contains(&other.hex));
            let back = mesh.triangle(*other).expect("neighbor exists in mesh");
            assert!(back.cross_neighbors.contains(&tri.id), "adjacency is symmetric");
        }
    }
}

#[test]
fn test_tokyo_rectangle_mesh() {
    common::init_logging();
    let mesh = GeoMesh::build(&Boundary::Rectangle(common::tokyo_bbox()), &spec(0.5)).unwrap();
    assert!(mesh.hexes().len() > 4);
    assert_mesh_invariants(&mesh);
    assert!(
        mesh.triangles().iter().any(|t| !t.cross_neighbors.is_empty()),
        "interior hexes share edges"
    );
    assert_eq!(mesh.unit(), DistanceUnit::Kilometers);
    assert_eq!(mesh.cell_size(), 0.5);
}

#[test]
fn test_polygon_keeps_fewer_hexes_than_its_bbox() {
    let bbox = common::tokyo_bbox();
    let rect = GeoMesh::build(&Boundary::Rectangle(bbox), &spec(0.4)).unwrap();
    let triangle = Polygon::new(vec![
        Coord::new(bbox.west, bbox.south),
        Coord::new(bbox.east, bbox.south),
        Coord::new(bbox.west, bbox.north),
    ]);
    let tri_mesh = GeoMesh::build(&Boundary::Polygon(triangle), &spec(0.4)).unwrap();
    assert!(tri_mesh.hexes().len() < rect.hexes().len());
    assert_mesh_invariants(&tri_mesh);
}

#[test]
fn test_auto_cell_size() {
    let mesh = GeoMesh::build(&Boundary::Rectangle(common::tokyo_bbox()), &spec(0.0)).unwrap();
    assert!(mesh.cell_size() > 0.0);
    assert!(!mesh.hexes().is_empty());
    assert!(mesh.hexes().len() <= MeshSpec::default().max_cells);
}

#[test]
fn test_rejects_bad_input() {
    let tokyo = Boundary::Rectangle(common::tokyo_bbox());
    assert!(matches!(
        GeoMesh::build(&tokyo, &spec(-1.0)),
        Err(ConfigError::InvalidCellSize(_))
    ));
    assert!(matches!(
        GeoMesh::build(&tokyo, &spec(0.005)),
        Err(ConfigError::InvalidCellSize(_))
    ));
    let inverted = Boundary::Rectangle(BBox::new(139.77, 35.66, 139.74, 35.69));
    assert!(matches!(
        GeoMesh::build(&inverted, &spec(1.0)),
        Err(ConfigError::InvalidBoundary(_))
    ));
}

#[test]
fn test_mesh_geojson_properties() {
    let mesh = GeoMesh::build(&Boundary::Rectangle(common::tokyo_bbox()), &spec(0.5)).unwrap();
    let hexes = mesh.hex_features();
    let triangles = mesh.triangle_features();
    assert_eq!(hexes.len(), mesh.hexes().len());
    assert_eq!(triangles.len(), mesh.triangles().len());

    let first = &triangles.features[0].properties;
    assert_eq!(first["triangleId"], "1-1");
    assert_eq!(first["parentHexId"], 1);
    assert_eq!(first["triInHex"], 1);
    assert!(first["crossNeighbors"].is_array());
    assert_eq!(hexes.features[0].properties["triIds"].as_array().map(Vec::len), Some(6));
}

#[test]
fn test_hex_context_localizes_its_own_centroid_region() {
    let mesh = GeoMesh::build(&Boundary::Rectangle(common::tokyo_bbox()), &spec(0.5)).unwrap();
    let ctx = mesh.hex_context(HexId(1)).unwrap();
    let center = ctx.bbox.center();
    assert!(ctx.contains(&center));
    // nudge off the shared centroid vertex so exactly one fan triangle applies
    let point = Coord::new(center.lon, center.lat - (ctx.bbox.north - ctx.bbox.south) / 8.0);
    let tri = ctx.localize(&point).unwrap();
    assert_eq!(tri.hex, HexId(1));
    assert!(mesh.hex_context(HexId(100_000)).is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_mesh_invariants_hold(
        west in -170.0f64..170.0,
        south in -60.0f64..60.0,
        width in 0.02f64..0.08,
        height in 0.02f64..0.08,
        cell in 0.6f64..2.0,
    ) {
        let bbox = BBox::new(west, south, west + width, south + height);
        match GeoMesh::build(&Boundary::Rectangle(bbox), &spec(cell)) {
            Ok(mesh) => assert_mesh_invariants(&mesh),
            // a cell wider than a tiny box may leave nothing to keep
            Err(ConfigError::InvalidCellSize(_)) => {}
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }
}
