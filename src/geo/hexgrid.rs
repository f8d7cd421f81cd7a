//! Flat-topped hexagon tessellation of a bounding box
//!
//! Cell geometry is computed in degrees after converting the requested cell
//! side to a fraction of the box's ground width and height, so hexes are
//! regular on the ground rather than in lon/lat space. Odd columns are offset
//! half a row down.

use super::measure::{bbox_area_km2, haversine_distance};
use super::types::{BBox, Coord, DistanceUnit};

/// Tessellate `bbox` into closed hexagon rings with the given cell side
///
/// Only hexes fully inside `bbox` are produced; callers that want edge
/// coverage should buffer the box first.
#[must_use]
pub fn hex_grid(bbox: &BBox, cell_side: f64, unit: DistanceUnit) -> Vec<Vec<Coord>> {
    if cell_side.is_nan() || cell_side <= 0.0 {
        return Vec::new();
    }
    let center = bbox.center();

    let ground_width = haversine_distance(
        &Coord::new(bbox.west, center.lat),
        &Coord::new(bbox.east, center.lat),
        unit,
    );
    let ground_height = haversine_distance(
        &Coord::new(center.lon, bbox.south),
        &Coord::new(center.lon, bbox.north),
        unit,
    );
    if ground_width <= 0.0 || ground_height <= 0.0 {
        return Vec::new();
    }

    let box_width = bbox.east - bbox.west;
    let box_height = bbox.north - bbox.south;
    let cell_width = (cell_side * 2.0 / ground_width) * box_width;
    let cell_height = (cell_side * 2.0 / ground_height) * box_height;

    let radius = cell_width / 2.0;
    let hex_width = radius * 2.0;
    let hex_height = 3f64.sqrt() / 2.0 * cell_height;

    let x_interval = 0.75 * hex_width;
    let y_interval = hex_height;

    let x_count = ((box_width - hex_width) / (hex_width - radius / 2.0)).floor() as i64;
    let x_adjust =
        (x_count as f64 * x_interval - radius / 2.0 - box_width) / 2.0 - radius / 2.0 + x_interval / 2.0;

    let y_count = ((box_height - hex_height) / hex_height).floor() as i64;
    let mut y_adjust = (box_height - y_count as f64 * hex_height) / 2.0;
    let has_offset_y = y_count as f64 * hex_height - box_height > hex_height / 2.0;
    if has_offset_y {
        y_adjust -= hex_height / 4.0;
    }

    let angles: Vec<(f64, f64)> = (0..6)
        .map(|i| {
            let a = std::f64::consts::PI / 3.0 * f64::from(i);
            (a.cos(), a.sin())
        })
        .collect();

    let mut cells = Vec::new();
    for x in 0..=x_count {
        for y in 0..=y_count {
            let is_odd = x % 2 == 1;
            if y == 0 && (is_odd || has_offset_y) {
                continue;
            }
            let cx = x as f64 * x_interval + bbox.west - x_adjust;
            let mut cy = y as f64 * y_interval + bbox.south + y_adjust;
            if is_odd {
                cy -= hex_height / 2.0;
            }
            let mut ring: Vec<Coord> = angles
                .iter()
                .map(|(cos, sin)| Coord::new(cx + cell_width / 2.0 * cos, cy + cell_height / 2.0 * sin))
                .collect();
            ring.push(ring[0]);
            cells.push(ring);
        }
    }
    cells
}

/// Derive a cell side that yields roughly `target_cells` hexes over `bbox`
///
/// A hexagon with side `r` covers `3√3/2 · r²`; the result is floored at
/// `min_km` and returned in `unit`.
#[must_use]
pub fn auto_cell_size(bbox: &BBox, target_cells: usize, min_km: f64, unit: DistanceUnit) -> f64 {
    let area = bbox_area_km2(bbox);
    let per_cell = area / target_cells.max(1) as f64;
    let side_km = (per_cell / (3.0 * 3f64.sqrt() / 2.0)).sqrt();
    unit.from_km(side_km.max(min_km))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_rings_are_closed_hexagons() {
        let bbox = BBox::new(139.70, 35.65, 139.80, 35.75);
        let cells = hex_grid(&bbox, 1.0, DistanceUnit::Kilometers);
        assert!(!cells.is_empty());
        for ring in &cells {
            assert_eq!(ring.len(), 7);
            assert_eq!(ring.first(), ring.last());
        }
    }

    #[test]
    fn test_nonpositive_size_yields_nothing() {
        let bbox = BBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(hex_grid(&bbox, 0.0, DistanceUnit::Kilometers).is_empty());
        assert!(hex_grid(&bbox, -1.0, DistanceUnit::Kilometers).is_empty());
    }

    #[test]
    fn test_auto_size_tracks_target_count() {
        let bbox = BBox::new(139.70, 35.65, 139.80, 35.75);
        let coarse = auto_cell_size(&bbox, 10, 0.05, DistanceUnit::Kilometers);
        let fine = auto_cell_size(&bbox, 1000, 0.05, DistanceUnit::Kilometers);
        assert!(coarse > fine);
        let floored = auto_cell_size(&bbox, 10_000_000, 0.05, DistanceUnit::Kilometers);
        assert!((floored - 0.05).abs() < 1e-9);
    }
}
