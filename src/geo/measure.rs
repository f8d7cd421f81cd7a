//! Spherical measurements: haversine distance, ring centroid and area

use std::f64::consts::PI;

use super::types::{BBox, Coord, DistanceUnit};

/// Approximate kilometers per degree of latitude
pub const KM_PER_DEGREE: f64 = 111.32;

/// Haversine distance between two positions in the specified unit.
#[must_use]
pub fn haversine_distance(a: &Coord, b: &Coord, unit: DistanceUnit) -> f64 {
    let to_rad = |deg: f64| deg * PI / 180.0;

    let dlat = to_rad(b.lat - a.lat);
    let dlng = to_rad(b.lon - a.lon);

    let h = (dlat / 2.0).sin().powi(2)
        + to_rad(a.lat).cos() * to_rad(b.lat).cos() * (dlng / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().asin();
    unit.earth_radius() * c
}

/// Vertex-mean centroid of a closed ring (closing coordinate excluded)
#[must_use]
pub fn ring_centroid(ring: &[Coord]) -> Option<Coord> {
    let open = open_ring(ring);
    if open.is_empty() {
        return None;
    }
    let n = open.len() as f64;
    let (lon, lat) = open
        .iter()
        .fold((0.0, 0.0), |(lon, lat), c| (lon + c.lon, lat + c.lat));
    Some(Coord::new(lon / n, lat / n))
}

/// Ground area of a bounding box in square kilometers
#[must_use]
pub fn bbox_area_km2(bbox: &BBox) -> f64 {
    let center = bbox.center();
    let width = haversine_distance(
        &Coord::new(bbox.west, center.lat),
        &Coord::new(bbox.east, center.lat),
        DistanceUnit::Kilometers,
    );
    let height = haversine_distance(
        &Coord::new(center.lon, bbox.south),
        &Coord::new(center.lon, bbox.north),
        DistanceUnit::Kilometers,
    );
    width * height
}

/// Ring without its closing coordinate
#[must_use]
pub fn open_ring(ring: &[Coord]) -> &[Coord] {
    match ring {
        [first, .., last] if first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokyo_to_yokohama() {
        let tokyo = Coord::new(139.7671, 35.6812);
        let yokohama = Coord::new(139.6380, 35.4437);
        let d = haversine_distance(&tokyo, &yokohama, DistanceUnit::Kilometers);
        assert!((d - 28.7).abs() < 1.5, "Expected ~28.7km, got {d}");
    }

    #[test]
    fn test_unit_consistency() {
        let a = Coord::new(-93.27, 44.96);
        let b = Coord::new(-93.09, 44.94);
        let miles = haversine_distance(&a, &b, DistanceUnit::Miles);
        let km = haversine_distance(&a, &b, DistanceUnit::Kilometers);
        assert!((km / miles - 1.609).abs() < 0.01);
        assert!((DistanceUnit::Miles.to_km(1.0) - 1.609).abs() < 0.01);
    }

    #[test]
    fn test_centroid_ignores_closing_vertex() {
        let ring = BBox::new(0.0, 0.0, 2.0, 2.0).to_ring();
        let c = ring_centroid(&ring).unwrap();
        assert_eq!(c, Coord::new(1.0, 1.0));
        assert!(ring_centroid(&[]).is_none());
    }
}
