//! Planar predicates on lon/lat rings
//!
//! Points on a ring's boundary count as inside, so an item sitting exactly
//! on a shared triangle edge still localizes to one of its triangles.

use super::measure::open_ring;
use super::types::{Coord, Polygon};

const EPSILON: f64 = 1e-12;

/// Point-in-ring test (ray casting, boundary inclusive)
#[must_use]
pub fn point_in_ring(p: &Coord, ring: &[Coord]) -> bool {
    let pts = open_ring(ring);
    let n = pts.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&pts[i], &pts[j]);
        if on_segment(p, a, b) {
            return true;
        }
        if (a.lat > p.lat) != (b.lat > p.lat) {
            let x = (b.lon - a.lon) * (p.lat - a.lat) / (b.lat - a.lat) + a.lon;
            if p.lon < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Point-in-polygon respecting holes
#[must_use]
pub fn point_in_polygon(p: &Coord, polygon: &Polygon) -> bool {
    point_in_ring(p, &polygon.exterior)
        && !polygon
            .holes
            .iter()
            .any(|h| point_in_ring(p, h) && !on_ring_boundary(p, h))
}

/// True when a ring overlaps the polygon anywhere (touching counts)
#[must_use]
pub fn ring_intersects_polygon(ring: &[Coord], polygon: &Polygon) -> bool {
    let outer = &polygon.exterior;
    if open_ring(ring).iter().any(|c| point_in_polygon(c, polygon)) {
        return true;
    }
    if open_ring(outer).iter().any(|c| point_in_ring(c, ring)) {
        return true;
    }
    edges(ring).any(|(a, b)| edges(outer).any(|(c, d)| segments_intersect(a, b, c, d)))
}

fn on_ring_boundary(p: &Coord, ring: &[Coord]) -> bool {
    edges(ring).any(|(a, b)| on_segment(p, a, b))
}

fn edges(ring: &[Coord]) -> impl Iterator<Item = (&Coord, &Coord)> {
    ring.windows(2).map(|w| (&w[0], &w[1]))
}

fn cross(o: &Coord, a: &Coord, b: &Coord) -> f64 {
    (a.lon - o.lon) * (b.lat - o.lat) - (a.lat - o.lat) * (b.lon - o.lon)
}

fn on_segment(p: &Coord, a: &Coord, b: &Coord) -> bool {
    cross(a, b, p).abs() <= EPSILON
        && p.lon >= a.lon.min(b.lon) - EPSILON
        && p.lon <= a.lon.max(b.lon) + EPSILON
        && p.lat >= a.lat.min(b.lat) - EPSILON
        && p.lat <= a.lat.max(b.lat) + EPSILON
}

/// Segment intersection including collinear overlap and shared endpoints
#[must_use]
pub fn segments_intersect(a: &Coord, b: &Coord, c: &Coord, d: &Coord) -> bool {
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    if ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
    {
        return true;
    }
    on_segment(a, c, d) || on_segment(b, c, d) || on_segment(c, a, b) || on_segment(d, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::types::BBox;

    fn square() -> Polygon {
        Polygon::new(BBox::new(0.0, 0.0, 10.0, 10.0).to_ring())
    }

    #[test]
    fn test_point_in_ring() {
        let sq = square();
        assert!(point_in_ring(&Coord::new(5.0, 5.0), &sq.exterior));
        assert!(!point_in_ring(&Coord::new(15.0, 5.0), &sq.exterior));
        // edges and corners are inside
        assert!(point_in_ring(&Coord::new(0.0, 5.0), &sq.exterior));
        assert!(point_in_ring(&Coord::new(10.0, 10.0), &sq.exterior));
    }

    #[test]
    fn test_holes_exclude_points() {
        let poly = square().with_holes(vec![BBox::new(4.0, 4.0, 6.0, 6.0).to_ring()]);
        assert!(!point_in_polygon(&Coord::new(5.0, 5.0), &poly));
        assert!(point_in_polygon(&Coord::new(1.0, 1.0), &poly));
    }

    #[test]
    fn test_ring_intersection() {
        let sq = square();
        let overlapping = BBox::new(8.0, 8.0, 12.0, 12.0).to_ring();
        let disjoint = BBox::new(20.0, 20.0, 22.0, 22.0).to_ring();
        let enclosing = BBox::new(-5.0, -5.0, 15.0, 15.0).to_ring();
        let crossing = BBox::new(-1.0, 4.0, 11.0, 6.0).to_ring();
        assert!(ring_intersects_polygon(&overlapping, &sq));
        assert!(!ring_intersects_polygon(&disjoint, &sq));
        assert!(ring_intersects_polygon(&enclosing, &sq));
        assert!(ring_intersects_polygon(&crossing, &sq));
    }
}
