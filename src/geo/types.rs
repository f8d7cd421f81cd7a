//! Core geometry types: coordinates, bounding boxes, polygons and units
//!
//! Coordinates are `[lon, lat]` in degrees, matching GeoJSON axis order.
//! Rings are stored closed (first coordinate repeated at the end).

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

const EARTH_RADIUS_MILES: f64 = 3958.8;
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance unit for cell sizes and haversine calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Miles,
    Meters,
    #[default]
    Kilometers,
}

impl DistanceUnit {
    #[must_use]
    pub fn earth_radius(self) -> f64 {
        match self {
            Self::Miles => EARTH_RADIUS_MILES,
            Self::Meters => EARTH_RADIUS_METERS,
            Self::Kilometers => EARTH_RADIUS_KM,
        }
    }

    /// Convert a distance in this unit to kilometers
    #[must_use]
    pub fn to_km(self, value: f64) -> f64 {
        value * EARTH_RADIUS_KM / self.earth_radius()
    }

    /// Convert a distance in kilometers to this unit
    #[must_use]
    pub fn from_km(self, km: f64) -> f64 {
        km * self.earth_radius() / EARTH_RADIUS_KM
    }
}

/// A `[lon, lat]` position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

impl From<[f64; 2]> for Coord {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lon, lat }
    }
}

impl From<Coord> for [f64; 2] {
    fn from(c: Coord) -> Self {
        [c.lon, c.lat]
    }
}

/// Axis-aligned bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Smallest box containing every coordinate, `None` for an empty input
    #[must_use]
    pub fn from_coords<'a>(coords: impl IntoIterator<Item = &'a Coord>) -> Option<Self> {
        let mut iter = coords.into_iter();
        let first = iter.next()?;
        let mut bbox = Self::new(first.lon, first.lat, first.lon, first.lat);
        for c in iter {
            bbox.west = bbox.west.min(c.lon);
            bbox.south = bbox.south.min(c.lat);
            bbox.east = bbox.east.max(c.lon);
            bbox.north = bbox.north.max(c.lat);
        }
        Some(bbox)
    }

    #[must_use]
    pub fn center(&self) -> Coord {
        Coord::new((self.west + self.east) / 2.0, (self.south + self.north) / 2.0)
    }

    #[must_use]
    pub fn contains(&self, c: &Coord) -> bool {
        c.lon >= self.west && c.lon <= self.east && c.lat >= self.south && c.lat <= self.north
    }

    /// Grow the box outward by `distance` on every side
    #[must_use]
    pub fn buffered(&self, distance: f64, unit: DistanceUnit) -> Self {
        let km = unit.to_km(distance);
        let dlat = km / super::measure::KM_PER_DEGREE;
        let cos_lat = self.center().lat.to_radians().cos().abs().max(1e-6);
        let dlon = km / (super::measure::KM_PER_DEGREE * cos_lat);
        Self::new(
            (self.west - dlon).max(-180.0),
            (self.south - dlat).max(-90.0),
            (self.east + dlon).min(180.0),
            (self.north + dlat).min(90.0),
        )
    }

    /// Closed rectangular ring, counter-clockwise from the south-west corner
    #[must_use]
    pub fn to_ring(&self) -> Vec<Coord> {
        vec![
            Coord::new(self.west, self.south),
            Coord::new(self.east, self.south),
            Coord::new(self.east, self.north),
            Coord::new(self.west, self.north),
            Coord::new(self.west, self.south),
        ]
    }

    /// Reject inverted, empty or out-of-range boxes
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [self.west, self.south, self.east, self.north];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidBoundary(
                "bounding box contains non-finite values".to_string(),
            ));
        }
        if self.west >= self.east || self.south >= self.north {
            return Err(ConfigError::InvalidBoundary(format!(
                "bounding box min must be less than max: {:?}",
                self.to_array()
            )));
        }
        if self.west < -180.0 || self.east > 180.0 || self.south < -90.0 || self.north > 90.0 {
            return Err(ConfigError::InvalidBoundary(format!(
                "bounding box outside lon/lat range: {:?}",
                self.to_array()
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

impl From<[f64; 4]> for BBox {
    fn from([west, south, east, north]: [f64; 4]) -> Self {
        Self::new(west, south, east, north)
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        b.to_array()
    }
}

/// Polygon with a closed exterior ring and optional holes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<Coord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<Vec<Coord>>,
}

impl Polygon {
    /// Build a polygon, closing the ring if the caller left it open
    #[must_use]
    pub fn new(mut exterior: Vec<Coord>) -> Self {
        close_ring(&mut exterior);
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_holes(mut self, holes: Vec<Vec<Coord>>) -> Self {
        self.holes = holes
            .into_iter()
            .map(|mut h| {
                close_ring(&mut h);
                h
            })
            .collect();
        self
    }

    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_coords(&self.exterior)
    }

    /// GeoJSON-style ring list: exterior first, then holes
    #[must_use]
    pub fn rings(&self) -> Vec<Vec<Coord>> {
        std::iter::once(self.exterior.clone())
            .chain(self.holes.iter().cloned())
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exterior.len() < 4 {
            return Err(ConfigError::InvalidBoundary(format!(
                "polygon ring needs at least 4 coordinates, got {}",
                self.exterior.len()
            )));
        }
        if self.exterior.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::InvalidBoundary(
                "polygon contains non-finite coordinates".to_string(),
            ));
        }
        Ok(())
    }
}

/// Region selected by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    Rectangle(BBox),
    Polygon(Polygon),
}

impl Boundary {
    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            Self::Rectangle(b) => Some(*b),
            Self::Polygon(p) => p.bbox(),
        }
    }

    #[must_use]
    pub fn to_polygon(&self) -> Polygon {
        match self {
            Self::Rectangle(b) => Polygon::new(b.to_ring()),
            Self::Polygon(p) => p.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Rectangle(b) => b.validate(),
            Self::Polygon(p) => {
                p.validate()?;
                p.bbox()
                    .ok_or_else(|| ConfigError::InvalidBoundary("empty polygon".to_string()))?
                    .validate()
            }
        }
    }
}

fn close_ring(ring: &mut Vec<Coord>) {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
}
