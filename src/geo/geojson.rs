//! Minimal GeoJSON model used for mesh output and visualizer layers

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::Coord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Coord },
    Polygon { coordinates: Vec<Vec<Coord>> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Value,
}

impl Feature {
    #[must_use]
    pub fn new(geometry: Geometry, properties: Value) -> Self {
        Self {
            geometry,
            properties,
        }
    }

    #[must_use]
    pub fn point(coord: Coord, properties: Value) -> Self {
        Self::new(Geometry::Point { coordinates: coord }, properties)
    }

    #[must_use]
    pub fn polygon(ring: Vec<Coord>, properties: Value) -> Self {
        Self::new(
            Geometry::Polygon {
                coordinates: vec![ring],
            },
            properties,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
