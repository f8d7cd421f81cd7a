//! Concrete provider adapters
//!
//! [`FlickrProvider`] pages through time-sorted photo search with window
//! bisection. [`GmapProvider`] follows Places page tokens, one lineage per
//! query term. [`OverpassProvider`] answers each task with one OpenStreetMap
//! query. [`default_registry`] wires them from raw option bags.

pub mod common;
pub mod flickr;
pub mod gmap;
pub mod overpass;

use std::sync::Arc;

use serde_json::Value;

pub use common::DateBound;
pub use flickr::{DateMode, FLICKR_PROVIDER_ID, FlickrOptions, FlickrProvider};
pub use gmap::{GMAP_PROVIDER_ID, GmapOptions, GmapProvider};
pub use overpass::{OVERPASS_PROVIDER_ID, OsmType, OverpassOptions, OverpassProvider, TagOp, TagQuery, build_query};

use crate::crawl_engine::CrawlError;
use crate::provider::{Provider, ProviderRegistry};

/// Registry with the built-in adapters
///
/// Flickr and Places are registered only when their options are given,
/// since both need an API key.
pub fn default_registry(
    flickr: Option<&Value>,
    gmap: Option<&Value>,
    overpass: &Value,
) -> Result<ProviderRegistry, CrawlError> {
    let mut builder = ProviderRegistry::builder();
    if let Some(raw) = flickr {
        let provider: Arc<dyn Provider> = Arc::new(FlickrProvider::from_value(raw)?);
        builder = builder.register(provider);
    }
    if let Some(raw) = gmap {
        let provider: Arc<dyn Provider> = Arc::new(GmapProvider::from_value(raw)?);
        builder = builder.register(provider);
    }
    let provider: Arc<dyn Provider> = Arc::new(OverpassProvider::from_value(overpass)?);
    Ok(builder.register(provider).build()?)
}
