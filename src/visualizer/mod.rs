//! Visualizer contract
//!
//! Visualizers turn a finished session's results into GeoJSON layers keyed
//! by category. Rendering itself lives outside this crate; this module fixes
//! the interface and runs registered renderers in dependency order.

use std::collections::BTreeMap;

use anyhow::Context;
use serde_json::Value;

use crate::geo::FeatureCollection;
use crate::plugin::{Plugin, PluginRegistry};
use crate::session::{CrawlResults, CrawlTarget};

/// Category name to layer
pub type Layers = BTreeMap<String, FeatureCollection>;

pub trait Visualizer: Plugin {
    fn render(&self, results: &CrawlResults, target: &CrawlTarget, options: &Value) -> anyhow::Result<Layers>;
}

pub type VisualizerRegistry = PluginRegistry<dyn Visualizer>;

/// Render every registered visualizer in load order
///
/// `options` maps visualizer id to its option bag; missing entries render
/// with `null` options. Options are checked against each schema first.
pub fn render_all(
    registry: &VisualizerRegistry,
    results: &CrawlResults,
    options: &BTreeMap<String, Value>,
) -> anyhow::Result<BTreeMap<String, Layers>> {
    let mut out = BTreeMap::new();
    for id in registry.load_order() {
        let visualizer = registry.require(id)?;
        let opts = options.get(id).unwrap_or(&Value::Null);
        visualizer
            .check_options(opts)
            .with_context(|| format!("invalid options for visualizer '{id}'"))?;
        let layers = visualizer
            .render(results, &results.target, opts)
            .with_context(|| format!("visualizer '{id}' failed"))?;
        log::debug!("Visualizer '{id}' produced {} layers", layers.len());
        out.insert(id.clone(), layers);
    }
    Ok(out)
}
