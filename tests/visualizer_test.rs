//! Visualizer registry ordering and option checking

use std::collections::BTreeMap;
use std::sync::Arc;

use kodegen_tools_hexcrawl::geo::{BBox, Coord, FeatureCollection, GeoMesh};
use kodegen_tools_hexcrawl::provider::{ContinuationState, CrawledItem, ProviderResult};
use kodegen_tools_hexcrawl::session::{CrawlResults, CrawlTarget, SessionId, SessionState};
use kodegen_tools_hexcrawl::visualizer::{Layers, render_all};
use kodegen_tools_hexcrawl::{
    OptionKind, OptionSpec, Plugin, RegistryError, Visualizer, VisualizerRegistry, parse_category_spec,
};
use serde_json::{Value, json};

/// Emits every item as a point layer per category
struct Points;

impl Plugin for Points {
    fn id(&self) -> &str {
        "points"
    }

    fn option_schema(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::new("skip_empty", OptionKind::Boolean, json!(false), "Drop empty layers")]
    }
}

impl Visualizer for Points {
    fn render(&self, results: &CrawlResults, _target: &CrawlTarget, options: &Value) -> anyhow::Result<Layers> {
        let skip_empty = options.get("skip_empty").and_then(Value::as_bool).unwrap_or(false);
        let mut layers = results.to_feature_collections();
        if skip_empty {
            layers.retain(|_, layer| !layer.is_empty());
        }
        Ok(layers)
    }
}

/// One hex outline layer; must run after `points`
struct Outline {
    fail: bool,
}

impl Plugin for Outline {
    fn id(&self) -> &str {
        "outline"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["points".to_string()]
    }
}

impl Visualizer for Outline {
    fn render(&self, _results: &CrawlResults, target: &CrawlTarget, _options: &Value) -> anyhow::Result<Layers> {
        if self.fail {
            anyhow::bail!("no canvas");
        }
        let mut layers = BTreeMap::new();
        layers.insert("hexes".to_string(), target.mesh().hex_features());
        Ok(layers)
    }
}

fn finished_results() -> CrawlResults {
    let mesh = GeoMesh::from_hex_rings(vec![BBox::new(0.0, 0.0, 1.0, 1.0).to_ring()], 6);
    let categories = parse_category_spec("food=cafe|park=garden").unwrap();
    let mut session = SessionState::new(SessionId::new());
    session.set_target(Arc::new(CrawlTarget::new(mesh, categories)));
    let tasks = session.begin_crawl("synthetic", &ContinuationState::root()).unwrap();
    for task in &tasks {
        session.mark_dispatched();
        session.mark_completed();
        let item = CrawledItem {
            id: format!("{}-{}", task.hex_id, task.category),
            coord: Coord::new(0.5, 0.2),
            triangle: None,
            timestamp: None,
            properties: json!({}),
        };
        let items = if task.category == "food" { vec![item] } else { Vec::new() };
        let _ = session.apply(task, ProviderResult::complete(items, 0));
    }
    session.results().unwrap()
}

fn registry(fail: bool) -> VisualizerRegistry {
    let outline: Arc<dyn Visualizer> = Arc::new(Outline { fail });
    let points: Arc<dyn Visualizer> = Arc::new(Points);
    VisualizerRegistry::builder().register(outline).register(points).build().unwrap()
}

#[test]
fn test_render_all_in_dependency_order() {
    let registry = registry(false);
    assert_eq!(registry.load_order(), &["points", "outline"]);

    let mut options = BTreeMap::new();
    options.insert("points".to_string(), json!({ "skip_empty": true }));
    let rendered = render_all(&registry, &finished_results(), &options).unwrap();

    let points = &rendered["points"];
    assert_eq!(points.keys().collect::<Vec<_>>(), vec!["food"]);
    assert_eq!(points["food"].len(), 1);
    let hexes: &FeatureCollection = &rendered["outline"]["hexes"];
    assert_eq!(hexes.len(), 1);
}

#[test]
fn test_render_all_checks_options_first() {
    let registry = registry(false);
    let mut options = BTreeMap::new();
    options.insert("points".to_string(), json!({ "skip_empty": "yes" }));
    let err = render_all(&registry, &finished_results(), &options).unwrap_err();
    assert!(err.to_string().contains("invalid options for visualizer 'points'"));
}

#[test]
fn test_render_failure_names_visualizer() {
    let err = render_all(&registry(true), &finished_results(), &BTreeMap::new()).unwrap_err();
    assert!(err.to_string().contains("visualizer 'outline' failed"));
    assert!(format!("{err:#}").contains("no canvas"));
}

#[test]
fn test_missing_dependency_is_rejected() {
    let outline: Arc<dyn Visualizer> = Arc::new(Outline { fail: false });
    match VisualizerRegistry::builder().register(outline).build() {
        Err(RegistryError::MissingDependency { plugin, dependency }) => {
            assert_eq!(plugin, "outline");
            assert_eq!(dependency, "points");
        }
        Err(other) => panic!("expected missing dependency, got {other}"),
        Ok(_) => panic!("registry built without its dependency"),
    }
}
