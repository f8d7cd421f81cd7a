//! Session bookkeeping: lineages, dedup, completion detection

use std::sync::Arc;

use kodegen_tools_hexcrawl::crawl_engine::{CrawlError, CrawlTask};
use kodegen_tools_hexcrawl::geo::{BBox, Coord, GeoMesh, HexId, TriangleId};
use kodegen_tools_hexcrawl::provider::{
    ContinuationState, CrawledItem, ProviderError, ProviderResult, TermId, TimeWindow,
};
use kodegen_tools_hexcrawl::session::{CrawlTarget, SessionId, SessionState};
use kodegen_tools_hexcrawl::parse_category_spec;
use serde_json::json;

mod common;

/// Two unit squares side by side, two categories
fn target() -> Arc<CrawlTarget> {
    let rings = vec![
        BBox::new(0.0, 0.0, 1.0, 1.0).to_ring(),
        BBox::new(1.0, 0.0, 2.0, 1.0).to_ring(),
    ];
    let mesh = GeoMesh::from_hex_rings(rings, 6);
    let categories = parse_category_spec("food=cafe,bakery|park=garden").unwrap();
    Arc::new(CrawlTarget::new(mesh, categories))
}

fn root() -> ContinuationState {
    ContinuationState::windowed(TermId::root(), TimeWindow::new(0, 1_000))
}

fn item(id: &str) -> CrawledItem {
    CrawledItem {
        id: id.to_string(),
        coord: Coord::new(0.5, 0.2),
        triangle: Some(TriangleId::new(HexId(1), 1)),
        timestamp: Some(500),
        properties: json!({ "title": id }),
    }
}

fn started() -> (SessionState, Vec<CrawlTask>) {
    let mut session = SessionState::new(SessionId::new());
    session.set_target(target());
    let tasks = session.begin_crawl("synthetic", &root()).unwrap();
    for _ in &tasks {
        session.mark_dispatched();
    }
    (session, tasks)
}

fn complete(session: &mut SessionState, task: &CrawlTask, result: ProviderResult) -> bool {
    session.mark_completed();
    session.apply(task, result).category_finished
}

#[test]
fn test_begin_crawl_creates_one_task_per_pair() {
    common::init_logging();
    let mut session = SessionState::new(SessionId::new());
    assert!(matches!(
        session.begin_crawl("synthetic", &root()),
        Err(CrawlError::NoTarget(_))
    ));

    session.set_target(target());
    let tasks = session.begin_crawl("synthetic", &root()).unwrap();
    assert_eq!(tasks.len(), 4);
    assert!(tasks.iter().all(|t| t.state == root() && t.epoch == session.epoch()));
    let pairs: Vec<(u32, &str)> = tasks.iter().map(|t| (t.hex_id.0, t.category.as_str())).collect();
    assert_eq!(pairs, vec![(1, "food"), (1, "park"), (2, "food"), (2, "park")]);

    assert_eq!(session.provider_id(), Some("synthetic"));
    assert_eq!(session.in_flight(), 0);
    assert!(!session.is_complete());
    let progress = session.progress();
    assert_eq!(progress.total_pairs, 4);
    assert_eq!(progress.final_pairs, 0);
}

#[test]
fn test_applying_same_result_twice_is_idempotent() {
    let (mut session, tasks) = started();
    let task = &tasks[0];
    let result = ProviderResult::partial(
        vec![item("p1"), item("p2")],
        0,
        40,
        vec![ContinuationState::windowed(TermId::root(), TimeWindow::new(0, 400))],
    );

    session.mark_completed();
    let first = session.apply(task, result.clone());
    assert_eq!((first.added, first.duplicates), (2, 0));
    let second = session.apply(task, result);
    assert_eq!((second.added, second.duplicates), (0, 2));
    assert_eq!(session.total_items(), 2);

    let hex = session.hex_progress(task.hex_id).unwrap();
    assert_eq!(hex.categories["food"].crawled, 2);
    assert_eq!(hex.categories["food"].remaining, 40);
}

#[test]
fn test_item_shared_across_lineages_is_counted_once() {
    let (mut session, tasks) = started();
    let task = &tasks[0];
    let split = ProviderResult::partial(
        vec![item("shared"), item("a-only")],
        0,
        900,
        vec![
            ContinuationState::windowed(TermId::new("aa"), TimeWindow::new(500, 1_000)),
            ContinuationState::windowed(TermId::new("ab"), TimeWindow::new(0, 500)),
        ],
    );
    session.mark_completed();
    let outcome = session.apply(task, split);
    assert_eq!(outcome.follow_ups.len(), 2);
    for follow_up in &outcome.follow_ups {
        session.mark_dispatched();
        let result = ProviderResult::complete(vec![item("shared"), item(follow_up.state.term_id.as_str())], 0);
        complete(&mut session, follow_up, result);
    }
    assert_eq!(session.results().unwrap().cells[&HexId(1)]["food"].items.len(), 4);
    assert_eq!(session.total_items(), 4);
}

#[test]
fn test_split_closes_parent_and_finishes_pair_once() {
    let (mut session, tasks) = started();
    let task = &tasks[0];
    let upper = ContinuationState::windowed(TermId::new("aa"), TimeWindow::new(500, 1_000));
    let lower = ContinuationState::windowed(TermId::new("ab"), TimeWindow::new(0, 500));

    session.mark_completed();
    let outcome = session.apply(
        task,
        ProviderResult::partial(vec![item("x")], 0, 1_200, vec![upper.clone(), lower.clone()]),
    );
    assert_eq!(outcome.split_children, vec![TermId::new("aa"), TermId::new("ab")]);
    assert!(!outcome.category_finished);
    assert!(outcome.follow_ups.iter().all(|t| t.hex_id == task.hex_id && t.category == task.category));

    let children = outcome.follow_ups;
    session.mark_dispatched();
    session.mark_dispatched();

    // first child closes the parent lineage but its sibling is still open
    assert!(!complete(&mut session, &children[0], ProviderResult::complete(vec![item("y")], 0)));
    let food = &session.hex_progress(task.hex_id).unwrap().categories["food"];
    assert!(!food.is_final);
    assert_eq!(food.remaining, 0);

    assert!(complete(&mut session, &children[1], ProviderResult::complete(Vec::new(), 0)));
    // a late duplicate does not finish it again
    assert!(!session.apply(&children[1], ProviderResult::complete(Vec::new(), 0)).category_finished);
}

#[test]
fn test_session_completes_only_when_nothing_in_flight() {
    let (mut session, tasks) = started();
    let (last, rest) = tasks.split_last().unwrap();
    for task in rest {
        complete(&mut session, task, ProviderResult::complete(vec![item(&format!("{}-{}", task.hex_id, task.category))], 0));
        assert!(!session.is_complete());
    }

    // every pair final, but a duplicate dispatch is still outstanding
    session.mark_dispatched();
    complete(&mut session, last, ProviderResult::complete(Vec::new(), 0));
    assert_eq!(session.progress().final_pairs, 4);
    assert_eq!(session.in_flight(), 1);
    assert!(!session.is_complete());
    assert!(!session.try_finish());

    complete(&mut session, last, ProviderResult::complete(Vec::new(), 0));
    assert!(session.is_complete());
    assert!(session.try_finish());
    assert!(!session.try_finish(), "finish is reported once");
    assert!(session.progress().complete);
}

#[test]
fn test_final_result_with_remaining_is_clamped() {
    let (mut session, tasks) = started();
    let result = ProviderResult {
        items: vec![item("z")],
        outside_count: 3,
        remaining: 50,
        is_final: true,
        next_states: Vec::new(),
        error: None,
    };
    assert!(complete(&mut session, &tasks[0], result));
    let food = session.hex_progress(HexId(1)).unwrap().categories["food"].clone();
    assert!(food.is_final);
    assert_eq!(food.remaining, 0);
    assert_eq!(food.percent, 1.0);

    // non-final flag with nothing to follow up is treated as final
    let dangling = ProviderResult {
        items: Vec::new(),
        outside_count: 0,
        remaining: 7,
        is_final: false,
        next_states: Vec::new(),
        error: None,
    };
    assert!(complete(&mut session, &tasks[1], dangling));
    assert_eq!(session.results().unwrap().cells[&HexId(1)]["food"].outside_count, 3);
}

#[test]
fn test_failed_result_closes_lineage_and_keeps_error() {
    let (mut session, tasks) = started();
    let err = ProviderError::fatal("quota exceeded", Some("HTTP_403".into()));
    assert!(complete(&mut session, &tasks[3], ProviderResult::failed(&err)));
    let results = session.results().unwrap();
    let park = &results.cells[&HexId(2)]["park"];
    assert_eq!(park.errors.len(), 1);
    assert_eq!(park.errors[0].code.as_deref(), Some("HTTP_403"));
    assert!(park.progress.is_final);
}

#[test]
fn test_retarget_and_restart_bump_epoch() {
    let (mut session, tasks) = started();
    let epoch = session.epoch();
    complete(&mut session, &tasks[0], ProviderResult::complete(vec![item("a")], 0));

    let restarted = session.begin_crawl("synthetic", &root()).unwrap();
    assert!(session.epoch() > epoch);
    assert_eq!(session.total_items(), 0);
    assert_eq!(session.in_flight(), 0);
    assert!(restarted.iter().all(|t| t.epoch == session.epoch()));

    let before = session.epoch();
    session.set_target(target());
    assert!(session.epoch() > before);
    assert!(session.provider_id().is_none());
    assert!(session.progress().hexes.is_empty());
}

#[test]
fn test_results_export_layers_and_triangle_stats() {
    let (mut session, tasks) = started();
    complete(&mut session, &tasks[0], ProviderResult::complete(vec![item("a"), item("b")], 0));
    let results = session.results().unwrap();
    assert_eq!(results.provider_id, "synthetic");
    assert_eq!(results.total_items(), 2);

    let layers = results.to_feature_collections();
    assert_eq!(layers.keys().collect::<Vec<_>>(), vec!["food", "park"]);
    assert_eq!(layers["food"].len(), 2);
    assert!(layers["park"].is_empty());
    let props = &layers["food"].features[0].properties;
    assert_eq!(props["provider"], "synthetic");
    assert_eq!(props["hexId"], 1);
    assert_eq!(props["triangleId"], "1-1");
    assert_eq!(props["title"], "a");

    let stats = results.triangle_stats();
    let tri = &stats[&HexId(1)][&1];
    assert_eq!(tri.total, 2);
    assert_eq!(tri.by_category["food"], 2);
}
