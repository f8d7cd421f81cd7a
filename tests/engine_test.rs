//! End-to-end scheduler behavior with synthetic providers

use std::sync::Arc;
use std::time::Duration;

use kodegen_tools_hexcrawl::crawl_engine::{CrawlEngine, CrawlError};
use kodegen_tools_hexcrawl::crawl_events::{CrawlEvent, EventBusError, ShutdownReason};
use kodegen_tools_hexcrawl::{
    BBox, Boundary, CrawlConfig, DistanceUnit, MeshRequest, RegistryError, SessionId, ThrottleConfig,
};
use tokio::time::{Instant, sleep, timeout};

mod common;

use common::{Behavior, SyntheticProvider};

const DEPTH: usize = 2;

fn engine_with(provider: Arc<SyntheticProvider>) -> CrawlEngine {
    engine_with_pool(provider, 4)
}

fn engine_with_pool(provider: Arc<SyntheticProvider>, workers: usize) -> CrawlEngine {
    common::init_logging();
    let config = CrawlConfig::builder().worker_pool_size(workers).build().unwrap();
    CrawlEngine::start(config, common::registry_with(vec![provider]))
}

/// Receive session events until `SessionFinished`, returning all of them
async fn collect_until_finished<F>(
    rx: &mut kodegen_tools_hexcrawl::crawl_events::FilteredReceiver<F>,
) -> Vec<CrawlEvent>
where
    F: Fn(&CrawlEvent) -> bool + Send + Sync + 'static,
{
    let mut events = Vec::new();
    let deadline = Duration::from_secs(20);
    loop {
        match timeout(deadline, rx.recv()).await {
            Ok(Ok(event)) => {
                let done = matches!(event, CrawlEvent::SessionFinished { .. });
                events.push(event);
                if done {
                    return events;
                }
            }
            Ok(Err(EventBusError::ReceiverLagged(n))) => log::warn!("test receiver lagged by {n}"),
            Ok(Err(e)) => panic!("event stream failed: {e}"),
            Err(_) => panic!("timeout waiting for SessionFinished after {} events", events.len()),
        }
    }
}

async fn wait_for_outstanding(engine: &CrawlEngine) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while engine.metrics().outstanding() > 0 {
        assert!(Instant::now() < deadline, "tasks still outstanding: {:?}", engine.metrics());
        sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_crawl_runs_to_completion() {
    let provider = Arc::new(SyntheticProvider::new("synthetic", Behavior::Split { depth: DEPTH }));
    let engine = engine_with(Arc::clone(&provider));

    let session = engine.connect().await.unwrap();
    let summary = engine
        .set_target(session, common::tokyo_request("food=cafe|park=garden"))
        .await
        .unwrap();
    let hexes = summary.hexes.len();
    assert!(hexes > 0);
    assert_eq!(summary.triangles.len(), hexes * 6);
    assert_eq!(summary.categories, vec!["food", "park"]);
    assert_eq!(summary.palette.len(), 2);

    let mut rx = engine.subscribe(session);
    let pairs = engine.start_crawl(session, "synthetic").await.unwrap();
    assert_eq!(pairs, hexes * 2);

    let events = collect_until_finished(&mut rx).await;
    assert!(matches!(events[0], CrawlEvent::CrawlStarted { initial_tasks, .. } if initial_tasks == pairs));
    let finished = events
        .iter()
        .filter(|e| matches!(e, CrawlEvent::CategoryFinished { .. }))
        .count();
    assert_eq!(finished, pairs);
    let splits = events
        .iter()
        .filter(|e| matches!(e, CrawlEvent::TermSplit { .. }))
        .count();
    assert_eq!(splits, pairs * 3);

    let per_pair = SyntheticProvider::tasks_per_pair(DEPTH);
    match events.last() {
        Some(CrawlEvent::SessionFinished { total_items, .. }) => assert_eq!(*total_items, pairs * (per_pair + 1)),
        other => panic!("expected SessionFinished, got {other:?}"),
    }

    // nothing else is finished twice
    sleep(Duration::from_millis(100)).await;
    while let Ok(Some(event)) = rx.try_recv() {
        assert!(!matches!(event, CrawlEvent::SessionFinished { .. }), "SessionFinished emitted twice");
    }

    let progress = engine.progress(session).await.unwrap();
    assert!(progress.complete);
    assert_eq!(progress.in_flight, 0);
    assert_eq!(progress.final_pairs, progress.total_pairs);
    assert!(progress.hexes.iter().all(|h| h.is_final && h.percent == 1.0));

    let results = engine.results(session).await.unwrap();
    assert_eq!(results.total_items(), pairs * (per_pair + 1));

    let metrics = engine.metrics();
    assert_eq!(metrics.dispatched, (pairs * per_pair) as u64);
    assert_eq!(metrics.completed, metrics.dispatched);
    assert_eq!(metrics.failed, 0);
    assert_eq!(metrics.stale_dropped, 0);
    assert_eq!(metrics.duplicates_dropped, (pairs * (per_pair - 1)) as u64);
    assert_eq!(metrics.splits, (pairs * 3) as u64);
    assert_eq!(provider.calls(), pairs * per_pair);
}

#[tokio::test]
async fn test_auto_cell_size_crawls_every_pair() {
    let provider = Arc::new(SyntheticProvider::new("synthetic", Behavior::Split { depth: 0 }));
    let engine = engine_with(provider);
    let session = engine.connect().await.unwrap();
    let request = MeshRequest::new(
        Boundary::Rectangle(BBox::new(139.70, 35.65, 139.80, 35.75)),
        0.0,
        DistanceUnit::Kilometers,
        "food=restaurant,cafe|park=garden,park",
    );
    let summary = engine.set_target(session, request).await.unwrap();
    let hexes = summary.hexes.len();
    assert!(hexes > 1, "auto sizing produced {hexes} hexes");
    assert_eq!(summary.triangles.len(), hexes * 6);
    assert_eq!(summary.categories, vec!["food", "park"]);
    assert_eq!(summary.palette.len(), 2);

    let mut rx = engine.subscribe(session);
    let pairs = engine.start_crawl(session, "synthetic").await.unwrap();
    assert_eq!(pairs, hexes * 2);
    let events = collect_until_finished(&mut rx).await;
    assert!(matches!(events[0], CrawlEvent::CrawlStarted { initial_tasks, .. } if initial_tasks == hexes * 2));
    assert!(engine.progress(session).await.unwrap().complete);
}

#[tokio::test]
async fn test_throttle_caps_calls_in_flight() {
    let provider = Arc::new(
        SyntheticProvider::new("slow", Behavior::Split { depth: 1 })
            .with_delay(Duration::from_millis(30))
            .with_throttle(ThrottleConfig::new(2, 0)),
    );
    let engine = engine_with_pool(Arc::clone(&provider), 8);
    let session = engine.connect().await.unwrap();
    engine
        .set_target(session, common::tokyo_request("food=cafe|park=garden"))
        .await
        .unwrap();

    let mut rx = engine.subscribe(session);
    let pairs = engine.start_crawl(session, "slow").await.unwrap();
    collect_until_finished(&mut rx).await;

    assert_eq!(provider.calls(), pairs * SyntheticProvider::tasks_per_pair(1));
    assert!(
        provider.peak_in_flight() <= 2,
        "{} calls ran at once with 8 workers",
        provider.peak_in_flight()
    );
    assert_eq!(provider.peak_in_flight(), 2);
}

#[tokio::test]
async fn test_throttle_spaces_call_starts() {
    let spacing = Duration::from_millis(60);
    let provider = Arc::new(
        SyntheticProvider::new("spaced", Behavior::Split { depth: 0 })
            .with_throttle(ThrottleConfig::new(4, spacing.as_millis() as u64)),
    );
    let engine = engine_with_pool(Arc::clone(&provider), 8);
    let session = engine.connect().await.unwrap();
    engine.set_target(session, common::tokyo_request("food=cafe")).await.unwrap();

    let mut rx = engine.subscribe(session);
    let pairs = engine.start_crawl(session, "spaced").await.unwrap();
    collect_until_finished(&mut rx).await;

    let starts = provider.call_starts();
    assert_eq!(starts.len(), pairs);
    assert!(pairs > 2);
    // the k-th call may not start before k spacing slots have passed
    let slack = Duration::from_millis(15);
    for (k, start) in starts.iter().enumerate().skip(1) {
        let elapsed = start.duration_since(starts[0]);
        assert!(
            elapsed + slack >= spacing * k as u32,
            "call {k} started {elapsed:?} after the first"
        );
    }
}

#[tokio::test]
async fn test_erroring_provider_finishes_with_failures() {
    let provider = Arc::new(SyntheticProvider::new("broken", Behavior::Error));
    let engine = engine_with(provider);
    let session = engine.connect().await.unwrap();
    engine.set_target(session, common::tokyo_request("food=cafe")).await.unwrap();

    let mut rx = engine.subscribe(session);
    let pairs = engine.start_crawl(session, "broken").await.unwrap();
    let events = collect_until_finished(&mut rx).await;

    let failures: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CrawlEvent::TaskFailed { error, .. } => Some(error.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), pairs);
    assert!(failures.iter().all(|e| e.code.as_deref() == Some("SYNTHETIC")));

    let results = engine.results(session).await.unwrap();
    assert_eq!(results.total_items(), 0);
    assert_eq!(engine.metrics().failed, pairs as u64);
}

#[tokio::test]
async fn test_panicking_provider_does_not_stall_session() {
    let provider = Arc::new(SyntheticProvider::new("panicky", Behavior::Panic));
    let engine = engine_with(provider);
    let session = engine.connect().await.unwrap();
    engine.set_target(session, common::tokyo_request("food=cafe")).await.unwrap();

    let mut rx = engine.subscribe(session);
    let pairs = engine.start_crawl(session, "panicky").await.unwrap();
    let events = collect_until_finished(&mut rx).await;

    let panics = events
        .iter()
        .filter(|e| matches!(e, CrawlEvent::TaskFailed { error, .. } if error.code.as_deref() == Some("PANIC")))
        .count();
    assert_eq!(panics, pairs);
    assert_eq!(engine.metrics().outstanding(), 0);
}

#[tokio::test]
async fn test_command_errors() {
    let provider = Arc::new(SyntheticProvider::new("synthetic", Behavior::Split { depth: 0 }));
    let engine = engine_with(provider);

    let ghost = SessionId::new();
    assert!(matches!(engine.progress(ghost).await, Err(CrawlError::UnknownSession(id)) if id == ghost));
    assert!(matches!(engine.start_crawl(ghost, "synthetic").await, Err(CrawlError::UnknownSession(_))));
    assert!(!engine.disconnect(ghost).await.unwrap());

    let session = engine.connect().await.unwrap();
    assert!(matches!(engine.start_crawl(session, "synthetic").await, Err(CrawlError::NoTarget(_))));
    assert!(matches!(engine.results(session).await, Err(CrawlError::NoTarget(_))));

    engine.set_target(session, common::tokyo_request("food=cafe")).await.unwrap();
    match engine.start_crawl(session, "nope").await {
        Err(CrawlError::Registry(RegistryError::Unknown(id))) => assert_eq!(id, "nope"),
        other => panic!("expected unknown provider, got {other:?}"),
    }

    let bad_categories = common::tokyo_request("food=");
    assert!(matches!(engine.set_target(session, bad_categories).await, Err(CrawlError::Config(_))));
}

#[tokio::test]
async fn test_completions_after_disconnect_are_dropped() {
    let provider = Arc::new(
        SyntheticProvider::new("slow", Behavior::Split { depth: 3 }).with_delay(Duration::from_millis(200)),
    );
    let engine = engine_with(provider);
    let session = engine.connect().await.unwrap();
    engine.set_target(session, common::tokyo_request("food=cafe")).await.unwrap();

    let mut rx = engine.subscribe(session);
    let pairs = engine.start_crawl(session, "slow").await.unwrap();
    assert!(engine.disconnect(session).await.unwrap());
    assert!(!engine.disconnect(session).await.unwrap());

    wait_for_outstanding(&engine).await;
    let metrics = engine.metrics();
    assert_eq!(metrics.dispatched, pairs as u64, "no follow-ups for a disposed session");
    assert_eq!(metrics.stale_dropped, pairs as u64);
    assert!(matches!(engine.progress(session).await, Err(CrawlError::UnknownSession(_))));

    let mut disposed = false;
    while let Ok(Some(event)) = rx.try_recv() {
        disposed |= matches!(event, CrawlEvent::SessionDisposed { .. });
        assert!(!matches!(event, CrawlEvent::HexProgress { .. }));
    }
    assert!(disposed);
}

#[tokio::test]
async fn test_retarget_drops_outstanding_results() {
    let provider = Arc::new(
        SyntheticProvider::new("slow", Behavior::Split { depth: 3 }).with_delay(Duration::from_millis(200)),
    );
    let engine = engine_with(provider);
    let session = engine.connect().await.unwrap();
    engine.set_target(session, common::tokyo_request("food=cafe")).await.unwrap();
    let pairs = engine.start_crawl(session, "slow").await.unwrap();
    let epoch = engine.progress(session).await.unwrap().epoch;

    engine.set_target(session, common::tokyo_request("park=garden")).await.unwrap();
    wait_for_outstanding(&engine).await;

    let metrics = engine.metrics();
    assert_eq!(metrics.stale_dropped, pairs as u64);
    assert_eq!(metrics.items_accepted, 0);
    let progress = engine.progress(session).await.unwrap();
    assert!(progress.epoch > epoch);
    assert!(progress.hexes.is_empty());
    assert!(!progress.complete);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let provider = Arc::new(SyntheticProvider::new("synthetic", Behavior::Split { depth: 1 }));
    let engine = engine_with(provider);
    let first = engine.connect().await.unwrap();
    let second = engine.connect().await.unwrap();
    assert_ne!(first, second);

    engine.set_target(first, common::tokyo_request("food=cafe")).await.unwrap();
    engine.set_target(second, common::tokyo_request("food=cafe|park=garden")).await.unwrap();

    let mut rx_first = engine.subscribe(first);
    let mut rx_second = engine.subscribe(second);
    let pairs_first = engine.start_crawl(first, "synthetic").await.unwrap();
    let pairs_second = engine.start_crawl(second, "synthetic").await.unwrap();
    assert_eq!(pairs_second, pairs_first * 2);

    let (a, b) = tokio::join!(
        collect_until_finished(&mut rx_first),
        collect_until_finished(&mut rx_second)
    );
    assert!(a.iter().all(|e| e.session_id() == Some(first)));
    assert!(b.iter().all(|e| e.session_id() == Some(second)));

    // disposing one leaves the other intact
    assert!(engine.disconnect(first).await.unwrap());
    assert!(engine.results(second).await.is_ok());
}

#[tokio::test]
async fn test_shutdown_notifies_and_rejects_commands() {
    let provider = Arc::new(SyntheticProvider::new("synthetic", Behavior::Split { depth: 0 }));
    let engine = engine_with(provider);
    let mut rx = engine.events().subscribe();

    engine.shutdown().await.unwrap();
    let event = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("shutdown event in time")
        .unwrap();
    match event {
        CrawlEvent::Shutdown { reason, .. } => assert_eq!(reason, ShutdownReason::Requested),
        other => panic!("expected Shutdown, got {other:?}"),
    }
    assert!(engine.events().is_shutdown());

    sleep(Duration::from_millis(50)).await;
    assert!(matches!(engine.connect().await, Err(CrawlError::EngineShutdown)));
}
