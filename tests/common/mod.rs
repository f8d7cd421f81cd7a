//! Test utilities shared by the hexcrawl integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use kodegen_tools_hexcrawl::crawl_engine::ThrottleConfig;
use kodegen_tools_hexcrawl::provider::{
    ContinuationState, CrawledItem, Provider, ProviderError, ProviderRegistry, ProviderResult,
    SearchRequest, TermId, TimeWindow,
};
use kodegen_tools_hexcrawl::{BBox, Boundary, DistanceUnit, MeshRequest, Plugin};
use serde_json::json;

/// Initialize logging once per test binary
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Small rectangle in central Tokyo
#[allow(dead_code)]
pub fn tokyo_bbox() -> BBox {
    BBox::new(139.74, 35.66, 139.77, 35.69)
}

#[allow(dead_code)]
pub fn tokyo_request(categories: &str) -> MeshRequest {
    MeshRequest::new(
        Boundary::Rectangle(tokyo_bbox()),
        1.0,
        DistanceUnit::Kilometers,
        categories,
    )
}

/// How the synthetic provider answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Behavior {
    /// Split lineages until their id is longer than the depth
    Split { depth: usize },
    /// Return `Err` from every call
    Error,
    /// Panic inside every call
    Panic,
}

/// Deterministic in-memory provider
///
/// Every page holds one item unique to its lineage plus one item shared by
/// all lineages of the pair, so duplicates are predictable.
#[allow(dead_code)]
pub struct SyntheticProvider {
    id: String,
    behavior: Behavior,
    delay: Duration,
    throttle: ThrottleConfig,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    starts: Mutex<Vec<Instant>>,
}

/// Counts one running call until dropped, unwinding included
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[allow(dead_code)]
impl SyntheticProvider {
    pub fn new(id: &str, behavior: Behavior) -> Self {
        Self {
            id: id.to_string(),
            behavior,
            delay: Duration::ZERO,
            throttle: ThrottleConfig::new(8, 0),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            starts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls ever running at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// When each call entered `search`, in order
    pub fn call_starts(&self) -> Vec<Instant> {
        let mut starts = self.starts.lock().unwrap().clone();
        starts.sort();
        starts
    }

    /// Tasks one pair needs for a split depth
    pub fn tasks_per_pair(depth: usize) -> usize {
        (1 << (depth + 1)) - 1
    }
}

impl Plugin for SyntheticProvider {
    fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl Provider for SyntheticProvider {
    fn initial_state(&self) -> ContinuationState {
        ContinuationState::windowed(TermId::root(), TimeWindow::new(0, 1 << 20))
    }

    fn throttle(&self) -> ThrottleConfig {
        self.throttle
    }

    async fn search(&self, request: SearchRequest) -> Result<ProviderResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.starts.lock().unwrap().push(Instant::now());
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        let _in_flight = InFlight(&self.active);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let depth = match self.behavior {
            Behavior::Split { depth } => depth,
            Behavior::Error => {
                return Err(ProviderError::fatal("synthetic failure", Some("SYNTHETIC".into())));
            }
            Behavior::Panic => panic!("synthetic provider panicked"),
        };

        let hex = request.hex.hex_id;
        let category = &request.category.name;
        let term = &request.state.term_id;
        let center = request.hex.bbox.center();
        let item = |id: String| CrawledItem {
            id,
            coord: center,
            triangle: None,
            timestamp: None,
            properties: json!({ "term": term.as_str() }),
        };
        let items = vec![
            item(format!("{hex}:{category}:{term}")),
            item(format!("{hex}:{category}:shared")),
        ];
        let (kept, outside) = request.localize(items);

        let window = request.state.window;
        match window.and_then(|w| w.bisect()) {
            Some((upper, lower)) if term.as_str().len() <= depth => {
                let next = vec![
                    ContinuationState::windowed(term.child('a'), upper),
                    ContinuationState::windowed(term.child('b'), lower),
                ];
                Ok(ProviderResult::partial(kept, outside, 10, next))
            }
            _ => Ok(ProviderResult::complete(kept, outside)),
        }
    }
}

/// Registry holding the given synthetic providers
#[allow(dead_code)]
pub fn registry_with(providers: Vec<Arc<SyntheticProvider>>) -> ProviderRegistry {
    providers
        .into_iter()
        .fold(ProviderRegistry::builder(), |builder, p| {
            let p: Arc<dyn Provider> = p;
            builder.register(p)
        })
        .build()
        .expect("synthetic providers have unique ids")
}
