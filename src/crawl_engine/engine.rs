//! Client-facing handle to a running crawl engine

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::core::{EngineCommand, EngineCore};
use super::crawl_types::{CrawlError, CrawlResult};
use super::metrics::{EngineMetrics, EngineMetricsSnapshot};
use super::throttle::ThrottleRegistry;
use super::worker_pool::WorkerPool;
use crate::config::CrawlConfig;
use crate::crawl_events::{CrawlEvent, CrawlEventBus, FilteredReceiver};
use crate::provider::ProviderRegistry;
use crate::session::{CrawlResults, CrawlTarget, MeshRequest, SessionId, SessionProgress, TargetSummary};
use crate::utils::COMMAND_CHANNEL_CAPACITY;

/// Cheap to clone; every clone talks to the same core
#[derive(Clone)]
pub struct CrawlEngine {
    commands: mpsc::Sender<EngineCommand>,
    config: Arc<CrawlConfig>,
    events: CrawlEventBus,
    metrics: EngineMetrics,
}

impl CrawlEngine {
    /// Spawn the core and worker pool on the current tokio runtime
    #[must_use]
    pub fn start(config: CrawlConfig, providers: ProviderRegistry) -> Self {
        let events = CrawlEventBus::new(config.event_bus_capacity());
        let metrics = EngineMetrics::new();
        let throttles = Arc::new(ThrottleRegistry::new());
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::spawn(config.worker_pool_size(), Arc::clone(&throttles), completion_tx);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let core = EngineCore::new(providers, pool, throttles, events.clone(), metrics.clone());
        tokio::spawn(core.run(command_rx, completion_rx));

        Self {
            commands: command_tx,
            config: Arc::new(config),
            events,
            metrics,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    #[must_use]
    pub fn events(&self) -> &CrawlEventBus {
        &self.events
    }

    /// Events for one session
    pub fn subscribe(
        &self,
        session_id: SessionId,
    ) -> FilteredReceiver<impl Fn(&CrawlEvent) -> bool + Send + Sync + 'static> {
        self.events.subscribe_session(session_id)
    }

    #[must_use]
    pub fn metrics(&self) -> EngineMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Open a new session
    pub async fn connect(&self) -> CrawlResult<SessionId> {
        self.call(|reply| EngineCommand::Connect { reply }).await
    }

    /// Build a mesh for `request` and make it the session's target
    ///
    /// Geometry runs on the blocking pool. Any crawl in progress for the
    /// session is abandoned.
    pub async fn set_target(&self, session_id: SessionId, request: MeshRequest) -> CrawlResult<TargetSummary> {
        let config = Arc::clone(&self.config);
        let target = tokio::task::spawn_blocking(move || CrawlTarget::build(&request, &config))
            .await
            .map_err(|e| CrawlError::Other(format!("mesh build task failed: {e}")))??;
        let target = Arc::new(target);
        let summary = target.summary();
        self.call(|reply| EngineCommand::SetTarget {
            session_id,
            target,
            reply,
        })
        .await??;
        Ok(summary)
    }

    /// Start crawling the session's target; returns the initial task count
    pub async fn start_crawl(&self, session_id: SessionId, provider_id: &str) -> CrawlResult<usize> {
        let provider_id = provider_id.to_string();
        self.call(|reply| EngineCommand::StartCrawl {
            session_id,
            provider_id,
            reply,
        })
        .await?
    }

    pub async fn progress(&self, session_id: SessionId) -> CrawlResult<SessionProgress> {
        self.call(|reply| EngineCommand::Progress { session_id, reply }).await?
    }

    pub async fn results(&self, session_id: SessionId) -> CrawlResult<CrawlResults> {
        self.call(|reply| EngineCommand::Results { session_id, reply }).await?
    }

    /// Dispose of a session; returns whether it existed
    pub async fn disconnect(&self, session_id: SessionId) -> CrawlResult<bool> {
        self.call(|reply| EngineCommand::Disconnect { session_id, reply }).await
    }

    /// Stop the engine; in-flight work is abandoned
    pub async fn shutdown(&self) -> CrawlResult<()> {
        self.call(|reply| EngineCommand::Shutdown { reply }).await
    }

    async fn call<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> EngineCommand) -> CrawlResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| CrawlError::EngineShutdown)?;
        rx.await.map_err(|_| CrawlError::EngineShutdown)
    }
}
