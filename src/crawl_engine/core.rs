//! Scheduler core
//!
//! A single task owns the session registry. Client commands and worker
//! completions arrive on channels and are applied one at a time, so session
//! state never needs a lock. Completions are matched to their session by id
//! and epoch; anything that no longer matches is logged and dropped.

use std::ops::ControlFlow;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};

use super::crawl_types::{CrawlError, CrawlResult, CrawlTask, TaskCompletion};
use super::metrics::EngineMetrics;
use super::throttle::ThrottleRegistry;
use super::worker_pool::WorkerPool;
use crate::crawl_events::{CrawlEvent, CrawlEventBus, ShutdownReason};
use crate::provider::{ProviderRegistry, SearchRequest};
use crate::session::{CrawlResults, CrawlTarget, SessionId, SessionProgress, SessionRegistry};

pub(crate) enum EngineCommand {
    Connect {
        reply: oneshot::Sender<SessionId>,
    },
    SetTarget {
        session_id: SessionId,
        target: Arc<CrawlTarget>,
        reply: oneshot::Sender<CrawlResult<()>>,
    },
    StartCrawl {
        session_id: SessionId,
        provider_id: String,
        reply: oneshot::Sender<CrawlResult<usize>>,
    },
    Progress {
        session_id: SessionId,
        reply: oneshot::Sender<CrawlResult<SessionProgress>>,
    },
    Results {
        session_id: SessionId,
        reply: oneshot::Sender<CrawlResult<CrawlResults>>,
    },
    Disconnect {
        session_id: SessionId,
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

pub(crate) struct EngineCore {
    sessions: SessionRegistry,
    providers: ProviderRegistry,
    pool: WorkerPool,
    throttles: Arc<ThrottleRegistry>,
    events: CrawlEventBus,
    metrics: EngineMetrics,
}

impl EngineCore {
    pub(crate) fn new(
        providers: ProviderRegistry,
        pool: WorkerPool,
        throttles: Arc<ThrottleRegistry>,
        events: CrawlEventBus,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            providers,
            pool,
            throttles,
            events,
            metrics,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        mut completions: mpsc::UnboundedReceiver<TaskCompletion>,
    ) {
        info!("Crawl engine started with {} workers", self.pool.size());
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        info!("All engine handles dropped, stopping");
                        self.stop(ShutdownReason::HandlesDropped).await;
                        break;
                    };
                    if self.handle_command(command).await.is_break() {
                        break;
                    }
                }
                Some(done) = completions.recv() => self.on_completion(done).await,
            }
        }
        info!("Crawl engine stopped");
    }

    async fn handle_command(&mut self, command: EngineCommand) -> ControlFlow<()> {
        match command {
            EngineCommand::Connect { reply } => {
                let _ = reply.send(self.sessions.create());
            }
            EngineCommand::SetTarget {
                session_id,
                target,
                reply,
            } => {
                let _ = reply.send(self.set_target(session_id, target).await);
            }
            EngineCommand::StartCrawl {
                session_id,
                provider_id,
                reply,
            } => {
                let _ = reply.send(self.start_crawl(session_id, &provider_id).await);
            }
            EngineCommand::Progress { session_id, reply } => {
                let progress = self
                    .sessions
                    .get(&session_id)
                    .map(|s| s.progress())
                    .ok_or(CrawlError::UnknownSession(session_id));
                let _ = reply.send(progress);
            }
            EngineCommand::Results { session_id, reply } => {
                let results = self
                    .sessions
                    .get(&session_id)
                    .ok_or(CrawlError::UnknownSession(session_id))
                    .and_then(|s| s.results());
                let _ = reply.send(results);
            }
            EngineCommand::Disconnect { session_id, reply } => {
                let removed = self.sessions.dispose(&session_id).is_some();
                if removed {
                    self.events.emit(CrawlEvent::session_disposed(session_id)).await;
                }
                let _ = reply.send(removed);
            }
            EngineCommand::Shutdown { reply } => {
                self.stop(ShutdownReason::Requested).await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn set_target(&mut self, session_id: SessionId, target: Arc<CrawlTarget>) -> CrawlResult<()> {
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(CrawlError::UnknownSession(session_id))?;
        let event = CrawlEvent::target_built(
            session_id,
            target.mesh().hexes().len(),
            target.mesh().triangles().len(),
            target.categories().len(),
        );
        session.set_target(target);
        self.events.emit(event).await;
        Ok(())
    }

    async fn start_crawl(&mut self, session_id: SessionId, provider_id: &str) -> CrawlResult<usize> {
        let provider = self.providers.require(provider_id)?;
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(CrawlError::UnknownSession(session_id))?;
        let tasks = session.begin_crawl(provider_id, &provider.initial_state())?;
        let count = tasks.len();
        info!("Session {session_id}: crawl with '{provider_id}' started, {count} initial tasks");
        self.events
            .emit(CrawlEvent::crawl_started(session_id, provider_id.to_string(), count))
            .await;
        for task in tasks {
            self.dispatch(task);
        }
        Ok(count)
    }

    fn dispatch(&mut self, task: CrawlTask) {
        let Some(session) = self.sessions.get_mut(&task.session_id) else {
            warn!("Not dispatching task for unknown session {}", task.session_id);
            return;
        };
        let Some(target) = session.target().cloned() else {
            warn!("Session {}: no target, task dropped", task.session_id);
            return;
        };
        let Some(provider) = session.provider_id().and_then(|id| self.providers.get(id)) else {
            error!("Session {}: provider unavailable, task dropped", task.session_id);
            return;
        };
        let (Some(hex), Some(category)) = (target.hex_context(task.hex_id), target.category(&task.category))
        else {
            error!(
                "Session {}: hex {} / category '{}' not in target, task dropped",
                task.session_id, task.hex_id, task.category
            );
            return;
        };
        session.mark_dispatched();
        self.metrics.record_dispatch();
        let request = SearchRequest {
            hex,
            category,
            state: task.state.clone(),
        };
        self.pool.submit(task, request, provider);
    }

    async fn on_completion(&mut self, done: TaskCompletion) {
        let TaskCompletion { task, result } = done;
        self.metrics.record_completion(result.error.is_some());

        let Some(session) = self.sessions.get_mut(&task.session_id) else {
            warn!(
                "Dropping completion for disposed session {} (hex {}, term {})",
                task.session_id, task.hex_id, task.state.term_id
            );
            self.metrics.record_stale();
            return;
        };
        if session.epoch() != task.epoch {
            warn!(
                "Session {}: dropping stale completion from epoch {} (current {})",
                task.session_id,
                task.epoch,
                session.epoch()
            );
            self.metrics.record_stale();
            return;
        }

        let session_id = task.session_id;
        let failure = result.error.clone();
        session.mark_completed();
        let outcome = session.apply(&task, result);
        self.metrics.record_items(outcome.added, outcome.duplicates);
        debug!(
            "Session {session_id}: hex {} '{}' term {} +{} items ({} duplicates), {} follow-ups",
            task.hex_id,
            task.category,
            task.state.term_id,
            outcome.added,
            outcome.duplicates,
            outcome.follow_ups.len()
        );

        if let Some(error) = failure {
            error!(
                "Session {session_id}: hex {} '{}' term {} failed: {}",
                task.hex_id, task.category, task.state.term_id, error.message
            );
            self.events
                .emit(CrawlEvent::task_failed(
                    session_id,
                    task.hex_id,
                    task.category.clone(),
                    task.state.term_id.clone(),
                    error,
                ))
                .await;
        }
        if !outcome.split_children.is_empty() {
            self.metrics.record_split();
            self.events
                .emit(CrawlEvent::term_split(
                    session_id,
                    task.hex_id,
                    task.category.clone(),
                    task.state.term_id.clone(),
                    outcome.split_children.clone(),
                ))
                .await;
        }

        for follow_up in outcome.follow_ups {
            self.dispatch(follow_up);
        }

        if let Some(progress) = outcome.hex_progress {
            if outcome.category_finished {
                let crawled = progress
                    .categories
                    .get(&task.category)
                    .map_or(0, |c| c.crawled);
                self.events
                    .emit(CrawlEvent::category_finished(
                        session_id,
                        task.hex_id,
                        task.category.clone(),
                        crawled,
                    ))
                    .await;
            }
            self.events.emit(CrawlEvent::hex_progress(session_id, progress)).await;
        }

        let Some(session) = self.sessions.get_mut(&session_id) else {
            return;
        };
        if session.try_finish() {
            let total = session.total_items();
            let elapsed = session.elapsed();
            info!("Session {session_id}: crawl finished with {total} items in {elapsed:?}");
            self.events
                .emit(CrawlEvent::session_finished(session_id, total, elapsed))
                .await;
        }
    }

    async fn stop(&mut self, reason: ShutdownReason) {
        self.throttles.close_all();
        self.pool.shutdown();
        let ids: Vec<SessionId> = self.sessions.ids().collect();
        for id in ids {
            self.sessions.dispose(&id);
        }
        self.events.shutdown_with(reason).await;
    }
}
