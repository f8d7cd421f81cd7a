//! Bounded pool of workers executing provider calls
//!
//! Admission happens first: a submitted task waits for its provider's
//! throttle slot and only then enters the shared work queue. `size`
//! long-lived workers drain the queue, run the provider call with panics
//! caught and send exactly one [`TaskCompletion`] back per submitted task,
//! whatever the outcome.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, error, warn};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use super::crawl_types::{CrawlTask, TaskCompletion};
use super::throttle::{ThrottlePermit, ThrottleRegistry};
use crate::provider::{Provider, ProviderError, ProviderResult, SearchRequest};

struct WorkItem {
    task: CrawlTask,
    request: SearchRequest,
    provider: Arc<dyn Provider>,
    permit: ThrottlePermit,
}

pub struct WorkerPool {
    queue: mpsc::UnboundedSender<WorkItem>,
    completions: mpsc::UnboundedSender<TaskCompletion>,
    throttles: Arc<ThrottleRegistry>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` workers reporting to `completions`
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(
        size: usize,
        throttles: Arc<ThrottleRegistry>,
        completions: mpsc::UnboundedSender<TaskCompletion>,
    ) -> Self {
        let size = size.max(1);
        let (queue, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..size)
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(&rx), completions.clone())))
            .collect();
        debug!("Worker pool started with {size} workers");
        Self {
            queue,
            completions,
            throttles,
            workers,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a task behind its provider's throttle
    pub fn submit(&self, task: CrawlTask, request: SearchRequest, provider: Arc<dyn Provider>) {
        let throttle = self.throttles.throttle_for(provider.id(), provider.throttle());
        let queue = self.queue.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let permit = match throttle.acquire().await {
                Ok(permit) => permit,
                Err(closed) => {
                    let err = ProviderError::fatal(closed.to_string(), Some("THROTTLE_CLOSED".to_string()));
                    let _ = completions.send(TaskCompletion::failed(task, &err));
                    return;
                }
            };
            let item = WorkItem {
                task,
                request,
                provider,
                permit,
            };
            if let Err(mpsc::error::SendError(item)) = queue.send(item) {
                let err = ProviderError::fatal("worker pool stopped", Some("POOL_STOPPED".to_string()));
                let _ = completions.send(TaskCompletion::failed(item.task, &err));
            }
        });
    }

    /// Stop all workers; queued items are dropped
    pub fn shutdown(&mut self) {
        for worker in self.workers.drain(..) {
            worker.abort();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn worker_loop(
    id: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
    completions: mpsc::UnboundedSender<TaskCompletion>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(WorkItem {
            task,
            request,
            provider,
            permit,
        }) = next
        else {
            debug!("Worker {id}: queue closed, exiting");
            break;
        };
        let result = execute(provider, request).await;
        drop(permit);
        if completions.send(TaskCompletion::new(task, result)).is_err() {
            debug!("Worker {id}: completion channel closed, exiting");
            break;
        }
    }
}

/// Run one provider call, turning errors and panics into failed results
pub(crate) async fn execute(provider: Arc<dyn Provider>, request: SearchRequest) -> ProviderResult {
    let provider_id = provider.id().to_string();
    let hex_id = request.hex.hex_id;
    let term_id = request.state.term_id.clone();
    match AssertUnwindSafe(provider.search(request)).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!("Provider '{provider_id}' failed for hex {hex_id} term {term_id}: {e}");
            ProviderResult::failed(&e.into_fatal())
        }
        Err(payload) => {
            let message = panic_message(&*payload);
            error!("Provider '{provider_id}' panicked for hex {hex_id} term {term_id}: {message}");
            let err = ProviderError::fatal(format!("provider panicked: {message}"), Some("PANIC".to_string()));
            ProviderResult::failed(&err)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
