//! Core types shared by the scheduler, workers and sessions

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::geo::HexId;
use crate::plugin::RegistryError;
use crate::provider::{ContinuationState, ProviderError, ProviderResult};
use crate::session::SessionId;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Plugin error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Unknown session {0}")]
    UnknownSession(SessionId),
    #[error("Session {0} has no target; set one before crawling")]
    NoTarget(SessionId),
    #[error("Crawl engine is shut down")]
    EngineShutdown,
    #[error("Crawl error: {0}")]
    Other(String),
}

impl From<anyhow::Error> for CrawlError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain
        Self::Other(format!("{err:#}"))
    }
}

/// Convenience alias for Result with `CrawlError`
pub type CrawlResult<T> = Result<T, CrawlError>;

/// One provider call for one lineage of one hex × category pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlTask {
    pub session_id: SessionId,
    /// Session epoch at creation; completions from older epochs are dropped
    pub epoch: u64,
    pub hex_id: HexId,
    pub category: String,
    pub state: ContinuationState,
}

/// A finished task travelling back to the core
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub task: CrawlTask,
    pub result: ProviderResult,
}

impl TaskCompletion {
    #[must_use]
    pub fn new(task: CrawlTask, result: ProviderResult) -> Self {
        Self { task, result }
    }

    /// Terminal completion carrying `err`
    #[must_use]
    pub fn failed(task: CrawlTask, err: &ProviderError) -> Self {
        Self {
            task,
            result: ProviderResult::failed(err),
        }
    }
}
