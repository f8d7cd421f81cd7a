//! Session state, progress aggregation and the session registry

pub mod registry;
pub mod results;
pub mod state;
pub mod target;
pub mod types;

pub use registry::SessionRegistry;
pub use results::{CategoryResult, CrawlResults, TriangleStats};
pub use state::{ApplyOutcome, SessionState};
pub use target::{CrawlTarget, MeshRequest, TargetSummary};
pub use types::{CategoryProgress, HexProgress, SessionId, SessionProgress, TermProgress};
