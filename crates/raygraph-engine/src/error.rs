//! Engine-side errors

use raygraph_model::GraphError;

/// Errors surfaced by [`crate::SimEngine`] operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A run is already outstanding on this engine; overlapping runs
    /// are rejected, not queued
    #[error("a run is already in progress")]
    RunInProgress,

    /// The worker task is gone (its channel closed)
    #[error("simulation worker is gone")]
    WorkerGone,

    /// The worker reported a terminal fault for this run
    #[error("simulation worker failed: {0}")]
    Worker(String),

    /// Graph construction failed before the run started
    #[error(transparent)]
    Graph(#[from] GraphError),
}
