//! Engine facade
//!
//! Caller-side handle for the worker. Wraps the message protocol as a
//! single awaitable run operation: resolves on `Done` (or on a
//! stopped-tagged snapshot), rejects on `Error`, and tolerates any
//! number of `Progress` messages in between. The caller's pre-run copy
//! of the graph is stale the instant the run starts; only received
//! snapshots reflect live counts.

use crate::error::EngineError;
use crate::worker::{spawn_worker, Snapshot, WorkerReply, WorkerRequest};
use parking_lot::Mutex;
use raygraph_model::{build_graph, EdgeSpec, NodeSpec, RunConfig, SimGraph};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What an awaited run resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Trials completed (equals the configured count unless stopped)
    pub trials_completed: u64,
    /// Nodes processed across all completed trials
    pub total_visits: u64,
    /// True when the run was cancelled by `stop`
    pub stopped: bool,
}

/// One row of the ranked outcome listing
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Node id
    pub id: String,
    /// Node label
    pub label: String,
    /// Times the node was reached
    pub hits: u64,
    /// Hits as a fraction of completed trials
    pub fraction: f64,
}

/// The simulation engine: one background worker, one run at a time
#[derive(Debug)]
pub struct SimEngine {
    requests: mpsc::Sender<WorkerRequest>,
    latest: Mutex<Option<Snapshot>>,
    running: Arc<AtomicBool>,
}

impl SimEngine {
    /// Create an engine and spawn its worker task
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests: spawn_worker(),
            latest: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build the canonical graph from editor node and edge lists
    ///
    /// # Errors
    /// Construction errors are synchronous and fatal to this attempt
    /// only; see [`raygraph_model::GraphError`].
    pub fn build_graph(
        &self,
        nodes: &[NodeSpec],
        edges: &[EdgeSpec],
    ) -> Result<SimGraph, EngineError> {
        Ok(build_graph(nodes, edges)?)
    }

    /// Run a batch of trials to completion (or cancellation)
    ///
    /// # Errors
    /// - [`EngineError::RunInProgress`] when a run is already outstanding
    /// - [`EngineError::Worker`] when the worker reports a terminal fault
    /// - [`EngineError::WorkerGone`] when the worker vanished mid-run
    pub async fn run(&self, graph: SimGraph, config: RunConfig) -> Result<RunSummary, EngineError> {
        self.run_with_progress(graph, config, |_| {}).await
    }

    /// Run a batch, invoking `on_progress` for every received snapshot
    ///
    /// Snapshots arrive in increasing trial-count order on an
    /// exponential schedule; callers must not assume uniform timing.
    /// Only a terminal stopped snapshot can repeat the preceding count.
    ///
    /// # Errors
    /// See [`Self::run`].
    pub async fn run_with_progress(
        &self,
        graph: SimGraph,
        config: RunConfig,
        mut on_progress: impl FnMut(&Snapshot),
    ) -> Result<RunSummary, EngineError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::RunInProgress);
        }
        let _guard = RunningGuard(Arc::clone(&self.running));

        if config.workers > 1 {
            tracing::debug!(workers = config.workers, "worker count is reserved; running one");
        }
        if config.sweep.is_some() {
            tracing::debug!("variable sweep configured but not exercised");
        }

        let (reply_tx, mut reply_rx) = mpsc::channel(32);
        self.requests
            .send(WorkerRequest::Run {
                graph,
                trials: config.trials,
                frontier_cap: config.frontier_cap,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::WorkerGone)?;

        let mut last = (0u64, 0u64);
        while let Some(reply) = reply_rx.recv().await {
            match reply {
                WorkerReply::Progress(snapshot) => {
                    on_progress(&snapshot);
                    last = (snapshot.trials_completed, snapshot.total_visits);
                    let stopped = snapshot.stopped;
                    *self.latest.lock() = Some(snapshot);
                    if stopped {
                        // Terminal: no Done follows a stopped run
                        return Ok(RunSummary {
                            trials_completed: last.0,
                            total_visits: last.1,
                            stopped: true,
                        });
                    }
                }
                WorkerReply::Done => {
                    return Ok(RunSummary {
                        trials_completed: last.0,
                        total_visits: last.1,
                        stopped: false,
                    });
                }
                WorkerReply::Error(description) => {
                    return Err(EngineError::Worker(description));
                }
            }
        }

        Err(EngineError::WorkerGone)
    }

    /// Request cancellation of the outstanding run
    ///
    /// Takes effect at the next trial boundary; the awaited run then
    /// resolves with `stopped = true`.
    ///
    /// # Errors
    /// [`EngineError::WorkerGone`] when the worker channel is closed.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.requests
            .send(WorkerRequest::Stop)
            .await
            .map_err(|_| EngineError::WorkerGone)
    }

    /// Pull the worker's last completed snapshot, refreshing the local
    /// copy; `None` when no run has completed yet
    ///
    /// # Errors
    /// [`EngineError::WorkerGone`] when the worker channel is closed.
    pub async fn request_results(&self) -> Result<Option<Snapshot>, EngineError> {
        let (reply_tx, mut reply_rx) = mpsc::channel(1);
        self.requests
            .send(WorkerRequest::RequestResults { reply: reply_tx })
            .await
            .map_err(|_| EngineError::WorkerGone)?;

        match reply_rx.recv().await {
            Some(WorkerReply::Progress(snapshot)) => {
                *self.latest.lock() = Some(snapshot.clone());
                Ok(Some(snapshot))
            }
            // Channel closed without a reply: nothing completed yet
            _ => Ok(None),
        }
    }

    /// Latest snapshot received from the worker, if any
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        self.latest.lock().clone()
    }

    /// Clear stored results, both the local snapshot and the worker's
    /// retained copy
    ///
    /// # Errors
    /// [`EngineError::WorkerGone`] when the worker channel is closed.
    pub async fn reset(&self) -> Result<(), EngineError> {
        *self.latest.lock() = None;
        self.requests
            .send(WorkerRequest::Reset)
            .await
            .map_err(|_| EngineError::WorkerGone)
    }

    /// Is a run outstanding on this engine?
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the running flag however the run future ends
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Rank nodes of a snapshot by hit count, descending
#[must_use]
pub fn outcome_table(graph: &SimGraph, trials_completed: u64) -> Vec<Outcome> {
    let mut rows: Vec<Outcome> = graph
        .nodes()
        .map(|node| Outcome {
            id: node.id.clone(),
            label: node.label.clone(),
            hits: node.hits,
            fraction: if trials_completed == 0 {
                0.0
            } else {
                node.hits as f64 / trials_completed as f64
            },
        })
        .collect();
    rows.sort_by(|a, b| b.hits.cmp(&a.hits).then_with(|| a.id.cmp(&b.id)));
    rows
}
