//! Concurrency boundary
//!
//! The run loop executes inside a dedicated worker task reachable only
//! through asynchronous messages; no shared memory crosses the
//! boundary. The graph moves into the worker by value with `Run` and
//! comes back only as cloned snapshots.
//!
//! Reply contract per run: zero or more `Progress`, then exactly one
//! terminal message, either `Done` or `Error`, never both. A run
//! cancelled by `Stop` ends with a `Progress` whose snapshot is tagged
//! `stopped`, and no `Done` follows.

use crate::rng::CryptoUniform;
use crate::runloop::{run_batch, CancelHandle, RunOutcome};
use futures::FutureExt;
use raygraph_model::SimGraph;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Point-in-time copy of the graph with live hit counts plus run
/// metadata
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Graph clone with cumulative hit counters
    pub graph: SimGraph,
    /// Trials completed when the snapshot was taken
    pub trials_completed: u64,
    /// Nodes processed across all completed trials
    pub total_visits: u64,
    /// True on the terminal snapshot of a cancelled run
    pub stopped: bool,
}

/// Caller -> worker messages
#[derive(Debug)]
pub enum WorkerRequest {
    /// Start a batch; replies flow back over `reply`
    Run {
        /// Graph the worker takes exclusive ownership of for the run
        graph: SimGraph,
        /// Number of trials to run
        trials: u64,
        /// Per-trial frontier cap; 0 = unbounded
        frontier_cap: u64,
        /// Per-run reply channel
        reply: mpsc::Sender<WorkerReply>,
    },
    /// Cancel the outstanding run at the next trial boundary
    Stop,
    /// Re-send the last completed snapshot, if any
    RequestResults {
        /// One-shot style reply channel; dropped unanswered when the
        /// worker has no completed snapshot yet
        reply: mpsc::Sender<WorkerReply>,
    },
    /// Forget the last completed snapshot
    Reset,
}

/// Worker -> caller messages
#[derive(Debug, Clone)]
pub enum WorkerReply {
    /// Periodic progress snapshot (zero or more per run)
    Progress(Snapshot),
    /// Run completed its configured trial count (terminal)
    Done,
    /// Run failed (terminal, mutually exclusive with `Done`)
    Error(String),
}

struct ActiveRun {
    cancel: CancelHandle,
    reply: mpsc::Sender<WorkerReply>,
    handle: JoinHandle<Result<(SimGraph, RunOutcome), Box<dyn std::any::Any + Send>>>,
}

/// Spawn the engine's worker task; the sender is its only doorway
pub(crate) fn spawn_worker() -> mpsc::Sender<WorkerRequest> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(worker_task(rx));
    tx
}

async fn worker_task(mut rx: mpsc::Receiver<WorkerRequest>) {
    let mut active: Option<ActiveRun> = None;
    let mut last: Option<(SimGraph, RunOutcome)> = None;

    loop {
        match active.take() {
            None => {
                let Some(msg) = rx.recv().await else {
                    break; // engine dropped, worker winds down
                };
                match msg {
                    WorkerRequest::Run {
                        graph,
                        trials,
                        frontier_cap,
                        reply,
                    } => {
                        tracing::debug!(trials, frontier_cap, "starting run");
                        let cancel = CancelHandle::new();
                        let fut = run_batch(
                            graph,
                            trials,
                            frontier_cap,
                            cancel.clone(),
                            reply.clone(),
                            CryptoUniform::new(),
                        );
                        // catch_unwind: a fault inside the run loop must
                        // surface as an Error reply, never take down the host
                        let handle = tokio::spawn(std::panic::AssertUnwindSafe(fut).catch_unwind());
                        active = Some(ActiveRun {
                            cancel,
                            reply,
                            handle,
                        });
                    }
                    WorkerRequest::Stop => {
                        tracing::debug!("stop with no outstanding run; ignored");
                    }
                    WorkerRequest::RequestResults { reply } => {
                        if let Some((graph, outcome)) = &last {
                            let _ = reply
                                .send(WorkerReply::Progress(Snapshot {
                                    graph: graph.clone(),
                                    trials_completed: outcome.trials_completed,
                                    total_visits: outcome.total_visits,
                                    stopped: outcome.stopped,
                                }))
                                .await;
                        }
                        // No completed run yet: drop the reply sender,
                        // the caller sees the channel close.
                    }
                    WorkerRequest::Reset => {
                        last = None;
                    }
                }
            }
            Some(mut run) => {
                tokio::select! {
                    result = &mut run.handle => {
                        match result {
                            Ok(Ok((graph, outcome))) => {
                                // A stopped run's terminal message is its
                                // stopped-tagged snapshot; Done only follows
                                // a run that reached its trial count.
                                if !outcome.stopped {
                                    let _ = run.reply.send(WorkerReply::Done).await;
                                }
                                last = Some((graph, outcome));
                            }
                            Ok(Err(panic)) => {
                                let description = describe_panic(panic.as_ref());
                                tracing::error!(%description, "run loop panicked");
                                let _ = run.reply.send(WorkerReply::Error(description)).await;
                            }
                            Err(join_err) => {
                                tracing::error!(error = %join_err, "run task failed");
                                let _ = run
                                    .reply
                                    .send(WorkerReply::Error(join_err.to_string()))
                                    .await;
                            }
                        }
                        // active stays None
                    }
                    msg = rx.recv() => {
                        match msg {
                            None => {
                                run.cancel.cancel();
                                let _ = run.handle.await;
                                break;
                            }
                            Some(WorkerRequest::Stop) => {
                                run.cancel.cancel();
                                active = Some(run);
                            }
                            Some(WorkerRequest::Run { reply, .. }) => {
                                // Overlap policy: reject, never queue
                                let _ = reply
                                    .send(WorkerReply::Error(
                                        "run already in progress".to_string(),
                                    ))
                                    .await;
                                active = Some(run);
                            }
                            Some(WorkerRequest::RequestResults { .. }) => {
                                // Mid-run there is no completed snapshot;
                                // the dropped sender tells the caller.
                                active = Some(run);
                            }
                            Some(WorkerRequest::Reset) => {
                                last = None;
                                active = Some(run);
                            }
                        }
                    }
                }
            }
        }
    }
}

fn describe_panic(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "run loop panicked".to_string()
    }
}
