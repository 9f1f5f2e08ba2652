//! Run loop / orchestrator
//!
//! Drives a batch of sequential trials, emitting snapshots on an
//! exponential checkpoint schedule and honoring cooperative, per-run
//! cancellation. Cancellation is checked only between trials, so a
//! trial always runs to completion once started.

use crate::rng::UniformSource;
use crate::trial::run_trial;
use crate::worker::{Snapshot, WorkerReply};
use raygraph_model::{prepare, SimGraph};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Longest gap between two progress snapshots, in trials
pub const MAX_CHECKPOINT_INTERVAL: u64 = 16_384;

/// How often the loop yields to the scheduler between checkpoints,
/// keeping the worker responsive to `Stop` on any runtime flavor
const YIELD_INTERVAL: u64 = 1_024;

/// Checkpoint schedule: trial 1, then doubling (2, 4, 8, ...) until the
/// gap reaches [`MAX_CHECKPOINT_INTERVAL`], then that fixed interval.
#[derive(Debug, Clone)]
pub struct CheckpointSchedule {
    next: u64,
}

impl CheckpointSchedule {
    /// Schedule with the first checkpoint at trial 1
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Is a checkpoint due at this completed-trial count?
    #[inline]
    #[must_use]
    pub fn is_due(&self, trials_completed: u64) -> bool {
        trials_completed == self.next
    }

    /// Move to the next checkpoint
    pub fn advance(&mut self) {
        if self.next < MAX_CHECKPOINT_INTERVAL {
            self.next *= 2;
        } else {
            self.next += MAX_CHECKPOINT_INTERVAL;
        }
    }
}

impl Default for CheckpointSchedule {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation handle for one run
///
/// Owned by the run it was created for; no process-wide flags. Setting
/// it stops the run at the next trial boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Fresh, un-cancelled handle
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation at the next trial boundary
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Has cancellation been requested?
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a finished (or stopped) batch produced
#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    /// Trials actually completed
    pub trials_completed: u64,
    /// Nodes processed across all completed trials
    pub total_visits: u64,
    /// True when the run was cancelled before reaching its trial count
    pub stopped: bool,
}

/// Run a batch of trials, streaming snapshots over `tx`
///
/// Normalizes the graph exactly once, then runs up to `trials`
/// sequential trials. A snapshot is emitted at every due checkpoint and
/// once more after the final trial; a stopped run's last snapshot is
/// tagged `stopped`. Trial counts across snapshots are strictly
/// increasing, except that a cancellation arriving just after a
/// checkpoint snapshot repeats that count on the stopped marker.
/// Returns the graph (with live counters) so the worker can answer
/// later result requests.
pub(crate) async fn run_batch(
    mut graph: SimGraph,
    trials: u64,
    frontier_cap: u64,
    cancel: CancelHandle,
    tx: mpsc::Sender<WorkerReply>,
    mut rng: impl UniformSource,
) -> (SimGraph, RunOutcome) {
    prepare(&mut graph);

    let mut schedule = CheckpointSchedule::new();
    let mut traced = 0u64;
    let mut total_visits = 0u64;
    let mut stopped = false;
    let mut stopped_emitted = false;
    let mut last_emitted: Option<u64> = None;

    while traced < trials {
        if cancel.is_cancelled() {
            stopped = true;
            break;
        }

        traced += 1;
        total_visits += run_trial(&mut graph, frontier_cap, &mut rng);

        if schedule.is_due(traced) {
            // Cancellation seen at a due checkpoint folds into that
            // checkpoint's snapshot; no duplicate-count repeat follows.
            stopped = cancel.is_cancelled();
            schedule.advance();
            emit(&tx, &graph, traced, total_visits, stopped).await;
            last_emitted = Some(traced);
            if stopped {
                stopped_emitted = true;
                break;
            }
            tokio::task::yield_now().await;
        } else if traced % YIELD_INTERVAL == 0 {
            tokio::task::yield_now().await;
        }
    }

    // Terminal snapshot: the final trial count if no checkpoint already
    // carried it, or the stopped marker when cancellation landed in the
    // narrow window right after a checkpoint snapshot went out (the one
    // case where a count repeats).
    if last_emitted != Some(traced) {
        emit(&tx, &graph, traced, total_visits, stopped).await;
    } else if stopped && !stopped_emitted {
        emit(&tx, &graph, traced, total_visits, true).await;
    }

    tracing::debug!(traced, total_visits, stopped, "batch finished");

    (
        graph,
        RunOutcome {
            trials_completed: traced,
            total_visits,
            stopped,
        },
    )
}

async fn emit(
    tx: &mpsc::Sender<WorkerReply>,
    graph: &SimGraph,
    trials_completed: u64,
    total_visits: u64,
    stopped: bool,
) {
    // A receiver that hung up is not an error; the run just keeps going.
    let _ = tx
        .send(WorkerReply::Progress(Snapshot {
            graph: graph.clone(),
            trials_completed,
            total_visits,
            stopped,
        }))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SequenceSource;
    use raygraph_model::{build_graph, NodeSpec};

    #[test]
    fn schedule_doubles_then_caps() {
        let mut schedule = CheckpointSchedule::new();
        let mut points = Vec::new();
        let mut trial = 1u64;
        while points.len() < 18 {
            if schedule.is_due(trial) {
                points.push(trial);
                schedule.advance();
            }
            trial += 1;
        }

        assert_eq!(
            &points[..16],
            &[1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768]
        );
        // After the doubling phase the gap stays at 16384
        assert_eq!(points[16] - points[15], MAX_CHECKPOINT_INTERVAL);
        assert_eq!(points[17] - points[16], MAX_CHECKPOINT_INTERVAL);
    }

    #[tokio::test]
    async fn checkpoints_then_final_snapshot() {
        let graph = build_graph(&[NodeSpec::leaf("only", "Only")], &[]).unwrap();
        let (tx, mut rx) = mpsc::channel(64);

        let (_, outcome) = run_batch(
            graph,
            10,
            0,
            CancelHandle::new(),
            tx,
            SequenceSource::new(vec![0.5]),
        )
        .await;

        assert_eq!(outcome.trials_completed, 10);
        assert_eq!(outcome.total_visits, 10);
        assert!(!outcome.stopped);

        let mut counts = Vec::new();
        while let Ok(reply) = rx.try_recv() {
            let WorkerReply::Progress(snap) = reply else {
                panic!("run_batch only emits progress");
            };
            assert!(!snap.stopped);
            counts.push(snap.trials_completed);
        }
        assert_eq!(counts, vec![1, 2, 4, 8, 10]);
    }

    #[tokio::test]
    async fn no_duplicate_snapshot_when_final_trial_is_a_checkpoint() {
        let graph = build_graph(&[NodeSpec::leaf("only", "Only")], &[]).unwrap();
        let (tx, mut rx) = mpsc::channel(64);

        run_batch(
            graph,
            8,
            0,
            CancelHandle::new(),
            tx,
            SequenceSource::new(vec![0.5]),
        )
        .await;

        let mut counts = Vec::new();
        while let Ok(WorkerReply::Progress(snap)) = rx.try_recv() {
            counts.push(snap.trials_completed);
        }
        assert_eq!(counts, vec![1, 2, 4, 8]);
    }

    /// Cancels its own run after a fixed number of draws; one draw is
    /// consumed per processed node.
    struct CancelAfterDraws {
        inner: SequenceSource,
        remaining: u64,
        cancel: CancelHandle,
    }

    impl crate::rng::UniformSource for CancelAfterDraws {
        fn next_f64(&mut self) -> f64 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.cancel.cancel();
            }
            self.inner.next_f64()
        }
    }

    #[tokio::test]
    async fn stop_at_a_checkpoint_folds_into_its_snapshot() {
        let graph = build_graph(&[NodeSpec::leaf("only", "Only")], &[]).unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let cancel = CancelHandle::new();

        // Cancellation lands during trial 4, itself a checkpoint: the
        // checkpoint snapshot carries the stopped tag and no repeated
        // count follows.
        let rng = CancelAfterDraws {
            inner: SequenceSource::new(vec![0.5]),
            remaining: 4,
            cancel: cancel.clone(),
        };
        let (_, outcome) = run_batch(graph, 100, 0, cancel, tx, rng).await;

        assert!(outcome.stopped);
        assert_eq!(outcome.trials_completed, 4);

        let mut counts = Vec::new();
        let mut tags = Vec::new();
        while let Ok(WorkerReply::Progress(snap)) = rx.try_recv() {
            counts.push(snap.trials_completed);
            tags.push(snap.stopped);
        }
        assert_eq!(counts, vec![1, 2, 4]);
        assert_eq!(tags, vec![false, false, true]);
        assert!(counts.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn pre_cancelled_run_emits_stopped_snapshot() {
        let graph = build_graph(&[NodeSpec::leaf("only", "Only")], &[]).unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let cancel = CancelHandle::new();
        cancel.cancel();

        let (_, outcome) =
            run_batch(graph, 100, 0, cancel, tx, SequenceSource::new(vec![0.5])).await;

        assert!(outcome.stopped);
        assert_eq!(outcome.trials_completed, 0);

        let Ok(WorkerReply::Progress(snap)) = rx.try_recv() else {
            panic!("expected a stopped snapshot");
        };
        assert!(snap.stopped);
        assert!(rx.try_recv().is_err(), "stopped snapshot is terminal");
    }

    #[tokio::test]
    async fn snapshot_counters_are_live_and_cumulative() {
        let graph = build_graph(&[NodeSpec::leaf("only", "Only")], &[]).unwrap();
        let (tx, mut rx) = mpsc::channel(64);

        run_batch(
            graph,
            6,
            0,
            CancelHandle::new(),
            tx,
            SequenceSource::new(vec![0.5]),
        )
        .await;

        let mut last_hits = 0;
        while let Ok(WorkerReply::Progress(snap)) = rx.try_recv() {
            let hits = snap.graph.node(snap.graph.root()).hits;
            assert_eq!(hits, snap.trials_completed);
            assert!(hits > last_hits, "counters never reset between snapshots");
            last_hits = hits;
        }
        assert_eq!(last_hits, 6);
    }
}
