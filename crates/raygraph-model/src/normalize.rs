//! Normalizer
//!
//! Rescales every reachable node's branch weights (plus its residual
//! error term) into a proper probability distribution and zeroes all
//! hit counters. Runs exactly once before a batch of trials, never
//! between trials.

use crate::graph::{NodeIdx, SimGraph};
use std::collections::{HashSet, VecDeque};

/// Tolerance used when deciding a distribution already sums to 1
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Prepare a graph for a batch of trials
///
/// Breadth-first from the root with a visited set, so shared nodes and
/// cycles are each processed once. Per node:
/// - `total = sum(branch weights) + error_term`
/// - `total <= 0`: every branch gets `1 / branch_count` and the error
///   term drops to zero (degenerate input, defined fallback)
/// - otherwise every weight and the error term are divided by `total`
///
/// Idempotent: re-running on an already-normalized graph changes
/// nothing beyond the counter reset.
pub fn prepare(graph: &mut SimGraph) {
    let mut queue: VecDeque<NodeIdx> = VecDeque::new();
    let mut visited: HashSet<NodeIdx> = HashSet::new();
    queue.push_back(graph.root());

    while let Some(idx) = queue.pop_front() {
        if !visited.insert(idx) {
            continue;
        }

        let node = graph.node_mut(idx);
        let total: f64 = node.branches.iter().map(|b| b.weight).sum::<f64>() + node.error_term;

        if node.branches.is_empty() {
            // Absorbing leaf: nothing to distribute
            node.error_term = 0.0;
        } else if total <= 0.0 {
            let equal = 1.0 / node.branches.len() as f64;
            for branch in &mut node.branches {
                branch.weight = equal;
            }
            node.error_term = 0.0;
        } else {
            for branch in &mut node.branches {
                branch.weight /= total;
            }
            node.error_term /= total;
        }

        node.hits = 0;
        for branch in &mut node.branches {
            branch.hits = 0;
            queue.extend(branch.next.iter().copied());
        }
    }
}
