//! Trial executor
//!
//! One trial ("ray") is a frontier-bounded breadth-first traversal of
//! the graph. The frontier counter counts nodes *processed*, not nodes
//! enqueued, and exists to bound traversal length on cyclic graphs.
//!
//! Hit counters record how many times a node was *reached*: seeding the
//! root counts as a reach, and every successor is counted at enqueue
//! time. A node reached through two branches in the same sweep counts
//! twice. Counters accumulate across the whole batch; nothing resets
//! them between trials.

use crate::rng::UniformSource;
use crate::sampler::sample_branch;
use raygraph_model::{NodeIdx, SimGraph};
use std::collections::VecDeque;

/// Run one trial; returns the number of nodes processed
///
/// `frontier_cap` of 0 means unbounded.
pub fn run_trial(graph: &mut SimGraph, frontier_cap: u64, rng: &mut impl UniformSource) -> u64 {
    let cap = if frontier_cap == 0 {
        u64::MAX
    } else {
        frontier_cap
    };

    let mut frontier = 0u64;
    let mut queue: VecDeque<NodeIdx> = VecDeque::new();

    let root = graph.root();
    queue.push_back(root);
    graph.node_mut(root).hits += 1;

    while let Some(idx) = queue.pop_front() {
        if frontier >= cap {
            break;
        }
        frontier += 1;

        let u = rng.next_f64();
        let Some(choice) = sample_branch(graph.node(idx), u, rng) else {
            continue; // absorbing leaf
        };

        let branch = &mut graph.node_mut(idx).branches[choice];
        branch.hits += 1;
        let successors = branch.next.clone();

        for succ in successors {
            graph.node_mut(succ).hits += 1;
            queue.push_back(succ);
        }
    }

    frontier
}
