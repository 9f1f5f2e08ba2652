//! Branch sampler
//!
//! Inverse-CDF selection over a node's ordered branch list. The walk
//! accumulates branch weights and returns the first index whose
//! cumulative sum exceeds the draw (`u < cumulative`, half-open). When
//! the walk exhausts the list, the draw landed in the node's residual
//! error-term mass: the "uncertainty" outcome degrades to an unweighted
//! coin-flip among the modeled branches.

use crate::rng::UniformSource;
use raygraph_model::SimNode;

/// Pick one outgoing branch of `node` for the uniform draw `u`
///
/// Returns `None` only for nodes with no branches (absorbing leaves).
/// The fallback pick consumes one fresh draw from `rng`.
pub fn sample_branch(node: &SimNode, u: f64, rng: &mut impl UniformSource) -> Option<usize> {
    if node.branches.is_empty() {
        return None;
    }

    let mut cumulative = 0.0;
    for (i, branch) in node.branches.iter().enumerate() {
        cumulative += branch.weight;
        if u < cumulative {
            return Some(i);
        }
    }

    // Residual error-term mass: uniform pick among the branches
    let pick = (rng.next_f64() * node.branches.len() as f64) as usize;
    Some(pick.min(node.branches.len() - 1))
}
