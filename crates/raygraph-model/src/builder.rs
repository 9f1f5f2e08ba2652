//! Graph builder
//!
//! Converts the editor's node and edge lists into a canonical
//! [`SimGraph`]. Every declared output becomes exactly one branch, in
//! declaration order; edges wire branch successor lists by output
//! handle. Malformed edges are dropped with a warning rather than
//! failing the build.
//!
//! Root policy: the root is the first node in input order with no
//! incoming edge. If every node has an incoming edge (fully cyclic
//! input), the first node in input order is used.

use crate::error::GraphError;
use crate::graph::{Branch, NodeIdx, SimGraph, SimNode};
use crate::spec::{EdgeSpec, NodeSpec};
use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashMap;

/// Build a canonical graph from editor node and edge lists
///
/// The input is read-only; the returned graph is a fresh arena owned by
/// the caller (and handed to the worker for the run's duration).
///
/// # Errors
/// - [`GraphError::EmptyGraph`] when `nodes` is empty
/// - [`GraphError::DuplicateNode`] when two nodes share an id
pub fn build_graph(nodes: &[NodeSpec], edges: &[EdgeSpec]) -> Result<SimGraph, GraphError> {
    if nodes.is_empty() {
        return Err(GraphError::EmptyGraph);
    }

    // Arena slots in input order; editor id -> arena index
    let mut index_of: HashMap<&str, NodeIdx> = HashMap::with_capacity(nodes.len());
    for (i, spec) in nodes.iter().enumerate() {
        if index_of.insert(&spec.id, NodeIdx(i as u32)).is_some() {
            return Err(GraphError::DuplicateNode(spec.id.clone()));
        }
    }

    let mut arena: Vec<SimNode> = nodes
        .iter()
        .map(|spec| SimNode {
            id: spec.id.clone(),
            label: spec.label.clone(),
            branches: spec
                .outputs
                .iter()
                .map(|out| Branch {
                    id: out.id.clone(),
                    label: out.label.clone(),
                    weight: out.weight(),
                    hits: 0,
                    next: Vec::new(),
                })
                .collect(),
            error_term: spec.error_term.max(0.0),
            hits: 0,
        })
        .collect();

    // Node-level connectivity, used for root detection and diagnostics
    let mut connectivity: DiGraphMap<u32, ()> = DiGraphMap::new();
    for idx in 0..arena.len() as u32 {
        connectivity.add_node(idx);
    }

    for edge in edges {
        let Some(&source) = index_of.get(edge.source.as_str()) else {
            tracing::warn!(edge = %edge.id, source = %edge.source, "dropping edge: unknown source");
            continue;
        };
        let Some(&target) = index_of.get(edge.target.as_str()) else {
            tracing::warn!(edge = %edge.id, target = %edge.target, "dropping edge: unknown target");
            continue;
        };

        let node = &mut arena[source.index()];
        let Some(branch) = node
            .branches
            .iter_mut()
            .find(|b| b.id == edge.source_output_id)
        else {
            tracing::warn!(
                edge = %edge.id,
                source = %edge.source,
                output = %edge.source_output_id,
                "dropping edge: no matching output"
            );
            continue;
        };

        branch.next.push(target);
        connectivity.add_edge(source.0, target.0, ());
    }

    let root = select_root(&arena, &connectivity);

    if is_cyclic_directed(&connectivity) {
        tracing::warn!("graph contains cycles; set a frontier cap to bound trials");
    }

    Ok(SimGraph::from_parts(arena, root))
}

/// First node in input order with no incoming edge; falls back to the
/// first node when the input is fully cyclic.
fn select_root(arena: &[SimNode], connectivity: &DiGraphMap<u32, ()>) -> NodeIdx {
    let roots: Vec<u32> = (0..arena.len() as u32)
        .filter(|&idx| {
            connectivity
                .neighbors_directed(idx, petgraph::Direction::Incoming)
                .next()
                .is_none()
        })
        .collect();

    match roots.as_slice() {
        [] => {
            tracing::warn!(root = %arena[0].id, "no entry node; using first node in input order");
            NodeIdx(0)
        }
        [only] => NodeIdx(*only),
        [first, ..] => {
            tracing::warn!(
                candidates = roots.len(),
                chosen = %arena[*first as usize].id,
                "multiple entry nodes; using first in input order"
            );
            NodeIdx(*first)
        }
    }
}
