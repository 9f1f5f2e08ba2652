//! Arena graph traversed by the simulation engine
//!
//! Nodes live in a flat arena and reference each other through dense
//! [`NodeIdx`] indices, never through shared pointers. A node reachable
//! along several paths (diamond shapes) is a single arena entry; cycles
//! are representable and bounded at trial time by the frontier cap.
//!
//! The whole arena is `Clone + Serialize`, which is what lets a
//! progress snapshot cross the worker boundary by value.

use serde::{Deserialize, Serialize};

/// Dense index of a node inside a [`SimGraph`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIdx(pub u32);

impl NodeIdx {
    /// Index as usize for arena access
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One weighted branch out of a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Output handle id this branch was built from
    pub id: String,
    /// Display label
    pub label: String,
    /// Probability mass; rescaled in place by [`crate::prepare`]
    pub weight: f64,
    /// Times this branch was taken during trials
    pub hits: u64,
    /// Successor nodes, all of which are reached when the branch is taken
    pub next: Vec<NodeIdx>,
}

/// One branch point of the canonical graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimNode {
    /// Stable id from the editor
    pub id: String,
    /// Display label
    pub label: String,
    /// Ordered branches; order defines the cumulative-distribution
    /// boundaries used for sampling and must never be reordered
    pub branches: Vec<Branch>,
    /// Residual uncertainty mass; when sampled, degrades to a uniform
    /// pick among the branches
    pub error_term: f64,
    /// Times this node was reached during trials
    pub hits: u64,
}

/// The canonical probability graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimGraph {
    nodes: Vec<SimNode>,
    root: NodeIdx,
}

impl SimGraph {
    /// Assemble a graph from an arena and a root index
    ///
    /// Callers are expected to come through [`crate::build_graph`];
    /// this is exposed for tests and hosts that build arenas directly.
    #[must_use]
    pub fn from_parts(nodes: Vec<SimNode>, root: NodeIdx) -> Self {
        debug_assert!(root.index() < nodes.len());
        Self { nodes, root }
    }

    /// Root node index
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeIdx {
        self.root
    }

    /// Number of nodes in the arena
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node by arena index
    #[inline]
    #[must_use]
    pub fn node(&self, idx: NodeIdx) -> &SimNode {
        &self.nodes[idx.index()]
    }

    /// Mutable node by arena index
    #[inline]
    pub fn node_mut(&mut self, idx: NodeIdx) -> &mut SimNode {
        &mut self.nodes[idx.index()]
    }

    /// All nodes in arena order
    #[inline]
    pub fn nodes(&self) -> impl Iterator<Item = &SimNode> {
        self.nodes.iter()
    }

    /// Arena index of the node with the given editor id
    #[must_use]
    pub fn find_node(&self, id: &str) -> Option<NodeIdx> {
        self.nodes
            .iter()
            .position(|n| n.id == id)
            .map(|i| NodeIdx(i as u32))
    }

    /// Sum of node hit counters across the arena
    #[must_use]
    pub fn total_hits(&self) -> u64 {
        self.nodes.iter().map(|n| n.hits).sum()
    }

    /// Zero every node and branch hit counter
    pub fn reset_hits(&mut self) {
        for node in &mut self.nodes {
            node.hits = 0;
            for branch in &mut node.branches {
                branch.hits = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str) -> SimNode {
        SimNode {
            id: id.to_string(),
            label: id.to_string(),
            branches: Vec::new(),
            error_term: 0.0,
            hits: 0,
        }
    }

    #[test]
    fn find_node_by_editor_id() {
        let graph = SimGraph::from_parts(vec![leaf("a"), leaf("b")], NodeIdx(0));
        assert_eq!(graph.find_node("b"), Some(NodeIdx(1)));
        assert_eq!(graph.find_node("missing"), None);
    }

    #[test]
    fn reset_hits_clears_nodes_and_branches() {
        let mut root = leaf("root");
        root.hits = 5;
        root.branches.push(Branch {
            id: "o1".into(),
            label: "out".into(),
            weight: 1.0,
            hits: 3,
            next: vec![NodeIdx(1)],
        });
        let mut graph = SimGraph::from_parts(vec![root, leaf("leaf")], NodeIdx(0));
        graph.node_mut(NodeIdx(1)).hits = 7;

        graph.reset_hits();

        assert_eq!(graph.total_hits(), 0);
        assert_eq!(graph.node(NodeIdx(0)).branches[0].hits, 0);
    }

    #[test]
    fn snapshot_clone_is_independent() {
        let mut graph = SimGraph::from_parts(vec![leaf("a")], NodeIdx(0));
        let snapshot = graph.clone();
        graph.node_mut(NodeIdx(0)).hits = 42;
        assert_eq!(snapshot.node(NodeIdx(0)).hits, 0);
    }

    #[test]
    fn graph_round_trips_through_json() {
        let graph = SimGraph::from_parts(vec![leaf("a"), leaf("b")], NodeIdx(1));
        let json = serde_json::to_string(&graph).unwrap();
        let back: SimGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.root(), NodeIdx(1));
        assert_eq!(back.node_count(), 2);
    }
}
