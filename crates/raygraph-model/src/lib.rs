//! Canonical probability-graph model
//!
//! The in-memory representation shared by the editor-facing builder and
//! the simulation engine:
//! - [`spec`]: wire types the visual editor produces (node/edge lists,
//!   run configuration)
//! - [`graph`]: the arena graph the engine traverses
//! - [`builder`]: node+edge lists -> canonical [`graph::SimGraph`]
//! - [`normalize`]: rescale branch weights to a probability distribution
//!
//! The graph is an arena addressed by dense indices rather than shared
//! references, so a snapshot can be cloned and sent across a channel
//! without aliasing the worker's copy.

pub mod builder;
pub mod error;
pub mod graph;
pub mod normalize;
pub mod spec;

pub use builder::build_graph;
pub use error::GraphError;
pub use graph::{Branch, NodeIdx, SimGraph, SimNode};
pub use normalize::prepare;
pub use spec::{EdgeSpec, NodeSpec, OutputKind, OutputSpec, RunConfig, SweepConfig};
