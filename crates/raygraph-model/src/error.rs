//! Graph construction errors
//!
//! Reported synchronously by the builder, before any run starts.
//! Dangling edges are not errors; they are dropped with a warning.

/// Errors surfaced while converting editor state into a [`crate::SimGraph`]
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    /// The editor produced no nodes at all
    #[error("graph has no nodes")]
    EmptyGraph,

    /// Two nodes share the same id
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
}
