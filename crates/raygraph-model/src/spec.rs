//! Wire types for the editor collaborator
//!
//! These mirror what the visual graph editor hands the engine: a node
//! list with declared outputs and an edge list keyed by output handle.
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// How an output's probability mass is expressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputKind {
    /// A plain numeric probability
    #[default]
    Probability,
    /// An equation string evaluated to a number
    Equation,
    /// A function body evaluated to a number
    Function,
}

/// One declared output of an editor node
///
/// Exactly one of `probability`, `equation`, `function_body` is
/// normally set; `kind` says which one the editor intends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    /// Output handle id (edges reference this)
    pub id: String,
    /// Display label
    pub label: String,
    /// Numeric probability mass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    /// Equation source, evaluated at build time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equation: Option<String>,
    /// Function body source, evaluated at build time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_body: Option<String>,
    /// Which of the three fields carries the weight
    #[serde(default)]
    pub kind: OutputKind,
}

impl OutputSpec {
    /// Output with a plain numeric probability
    #[must_use]
    pub fn with_probability(id: impl Into<String>, label: impl Into<String>, p: f64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            probability: Some(p),
            equation: None,
            function_body: None,
            kind: OutputKind::Probability,
        }
    }

    /// Resolve this output's weight
    ///
    /// Evaluation failures, non-finite and negative values all sanitize
    /// to `0.0`: the branch becomes unreachable but the rest of the
    /// graph still runs.
    #[must_use]
    pub fn weight(&self) -> f64 {
        let raw = match self.kind {
            OutputKind::Probability => self.probability,
            OutputKind::Equation => self.equation.as_deref().and_then(eval_numeric),
            OutputKind::Function => self.function_body.as_deref().and_then(eval_numeric),
        };
        // Fall back across fields for editors that only fill one of them
        let raw = raw
            .or(self.probability)
            .or_else(|| self.equation.as_deref().and_then(eval_numeric))
            .or_else(|| self.function_body.as_deref().and_then(eval_numeric));

        match raw {
            Some(w) if w.is_finite() && w >= 0.0 => w,
            Some(w) => {
                tracing::warn!(output = %self.id, value = w, "invalid weight, using 0");
                0.0
            }
            None => {
                tracing::warn!(output = %self.id, "weight did not evaluate, using 0");
                0.0
            }
        }
    }
}

/// Evaluate an equation/function-body string to a number
///
/// Only numeric literals are accepted; the editor is expected to
/// pre-evaluate anything richer before handing the graph over.
fn eval_numeric(src: &str) -> Option<f64> {
    src.trim().parse::<f64>().ok()
}

/// One editor node: identity, label, declared outputs, residual mass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Stable node id
    pub id: String,
    /// Display label
    pub label: String,
    /// Ordered outputs; order defines sampling boundaries
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
    /// Residual uncertainty mass never assigned to an output
    #[serde(default)]
    pub error_term: f64,
}

impl NodeSpec {
    /// Node with no outputs (absorbing leaf)
    #[must_use]
    pub fn leaf(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            outputs: Vec::new(),
            error_term: 0.0,
        }
    }

    /// Add an output, preserving declaration order
    #[must_use]
    pub fn with_output(mut self, output: OutputSpec) -> Self {
        self.outputs.push(output);
        self
    }

    /// Set the residual uncertainty mass
    #[must_use]
    pub fn with_error_term(mut self, error_term: f64) -> Self {
        self.error_term = error_term;
        self
    }
}

/// One directed edge: `source`'s output handle to `target`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    /// Edge id (unused by the engine, kept for round-tripping)
    #[serde(default)]
    pub id: String,
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Which of the source's outputs this edge leaves from
    pub source_output_id: String,
}

impl EdgeSpec {
    /// Edge from a node's output handle to a target node
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        source_output_id: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            source: source.into(),
            target: target.into(),
            source_output_id: source_output_id.into(),
        }
    }
}

/// Run configuration for a batch of trials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Number of independent trials ("rays") to run
    pub trials: u64,
    /// Maximum nodes processed per trial; 0 = unbounded.
    /// Bounds traversal length on cyclic graphs.
    #[serde(default)]
    pub frontier_cap: u64,
    /// Reserved for parallel batch execution; a no-op today
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Variable-sweep parameters; carried but not yet exercised
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepConfig>,
}

fn default_workers() -> usize {
    1
}

impl RunConfig {
    /// Configuration with the given trial count and defaults elsewhere
    #[must_use]
    pub fn new(trials: u64) -> Self {
        Self {
            trials,
            frontier_cap: 0,
            workers: 1,
            sweep: None,
        }
    }

    /// Set the per-trial frontier cap (0 = unbounded)
    #[must_use]
    pub fn with_frontier_cap(mut self, cap: u64) -> Self {
        self.frontier_cap = cap;
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Variable-sweep parameters (unused configuration)
///
/// Present so hosts can persist sweep setups; no orchestration consumes
/// them yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepConfig {
    /// Variable name swept across steps
    pub variable: String,
    /// First value
    pub start: f64,
    /// Last value
    pub end: f64,
    /// Number of steps between start and end
    pub step_count: u32,
}
