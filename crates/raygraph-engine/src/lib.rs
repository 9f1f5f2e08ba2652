//! Monte Carlo simulation engine for probability graphs
//!
//! Runs repeated randomized traversals ("rays") of a
//! [`raygraph_model::SimGraph`] and streams progress snapshots back to
//! the caller. The run loop lives inside a background worker task; the
//! caller only ever talks to it through asynchronous messages, wrapped
//! by the [`SimEngine`] facade as a single awaitable operation.
//!
//! Pipeline: [`rng`] feeds [`sampler`], which [`trial`] drives once per
//! visited node; [`runloop`] batches trials and emits checkpointed
//! snapshots; [`worker`] hosts the loop behind the message protocol.

pub mod engine;
pub mod error;
pub mod rng;
pub mod runloop;
pub mod sampler;
pub mod trial;
pub mod worker;

pub use engine::{outcome_table, Outcome, RunSummary, SimEngine};
pub use error::EngineError;
pub use rng::{CryptoUniform, UniformSource};
pub use runloop::{CancelHandle, CheckpointSchedule};
pub use worker::{Snapshot, WorkerReply, WorkerRequest};
