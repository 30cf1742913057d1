//! Node-graph evaluator for procedural terrain previews.
//!
//! An editor hands over a snapshot of operator nodes and connections; the
//! evaluator resolves the output node's dependencies and returns a
//! row-major heightmap. See [`eval::evaluate_heightmap`].

pub mod commands;
pub mod config;
pub mod error;
pub mod eval;
pub mod telemetry;

pub use error::{EvalError, Result};
