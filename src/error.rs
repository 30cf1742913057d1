//! Error types surfaced by the evaluator and its preview surface.
//!
//! Graph-shape anomalies (cycles, dangling references, missing outputs) are
//! absorbed by the evaluator and never appear here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Debug, Error)]
pub enum EvalError {
    /// Zero, negative or overflowing grid size.
    #[error("invalid grid dimensions {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    /// The caller's `CancelToken` fired mid-evaluation.
    #[error("evaluation cancelled")]
    Cancelled,

    /// Malformed JSON request at the preview surface.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::InvalidRequest(err.to_string())
    }
}
