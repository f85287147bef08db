//! Error types for the simulation engine.
//!
//! Only conditions the caller has to act on are errors. Recoverable situations
//! during a generation turnover (empty population, no positive fitness, no
//! parents) are reported as [`super::events::SimulationEvent`]s instead.

use kdtree::ErrorKind as KdTreeError;
use thiserror::Error;

/// Errors produced by the simulation engine.
#[derive(Debug, Error)]
pub enum SimError {
    /// Two controllers of different topology were combined.
    #[error("controller shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// Layer shapes `(hidden, output)` of the first parent.
        expected: ((usize, usize), (usize, usize)),
        /// Layer shapes `(hidden, output)` of the second parent.
        found: ((usize, usize), (usize, usize)),
    },

    /// A parameter set failed validation.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The food index rejected a position.
    #[error("spatial index error: {0:?}")]
    Spatial(KdTreeError),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<KdTreeError> for SimError {
    fn from(err: KdTreeError) -> Self {
        SimError::Spatial(err)
    }
}

/// Result alias used throughout the simulation modules.
pub type Result<T> = std::result::Result<T, SimError>;
