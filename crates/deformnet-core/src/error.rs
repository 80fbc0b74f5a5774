//! Error types for deformnet.

use thiserror::Error;

/// Deformnet error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Mesh arrays are inconsistent with each other.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Node type code outside the one-hot range.
    #[error("unknown node type code: {0}")]
    UnknownNodeType(u32),

    /// Loss requested on a mesh without `target|world_pos`.
    #[error("mesh has no target world positions")]
    MissingTarget,

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
