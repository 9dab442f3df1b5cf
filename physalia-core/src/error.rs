//! Structured error types for the Physalia toolkit.

use thiserror::Error;

/// Unified error type for all Physalia operations.
///
/// Routine data-quality rejections (a hit below the coverage threshold, a
/// sub-range collapsing under the minimum length) are not errors — they are
/// silent filtering at the component boundary. Only the categories below
/// surface to callers.
#[derive(Debug, Error)]
pub enum PhysaliaError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed input data)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values, mismatched dimensions)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Allocation failure while growing internal state
    #[error("out of memory: {0}")]
    Resource(String),

    /// Internal invariant violation — indicates a bug, not bad input
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the Physalia crates.
pub type Result<T> = std::result::Result<T, PhysaliaError>;
