//! Error types for distance computations and their host surfaces.

use thiserror::Error;

/// Errors raised while validating parameters or moving data in and out of
/// the distance core.
///
/// Nothing in here is produced by the distance computation itself: a pair
/// that exceeds the ceiling or contains a missing element is reported through
/// the result value, not through an error.
#[derive(Debug, Error)]
pub enum DistanceError {
    /// One side of a batch has no elements, so recycling has nothing to cycle over.
    #[error("{side} batch is empty; both batches need at least one element")]
    EmptyBatch { side: &'static str },

    /// The weight vector does not have exactly four entries.
    #[error("expected 4 weights (deletion, insertion, substitution, transposition), got {0}")]
    WeightCount(usize),

    /// A weight is negative, infinite or NaN.
    #[error("{operation} weight must be finite and non-negative, got {value}")]
    InvalidWeight {
        operation: &'static str,
        value: f64,
    },

    /// The ceiling is negative, infinite or NaN.
    #[error("maximum distance must be finite and non-negative, got {0}")]
    InvalidMaxDistance(f64),

    /// A host value could not be read as a symbol.
    #[error("element {index}: {reason}")]
    InvalidSymbol { index: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, DistanceError>;
