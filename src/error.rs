//! Error types for the reverse sweep and the checkpoint scheduler.
//!
//! Configuration errors are raised before any sweep work starts. Consistency
//! errors abort a sweep part-way and point at a malformed trace rather than at
//! bad caller input. Numeric degeneracies (division by zero, domain errors)
//! are never reported here: they flow through the derivatives as NaN/∞.

use thiserror::Error;

use crate::trace::Location;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AdError>;

/// Top-level error type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdError {
    /// Derivative order outside `[1, max]` (or tensor rank above `max`).
    #[error("invalid derivative order {order}: must be between 1 and {max}")]
    InvalidOrder { order: usize, max: usize },

    /// Any other rejected configuration value.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Caller-supplied array has the wrong length.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The trace violates an invariant the sweep relies on.
    #[error("trace consistency violation: {0}")]
    Consistency(#[from] ConsistencyError),

    /// A conditional loop did not terminate within the configured bound.
    #[error("iteration limit of {limit} reached before the loop condition became false")]
    IterationLimit { limit: usize },

    /// Checkpoint storage exceeded its budget.
    #[error(
        "checkpoint limit of {limit} exceeded with min_ops_per_checkpoint = {min_ops_per_checkpoint}; \
         raise min_ops_per_checkpoint to store fewer checkpoints"
    )]
    CheckpointLimit {
        limit: usize,
        min_ops_per_checkpoint: usize,
    },
}

/// Internal-consistency failures detected during a sweep.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// A record's result does not come strictly after its operands and
    /// the previous record's result.
    #[error("record {record} defines location {location} out of order")]
    NonMonotonic { record: usize, location: Location },

    /// A location referenced by a record or a seed is not defined by the trace.
    #[error("location {location} is not defined by the trace")]
    UnknownLocation { location: Location },

    /// A non-independent location still holds derivative weight after the sweep.
    #[error("location {location} is still live after the sweep but is not an independent")]
    Undrained { location: Location },

    /// A derivative entry refers to a location with no independent index.
    #[error("location {location} has no independent index")]
    Untranslatable { location: Location },

    /// Replaying an iteration segment took a different path than the forward pass.
    #[error("replay of iteration {iteration} diverged from the forward pass")]
    ReplayDiverged { iteration: usize },
}

impl AdError {
    /// True for errors raised before any sweep work (bad caller configuration).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AdError::InvalidOrder { .. }
                | AdError::InvalidConfig { .. }
                | AdError::DimensionMismatch { .. }
        )
    }

    /// True for malformed-trace failures.
    pub fn is_consistency(&self) -> bool {
        matches!(self, AdError::Consistency(_))
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        AdError::InvalidConfig {
            message: message.into(),
        }
    }
}
