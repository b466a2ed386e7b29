//! Domain error types.
//!
//! These errors represent validation failures in the trip model. They are
//! distinct from Trip API and provider errors.

/// Domain-level errors for validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// A location is missing its address or has unusable coordinates
    #[error("invalid location: {0}")]
    InvalidLocation(&'static str),

    /// A required field was not supplied
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A stop does not belong to the trip it is being placed in
    #[error("stop {stop} belongs to trip {found}, expected {expected}")]
    ForeignStop {
        stop: String,
        found: String,
        expected: String,
    },

    /// A stop sequence contains the same stop or address twice
    #[error("duplicate stop in sequence: {0}")]
    DuplicateInSequence(String),
}
