//! Store error types.

use crate::api::ApiError;
use crate::domain::{DomainError, StopId, TripId};

use super::pending::OperationKind;

/// Errors returned by [`TripStateStore`](super::TripStateStore) operations.
///
/// None of these leave a partial mutation behind: local state is only
/// written once the Trip API has confirmed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Input rejected before any network call
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The operation needs an active trip and there is none
    #[error("no active trip")]
    NoActiveTrip,

    /// The trip is not in the local snapshot
    #[error("trip not found: {0}")]
    TripNotFound(TripId),

    /// The stop is not in the local snapshot
    #[error("stop not found: {0}")]
    StopNotFound(StopId),

    /// The Trip API call failed; local state is unchanged
    #[error("{operation} failed for {id}: {source}")]
    Api {
        operation: OperationKind,
        id: String,
        #[source]
        source: ApiError,
    },
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        let (field, reason) = match err {
            DomainError::InvalidLocation(reason) => ("location", reason.to_string()),
            DomainError::MissingField(field) => (field, "value is required".to_string()),
            other => ("stops", other.to_string()),
        };
        StoreError::Validation { field, reason }
    }
}
