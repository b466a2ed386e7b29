//! Cancellable background address lookups.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::Coordinates;

use super::client::{Geocoder, lookup_address};
use super::error::GeocodeError;

/// Default time budget for one lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A reverse geocode running on its own task.
///
/// Dropping or cancelling the handle never affects trip state; callers
/// that stop caring (the device moved, the screen closed) call
/// [`cancel`](Self::cancel) and the result is discarded.
#[derive(Debug)]
pub struct AddressLookup {
    handle: JoinHandle<Result<String, GeocodeError>>,
}

impl AddressLookup {
    /// Start resolving the address for `coords`, bounded by `timeout`.
    pub fn spawn<G>(geocoder: Arc<G>, coords: Coordinates, timeout: Duration) -> Self
    where
        G: Geocoder + Send + Sync + 'static,
    {
        let handle = tokio::spawn(async move {
            match tokio::time::timeout(timeout, lookup_address(geocoder.as_ref(), coords)).await {
                Ok(result) => result,
                Err(_) => Err(GeocodeError::Timeout),
            }
        });
        Self { handle }
    }

    /// Abort the lookup. A later [`finish`](Self::finish) yields `None`.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Returns true once the lookup has completed, failed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the address.
    ///
    /// Returns `None` if the lookup failed, timed out or was cancelled.
    pub async fn finish(self) -> Option<String> {
        match self.handle.await {
            Ok(Ok(address)) => Some(address),
            Ok(Err(e)) => {
                debug!(error = %e, "Address lookup failed");
                None
            }
            Err(e) if e.is_cancelled() => {
                debug!("Address lookup cancelled");
                None
            }
            Err(e) => {
                debug!(error = %e, "Address lookup task failed");
                None
            }
        }
    }
}
