//! Response envelope shared by every Trip API route.

use serde::Deserialize;

/// `{ data, message, error }` wrapper.
///
/// `data: null` is meaningful: stop creation uses it to signal that the
/// address already exists in the trip.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// The best human-readable description the server gave.
    pub fn describe(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}
