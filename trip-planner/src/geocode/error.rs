//! Geocoding error types.

/// Errors that can occur while reverse geocoding.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error HTTP status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Provider answered with a non-OK status in the body
    #[error("geocoder rejected request: {status}")]
    Rejected {
        status: String,
        message: Option<String>,
    },

    /// Failed to parse response JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// No result could be turned into an address
    #[error("no address found")]
    NoResults,

    /// Lookup did not finish in time
    #[error("geocoding timed out")]
    Timeout,
}
