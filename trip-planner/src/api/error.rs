//! Trip API error types.

/// Errors that can occur when talking to the Trip API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication failed
    #[error("unauthorized")]
    Unauthorized,

    /// The trip or stop does not exist on the server
    #[error("not found")]
    NotFound,

    /// API returned an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// A successful response carried no `data` where a record was required
    #[error("response for {operation} had no data")]
    MissingData { operation: &'static str },
}

impl ApiError {
    /// Returns true for errors that are worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(e) => e.is_timeout() || e.is_connect(),
            ApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
