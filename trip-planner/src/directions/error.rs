//! Directions client error types.

use std::fmt;

/// Errors from the directions HTTP client.
///
/// These never reach callers of [`directions_for_trip`](super::directions_for_trip);
/// they are folded into [`RouteResult::ProviderFailure`](super::RouteResult::ProviderFailure).
#[derive(Debug)]
pub enum DirectionsError {
    /// HTTP request failed (network error, timeout, etc.)
    Http(reqwest::Error),

    /// Response body was not directions JSON
    Json {
        message: String,
        body: Option<String>,
    },

    /// Provider returned an error status code
    ApiError { status: u16, message: String },

    /// Rate limited by the provider
    RateLimited,

    /// Invalid or missing API key
    Unauthorized,
}

impl fmt::Display for DirectionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionsError::Http(e) => write!(f, "HTTP error: {e}"),
            DirectionsError::Json { message, body } => {
                write!(f, "JSON parse error: {message}")?;
                if let Some(body) = body {
                    write!(f, " (body: {body})")?;
                }
                Ok(())
            }
            DirectionsError::ApiError { status, message } => {
                write!(f, "API error {status}: {message}")
            }
            DirectionsError::RateLimited => write!(f, "rate limited by directions provider"),
            DirectionsError::Unauthorized => write!(f, "unauthorized (invalid API key)"),
        }
    }
}

impl std::error::Error for DirectionsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DirectionsError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DirectionsError {
    fn from(err: reqwest::Error) -> Self {
        DirectionsError::Http(err)
    }
}
