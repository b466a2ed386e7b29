//! Directions HTTP client.
//!
//! Sends a [`RouteQuery`] to a Google-Directions-compatible endpoint and
//! converts the response at the boundary.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::domain::Stop;

use super::convert::{Route, RouteResult, convert_response};
use super::error::DirectionsError;
use super::query::RouteQuery;
use super::types::DirectionsResponse;

/// Default directions endpoint.
const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Configuration for the directions client.
#[derive(Debug, Clone)]
pub struct DirectionsConfig {
    /// API key, sent as the `key` query parameter
    pub api_key: String,
    /// Endpoint URL (defaults to Google Directions)
    pub base_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl DirectionsConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Anything that can answer a route query.
///
/// Implementations must not fail: transport and provider errors are
/// reported as [`RouteResult::ProviderFailure`]. This lets the store and
/// tests swap the HTTP client for an in-memory fake.
pub trait DirectionsProvider {
    fn route(&self, query: &RouteQuery) -> impl Future<Output = RouteResult> + Send;
}

/// Directions API client.
#[derive(Debug, Clone)]
pub struct DirectionsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    semaphore: Arc<Semaphore>,
}

impl DirectionsClient {
    /// Create a new directions client with the given configuration.
    pub fn new(config: DirectionsConfig) -> Result<Self, DirectionsError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            api_key: config.api_key,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// Fetch directions for a query.
    ///
    /// A provider-level status such as `ZERO_RESULTS` is not an error here;
    /// it comes back as `Ok(RouteResult::NoRoute)`.
    pub async fn fetch(&self, query: &RouteQuery) -> Result<RouteResult, DirectionsError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| DirectionsError::ApiError {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        let mut params = query.query_pairs();
        params.push(("key", self.api_key.clone()));

        debug!(
            waypoints = query.waypoints().len(),
            return_to_start = query.return_to_start(),
            "Requesting directions"
        );

        let response = self.http.get(&self.base_url).query(&params).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DirectionsError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DirectionsError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectionsError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;

        let parsed: DirectionsResponse =
            serde_json::from_str(&body).map_err(|e| DirectionsError::Json {
                message: e.to_string(),
                body: Some(body.chars().take(500).collect()),
            })?;

        Ok(convert_response(parsed))
    }
}

impl DirectionsProvider for DirectionsClient {
    async fn route(&self, query: &RouteQuery) -> RouteResult {
        match self.fetch(query).await {
            Ok(result) => result,
            Err(e) => RouteResult::ProviderFailure {
                cause: e.to_string(),
            },
        }
    }
}

/// Fetch a route for a stop sequence.
///
/// Returns `None` when the sequence has nothing to route, when the provider
/// finds no route, or when the provider fails. Failures are logged, never
/// propagated.
pub async fn directions_for_trip<P: DirectionsProvider>(
    provider: &P,
    stops: &[Stop],
    return_to_start: bool,
) -> Option<Route> {
    let query = RouteQuery::build(stops, return_to_start)?;

    match provider.route(&query).await {
        RouteResult::Found(route) => Some(route),
        RouteResult::NoRoute => {
            debug!(stops = stops.len(), "No route between stops");
            None
        }
        RouteResult::ProviderFailure { cause } => {
            warn!(stops = stops.len(), error = %cause, "Directions request failed");
            None
        }
    }
}
