//! Reverse geocoding client.

use std::future::Future;

use serde::Deserialize;
use tracing::debug;

use crate::domain::Coordinates;

use super::address::RawAddress;
use super::error::GeocodeError;

/// Default reverse geocoding endpoint.
const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Anything that can reverse geocode a coordinate pair.
pub trait Geocoder {
    /// Return the best raw result for `coords`.
    fn reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> impl Future<Output = Result<RawAddress, GeocodeError>> + Send;
}

/// Reverse geocode and normalize to one address line.
///
/// A result that normalizes to nothing is [`GeocodeError::NoResults`].
pub async fn lookup_address<G: Geocoder>(
    geocoder: &G,
    coords: Coordinates,
) -> Result<String, GeocodeError> {
    let raw = geocoder.reverse_geocode(coords).await?;
    raw.normalize().ok_or(GeocodeError::NoResults)
}

/// Geocoding API response wrapper.
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<RawAddress>,
}

/// Configuration for the Google geocoder.
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    /// API key, sent as the `key` query parameter
    pub api_key: String,
    /// Endpoint URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl GeocoderConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Client for the Google Geocoding API.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    /// Create a new geocoder client.
    pub fn new(config: GeocoderConfig) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            api_key: config.api_key,
        })
    }

    async fn fetch(&self, coords: Coordinates) -> Result<RawAddress, GeocodeError> {
        debug!(lat = coords.latitude, lng = coords.longitude, "Reverse geocoding");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latlng", coords.to_query_value()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeocodeError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let parsed: GeocodeResponse =
            serde_json::from_str(&body).map_err(|e| GeocodeError::Json {
                message: e.to_string(),
            })?;

        first_result(parsed)
    }
}

fn first_result(response: GeocodeResponse) -> Result<RawAddress, GeocodeError> {
    match response.status.as_str() {
        "OK" => response
            .results
            .into_iter()
            .next()
            .ok_or(GeocodeError::NoResults),
        "ZERO_RESULTS" => Err(GeocodeError::NoResults),
        _ => Err(GeocodeError::Rejected {
            status: response.status,
            message: response.error_message,
        }),
    }
}

impl Geocoder for GoogleGeocoder {
    async fn reverse_geocode(&self, coords: Coordinates) -> Result<RawAddress, GeocodeError> {
        self.fetch(coords).await
    }
}
