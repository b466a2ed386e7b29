//! Environment configuration for the binary.

use std::env;

use crate::api::TripApiConfig;
use crate::directions::DirectionsConfig;
use crate::geocode::GeocoderConfig;

/// Default Trip API location for local development.
const DEFAULT_TRIP_API_BASE_URL: &str = "http://localhost:8081/api";

/// Default HTTP timeout in seconds.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Errors reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub trip_api_base_url: String,
    /// Empty when unset; directions requests will then be rejected upstream.
    pub directions_api_key: String,
    pub geocoding_api_key: String,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let trip_api_base_url = lookup("TRIP_API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TRIP_API_BASE_URL.to_string());

        let directions_api_key = lookup("DIRECTIONS_API_KEY").unwrap_or_default();
        // The geocoder shares the directions key unless given its own.
        let geocoding_api_key =
            lookup("GEOCODING_API_KEY").unwrap_or_else(|| directions_api_key.clone());

        let http_timeout_secs = match lookup("HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|err| ConfigError::Invalid {
                    name: "HTTP_TIMEOUT_SECS",
                    reason: format!("{err}"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        name: "HTTP_TIMEOUT_SECS",
                        reason: "must be greater than zero".into(),
                    });
                }
                secs
            }
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            trip_api_base_url,
            directions_api_key,
            geocoding_api_key,
            http_timeout_secs,
        })
    }

    pub fn trip_api(&self) -> TripApiConfig {
        TripApiConfig::new(&self.trip_api_base_url).with_timeout(self.http_timeout_secs)
    }

    pub fn directions(&self) -> DirectionsConfig {
        DirectionsConfig::new(&self.directions_api_key).with_timeout(self.http_timeout_secs)
    }

    pub fn geocoder(&self) -> GeocoderConfig {
        GeocoderConfig::new(&self.geocoding_api_key).with_timeout(self.http_timeout_secs)
    }
}
