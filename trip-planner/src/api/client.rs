//! Trip API client.
//!
//! The [`TripApi`] trait is the seam the store depends on; [`HttpTripApi`]
//! speaks the REST routes and tests use in-memory implementations.

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::{CreateTripRequest, Stop, StopId, StopPatch, Trip, TripId, TripPatch, UserId};

use super::envelope::Envelope;
use super::error::ApiError;

/// Default base URL for a locally running Trip API.
const DEFAULT_BASE_URL: &str = "http://localhost:8081/api";

/// Outcome of a stop creation request.
#[derive(Debug, Clone, PartialEq)]
pub enum StopCreation {
    /// The server stored the stop and returned its record.
    Created(Stop),
    /// The trip already has a stop at this address; nothing was stored.
    Duplicate { message: String },
}

/// Persistence backend for trips and stops.
pub trait TripApi {
    /// All trips of a user, most recent first. Each trip carries its stops.
    fn list_trips(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Vec<Trip>, ApiError>> + Send;

    /// Create a trip. The returned record is authoritative.
    fn create_trip(
        &self,
        request: &CreateTripRequest,
    ) -> impl Future<Output = Result<Trip, ApiError>> + Send;

    /// Apply a partial update to a trip. The returned record may omit stops.
    fn update_trip(
        &self,
        trip_id: &TripId,
        patch: &TripPatch,
    ) -> impl Future<Output = Result<Trip, ApiError>> + Send;

    fn delete_trip(&self, trip_id: &TripId) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Create a stop. An address already present in the trip is
    /// [`StopCreation::Duplicate`], not an error.
    fn create_stop(&self, stop: &Stop)
    -> impl Future<Output = Result<StopCreation, ApiError>> + Send;

    fn update_stop(
        &self,
        stop_id: &StopId,
        patch: &StopPatch,
    ) -> impl Future<Output = Result<Stop, ApiError>> + Send;

    fn delete_stop(&self, stop_id: &StopId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Pick the active trip out of a user's trip list.
///
/// If the server reports several active trips, the most recently created
/// one wins.
pub fn select_active_trip(trips: &[Trip]) -> Option<&Trip> {
    trips
        .iter()
        .filter(|t| t.active_trip)
        .max_by_key(|t| t.created_at)
}

/// Configuration for the HTTP Trip API client.
#[derive(Debug, Clone)]
pub struct TripApiConfig {
    /// Base URL, without a trailing slash
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl TripApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs: 10,
        }
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for TripApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[derive(Serialize)]
struct StopUpdateBody<'a> {
    stop_id: &'a StopId,
    #[serde(flatten)]
    patch: &'a StopPatch,
}

#[derive(Serialize)]
struct StopIdBody<'a> {
    stop_id: &'a StopId,
}

/// HTTP implementation of [`TripApi`].
#[derive(Debug, Clone)]
pub struct HttpTripApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTripApi {
    /// Create a new Trip API client.
    pub fn new(config: TripApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode the envelope, mapping error statuses.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Envelope<T>, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|env| env.describe().map(str::to_string))
                .unwrap_or(body);
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Json {
            message: e.to_string(),
        })
    }

    async fn send_data<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        self.send::<T>(request)
            .await?
            .data
            .ok_or(ApiError::MissingData { operation })
    }
}

impl TripApi for HttpTripApi {
    async fn list_trips(&self, user_id: &UserId) -> Result<Vec<Trip>, ApiError> {
        debug!(user_id = %user_id, "Listing trips");
        let request = self.http.get(self.url(&format!("/trip/{user_id}")));
        let trips: Option<Vec<Trip>> = self.send(request).await?.data;
        Ok(trips.unwrap_or_default())
    }

    async fn create_trip(&self, request: &CreateTripRequest) -> Result<Trip, ApiError> {
        debug!(trip_id = %request.trip_id, "Creating trip");
        let request = self.http.post(self.url("/trip/create")).json(request);
        self.send_data("create_trip", request).await
    }

    async fn update_trip(&self, trip_id: &TripId, patch: &TripPatch) -> Result<Trip, ApiError> {
        debug!(trip_id = %trip_id, "Updating trip");
        let request = self.http.put(self.url(&format!("/trip/{trip_id}"))).json(patch);
        self.send_data("update_trip", request).await
    }

    async fn delete_trip(&self, trip_id: &TripId) -> Result<(), ApiError> {
        debug!(trip_id = %trip_id, "Deleting trip");
        let request = self.http.delete(self.url(&format!("/trip/{trip_id}")));
        self.send::<serde_json::Value>(request).await?;
        Ok(())
    }

    async fn create_stop(&self, stop: &Stop) -> Result<StopCreation, ApiError> {
        debug!(stop_id = %stop.stop_id, trip_id = %stop.trip_id, "Creating stop");
        let request = self.http.post(self.url("/stop")).json(stop);
        let envelope: Envelope<Stop> = self.send(request).await?;
        Ok(match envelope.data {
            Some(created) => StopCreation::Created(created),
            None => StopCreation::Duplicate {
                message: envelope
                    .describe()
                    .unwrap_or("Stop with this address already exists in the trip")
                    .to_string(),
            },
        })
    }

    async fn update_stop(&self, stop_id: &StopId, patch: &StopPatch) -> Result<Stop, ApiError> {
        debug!(stop_id = %stop_id, "Updating stop");
        let body = StopUpdateBody { stop_id, patch };
        let request = self.http.put(self.url("/stop")).json(&body);
        self.send_data("update_stop", request).await
    }

    async fn delete_stop(&self, stop_id: &StopId) -> Result<(), ApiError> {
        debug!(stop_id = %stop_id, "Deleting stop");
        let request = self
            .http
            .delete(self.url("/stop"))
            .json(&StopIdBody { stop_id });
        self.send::<serde_json::Value>(request).await?;
        Ok(())
    }
}
