//! Directions API response DTOs.
//!
//! These types map directly to the provider's JSON. Everything is optional or
//! defaulted because the provider omits fields on error statuses; conversion
//! into [`RouteResult`](super::RouteResult) decides what is usable.

use serde::Deserialize;

/// Top-level directions response.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectionsResponse {
    /// "OK", "ZERO_RESULTS", "NOT_FOUND", "REQUEST_DENIED", ...
    pub status: String,

    /// Human-readable detail accompanying a non-OK status.
    pub error_message: Option<String>,

    #[serde(default)]
    pub routes: Vec<RouteDto>,
}

/// One route alternative.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteDto {
    pub overview_polyline: Option<PolylineDto>,

    /// Indices into the request's waypoint list, in optimized visiting order.
    #[serde(default)]
    pub waypoint_order: Vec<usize>,

    #[serde(default)]
    pub legs: Vec<LegDto>,
}

/// Encoded polyline wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct PolylineDto {
    pub points: String,
}

/// A leg between two consecutive route points.
#[derive(Debug, Clone, Deserialize)]
pub struct LegDto {
    pub distance: Option<TextValueDto>,
    pub duration: Option<TextValueDto>,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
}

/// The numeric half of a `{text, value}` pair, e.g. `{"text": "1.2 km", "value": 1234}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TextValueDto {
    pub value: u64,
}
