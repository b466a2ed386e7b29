//! Conversion from directions DTOs to route results.
//!
//! Provider JSON is loosely shaped; this is the only place that inspects it.
//! Everything past this point works with [`RouteResult`].

use super::types::{DirectionsResponse, LegDto, RouteDto};

/// Status string the provider uses for a successful response.
const STATUS_OK: &str = "OK";

/// Statuses meaning "the request was fine but there is no route".
const NO_ROUTE_STATUSES: &[&str] = &["ZERO_RESULTS", "NOT_FOUND"];

/// A normalized route.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Encoded overview polyline.
    pub polyline: String,
    /// Indices into the request's waypoint list, in visiting order.
    /// These are not stop ids; see [`RouteQuery::visit_order`](super::RouteQuery::visit_order).
    pub waypoint_order: Vec<usize>,
    pub legs: Vec<RouteLeg>,
}

impl Route {
    /// Total distance over all legs, in meters.
    pub fn total_distance_m(&self) -> u64 {
        self.legs.iter().map(|l| l.distance_m).sum()
    }

    /// Total duration over all legs, in seconds.
    pub fn total_duration_s(&self) -> u64 {
        self.legs.iter().map(|l| l.duration_s).sum()
    }

    /// Total distance in kilometers, as stored on a trip.
    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_m() as f64 / 1000.0
    }

    /// Total duration in minutes, as stored on a trip.
    pub fn total_duration_min(&self) -> f64 {
        self.total_duration_s() as f64 / 60.0
    }
}

/// One leg of a route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteLeg {
    pub distance_m: u64,
    pub duration_s: u64,
    pub start_address: String,
    pub end_address: String,
}

/// Outcome of a directions request.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteResult {
    /// The provider found a route.
    Found(Route),
    /// The request was understood but no route exists.
    NoRoute,
    /// The provider rejected the request or could not be reached.
    ProviderFailure { cause: String },
}

impl RouteResult {
    /// The route, if one was found.
    pub fn into_route(self) -> Option<Route> {
        match self {
            RouteResult::Found(route) => Some(route),
            RouteResult::NoRoute | RouteResult::ProviderFailure { .. } => None,
        }
    }

    /// Returns true if a route was found.
    pub fn is_found(&self) -> bool {
        matches!(self, RouteResult::Found(_))
    }
}

/// Convert a parsed directions response into a route result.
pub fn convert_response(response: DirectionsResponse) -> RouteResult {
    if response.status != STATUS_OK {
        if NO_ROUTE_STATUSES.contains(&response.status.as_str()) {
            return RouteResult::NoRoute;
        }
        let cause = match response.error_message {
            Some(message) => format!("{}: {}", response.status, message),
            None => response.status,
        };
        return RouteResult::ProviderFailure { cause };
    }

    match response.routes.into_iter().next() {
        Some(route) => RouteResult::Found(convert_route(route)),
        None => RouteResult::NoRoute,
    }
}

/// Parse a raw JSON body into a route result.
///
/// A body that is not valid directions JSON is a provider failure.
pub fn parse_response(body: &str) -> RouteResult {
    match serde_json::from_str::<DirectionsResponse>(body) {
        Ok(response) => convert_response(response),
        Err(e) => RouteResult::ProviderFailure {
            cause: format!("invalid directions JSON: {e}"),
        },
    }
}

fn convert_route(route: RouteDto) -> Route {
    Route {
        polyline: route.overview_polyline.map(|p| p.points).unwrap_or_default(),
        waypoint_order: route.waypoint_order,
        legs: route.legs.into_iter().map(convert_leg).collect(),
    }
}

fn convert_leg(leg: LegDto) -> RouteLeg {
    RouteLeg {
        distance_m: leg.distance.map_or(0, |d| d.value),
        duration_s: leg.duration.map_or(0, |d| d.value),
        start_address: leg.start_address.unwrap_or_default(),
        end_address: leg.end_address.unwrap_or_default(),
    }
}
