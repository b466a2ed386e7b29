//! Directions request construction.

use crate::domain::{Coordinates, Stop, StopId};
use crate::reconcile::{sentinel_first, translate_waypoint_order};

use super::Route;

/// A stop as submitted to the directions provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePoint {
    pub stop_id: StopId,
    pub coordinates: Coordinates,
    pub is_user_location: bool,
}

impl From<&Stop> for RoutePoint {
    fn from(stop: &Stop) -> Self {
        Self {
            stop_id: stop.stop_id.clone(),
            coordinates: stop.location.coordinates(),
            is_user_location: stop.is_user_location,
        }
    }
}

/// A directions request for a trip's stop sequence.
///
/// The origin is the first stop (the sentinel, when the trip has one). The
/// destination is the origin again for round trips, otherwise the last stop.
/// Everything in between is a waypoint the provider may reorder.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuery {
    origin: RoutePoint,
    destination: RoutePoint,
    waypoints: Vec<RoutePoint>,
    return_to_start: bool,
}

impl RouteQuery {
    /// Build a query from an ordered stop sequence.
    ///
    /// Returns `None` when there is no route to ask for: no stops at all, or a
    /// single stop without a return to start.
    pub fn build(stops: &[Stop], return_to_start: bool) -> Option<Self> {
        if stops.is_empty() || (stops.len() < 2 && !return_to_start) {
            return None;
        }

        let ordered = sentinel_first(stops.to_vec());
        let points: Vec<RoutePoint> = ordered.iter().map(RoutePoint::from).collect();

        let origin = points[0].clone();
        let (destination, waypoints) = if return_to_start {
            (origin.clone(), points[1..].to_vec())
        } else {
            let last = points.len() - 1;
            (points[last].clone(), points[1..last].to_vec())
        };

        Some(Self {
            origin,
            destination,
            waypoints,
            return_to_start,
        })
    }

    pub fn origin(&self) -> &RoutePoint {
        &self.origin
    }

    pub fn destination(&self) -> &RoutePoint {
        &self.destination
    }

    pub fn waypoints(&self) -> &[RoutePoint] {
        &self.waypoints
    }

    pub fn return_to_start(&self) -> bool {
        self.return_to_start
    }

    /// Stop ids of the waypoints, in request order.
    pub fn waypoint_ids(&self) -> Vec<StopId> {
        self.waypoints.iter().map(|w| w.stop_id.clone()).collect()
    }

    /// Query parameters for the provider (without the API key).
    ///
    /// Waypoints are pipe-delimited and prefixed with `optimize:true` so the
    /// provider is free to reorder them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("origin", self.origin.coordinates.to_query_value()),
            ("destination", self.destination.coordinates.to_query_value()),
        ];

        if !self.waypoints.is_empty() {
            let mut value = String::from("optimize:true");
            for waypoint in &self.waypoints {
                value.push('|');
                value.push_str(&waypoint.coordinates.to_query_value());
            }
            pairs.push(("waypoints", value));
        }

        pairs
    }

    /// The full visiting order of routable stops implied by a route.
    ///
    /// A non-sentinel origin stays first and a distinct destination stays
    /// last; waypoints follow the provider's `waypoint_order`. The sentinel is
    /// never included. The result is what `optimized_order` should hold.
    pub fn visit_order(&self, route: &Route) -> Vec<StopId> {
        let mut order = Vec::with_capacity(self.waypoints.len() + 2);

        if !self.origin.is_user_location {
            order.push(self.origin.stop_id.clone());
        }

        order.extend(translate_waypoint_order(
            &self.waypoint_ids(),
            &route.waypoint_order,
        ));

        if !self.return_to_start && !self.destination.is_user_location {
            order.push(self.destination.stop_id.clone());
        }

        order
    }
}
