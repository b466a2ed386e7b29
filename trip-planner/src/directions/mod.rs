//! Directions requests and route parsing.
//!
//! [`RouteQuery`] turns a trip's stop sequence into origin, destination and
//! optimizable waypoints. The provider's JSON is converted into a
//! [`RouteResult`] at the boundary, so nothing downstream sees raw DTOs.
//!
//! Waypoint order in a route refers to indices into the query's waypoint
//! list, not stop ids. Use [`RouteQuery::visit_order`] to translate.

mod client;
mod convert;
mod error;
mod query;
mod types;

pub use client::{DirectionsClient, DirectionsConfig, DirectionsProvider, directions_for_trip};
pub use convert::{Route, RouteLeg, RouteResult, convert_response, parse_response};
pub use error::DirectionsError;
pub use query::{RoutePoint, RouteQuery};
pub use types::{DirectionsResponse, LegDto, PolylineDto, RouteDto, TextValueDto};
