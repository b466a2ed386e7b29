//! Domain types for the trip planner.
//!
//! This module contains the trip and stop model shared by the store, the
//! reconciler and the provider clients. Identifiers and locations validate
//! their input at construction time.

mod error;
mod ids;
mod location;
mod stop;
mod trip;

pub use error::DomainError;
pub use ids::{InvalidId, StopId, TripId, UserId};
pub use location::{Coordinates, Location};
pub use stop::{Stop, StopPatch};
pub use trip::{CreateTripRequest, NewTrip, Trip, TripPatch};

use serde::{Deserialize, Deserializer};

/// Deserialize a nullable field, mapping `null` to the type's default.
///
/// The Trip API returns raw database rows, where unset columns arrive as
/// `null` rather than being omitted.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
