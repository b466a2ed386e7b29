//! Stop types.

use serde::{Deserialize, Serialize};

use super::{Location, StopId, TripId};

/// A single waypoint belonging to a trip.
///
/// At most one stop per trip is the user-location sentinel: the stop
/// representing the device's current position, pinned at the head of the
/// displayed sequence and never reordered or optimized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: StopId,
    pub trip_id: TripId,
    pub location: Location,
    /// Seconds from the previous stop.
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub expected_duration: u64,
    /// Meters from the previous stop.
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub expected_distance: u64,
    #[serde(
        rename = "isUserLocation",
        default,
        deserialize_with = "super::null_as_default"
    )]
    pub is_user_location: bool,
}

impl Stop {
    /// Create a regular stop with a freshly generated id.
    pub fn new(trip_id: TripId, location: Location) -> Self {
        Self {
            stop_id: StopId::generate(),
            trip_id,
            location,
            expected_duration: 0,
            expected_distance: 0,
            is_user_location: false,
        }
    }

    /// Create the user-location sentinel stop for a trip.
    pub fn user_location(trip_id: TripId, location: Location) -> Self {
        Self {
            is_user_location: true,
            ..Self::new(trip_id, location)
        }
    }

    /// The address used for duplicate detection.
    pub fn address(&self) -> &str {
        &self.location.address
    }
}

/// A partial update to a stop.
///
/// Only fields that are `Some` are sent to the Trip API and applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_distance: Option<u64>,
}

impl StopPatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.location.is_none()
            && self.expected_duration.is_none()
            && self.expected_distance.is_none()
    }

    /// Apply the patch to a stop in place.
    pub fn apply_to(&self, stop: &mut Stop) {
        if let Some(location) = &self.location {
            stop.location = location.clone();
        }
        if let Some(duration) = self.expected_duration {
            stop.expected_duration = duration;
        }
        if let Some(distance) = self.expected_distance {
            stop.expected_distance = distance;
        }
    }
}
