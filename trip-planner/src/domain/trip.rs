//! Trip types.
//!
//! A `Trip` owns its stops exclusively. The invariants the rest of the crate
//! relies on are:
//!
//! - at most one stop is the user-location sentinel, and it sits at the head
//! - every stop's `trip_id` is the owning trip's id
//! - no two stops share an address
//! - `optimized_order` only names stops that exist (and never the sentinel)
//!
//! Records arriving from the Trip API are brought into that shape with
//! [`Trip::normalize`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{DomainError, Location, Stop, StopId, TripId, UserId};

/// A named collection of ordered stops with trip-level aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: TripId,
    pub user_id: UserId,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub name: String,
    pub start_location: Location,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub return_to_start: bool,
    /// Stop ids in the order suggested by the routing provider.
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub optimized_order: Vec<StopId>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub total_distance_km: f64,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub total_duration_min: f64,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub active_trip: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub stops: Vec<Stop>,
}

impl Trip {
    /// The user-location sentinel stop, if present.
    pub fn sentinel(&self) -> Option<&Stop> {
        self.stops.iter().find(|s| s.is_user_location)
    }

    /// Look up a stop by id.
    pub fn stop(&self, stop_id: &StopId) -> Option<&Stop> {
        self.stops.iter().find(|s| &s.stop_id == stop_id)
    }

    /// Returns true if the trip contains a stop with this id.
    pub fn contains_stop(&self, stop_id: &StopId) -> bool {
        self.stop(stop_id).is_some()
    }

    /// Stops that take part in routing and reordering (everything but the sentinel).
    pub fn routable_stops(&self) -> impl Iterator<Item = &Stop> {
        self.stops.iter().filter(|s| !s.is_user_location)
    }

    /// Remove ids from `optimized_order` that no longer name a routable stop.
    ///
    /// Duplicated ids keep their first position. Returns how many ids were dropped.
    pub fn prune_optimized_order(&mut self) -> usize {
        let routable: HashSet<&StopId> = self.routable_stops().map(|s| &s.stop_id).collect();
        let mut seen = HashSet::new();
        let before = self.optimized_order.len();

        let pruned: Vec<StopId> = self
            .optimized_order
            .iter()
            .filter(|id| routable.contains(id) && seen.insert((*id).clone()))
            .cloned()
            .collect();

        self.optimized_order = pruned;
        before - self.optimized_order.len()
    }

    /// Bring a trip record into its invariant shape.
    ///
    /// Stops belonging to another trip, repeated stop ids, repeated addresses
    /// and extra sentinels are dropped (first occurrence wins); the sentinel is
    /// moved to the head; stale optimized ids are pruned.
    pub fn normalize(&mut self) {
        let mut ids = HashSet::new();
        let mut addresses = HashSet::new();
        let mut sentinel: Option<Stop> = None;
        let mut kept = Vec::with_capacity(self.stops.len());
        let mut dropped = 0usize;

        for stop in std::mem::take(&mut self.stops) {
            let foreign = stop.trip_id != self.trip_id;
            let repeated = !ids.insert(stop.stop_id.clone())
                || !addresses.insert(stop.location.address.clone());
            let extra_sentinel = stop.is_user_location && sentinel.is_some();

            if foreign || repeated || extra_sentinel {
                dropped += 1;
                continue;
            }

            if stop.is_user_location {
                sentinel = Some(stop);
            } else {
                kept.push(stop);
            }
        }

        if let Some(sentinel) = sentinel {
            kept.insert(0, sentinel);
        }
        self.stops = kept;

        let stale = self.prune_optimized_order();

        if dropped > 0 || stale > 0 {
            warn!(
                trip_id = %self.trip_id,
                dropped_stops = dropped,
                stale_ids = stale,
                "Normalized inconsistent trip record"
            );
        }
    }
}

/// A trip as staged by the client before the Trip API confirms it.
///
/// Fields are optional so that missing input can be reported as a
/// validation failure instead of a type error at the call site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTrip {
    /// Client-side id; generated when absent.
    pub trip_id: Option<TripId>,
    pub user_id: Option<UserId>,
    pub name: String,
    pub start_location: Option<Location>,
    pub return_to_start: bool,
    /// Initial stops created together with the trip.
    pub stops: Vec<Stop>,
}

impl NewTrip {
    /// Start a new trip for a user from a starting location.
    pub fn new(user_id: UserId, start_location: Location) -> Self {
        Self {
            user_id: Some(user_id),
            start_location: Some(start_location),
            ..Self::default()
        }
    }

    /// Set the trip name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set whether the route returns to its origin.
    pub fn with_return_to_start(mut self, return_to_start: bool) -> Self {
        self.return_to_start = return_to_start;
        self
    }

    /// Validate required fields and produce the request sent to the Trip API.
    pub fn stage(&self) -> Result<CreateTripRequest, DomainError> {
        let user_id = self
            .user_id
            .clone()
            .ok_or(DomainError::MissingField("user_id"))?;
        let start_location = self
            .start_location
            .clone()
            .ok_or(DomainError::MissingField("start_location"))?;
        start_location.validate()?;

        let trip_id = self.trip_id.clone().unwrap_or_else(TripId::generate);

        let mut addresses = HashSet::new();
        let mut stops = Vec::with_capacity(self.stops.len());
        for stop in &self.stops {
            stop.location.validate()?;
            if !addresses.insert(stop.location.address.as_str()) {
                return Err(DomainError::DuplicateInSequence(
                    stop.location.address.clone(),
                ));
            }
            let mut stop = stop.clone();
            stop.trip_id = trip_id.clone();
            stops.push(stop);
        }

        Ok(CreateTripRequest {
            trip_id,
            user_id,
            name: self.name.clone(),
            start_location,
            return_to_start: self.return_to_start,
            stops,
        })
    }
}

/// Body of a trip creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateTripRequest {
    pub trip_id: TripId,
    pub user_id: UserId,
    pub name: String,
    pub start_location: Location,
    pub return_to_start: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stops: Vec<Stop>,
}

/// A partial update to trip-level fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_to_start: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_order: Option<Vec<StopId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_trip: Option<bool>,
}

impl TripPatch {
    /// A patch that only flips the active flag.
    pub fn active(active: bool) -> Self {
        Self {
            active_trip: Some(active),
            ..Self::default()
        }
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply the patch to a trip in place. Stops are never touched.
    pub fn apply_to(&self, trip: &mut Trip) {
        if let Some(name) = &self.name {
            trip.name = name.clone();
        }
        if let Some(return_to_start) = self.return_to_start {
            trip.return_to_start = return_to_start;
        }
        if let Some(km) = self.total_distance_km {
            trip.total_distance_km = km;
        }
        if let Some(min) = self.total_duration_min {
            trip.total_duration_min = min;
        }
        if let Some(order) = &self.optimized_order {
            trip.optimized_order = order.clone();
            trip.prune_optimized_order();
        }
        if let Some(active) = self.active_trip {
            trip.active_trip = active;
        }
    }
}
