//! Trip state store.
//!
//! [`TripStateStore`] owns the in-memory snapshot of the user's trips and is
//! the only writer to it. Reads are synchronous clones and may be slightly
//! stale. Mutations go through the Trip API first and are merged into the
//! snapshot only after the API confirms them.
//!
//! Mutations against one trip are serialized through a per-trip lane (see
//! [`TripLanes`]): each one waits for the previous one on the same trip,
//! then reads the latest committed snapshot. Commits splice by id, never by
//! position, so a stop added by one call cannot shift another call's target.

mod config;
mod error;
mod lanes;
mod pending;

#[cfg(test)]
mod tests;

use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::api::{ApiError, StopCreation, TripApi, select_active_trip};
use crate::directions::{DirectionsProvider, Route, RouteQuery, RouteResult};
use crate::domain::{NewTrip, Stop, StopId, StopPatch, Trip, TripId, TripPatch, UserId};
use crate::reconcile::{DuplicateGuard, GuardDecision, apply_manual_order, reorder_by_optimization};

pub use config::StoreConfig;
pub use error::StoreError;
pub use lanes::{LaneGuard, TripLanes};
pub use pending::{
    CANCELLED, OperationGuard, OperationId, OperationKind, OperationState, PendingLedger,
    PendingOperation,
};

/// The store's view of the user's trips.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripSnapshot {
    pub active_trip: Option<Trip>,
    /// Most recent first.
    pub user_trips: Vec<Trip>,
}

impl TripSnapshot {
    /// Find a trip in either the active slot or the trip list.
    pub fn trip(&self, trip_id: &TripId) -> Option<&Trip> {
        self.active_trip
            .iter()
            .chain(self.user_trips.iter())
            .find(|t| &t.trip_id == trip_id)
    }

    /// Find the trip that holds a stop.
    pub fn trip_of_stop(&self, stop_id: &StopId) -> Option<&Trip> {
        self.active_trip
            .iter()
            .chain(self.user_trips.iter())
            .find(|t| t.contains_stop(stop_id))
    }

    /// Apply `f` to every copy of a trip. Returns how many copies were changed.
    fn update_trip(&mut self, trip_id: &TripId, mut f: impl FnMut(&mut Trip)) -> usize {
        let mut touched = 0;
        for trip in self
            .active_trip
            .iter_mut()
            .chain(self.user_trips.iter_mut())
            .filter(|t| &t.trip_id == trip_id)
        {
            f(trip);
            touched += 1;
        }
        touched
    }

    /// Remove a trip everywhere.
    fn remove_trip(&mut self, trip_id: &TripId) {
        if self
            .active_trip
            .as_ref()
            .is_some_and(|t| &t.trip_id == trip_id)
        {
            self.active_trip = None;
        }
        self.user_trips.retain(|t| &t.trip_id != trip_id);
    }

    /// Make `trip` the active trip and clear the active flag on the user's
    /// other trips. Returns the ids that were deactivated.
    fn activate(&mut self, mut trip: Trip) -> Vec<TripId> {
        trip.active_trip = true;

        let mut deactivated = Vec::new();
        if let Some(previous) = &self.active_trip
            && previous.trip_id != trip.trip_id
            && previous.user_id == trip.user_id
            && previous.active_trip
        {
            deactivated.push(previous.trip_id.clone());
        }
        for other in self
            .user_trips
            .iter_mut()
            .filter(|t| t.user_id == trip.user_id && t.trip_id != trip.trip_id)
        {
            if other.active_trip {
                other.active_trip = false;
                if !deactivated.contains(&other.trip_id) {
                    deactivated.push(other.trip_id.clone());
                }
            }
        }

        match self
            .user_trips
            .iter_mut()
            .find(|t| t.trip_id == trip.trip_id)
        {
            Some(existing) => *existing = trip.clone(),
            None => self.user_trips.insert(0, trip.clone()),
        }
        self.active_trip = Some(trip);
        deactivated
    }
}

/// Result of [`TripStateStore::add_stop`].
#[derive(Debug, Clone, PartialEq)]
pub enum AddStopOutcome {
    /// The stop was created and merged into the trip.
    Added(Stop),
    /// The trip already has a stop at this address. Nothing changed.
    Duplicate { message: String },
}

impl AddStopOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, AddStopOutcome::Duplicate { .. })
    }
}

/// Message shown when a stop duplicates an existing address.
const DUPLICATE_MESSAGE: &str = "Stop with this address already exists in the trip";

/// Single owner of trip state.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct TripStateStore<A> {
    api: A,
    config: StoreConfig,
    snapshot: RwLock<TripSnapshot>,
    lanes: TripLanes,
    ledger: Mutex<PendingLedger>,
}

impl<A: TripApi + Sync> TripStateStore<A> {
    /// Create an empty store backed by `api`.
    pub fn new(api: A, config: StoreConfig) -> Self {
        let ledger = PendingLedger::new(config.ledger_capacity);
        Self {
            api,
            config,
            snapshot: RwLock::new(TripSnapshot::default()),
            lanes: TripLanes::new(),
            ledger: Mutex::new(ledger),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Snapshot access
    // -----------------------------------------------------------------

    fn read(&self) -> RwLockReadGuard<'_, TripSnapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TripSnapshot> {
        self.snapshot.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the whole snapshot.
    pub fn snapshot(&self) -> TripSnapshot {
        self.read().clone()
    }

    pub fn active_trip(&self) -> Option<Trip> {
        self.read().active_trip.clone()
    }

    pub fn user_trips(&self) -> Vec<Trip> {
        self.read().user_trips.clone()
    }

    /// Recorded operations, oldest first.
    pub fn operations(&self) -> Vec<PendingOperation> {
        self.ledger().entries()
    }

    fn active_trip_id(&self) -> Result<TripId, StoreError> {
        self.read()
            .active_trip
            .as_ref()
            .map(|t| t.trip_id.clone())
            .ok_or(StoreError::NoActiveTrip)
    }

    // -----------------------------------------------------------------
    // Ledger
    // -----------------------------------------------------------------

    fn ledger(&self) -> std::sync::MutexGuard<'_, PendingLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, kind: OperationKind, trip_id: &TripId, target: &str) -> OperationGuard<'_> {
        OperationGuard::begin(&self.ledger, kind, Some(trip_id.clone()), target)
    }

    /// Record a failed operation, log it, and build the error.
    fn api_failure(
        &self,
        op: OperationGuard<'_>,
        operation: OperationKind,
        id: &str,
        source: ApiError,
    ) -> StoreError {
        warn!(operation = %operation, id = %id, error = %source, "Trip API call failed");
        op.fail(source.to_string());
        StoreError::Api {
            operation,
            id: id.to_string(),
            source,
        }
    }

    /// Record a local failure (validation, missing trip) for an operation.
    fn local_failure(&self, op: OperationGuard<'_>, err: StoreError) -> StoreError {
        op.fail(err.to_string());
        err
    }

    // -----------------------------------------------------------------
    // Server sync
    // -----------------------------------------------------------------

    /// Load all trips of a user into the trip list.
    ///
    /// The active trip slot is left alone so that local reorderings of the
    /// active trip survive a refresh of the list. At most one listed trip
    /// keeps its active flag: the one in the active slot if listed, else the
    /// server's most recent active trip. Any other trip the server still
    /// reports as active is deactivated.
    pub async fn fetch_user_trips(&self, user_id: &UserId) -> Result<Vec<Trip>, StoreError> {
        let mut trips = self.list_normalized(user_id).await?;

        let (trips, deactivated) = {
            let mut snapshot = self.write();
            let keep = snapshot
                .active_trip
                .as_ref()
                .filter(|active| &active.user_id == user_id)
                .map(|active| active.trip_id.clone())
                .filter(|id| trips.iter().any(|t| &t.trip_id == id))
                .or_else(|| select_active_trip(&trips).map(|t| t.trip_id.clone()));

            let mut deactivated = Vec::new();
            for trip in &mut trips {
                let active = keep.as_ref() == Some(&trip.trip_id);
                if trip.active_trip && !active {
                    deactivated.push(trip.trip_id.clone());
                }
                trip.active_trip = active;
            }

            snapshot.user_trips = trips.clone();
            (trips, deactivated)
        };

        debug!(
            user_id = %user_id,
            trips = trips.len(),
            deactivated = deactivated.len(),
            "Fetched user trips"
        );
        self.deactivate_on_server(&deactivated).await;
        Ok(trips)
    }

    /// Load the user's trips and make the server's active trip the active one.
    pub async fn fetch_active_trip(&self, user_id: &UserId) -> Result<Option<Trip>, StoreError> {
        let trips = self.list_normalized(user_id).await?;
        let active = select_active_trip(&trips).cloned();

        let deactivated = {
            let mut snapshot = self.write();
            snapshot.user_trips = trips;
            snapshot.active_trip = None;
            match active.clone() {
                Some(trip) => snapshot.activate(trip),
                None => Vec::new(),
            }
        };

        debug!(
            user_id = %user_id,
            trip_id = ?active.as_ref().map(|t| t.trip_id.as_str()),
            "Fetched active trip"
        );

        // The server reported more than one active trip.
        self.deactivate_on_server(&deactivated).await;
        Ok(active)
    }

    async fn list_normalized(&self, user_id: &UserId) -> Result<Vec<Trip>, StoreError> {
        let mut trips = self.api.list_trips(user_id).await.map_err(|e| {
            warn!(operation = %OperationKind::FetchTrips, id = %user_id, error = %e, "Trip API call failed");
            StoreError::Api {
                operation: OperationKind::FetchTrips,
                id: user_id.to_string(),
                source: e,
            }
        })?;
        for trip in &mut trips {
            trip.normalize();
        }
        Ok(trips)
    }

    // -----------------------------------------------------------------
    // Trip CRUD
    // -----------------------------------------------------------------

    /// Create a trip and make it the active trip.
    ///
    /// Missing `user_id` or a malformed `start_location` fail before any
    /// network call. Every other trip of the user that was active is then
    /// deactivated, locally at once and on the server one by one.
    pub async fn create_trip(&self, new_trip: NewTrip) -> Result<Trip, StoreError> {
        let request = new_trip.stage()?;
        let trip_id = request.trip_id.clone();

        let (created, deactivated) = {
            let _lane = self.lanes.acquire(&trip_id).await;
            let op = self.begin(OperationKind::CreateTrip, &trip_id, trip_id.as_str());

            let mut created = match self.api.create_trip(&request).await {
                Ok(trip) => trip,
                Err(e) => {
                    return Err(self.api_failure(op, OperationKind::CreateTrip, trip_id.as_str(), e));
                }
            };

            // The create route answers with the trip row only.
            if created.stops.is_empty() && !request.stops.is_empty() {
                created.stops = request.stops.clone();
                for stop in &mut created.stops {
                    stop.trip_id = created.trip_id.clone();
                }
            }
            created.normalize();
            created.active_trip = true;

            let deactivated = self.write().activate(created.clone());
            op.commit();
            info!(trip_id = %created.trip_id, "Created trip");
            (created, deactivated)
        };

        self.deactivate_on_server(&deactivated).await;
        Ok(created)
    }

    /// Push `active_trip = false` for trips already deactivated locally.
    ///
    /// Each trip goes through its own lane, so the updates run concurrently.
    /// Failures are logged; the server copy stays active until the next
    /// successful update of that trip.
    async fn deactivate_on_server(&self, trip_ids: &[TripId]) {
        let patch = TripPatch::active(false);
        join_all(trip_ids.iter().map(|trip_id| self.deactivate_one(trip_id, &patch))).await;
    }

    async fn deactivate_one(&self, trip_id: &TripId, patch: &TripPatch) {
        let _lane = self.lanes.acquire(trip_id).await;
        let op = self.begin(OperationKind::DeactivateTrip, trip_id, trip_id.as_str());
        match self.api.update_trip(trip_id, patch).await {
            Ok(_) => {
                op.commit();
                debug!(trip_id = %trip_id, "Deactivated previous trip");
            }
            Err(e) => {
                self.api_failure(op, OperationKind::DeactivateTrip, trip_id.as_str(), e);
            }
        }
    }

    /// Update trip-level fields.
    ///
    /// Activating a trip makes it the active trip and deactivates the user's
    /// others; deactivating the active trip clears the active slot.
    pub async fn update_trip(&self, trip_id: &TripId, patch: TripPatch) -> Result<Trip, StoreError> {
        let (updated, deactivated) = {
            let _lane = self.lanes.acquire(trip_id).await;
            let op = self.begin(OperationKind::UpdateTrip, trip_id, trip_id.as_str());

            let server = match self.api.update_trip(trip_id, &patch).await {
                Ok(trip) => trip,
                Err(e) => {
                    return Err(self.api_failure(op, OperationKind::UpdateTrip, trip_id.as_str(), e));
                }
            };

            let mut snapshot = self.write();
            let touched = snapshot.update_trip(trip_id, |trip| patch.apply_to(trip));

            let updated = match snapshot.trip(trip_id).cloned() {
                Some(trip) => trip,
                None => {
                    // Not cached locally; the server row has no stops.
                    let mut trip = server;
                    patch.apply_to(&mut trip);
                    trip.normalize();
                    trip
                }
            };

            let mut deactivated = Vec::new();
            match patch.active_trip {
                Some(true) => deactivated = snapshot.activate(updated.clone()),
                Some(false) => {
                    if snapshot
                        .active_trip
                        .as_ref()
                        .is_some_and(|t| &t.trip_id == trip_id)
                    {
                        snapshot.active_trip = None;
                    }
                }
                None => {}
            }
            drop(snapshot);

            op.commit();
            debug!(trip_id = %trip_id, cached_copies = touched, "Updated trip");
            (updated, deactivated)
        };

        self.deactivate_on_server(&deactivated).await;
        Ok(updated)
    }

    /// Delete a trip. A trip the server no longer knows is removed locally too.
    pub async fn delete_trip(&self, trip_id: &TripId) -> Result<(), StoreError> {
        let _lane = self.lanes.acquire(trip_id).await;
        let op = self.begin(OperationKind::DeleteTrip, trip_id, trip_id.as_str());

        match self.api.delete_trip(trip_id).await {
            Ok(()) => {}
            Err(ApiError::NotFound) => {
                debug!(trip_id = %trip_id, "Trip already gone on server");
            }
            Err(e) => {
                return Err(self.api_failure(op, OperationKind::DeleteTrip, trip_id.as_str(), e));
            }
        }

        self.write().remove_trip(trip_id);
        op.commit();
        info!(trip_id = %trip_id, "Deleted trip");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Stops
    // -----------------------------------------------------------------

    /// Add a stop to its trip.
    ///
    /// An address already present in the trip is reported as
    /// [`AddStopOutcome::Duplicate`] and changes nothing. A new sentinel
    /// replaces any existing one at the head of the sequence.
    pub async fn add_stop(&self, stop: Stop) -> Result<AddStopOutcome, StoreError> {
        stop.location.validate()?;
        let trip_id = stop.trip_id.clone();

        if self.read().trip(&trip_id).is_none() {
            return Err(StoreError::TripNotFound(trip_id));
        }

        let _lane = self.lanes.acquire(&trip_id).await;
        let op = self.begin(OperationKind::AddStop, &trip_id, stop.stop_id.as_str());

        if self.config.local_duplicate_check
            && let GuardDecision::Reject { existing } = self.check_duplicate(&stop)
        {
            debug!(
                stop_id = %stop.stop_id,
                existing = %existing,
                address = %stop.address(),
                "Rejected duplicate stop locally"
            );
            op.commit();
            return Ok(AddStopOutcome::Duplicate {
                message: DUPLICATE_MESSAGE.to_string(),
            });
        }

        let created = match self.api.create_stop(&stop).await {
            Ok(StopCreation::Created(created)) => created,
            Ok(StopCreation::Duplicate { message }) => {
                debug!(stop_id = %stop.stop_id, address = %stop.address(), "Trip API reported duplicate stop");
                op.commit();
                return Ok(AddStopOutcome::Duplicate { message });
            }
            Err(e) => {
                return Err(self.api_failure(op, OperationKind::AddStop, stop.stop_id.as_str(), e));
            }
        };

        let mut created = created;
        if created.trip_id != trip_id {
            warn!(
                stop_id = %created.stop_id,
                returned = %created.trip_id,
                expected = %trip_id,
                "Created stop came back with another trip id"
            );
            created.trip_id = trip_id.clone();
        }

        let mut displaced = 0;
        let touched = self.write().update_trip(&trip_id, |trip| {
            displaced = displaced.max(merge_created_stop(trip, created.clone()));
        });
        if touched == 0 {
            debug!(trip_id = %trip_id, "Trip left the snapshot before stop commit");
        }
        if displaced > 0 {
            warn!(
                stop_id = %created.stop_id,
                address = %created.address(),
                displaced,
                "Trip API accepted a stop at an address already held locally; keeping the confirmed stop"
            );
        }

        op.commit();
        debug!(
            stop_id = %created.stop_id,
            trip_id = %trip_id,
            sentinel = created.is_user_location,
            "Added stop"
        );
        Ok(AddStopOutcome::Added(created))
    }

    fn check_duplicate(&self, candidate: &Stop) -> GuardDecision {
        let snapshot = self.read();
        let Some(trip) = snapshot.trip(&candidate.trip_id) else {
            return GuardDecision::Accept;
        };
        if candidate.is_user_location {
            // The current sentinel is about to be replaced.
            let routable: Vec<Stop> = trip.routable_stops().cloned().collect();
            DuplicateGuard::check(candidate, &routable)
        } else {
            DuplicateGuard::check(candidate, &trip.stops)
        }
    }

    /// Remove a stop by id and drop it from the optimized order.
    pub async fn remove_stop(&self, stop_id: &StopId) -> Result<(), StoreError> {
        let trip_id = self.trip_id_of_stop(stop_id)?;

        let _lane = self.lanes.acquire(&trip_id).await;
        let op = self.begin(OperationKind::RemoveStop, &trip_id, stop_id.as_str());

        match self.api.delete_stop(stop_id).await {
            Ok(()) => {}
            Err(ApiError::NotFound) => {
                debug!(stop_id = %stop_id, "Stop already gone on server");
            }
            Err(e) => {
                return Err(self.api_failure(op, OperationKind::RemoveStop, stop_id.as_str(), e));
            }
        }

        self.write().update_trip(&trip_id, |trip| {
            trip.stops.retain(|s| &s.stop_id != stop_id);
            trip.prune_optimized_order();
        });

        op.commit();
        debug!(stop_id = %stop_id, trip_id = %trip_id, "Removed stop");
        Ok(())
    }

    /// Update a stop by id.
    ///
    /// Moving a stop onto another stop's address is rejected before any
    /// network call.
    pub async fn update_stop(&self, stop_id: &StopId, patch: StopPatch) -> Result<Stop, StoreError> {
        if let Some(location) = &patch.location {
            location.validate()?;
        }
        let trip_id = self.trip_id_of_stop(stop_id)?;

        let _lane = self.lanes.acquire(&trip_id).await;
        let op = self.begin(OperationKind::UpdateStop, &trip_id, stop_id.as_str());

        if let Some(location) = &patch.location {
            let decision = {
                let snapshot = self.read();
                snapshot.trip(&trip_id).map(|trip| {
                    DuplicateGuard::check_address(stop_id, &location.address, &trip.stops)
                })
            };
            if let Some(GuardDecision::Reject { existing }) = decision {
                let err = StoreError::Validation {
                    field: "location",
                    reason: format!("address already used by stop {existing}"),
                };
                return Err(self.local_failure(op, err));
            }
        }

        let mut updated = match self.api.update_stop(stop_id, &patch).await {
            Ok(stop) => stop,
            Err(e) => {
                return Err(self.api_failure(op, OperationKind::UpdateStop, stop_id.as_str(), e));
            }
        };
        updated.trip_id = trip_id.clone();

        self.write().update_trip(&trip_id, |trip| {
            if let Some(slot) = trip.stops.iter_mut().find(|s| &s.stop_id == stop_id) {
                *slot = updated.clone();
            }
        });

        op.commit();
        debug!(stop_id = %stop_id, trip_id = %trip_id, "Updated stop");
        Ok(updated)
    }

    fn trip_id_of_stop(&self, stop_id: &StopId) -> Result<TripId, StoreError> {
        self.read()
            .trip_of_stop(stop_id)
            .map(|t| t.trip_id.clone())
            .ok_or_else(|| StoreError::StopNotFound(stop_id.clone()))
    }

    // -----------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------

    /// Replace the active trip's stop sequence with a caller-supplied order.
    ///
    /// Local only. The sentinel stays at the head whatever the input says.
    /// `optimized_order` is kept unless the store is configured to clear it.
    pub async fn reorder_stops_manually(&self, new_sequence: Vec<Stop>) -> Result<Vec<Stop>, StoreError> {
        let trip_id = self.active_trip_id()?;
        let _lane = self.lanes.acquire(&trip_id).await;
        let op = self.begin(OperationKind::ReorderManually, &trip_id, trip_id.as_str());

        let current = match self.read().trip(&trip_id) {
            Some(trip) => trip.stops.clone(),
            None => return Err(self.local_failure(op, StoreError::TripNotFound(trip_id))),
        };

        let reordered = match apply_manual_order(&trip_id, &current, new_sequence) {
            Ok(stops) => stops,
            Err(e) => return Err(self.local_failure(op, e.into())),
        };

        let clear = self.config.clear_optimization_on_manual_reorder;
        self.write().update_trip(&trip_id, |trip| {
            trip.stops = reordered.clone();
            if clear {
                trip.optimized_order.clear();
            }
            trip.prune_optimized_order();
        });

        op.commit();
        debug!(trip_id = %trip_id, stops = reordered.len(), "Reordered stops manually");
        Ok(reordered)
    }

    /// Resequence the active trip's stops by its `optimized_order`.
    ///
    /// Stops missing from the order drop out of the sequence until the next
    /// optimization. With an empty order nothing changes. Idempotent.
    pub async fn reorder_stops_according_to_optimization(&self) -> Result<Vec<Stop>, StoreError> {
        let trip_id = self.active_trip_id()?;
        let _lane = self.lanes.acquire(&trip_id).await;
        let op = self.begin(OperationKind::ReorderByOptimization, &trip_id, trip_id.as_str());

        let reordered = {
            let mut snapshot = self.write();
            let Some(trip) = snapshot.trip(&trip_id) else {
                drop(snapshot);
                return Err(self.local_failure(op, StoreError::TripNotFound(trip_id)));
            };
            let reordered = reorder_by_optimization(&trip.stops, &trip.optimized_order);
            let hidden = trip.stops.len() - reordered.len();
            if hidden > 0 {
                debug!(trip_id = %trip_id, hidden, "Stops outside the optimized order were dropped from the sequence");
            }
            snapshot.update_trip(&trip_id, |trip| trip.stops = reordered.clone());
            reordered
        };

        op.commit();
        Ok(reordered)
    }

    /// Set the active trip's optimized order locally.
    ///
    /// Ids that are unknown, repeated or the sentinel are dropped. Returns the
    /// order that was stored.
    pub async fn set_optimized_order(&self, order: Vec<StopId>) -> Result<Vec<StopId>, StoreError> {
        let trip_id = self.active_trip_id()?;
        let _lane = self.lanes.acquire(&trip_id).await;
        let op = self.begin(OperationKind::SetOptimizedOrder, &trip_id, trip_id.as_str());

        let stored = {
            let mut snapshot = self.write();
            snapshot.update_trip(&trip_id, |trip| {
                trip.optimized_order = order.clone();
                let stale = trip.prune_optimized_order();
                if stale > 0 {
                    debug!(trip_id = %trip_id, stale, "Dropped unknown ids from optimized order");
                }
            });
            snapshot.trip(&trip_id).map(|t| t.optimized_order.clone())
        };

        match stored {
            Some(stored) => {
                op.commit();
                Ok(stored)
            }
            None => Err(self.local_failure(op, StoreError::TripNotFound(trip_id))),
        }
    }

    /// Ask the directions provider for an optimized route of the active trip.
    ///
    /// On a route: the visiting order and totals are persisted through the
    /// Trip API, then applied locally and the stops resequenced. No route and
    /// provider failures return `Ok(None)` and leave state untouched.
    pub async fn optimize_active_trip<D>(&self, directions: &D) -> Result<Option<Route>, StoreError>
    where
        D: DirectionsProvider + Sync,
    {
        let trip_id = self.active_trip_id()?;
        let _lane = self.lanes.acquire(&trip_id).await;
        let op = self.begin(OperationKind::OptimizeRoute, &trip_id, trip_id.as_str());

        let Some((stops, return_to_start)) = self
            .read()
            .trip(&trip_id)
            .map(|t| (t.stops.clone(), t.return_to_start))
        else {
            return Err(self.local_failure(op, StoreError::TripNotFound(trip_id)));
        };

        let Some(query) = RouteQuery::build(&stops, return_to_start) else {
            debug!(trip_id = %trip_id, stops = stops.len(), "Nothing to route");
            op.commit();
            return Ok(None);
        };

        let route = match directions.route(&query).await {
            RouteResult::Found(route) => route,
            RouteResult::NoRoute => {
                info!(trip_id = %trip_id, "No route for trip");
                op.fail("no route");
                return Ok(None);
            }
            RouteResult::ProviderFailure { cause } => {
                warn!(trip_id = %trip_id, error = %cause, "Directions request failed");
                op.fail(cause);
                return Ok(None);
            }
        };

        let order = query.visit_order(&route);
        let patch = TripPatch {
            optimized_order: Some(order.clone()),
            total_distance_km: Some(route.total_distance_km()),
            total_duration_min: Some(route.total_duration_min()),
            ..TripPatch::default()
        };

        if let Err(e) = self.api.update_trip(&trip_id, &patch).await {
            return Err(self.api_failure(op, OperationKind::OptimizeRoute, trip_id.as_str(), e));
        }

        self.write().update_trip(&trip_id, |trip| {
            patch.apply_to(trip);
            trip.stops = reorder_by_optimization(&trip.stops, &trip.optimized_order);
        });

        op.commit();
        info!(
            trip_id = %trip_id,
            stops = order.len(),
            distance_km = route.total_distance_km(),
            duration_min = route.total_duration_min(),
            "Optimized trip"
        );
        Ok(Some(route))
    }

    // -----------------------------------------------------------------
    // Local state
    // -----------------------------------------------------------------

    /// Make `trip` the active trip without a server round trip.
    ///
    /// The user's other listed trips lose their active flag locally; the
    /// server is not told. Returns the ids that were deactivated.
    pub fn set_active_trip(&self, mut trip: Trip) -> Vec<TripId> {
        trip.normalize();
        let trip_id = trip.trip_id.clone();
        let deactivated = self.write().activate(trip);
        if !deactivated.is_empty() {
            debug!(trip_id = %trip_id, deactivated = deactivated.len(), "Set active trip locally");
        }
        deactivated
    }

    pub fn clear_active_trip(&self) {
        self.write().active_trip = None;
    }

    pub fn clear_user_trips(&self) {
        self.write().user_trips.clear();
    }

    pub fn clear_all_trips(&self) {
        *self.write() = TripSnapshot::default();
    }
}

/// Merge a confirmed stop into its trip.
///
/// A sentinel replaces any sentinel already present and goes to the head.
/// A stop whose id is already present replaces it in place. The confirmed
/// stop wins an address clash: other local stops at the same address are
/// dropped and their count returned.
fn merge_created_stop(trip: &mut Trip, stop: Stop) -> usize {
    let stop_id = stop.stop_id.clone();
    let address = stop.location.address.clone();

    if stop.is_user_location {
        trip.stops
            .retain(|s| !s.is_user_location && s.stop_id != stop.stop_id);
        trip.stops.insert(0, stop);
    } else if let Some(slot) = trip.stops.iter_mut().find(|s| s.stop_id == stop.stop_id) {
        *slot = stop;
    } else {
        trip.stops.push(stop);
    }

    let before = trip.stops.len();
    trip.stops
        .retain(|s| s.stop_id == stop_id || s.location.address != address);
    trip.prune_optimized_order();
    before - trip.stops.len()
}
