//! Unit tests for the trip state store.

use super::*;
use crate::api::ApiError;
use crate::directions::RouteLeg;
use crate::domain::{CreateTripRequest, Location};
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

// ---------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------

/// In-memory Trip API with the same duplicate rule as the real server.
#[derive(Default)]
struct FakeTripApi {
    trips: Mutex<HashMap<TripId, Trip>>,
    calls: Mutex<Vec<String>>,
    fail_next: Mutex<Option<fn() -> ApiError>>,
    stop_delays: Mutex<VecDeque<Duration>>,
}

impl FakeTripApi {
    fn with_trips(trips: Vec<Trip>) -> Self {
        let api = Self::default();
        {
            let mut map = api.trips.lock().unwrap();
            for trip in trips {
                map.insert(trip.trip_id.clone(), trip);
            }
        }
        api
    }

    fn record(&self, call: String) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        match self.fail_next.lock().unwrap().take() {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }

    fn fail_next(&self, make: fn() -> ApiError) {
        *self.fail_next.lock().unwrap() = Some(make);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn server_trip(&self, id: &str) -> Option<Trip> {
        self.trips.lock().unwrap().get(&tid(id)).cloned()
    }
}

impl TripApi for FakeTripApi {
    async fn list_trips(&self, user_id: &UserId) -> Result<Vec<Trip>, ApiError> {
        self.record(format!("list_trips {user_id}"))?;
        let mut trips: Vec<Trip> = self
            .trips
            .lock()
            .unwrap()
            .values()
            .filter(|t| &t.user_id == user_id)
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(trips)
    }

    async fn create_trip(&self, request: &CreateTripRequest) -> Result<Trip, ApiError> {
        self.record(format!("create_trip {}", request.trip_id))?;
        let trip = Trip {
            trip_id: request.trip_id.clone(),
            user_id: request.user_id.clone(),
            name: request.name.clone(),
            start_location: request.start_location.clone(),
            return_to_start: request.return_to_start,
            optimized_order: Vec::new(),
            total_distance_km: 0.0,
            total_duration_min: 0.0,
            active_trip: true,
            created_at: Utc::now(),
            stops: request.stops.clone(),
        };
        self.trips
            .lock()
            .unwrap()
            .insert(trip.trip_id.clone(), trip.clone());
        // The real route returns the trip row without stops.
        Ok(Trip {
            stops: Vec::new(),
            ..trip
        })
    }

    async fn update_trip(&self, trip_id: &TripId, patch: &TripPatch) -> Result<Trip, ApiError> {
        self.record(format!("update_trip {trip_id}"))?;
        let mut trips = self.trips.lock().unwrap();
        let trip = trips.get_mut(trip_id).ok_or(ApiError::NotFound)?;
        patch.apply_to(trip);
        Ok(Trip {
            stops: Vec::new(),
            ..trip.clone()
        })
    }

    async fn delete_trip(&self, trip_id: &TripId) -> Result<(), ApiError> {
        self.record(format!("delete_trip {trip_id}"))?;
        self.trips
            .lock()
            .unwrap()
            .remove(trip_id)
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }

    async fn create_stop(&self, stop: &Stop) -> Result<StopCreation, ApiError> {
        let delay = self.stop_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record(format!("create_stop {}", stop.stop_id))?;

        let mut trips = self.trips.lock().unwrap();
        let trip = trips.get_mut(&stop.trip_id).ok_or(ApiError::NotFound)?;
        if trip.stops.iter().any(|s| s.address() == stop.address()) {
            return Ok(StopCreation::Duplicate {
                message: "Stop with this address already exists in the trip".into(),
            });
        }
        trip.stops.push(stop.clone());
        Ok(StopCreation::Created(stop.clone()))
    }

    async fn update_stop(&self, stop_id: &StopId, patch: &StopPatch) -> Result<Stop, ApiError> {
        self.record(format!("update_stop {stop_id}"))?;
        let mut trips = self.trips.lock().unwrap();
        let stop = trips
            .values_mut()
            .flat_map(|t| t.stops.iter_mut())
            .find(|s| &s.stop_id == stop_id)
            .ok_or(ApiError::NotFound)?;
        patch.apply_to(stop);
        Ok(stop.clone())
    }

    async fn delete_stop(&self, stop_id: &StopId) -> Result<(), ApiError> {
        self.record(format!("delete_stop {stop_id}"))?;
        let mut trips = self.trips.lock().unwrap();
        for trip in trips.values_mut() {
            let before = trip.stops.len();
            trip.stops.retain(|s| &s.stop_id != stop_id);
            if trip.stops.len() != before {
                return Ok(());
            }
        }
        Err(ApiError::NotFound)
    }
}

/// Directions provider returning a fixed result.
struct FakeDirections {
    result: RouteResult,
}

impl DirectionsProvider for FakeDirections {
    async fn route(&self, _query: &RouteQuery) -> RouteResult {
        self.result.clone()
    }
}

// ---------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------

fn tid(s: &str) -> TripId {
    TripId::new(s).unwrap()
}

fn sid(s: &str) -> StopId {
    StopId::new(s).unwrap()
}

fn uid(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

fn stop(id: &str, trip: &str, address: &str) -> Stop {
    Stop {
        stop_id: sid(id),
        trip_id: tid(trip),
        location: Location::new(45.0, 9.0, address),
        expected_duration: 0,
        expected_distance: 0,
        is_user_location: false,
    }
}

fn sentinel(id: &str, trip: &str, address: &str) -> Stop {
    Stop {
        is_user_location: true,
        ..stop(id, trip, address)
    }
}

fn trip(id: &str, user: &str, active: bool, stops: Vec<Stop>) -> Trip {
    Trip {
        trip_id: tid(id),
        user_id: uid(user),
        name: format!("Trip {id}"),
        start_location: Location::new(45.0, 9.0, "Start"),
        return_to_start: false,
        optimized_order: Vec::new(),
        total_distance_km: 0.0,
        total_duration_min: 0.0,
        active_trip: active,
        created_at: Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap(),
        stops,
    }
}

/// Trip `t1` with stops [A (sentinel), B, C], active locally and on the server.
fn seeded_with(config: StoreConfig) -> TripStateStore<FakeTripApi> {
    let t1 = trip(
        "t1",
        "u1",
        true,
        vec![
            sentinel("A", "t1", "Here"),
            stop("B", "t1", "Via Roma 1"),
            stop("C", "t1", "Via Torino 2"),
        ],
    );
    let store = TripStateStore::new(FakeTripApi::with_trips(vec![t1.clone()]), config);
    store.set_active_trip(t1);
    store
}

fn seeded() -> TripStateStore<FakeTripApi> {
    seeded_with(StoreConfig::default())
}

fn stop_ids(stops: &[Stop]) -> Vec<&str> {
    stops.iter().map(|s| s.stop_id.as_str()).collect()
}

fn active_stop_ids(store: &TripStateStore<FakeTripApi>) -> Vec<String> {
    store
        .active_trip()
        .unwrap()
        .stops
        .iter()
        .map(|s| s.stop_id.to_string())
        .collect()
}

// ---------------------------------------------------------------------
// Trip lifecycle
// ---------------------------------------------------------------------

#[tokio::test]
async fn create_trip_requires_user_and_start_location() {
    let store = TripStateStore::new(FakeTripApi::default(), StoreConfig::default());

    let err = store
        .create_trip(NewTrip {
            start_location: Some(Location::new(45.0, 9.0, "Start")),
            ..NewTrip::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation { field: "user_id", .. }));

    let err = store
        .create_trip(NewTrip::new(uid("u1"), Location::new(45.0, 9.0, "  ")))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation { field: "location", .. }));

    assert!(store.api().calls().is_empty());
    assert!(store.active_trip().is_none());
}

#[tokio::test]
async fn create_trip_becomes_active_and_deactivates_previous() {
    let store = seeded();
    store.fetch_user_trips(&uid("u1")).await.unwrap();

    let created = store
        .create_trip(NewTrip::new(uid("u1"), Location::new(41.9, 12.5, "Roma")).with_name("Rome"))
        .await
        .unwrap();

    assert!(created.active_trip);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.active_trip.as_ref().unwrap().trip_id, created.trip_id);
    assert_eq!(snapshot.user_trips.len(), 2);
    assert_eq!(snapshot.user_trips[0].trip_id, created.trip_id);
    let active: Vec<_> = snapshot.user_trips.iter().filter(|t| t.active_trip).collect();
    assert_eq!(active.len(), 1);

    // Previous active trip was deactivated on the server too.
    assert!(!store.api().server_trip("t1").unwrap().active_trip);
    assert!(store.api().calls().contains(&"update_trip t1".to_string()));
}

#[tokio::test]
async fn create_trip_keeps_inline_stops() {
    let store = TripStateStore::new(FakeTripApi::default(), StoreConfig::default());
    let mut new_trip = NewTrip::new(uid("u1"), Location::new(45.0, 9.0, "Start"));
    new_trip.trip_id = Some(tid("t9"));
    new_trip.stops = vec![stop("X", "other", "Via Po 3")];

    let created = store.create_trip(new_trip).await.unwrap();
    assert_eq!(created.trip_id, tid("t9"));
    assert_eq!(created.stops.len(), 1);
    assert_eq!(created.stops[0].trip_id, tid("t9"));
}

#[tokio::test]
async fn create_trip_failure_changes_nothing() {
    let store = seeded();
    let before = store.snapshot();
    store.api().fail_next(|| ApiError::Api {
        status: 500,
        message: "Internal Server Error".into(),
    });

    let err = store
        .create_trip(NewTrip::new(uid("u1"), Location::new(41.9, 12.5, "Roma")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Api {
            operation: OperationKind::CreateTrip,
            ..
        }
    ));
    assert_eq!(store.snapshot(), before);
    let ops = store.operations();
    assert!(matches!(
        ops.last().unwrap().state,
        OperationState::Failed { .. }
    ));
}

#[tokio::test]
async fn fetch_active_trip_picks_server_active() {
    let api = FakeTripApi::with_trips(vec![
        trip("t1", "u1", false, Vec::new()),
        trip("t2", "u1", true, vec![stop("B", "t2", "Via Roma 1"), sentinel("A", "t2", "Here")]),
        trip("t3", "u2", true, Vec::new()),
    ]);
    let store = TripStateStore::new(api, StoreConfig::default());

    let active = store.fetch_active_trip(&uid("u1")).await.unwrap().unwrap();
    assert_eq!(active.trip_id, tid("t2"));
    // Normalized on the way in: sentinel first.
    assert_eq!(active_stop_ids(&store), vec!["A", "B"]);
    assert_eq!(store.user_trips().len(), 2);
}

#[tokio::test]
async fn fetch_failure_leaves_snapshot() {
    let store = seeded();
    store.api().fail_next(|| ApiError::Unauthorized);
    let err = store.fetch_user_trips(&uid("u1")).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Api {
            operation: OperationKind::FetchTrips,
            source: ApiError::Unauthorized,
            ..
        }
    ));
    assert!(store.active_trip().is_some());
}

#[tokio::test]
async fn fetch_user_trips_keeps_one_active() {
    let older = trip("t1", "u1", true, Vec::new());
    let newer = Trip {
        created_at: Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(),
        ..trip("t2", "u1", true, Vec::new())
    };
    let store = TripStateStore::new(
        FakeTripApi::with_trips(vec![older, newer]),
        StoreConfig::default(),
    );

    let trips = store.fetch_user_trips(&uid("u1")).await.unwrap();

    let active: Vec<_> = trips.iter().filter(|t| t.active_trip).map(|t| t.trip_id.as_str()).collect();
    assert_eq!(active, vec!["t2"]);
    assert_eq!(store.user_trips(), trips);
    assert!(store.active_trip().is_none());
    assert!(!store.api().server_trip("t1").unwrap().active_trip);
    assert!(store.api().server_trip("t2").unwrap().active_trip);
}

#[tokio::test]
async fn fetch_user_trips_prefers_local_active_trip() {
    let local = trip("t1", "u1", true, Vec::new());
    let newer = Trip {
        created_at: Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(),
        ..trip("t2", "u1", true, Vec::new())
    };
    let store = TripStateStore::new(
        FakeTripApi::with_trips(vec![local.clone(), newer]),
        StoreConfig::default(),
    );
    store.set_active_trip(local);

    let trips = store.fetch_user_trips(&uid("u1")).await.unwrap();

    let active: Vec<_> = trips.iter().filter(|t| t.active_trip).map(|t| t.trip_id.as_str()).collect();
    assert_eq!(active, vec!["t1"]);
    assert_eq!(store.active_trip().unwrap().trip_id, tid("t1"));
    assert!(!store.api().server_trip("t2").unwrap().active_trip);
}

#[test]
fn set_active_trip_deactivates_listed_trips() {
    let store = TripStateStore::new(FakeTripApi::default(), StoreConfig::default());
    store.set_active_trip(trip("t1", "u1", true, Vec::new()));
    store.set_active_trip(trip("t3", "u2", true, Vec::new()));

    let deactivated = store.set_active_trip(trip("t2", "u1", false, Vec::new()));

    assert_eq!(deactivated, vec![tid("t1")]);
    let snapshot = store.snapshot();
    assert!(snapshot.active_trip.as_ref().unwrap().active_trip);
    let active_u1: Vec<_> = snapshot
        .user_trips
        .iter()
        .filter(|t| t.user_id == uid("u1") && t.active_trip)
        .map(|t| t.trip_id.as_str())
        .collect();
    assert_eq!(active_u1, vec!["t2"]);
    // Other users' trips are untouched.
    assert!(snapshot.trip(&tid("t3")).unwrap().active_trip);
}

#[tokio::test]
async fn update_trip_applies_patch_after_confirmation() {
    let store = seeded();
    let patch = TripPatch {
        name: Some("Renamed".into()),
        total_distance_km: Some(12.5),
        ..TripPatch::default()
    };

    let updated = store.update_trip(&tid("t1"), patch).await.unwrap();
    assert_eq!(updated.name, "Renamed");
    // Stops survive even though the server row has none.
    assert_eq!(updated.stops.len(), 3);
    assert_eq!(store.active_trip().unwrap().total_distance_km, 12.5);
}

#[tokio::test]
async fn deactivating_active_trip_clears_slot() {
    let store = seeded();
    store
        .update_trip(&tid("t1"), TripPatch::active(false))
        .await
        .unwrap();
    assert!(store.active_trip().is_none());
}

#[tokio::test]
async fn delete_trip_removes_everywhere() {
    let store = seeded();
    store.fetch_user_trips(&uid("u1")).await.unwrap();

    store.delete_trip(&tid("t1")).await.unwrap();
    assert!(store.active_trip().is_none());
    assert!(store.user_trips().is_empty());

    // Already gone on the server: still fine.
    store.set_active_trip(trip("t1", "u1", true, Vec::new()));
    store.delete_trip(&tid("t1")).await.unwrap();
    assert!(store.active_trip().is_none());
}

// ---------------------------------------------------------------------
// Stops
// ---------------------------------------------------------------------

#[tokio::test]
async fn add_stop_appends() {
    let store = seeded();
    let outcome = store.add_stop(stop("D", "t1", "Via Po 3")).await.unwrap();
    assert!(matches!(outcome, AddStopOutcome::Added(ref s) if s.stop_id == sid("D")));
    assert_eq!(active_stop_ids(&store), vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn duplicate_address_is_rejected_locally() {
    let store = seeded();
    let outcome = store
        .add_stop(stop("D", "t1", "Via Roma 1"))
        .await
        .unwrap();

    assert!(outcome.is_duplicate());
    assert_eq!(store.active_trip().unwrap().stops.len(), 3);
    assert!(store.api().calls().is_empty());
}

#[tokio::test]
async fn duplicate_address_reported_by_server() {
    let store = seeded_with(StoreConfig::default().with_local_duplicate_check(false));
    let outcome = store
        .add_stop(stop("D", "t1", "Via Roma 1"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        AddStopOutcome::Duplicate {
            message: "Stop with this address already exists in the trip".into()
        }
    );
    assert_eq!(store.active_trip().unwrap().stops.len(), 3);
    assert_eq!(store.api().calls(), vec!["create_stop D"]);
}

#[tokio::test]
async fn new_sentinel_replaces_old_one() {
    let store = seeded();
    store
        .add_stop(sentinel("S2", "t1", "Moved here"))
        .await
        .unwrap();

    let trip = store.active_trip().unwrap();
    let sentinels: Vec<_> = trip.stops.iter().filter(|s| s.is_user_location).collect();
    assert_eq!(sentinels.len(), 1);
    assert_eq!(trip.stops[0].stop_id, sid("S2"));
    assert_eq!(active_stop_ids(&store), vec!["S2", "B", "C"]);
}

#[tokio::test]
async fn add_stop_to_unknown_trip() {
    let store = seeded();
    let err = store
        .add_stop(stop("D", "nope", "Via Po 3"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::TripNotFound(_)));
}

#[tokio::test]
async fn add_stop_failure_changes_nothing() {
    let store = seeded();
    store.api().fail_next(|| ApiError::Api {
        status: 502,
        message: "Bad Gateway".into(),
    });
    let err = store.add_stop(stop("D", "t1", "Via Po 3")).await.unwrap_err();
    assert!(matches!(err, StoreError::Api { .. }));
    assert_eq!(active_stop_ids(&store), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn remove_stop_prunes_optimized_order() {
    let store = seeded();
    store
        .set_optimized_order(vec![sid("C"), sid("B")])
        .await
        .unwrap();

    store.remove_stop(&sid("B")).await.unwrap();

    let trip = store.active_trip().unwrap();
    assert_eq!(stop_ids(&trip.stops), vec!["A", "C"]);
    assert_eq!(trip.optimized_order, vec![sid("C")]);
}

#[tokio::test]
async fn remove_unknown_stop() {
    let store = seeded();
    let err = store.remove_stop(&sid("Z")).await.unwrap_err();
    assert!(matches!(err, StoreError::StopNotFound(_)));
    assert!(store.api().calls().is_empty());
}

#[tokio::test]
async fn update_stop_splices_by_id() {
    let store = seeded();
    let updated = store
        .update_stop(
            &sid("C"),
            StopPatch {
                expected_duration: Some(300),
                ..StopPatch::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.expected_duration, 300);
    let trip = store.active_trip().unwrap();
    assert_eq!(trip.stop(&sid("C")).unwrap().expected_duration, 300);
    assert_eq!(stop_ids(&trip.stops), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn update_stop_rejects_duplicate_address() {
    let store = seeded();
    let err = store
        .update_stop(
            &sid("C"),
            StopPatch {
                location: Some(Location::new(45.1, 9.1, "Via Roma 1")),
                ..StopPatch::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Validation { field: "location", .. }));
    assert!(store.api().calls().is_empty());
    assert_eq!(
        store.active_trip().unwrap().stop(&sid("C")).unwrap().address(),
        "Via Torino 2"
    );
}

// ---------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------

#[tokio::test]
async fn optimization_order_keeps_sentinel_first() {
    let store = seeded();
    store
        .set_optimized_order(vec![sid("C"), sid("B")])
        .await
        .unwrap();

    let first = store.reorder_stops_according_to_optimization().await.unwrap();
    assert_eq!(stop_ids(&first), vec!["A", "C", "B"]);

    let second = store.reorder_stops_according_to_optimization().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_optimized_order_leaves_sequence() {
    let store = seeded();
    let stops = store.reorder_stops_according_to_optimization().await.unwrap();
    assert_eq!(stop_ids(&stops), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn set_optimized_order_drops_unknown_and_sentinel() {
    let store = seeded();
    let stored = store
        .set_optimized_order(vec![sid("C"), sid("ghost"), sid("A"), sid("B"), sid("C")])
        .await
        .unwrap();
    assert_eq!(stored, vec![sid("C"), sid("B")]);
}

#[tokio::test]
async fn manual_reorder_pins_sentinel_and_keeps_optimization() {
    let store = seeded();
    store
        .set_optimized_order(vec![sid("B"), sid("C")])
        .await
        .unwrap();

    let stops = store
        .reorder_stops_manually(vec![
            stop("C", "t1", "Via Torino 2"),
            sentinel("A", "t1", "Here"),
            stop("B", "t1", "Via Roma 1"),
        ])
        .await
        .unwrap();

    assert_eq!(stop_ids(&stops), vec!["A", "C", "B"]);
    assert_eq!(
        store.active_trip().unwrap().optimized_order,
        vec![sid("B"), sid("C")]
    );
}

#[tokio::test]
async fn manual_reorder_can_clear_optimization() {
    let store = seeded_with(StoreConfig::default().with_clear_optimization_on_manual_reorder(true));
    store
        .set_optimized_order(vec![sid("B"), sid("C")])
        .await
        .unwrap();

    store
        .reorder_stops_manually(vec![
            stop("C", "t1", "Via Torino 2"),
            stop("B", "t1", "Via Roma 1"),
        ])
        .await
        .unwrap();

    assert!(store.active_trip().unwrap().optimized_order.is_empty());
}

#[tokio::test]
async fn manual_reorder_rejects_foreign_stop() {
    let store = seeded();
    let err = store
        .reorder_stops_manually(vec![stop("X", "t2", "Elsewhere")])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation { field: "stops", .. }));
    assert_eq!(active_stop_ids(&store), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn ordering_needs_active_trip() {
    let store = TripStateStore::new(FakeTripApi::default(), StoreConfig::default());
    assert!(matches!(
        store.reorder_stops_according_to_optimization().await,
        Err(StoreError::NoActiveTrip)
    ));
    assert!(matches!(
        store.set_optimized_order(Vec::new()).await,
        Err(StoreError::NoActiveTrip)
    ));
}

// ---------------------------------------------------------------------
// Route optimization
// ---------------------------------------------------------------------

fn leg(distance_m: u64, duration_s: u64) -> RouteLeg {
    RouteLeg {
        distance_m,
        duration_s,
        start_address: String::new(),
        end_address: String::new(),
    }
}

#[tokio::test]
async fn optimize_persists_order_and_totals() {
    let store = seeded();
    store.add_stop(stop("D", "t1", "Via Po 3")).await.unwrap();

    // Waypoints are [B, C]; destination D stays last.
    let directions = FakeDirections {
        result: RouteResult::Found(Route {
            polyline: "xyz".into(),
            waypoint_order: vec![1, 0],
            legs: vec![leg(1000, 60), leg(2000, 120), leg(3000, 180)],
        }),
    };

    let route = store.optimize_active_trip(&directions).await.unwrap().unwrap();
    assert_eq!(route.polyline, "xyz");

    let trip = store.active_trip().unwrap();
    assert_eq!(trip.optimized_order, vec![sid("C"), sid("B"), sid("D")]);
    assert_eq!(stop_ids(&trip.stops), vec!["A", "C", "B", "D"]);
    assert_eq!(trip.total_distance_km, 6.0);
    assert_eq!(trip.total_duration_min, 6.0);

    let server = store.api().server_trip("t1").unwrap();
    assert_eq!(server.optimized_order, trip.optimized_order);
}

#[tokio::test]
async fn zero_results_changes_nothing() {
    let store = seeded();
    let before = store.snapshot();
    let directions = FakeDirections {
        result: crate::directions::parse_response(r#"{"status": "ZERO_RESULTS", "routes": []}"#),
    };

    assert!(store.optimize_active_trip(&directions).await.unwrap().is_none());
    assert_eq!(store.snapshot(), before);
    assert!(!store.api().calls().iter().any(|c| c.starts_with("update_trip")));
}

#[tokio::test]
async fn provider_failure_changes_nothing() {
    let store = seeded();
    let before = store.snapshot();
    let directions = FakeDirections {
        result: RouteResult::ProviderFailure {
            cause: "OVER_QUERY_LIMIT".into(),
        },
    };

    assert!(store.optimize_active_trip(&directions).await.unwrap().is_none());
    assert_eq!(store.snapshot(), before);
}

// ---------------------------------------------------------------------
// Serialization and local state
// ---------------------------------------------------------------------

#[tokio::test]
async fn same_trip_mutations_commit_in_call_order() {
    let store = seeded();
    // Earlier calls are slower; without serialization they would land last.
    store.api().stop_delays.lock().unwrap().extend([
        Duration::from_millis(60),
        Duration::from_millis(20),
        Duration::ZERO,
    ]);

    let results = futures::future::join_all(vec![
        store.add_stop(stop("D", "t1", "Via Po 3")),
        store.add_stop(stop("E", "t1", "Via Po 4")),
        store.add_stop(stop("F", "t1", "Via Po 5")),
    ])
    .await;

    assert!(results.iter().all(|r| matches!(r, Ok(AddStopOutcome::Added(_)))));
    assert_eq!(active_stop_ids(&store), vec!["A", "B", "C", "D", "E", "F"]);
    assert_eq!(
        store.api().calls(),
        vec!["create_stop D", "create_stop E", "create_stop F"]
    );
}

#[tokio::test]
async fn concurrent_duplicates_add_exactly_one() {
    let store = seeded_with(StoreConfig::default().with_local_duplicate_check(false));
    let results = futures::future::join_all(vec![
        store.add_stop(stop("D", "t1", "Via Po 3")),
        store.add_stop(stop("E", "t1", "Via Po 3")),
    ])
    .await;

    let added = results
        .iter()
        .filter(|r| matches!(r, Ok(AddStopOutcome::Added(_))))
        .count();
    assert_eq!(added, 1);
    assert_eq!(store.active_trip().unwrap().stops.len(), 4);
}

#[tokio::test]
async fn abandoned_calls_leave_no_pending_entries() {
    let store = seeded_with(StoreConfig::default().with_ledger_capacity(2));
    store
        .api()
        .stop_delays
        .lock()
        .unwrap()
        .extend([Duration::from_millis(200); 5]);

    for n in 0..5 {
        let call = store.add_stop(stop(&format!("D{n}"), "t1", &format!("Via Po {n}")));
        assert!(tokio::time::timeout(Duration::from_millis(5), call).await.is_err());
    }

    let ops = store.operations();
    assert!(ops.len() <= 2);
    assert!(ops.iter().all(|o| !o.state.is_pending()));
    assert!(ops.iter().all(|o| o.state
        == OperationState::Failed {
            cause: CANCELLED.into()
        }));
    assert_eq!(active_stop_ids(&store), vec!["A", "B", "C"]);
}

#[test]
fn confirmed_stop_wins_address_clash() {
    let mut t1 = trip(
        "t1",
        "u1",
        true,
        vec![
            sentinel("A", "t1", "Here"),
            stop("B", "t1", "Via Roma 1"),
            stop("C", "t1", "Via Torino 2"),
        ],
    );
    t1.optimized_order = vec![sid("C"), sid("B")];

    let displaced = merge_created_stop(&mut t1, stop("D", "t1", "Via Roma 1"));

    assert_eq!(displaced, 1);
    assert_eq!(stop_ids(&t1.stops), vec!["A", "C", "D"]);
    assert_eq!(t1.optimized_order, vec![sid("C")]);
}

#[test]
fn merge_without_clash_displaces_nothing() {
    let mut t1 = trip("t1", "u1", true, vec![stop("B", "t1", "Via Roma 1")]);
    assert_eq!(merge_created_stop(&mut t1, stop("C", "t1", "Via Po 3")), 0);
    assert_eq!(merge_created_stop(&mut t1, sentinel("S", "t1", "Here")), 0);
    assert_eq!(stop_ids(&t1.stops), vec!["S", "B", "C"]);
}

#[tokio::test]
async fn ledger_records_committed_operations() {
    let store = seeded();
    store.add_stop(stop("D", "t1", "Via Po 3")).await.unwrap();
    store.remove_stop(&sid("D")).await.unwrap();

    let ops = store.operations();
    let kinds: Vec<_> = ops.iter().map(|o| o.kind).collect();
    assert_eq!(kinds, vec![OperationKind::AddStop, OperationKind::RemoveStop]);
    assert!(ops.iter().all(|o| o.state == OperationState::Committed));
    assert_eq!(ops[0].target, "D");
}

#[test]
fn clear_operations() {
    let store = seeded();
    store.clear_user_trips();
    assert!(store.active_trip().is_some());

    store.clear_active_trip();
    assert!(store.active_trip().is_none());

    store.set_active_trip(trip("t2", "u1", true, Vec::new()));
    store.clear_all_trips();
    assert_eq!(store.snapshot(), TripSnapshot::default());
}

#[test]
fn set_active_trip_normalizes() {
    let store = TripStateStore::new(FakeTripApi::default(), StoreConfig::default());
    let mut messy = trip(
        "t1",
        "u1",
        true,
        vec![
            stop("B", "t1", "Via Roma 1"),
            sentinel("A", "t1", "Here"),
            stop("X", "t2", "Foreign"),
        ],
    );
    messy.optimized_order = vec![sid("ghost"), sid("B")];

    store.set_active_trip(messy);
    let trip = store.active_trip().unwrap();
    assert_eq!(stop_ids(&trip.stops), vec!["A", "B"]);
    assert_eq!(trip.optimized_order, vec![sid("B")]);
}
