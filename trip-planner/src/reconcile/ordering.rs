//! Stop ordering reconciliation.
//!
//! A trip has two orderings: the stored (manual) sequence, and the
//! provider-suggested `optimized_order`. The functions here merge them while
//! keeping the user-location sentinel pinned at the head.
//!
//! Applying an optimized order only emits stops it names. A stop added after
//! the optimization was computed is therefore hidden from the reordered
//! sequence until a new optimization runs.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::domain::{DomainError, Stop, StopId, TripId};

/// Split a stop list into the sentinel (first one found) and the routable stops.
pub fn split_sentinel(stops: &[Stop]) -> (Option<&Stop>, Vec<&Stop>) {
    let sentinel = stops.iter().find(|s| s.is_user_location);
    let rest = stops.iter().filter(|s| !s.is_user_location).collect();
    (sentinel, rest)
}

/// Move the sentinel to the head, keeping the relative order of other stops.
pub fn sentinel_first(mut stops: Vec<Stop>) -> Vec<Stop> {
    if let Some(pos) = stops.iter().position(|s| s.is_user_location)
        && pos > 0
    {
        let sentinel = stops.remove(pos);
        stops.insert(0, sentinel);
    }
    stops
}

/// Reorder stops to follow `optimized_order`.
///
/// Ids with no matching stop are dropped, as are repeats. Stops missing from
/// the order are omitted. The sentinel is never looked up through the order;
/// it is always emitted first. An empty order leaves the sequence as is.
pub fn reorder_by_optimization(stops: &[Stop], optimized_order: &[StopId]) -> Vec<Stop> {
    if optimized_order.is_empty() {
        return sentinel_first(stops.to_vec());
    }

    let (sentinel, routable) = split_sentinel(stops);
    let by_id: HashMap<&StopId, &Stop> = routable.iter().map(|s| (&s.stop_id, *s)).collect();

    let mut seen = HashSet::new();
    let mut reordered = Vec::with_capacity(optimized_order.len() + 1);
    reordered.extend(sentinel.cloned());

    for id in optimized_order {
        if let Some(stop) = by_id.get(id)
            && seen.insert(id)
        {
            reordered.push((*stop).clone());
        }
    }

    reordered
}

/// Replace the stored sequence with a caller-supplied one.
///
/// Sentinels in `new_sequence` are discarded and the trip's current sentinel
/// is spliced back at the head. Every other stop must belong to `trip_id`
/// and ids and addresses must be unique.
pub fn apply_manual_order(
    trip_id: &TripId,
    current: &[Stop],
    new_sequence: Vec<Stop>,
) -> Result<Vec<Stop>, DomainError> {
    let (sentinel, _) = split_sentinel(current);

    let mut ids = HashSet::new();
    let mut addresses = HashSet::new();
    if let Some(sentinel) = sentinel {
        ids.insert(sentinel.stop_id.clone());
        addresses.insert(sentinel.location.address.clone());
    }

    let mut result = Vec::with_capacity(new_sequence.len() + 1);
    result.extend(sentinel.cloned());

    for stop in new_sequence.into_iter().filter(|s| !s.is_user_location) {
        if &stop.trip_id != trip_id {
            return Err(DomainError::ForeignStop {
                stop: stop.stop_id.to_string(),
                found: stop.trip_id.to_string(),
                expected: trip_id.to_string(),
            });
        }
        if !ids.insert(stop.stop_id.clone()) {
            return Err(DomainError::DuplicateInSequence(stop.stop_id.to_string()));
        }
        if !addresses.insert(stop.location.address.clone()) {
            return Err(DomainError::DuplicateInSequence(stop.location.address));
        }
        result.push(stop);
    }

    Ok(result)
}

/// Translate a provider's waypoint order (indices into `waypoints`) to stop ids.
///
/// The result is always a permutation of `waypoints`: out-of-range and
/// repeated indices are skipped, and waypoints the provider left out are
/// appended in their original order.
pub fn translate_waypoint_order(waypoints: &[StopId], order: &[usize]) -> Vec<StopId> {
    let mut used = vec![false; waypoints.len()];
    let mut result = Vec::with_capacity(waypoints.len());

    for &idx in order {
        if idx < waypoints.len() && !used[idx] {
            used[idx] = true;
            result.push(waypoints[idx].clone());
        }
    }

    if result.len() < waypoints.len() || order.len() != waypoints.len() {
        warn!(
            waypoints = waypoints.len(),
            order_len = order.len(),
            "Provider waypoint order is not a permutation, repairing"
        );
        for (idx, id) in waypoints.iter().enumerate() {
            if !used[idx] {
                result.push(id.clone());
            }
        }
    }

    result
}
