//! Per-trip operation lanes.
//!
//! Mutations against one trip run one at a time in arrival order. Each trip
//! gets a fair async mutex; tokio's mutex hands the lock to waiters in FIFO
//! order. Different trips never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use crate::domain::TripId;

/// Exclusive access to one trip's lane. Released on drop.
#[derive(Debug)]
pub struct LaneGuard {
    trip_id: TripId,
    _guard: OwnedMutexGuard<()>,
}

impl LaneGuard {
    pub fn trip_id(&self) -> &TripId {
        &self.trip_id
    }
}

/// Registry of per-trip lanes.
#[derive(Debug, Default)]
pub struct TripLanes {
    lanes: Mutex<HashMap<TripId, Arc<tokio::sync::Mutex<()>>>>,
}

impl TripLanes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for this trip's lane.
    pub async fn acquire(&self, trip_id: &TripId) -> LaneGuard {
        let lane = {
            let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
            // Idle lanes are only referenced by the map.
            lanes.retain(|_, lane| Arc::strong_count(lane) > 1);
            Arc::clone(lanes.entry(trip_id.clone()).or_default())
        };

        LaneGuard {
            trip_id: trip_id.clone(),
            _guard: lane.lock_owned().await,
        }
    }

    /// Number of lanes currently held or waited on.
    pub fn active_lanes(&self) -> usize {
        let lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        lanes.values().filter(|lane| Arc::strong_count(lane) > 1).count()
    }
}
