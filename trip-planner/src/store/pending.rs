//! Ledger of store operations.
//!
//! Every mutation is recorded as `Pending` before its collaborator call and
//! moves exactly once to `Committed` or `Failed`. Local state is written only
//! on the way to `Committed`, so a failed operation has nothing to roll back.
//! An [`OperationGuard`] dropped before either transition (the caller gave up
//! on the future) records the entry as failed with cause `cancelled`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::domain::TripId;

/// Which store operation an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    FetchTrips,
    CreateTrip,
    UpdateTrip,
    DeleteTrip,
    DeactivateTrip,
    AddStop,
    RemoveStop,
    UpdateStop,
    ReorderManually,
    ReorderByOptimization,
    SetOptimizedOrder,
    OptimizeRoute,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::FetchTrips => "fetch_trips",
            OperationKind::CreateTrip => "create_trip",
            OperationKind::UpdateTrip => "update_trip",
            OperationKind::DeleteTrip => "delete_trip",
            OperationKind::DeactivateTrip => "deactivate_trip",
            OperationKind::AddStop => "add_stop",
            OperationKind::RemoveStop => "remove_stop",
            OperationKind::UpdateStop => "update_stop",
            OperationKind::ReorderManually => "reorder_manually",
            OperationKind::ReorderByOptimization => "reorder_by_optimization",
            OperationKind::SetOptimizedOrder => "set_optimized_order",
            OperationKind::OptimizeRoute => "optimize_route",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger-assigned operation number, increasing per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(u64);

impl OperationId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Lifecycle state of a recorded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Committed,
    Failed { cause: String },
}

impl OperationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, OperationState::Pending)
    }
}

/// One recorded operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub trip_id: Option<TripId>,
    /// Id of the trip or stop the operation targets.
    pub target: String,
    pub state: OperationState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Bounded record of recent operations.
///
/// Pending entries are never evicted; once more than `capacity` entries are
/// held, the oldest finished ones go first.
#[derive(Debug)]
pub struct PendingLedger {
    next_id: u64,
    capacity: usize,
    entries: VecDeque<PendingOperation>,
}

impl PendingLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: 1,
            capacity,
            entries: VecDeque::new(),
        }
    }

    /// Record a new pending operation.
    pub fn begin(
        &mut self,
        kind: OperationKind,
        trip_id: Option<TripId>,
        target: impl Into<String>,
    ) -> OperationId {
        let id = OperationId(self.next_id);
        self.next_id += 1;
        self.entries.push_back(PendingOperation {
            id,
            kind,
            trip_id,
            target: target.into(),
            state: OperationState::Pending,
            started_at: Utc::now(),
            finished_at: None,
        });
        self.evict();
        id
    }

    /// Mark an operation committed. Returns false if it was not pending.
    pub fn commit(&mut self, id: OperationId) -> bool {
        self.finish(id, OperationState::Committed)
    }

    /// Mark an operation failed. Returns false if it was not pending.
    pub fn fail(&mut self, id: OperationId, cause: impl Into<String>) -> bool {
        self.finish(
            id,
            OperationState::Failed {
                cause: cause.into(),
            },
        )
    }

    fn finish(&mut self, id: OperationId, state: OperationState) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        if !entry.state.is_pending() {
            return false;
        }
        entry.state = state;
        entry.finished_at = Some(Utc::now());
        self.evict();
        true
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(pos) = self.entries.iter().position(|e| !e.state.is_pending()) else {
                break;
            };
            self.entries.remove(pos);
        }
    }

    /// Look up an operation.
    pub fn get(&self, id: OperationId) -> Option<&PendingOperation> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Operations still waiting on a collaborator.
    pub fn in_flight(&self) -> Vec<PendingOperation> {
        self.entries
            .iter()
            .filter(|e| e.state.is_pending())
            .cloned()
            .collect()
    }

    /// All retained operations, oldest first.
    pub fn entries(&self) -> Vec<PendingOperation> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cause recorded for an operation whose future was dropped.
pub const CANCELLED: &str = "cancelled";

fn lock(ledger: &Mutex<PendingLedger>) -> MutexGuard<'_, PendingLedger> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ties one ledger entry to the lifetime of the call that began it.
#[must_use = "dropping the guard records the operation as cancelled"]
#[derive(Debug)]
pub struct OperationGuard<'a> {
    ledger: &'a Mutex<PendingLedger>,
    id: OperationId,
    finished: bool,
}

impl<'a> OperationGuard<'a> {
    /// Record a pending operation in `ledger`.
    pub fn begin(
        ledger: &'a Mutex<PendingLedger>,
        kind: OperationKind,
        trip_id: Option<TripId>,
        target: impl Into<String>,
    ) -> Self {
        let id = lock(ledger).begin(kind, trip_id, target);
        Self {
            ledger,
            id,
            finished: false,
        }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn commit(mut self) {
        self.finished = true;
        lock(self.ledger).commit(self.id);
    }

    pub fn fail(mut self, cause: impl Into<String>) {
        self.finished = true;
        lock(self.ledger).fail(self.id, cause);
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            lock(self.ledger).fail(self.id, CANCELLED);
        }
    }
}
