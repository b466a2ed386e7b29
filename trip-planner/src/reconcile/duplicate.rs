//! Duplicate stop detection.
//!
//! Two stops in the same trip may not share an address. The Trip API enforces
//! this server-side; the same rule is applied locally so the store can answer
//! without a round trip.

use crate::domain::{Stop, StopId};

/// Outcome of checking a candidate stop against a trip's stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// No existing stop shares the candidate's address.
    Accept,
    /// An existing stop already has this address.
    Reject { existing: StopId },
}

impl GuardDecision {
    /// Returns true if the candidate may be added.
    pub fn is_accept(&self) -> bool {
        matches!(self, GuardDecision::Accept)
    }
}

/// Predicate guarding against duplicate stop addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateGuard;

impl DuplicateGuard {
    /// Check a candidate stop against the existing stops of its trip.
    ///
    /// Addresses are compared exactly. A stop is never a duplicate of itself,
    /// so re-checking an already stored stop (same id) is accepted.
    pub fn check(candidate: &Stop, existing: &[Stop]) -> GuardDecision {
        Self::check_address(&candidate.stop_id, candidate.address(), existing)
    }

    /// Check whether `address` may be used by the stop `stop_id`.
    pub fn check_address(stop_id: &StopId, address: &str, existing: &[Stop]) -> GuardDecision {
        existing
            .iter()
            .find(|s| &s.stop_id != stop_id && s.address() == address)
            .map_or(GuardDecision::Accept, |s| GuardDecision::Reject {
                existing: s.stop_id.clone(),
            })
    }
}
