//! Stop ordering and duplicate reconciliation.
//!
//! Pure functions over stop sequences: they never perform I/O and can be
//! called on any snapshot, concurrently with store mutations.

mod duplicate;
mod ordering;

pub use duplicate::{DuplicateGuard, GuardDecision};
pub use ordering::{
    apply_manual_order, reorder_by_optimization, sentinel_first, split_sentinel,
    translate_waypoint_order,
};
