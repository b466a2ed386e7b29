//! Trip planning core.
//!
//! Keeps a user's trips and their stop sequences consistent with a remote
//! Trip API, asks a directions provider for optimized visiting orders and
//! resolves coordinates to readable addresses.
//!
//! [`store::TripStateStore`] is the entry point: it owns the trip snapshot
//! and serializes mutations per trip. The pure rules it applies (sentinel
//! placement, duplicate detection, reordering) live in [`reconcile`].

pub mod api;
pub mod config;
pub mod directions;
pub mod domain;
pub mod geocode;
pub mod reconcile;
pub mod store;
pub mod viewport;
