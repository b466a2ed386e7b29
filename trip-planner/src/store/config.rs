//! Store configuration.

/// Behavior switches for [`TripStateStore`](super::TripStateStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Check new stops against the local snapshot for duplicate addresses
    /// before asking the Trip API. The server check still applies.
    pub local_duplicate_check: bool,

    /// Clear `optimized_order` when the user reorders stops by hand, so the
    /// two orderings cannot diverge.
    pub clear_optimization_on_manual_reorder: bool,

    /// Number of finished operations kept in the ledger.
    pub ledger_capacity: usize,
}

impl StoreConfig {
    /// Set whether the local duplicate check runs.
    pub fn with_local_duplicate_check(mut self, enabled: bool) -> Self {
        self.local_duplicate_check = enabled;
        self
    }

    /// Set whether a manual reorder clears the optimized order.
    pub fn with_clear_optimization_on_manual_reorder(mut self, enabled: bool) -> Self {
        self.clear_optimization_on_manual_reorder = enabled;
        self
    }

    /// Set the ledger history size.
    pub fn with_ledger_capacity(mut self, capacity: usize) -> Self {
        self.ledger_capacity = capacity;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            local_duplicate_check: true,
            clear_optimization_on_manual_reorder: false,
            ledger_capacity: 64,
        }
    }
}
