//! Waiter registry for blocking safe-time queries
//!
//! Each thread parked in a blocking safe-time call registers here, keyed by
//! the minimum safe time it is waiting for. Mutations that can raise the
//! safe time notify every waiter whose bound is covered by the new
//! pending-set-derived limit; the woken thread re-evaluates its full
//! condition (lease, propagated bound, clock) under the manager lock and
//! re-registers if still unsatisfied.
//!
//! The registry itself lives inside the manager's mutex, so registration,
//! notification, and predicate evaluation are all serialized: a waiter can
//! be woken spuriously but can never miss a wakeup.

use parking_lot::Condvar;
use std::collections::BTreeMap;
use std::sync::Arc;
use tidemark_core::HybridTime;

/// Identifies one registered waiter: its requested bound plus a unique id
/// so equal bounds coexist
pub(crate) type WaiterKey = (HybridTime, u64);

/// Registry of threads parked in blocking safe-time calls
pub(crate) struct WaiterRegistry {
    /// Waiters ordered by requested minimum safe time
    waiters: BTreeMap<WaiterKey, Arc<Condvar>>,
    /// Next unique id for key disambiguation
    next_id: u64,
}

impl WaiterRegistry {
    pub(crate) fn new() -> Self {
        WaiterRegistry {
            waiters: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Register a waiter for `min_allowed` and hand back its key and the
    /// condvar it should park on
    pub(crate) fn register(&mut self, min_allowed: HybridTime) -> (WaiterKey, Arc<Condvar>) {
        let key = (min_allowed, self.next_id);
        self.next_id += 1;
        let condvar = Arc::new(Condvar::new());
        self.waiters.insert(key, Arc::clone(&condvar));
        (key, condvar)
    }

    /// Remove a waiter; called by the waiter itself after waking, whether
    /// satisfied or timed out
    pub(crate) fn deregister(&mut self, key: WaiterKey) {
        self.waiters.remove(&key);
    }

    /// Notify every waiter whose requested bound is at or below `bound`,
    /// returning how many were notified
    pub(crate) fn wake_up_to(&self, bound: HybridTime) -> usize {
        let mut woken = 0;
        for condvar in self.waiters.range(..=(bound, u64::MAX)).map(|(_, cv)| cv) {
            condvar.notify_one();
            woken += 1;
        }
        woken
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }
}
