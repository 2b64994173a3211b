//! MVCC manager: pending-operation tracking and safe-time computation
//!
//! One `MvccManager` exists per partition replica and sits on the critical
//! path of every write and every consistent read:
//!
//! 1. The write path calls [`MvccManager::add_pending`] to allocate a hybrid
//!    time before proposing the operation to replication.
//! 2. Replication reports the outcome with [`MvccManager::replicated`] or
//!    [`MvccManager::aborted`]; every allocated time is resolved exactly once.
//! 3. Readers call the `safe_time` family to obtain the highest hybrid time
//!    at which no undecided operation can still land.
//!
//! ## Safe-time algorithm
//!
//! With pending multiset `P` and active bound `B`:
//! - `P` non-empty: safe time is `min(min(P).decremented(), B)`, one tick
//!   below the smallest undecided time, since a reader at or above that time
//!   could be affected by the outcome.
//! - `P` empty, leader: safe time is `min(now(), B)`. The clock is read
//!   before the bound is applied, so the result can trail but never overtake
//!   the physical clock.
//! - `P` empty, follower: safe time is the propagated bound itself; a
//!   follower never consults the local clock.
//!
//! ## Roles
//!
//! The manager stores no role flag. Leader entry points carry a hybrid-time
//! lease source; the follower entry point selects the propagated bound
//! pushed by replication heartbeats. The surrounding replication layer
//! serializes role transitions against which entry point it calls.
//!
//! ## Concurrency
//!
//! All operations are safe to call from arbitrary threads. Mutable state is
//! one small block behind a single mutex (multiset insert/remove plus two
//! scalar updates); blocking queries park on per-waiter condvars and never
//! hold the mutex while suspended.

use crate::waiter::WaiterRegistry;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tidemark_core::{Clock, HybridTime};
use tracing::{debug, trace, warn};

/// Bound source for one safe-time query
///
/// The leader's bound comes from a hybrid-time lease provider, re-invoked on
/// every retry because the lease may advance between retries. The follower's
/// bound is the propagated safe time stored in the manager.
enum BoundSource<'a> {
    Lease(&'a dyn Fn() -> HybridTime),
    Propagated,
}

/// Mutable state, guarded by a single mutex
struct Inner {
    /// Pending hybrid times, value to occurrence count
    ///
    /// Duplicate values can arise during follower replay, where
    /// leader-issued times are reused verbatim; each insertion is matched by
    /// exactly one later removal.
    pending: BTreeMap<HybridTime, usize>,

    /// Highest time confirmed replicated, in arrival order of calls
    last_replicated: HybridTime,

    /// Follower-mode lower bound pushed by replication heartbeats;
    /// never regresses
    propagated_safe_time: HybridTime,

    /// Threads parked in blocking safe-time calls
    waiters: WaiterRegistry,
}

/// Per-replica safe-time engine
///
/// Tracks not-yet-decided hybrid times and computes the snapshot bound
/// usable for consistent reads. See the module documentation for the
/// algorithm and the concurrency model.
pub struct MvccManager {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl MvccManager {
    /// Create a manager bound to the given clock
    ///
    /// The manager holds the clock for its whole lifetime but claims no
    /// ownership over what drives it; the same clock is typically shared
    /// with the replication layer.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MvccManager {
            clock,
            inner: Mutex::new(Inner {
                pending: BTreeMap::new(),
                last_replicated: HybridTime::MIN,
                propagated_safe_time: HybridTime::MIN,
                waiters: WaiterRegistry::new(),
            }),
        }
    }

    // =========================================================================
    // Write path
    // =========================================================================

    /// Allocate a fresh pending hybrid time (leader mode)
    ///
    /// Mints the time from the clock, which guarantees it exceeds every
    /// previously seen value, and inserts it into the pending multiset. The
    /// caller must later resolve it with exactly one of [`replicated`] or
    /// [`aborted`].
    ///
    /// [`replicated`]: MvccManager::replicated
    /// [`aborted`]: MvccManager::aborted
    pub fn add_pending(&self) -> HybridTime {
        let mut inner = self.inner.lock();
        let ht = self.clock.now();
        debug_assert!(
            inner.pending.keys().next_back().map_or(true, |last| *last < ht),
            "clock minted a pending time at or below an existing one"
        );
        *inner.pending.entry(ht).or_insert(0) += 1;
        trace!(%ht, "added pending operation");
        ht
    }

    /// Insert an explicit, already-decided hybrid time (follower replay)
    ///
    /// The time was allocated by the leader and arrives through the
    /// replicated log; it is inserted exactly as if freshly allocated.
    /// Duplicate values are tracked by count.
    pub fn add_pending_at(&self, ht: HybridTime) {
        let mut inner = self.inner.lock();
        *inner.pending.entry(ht).or_insert(0) += 1;
        trace!(%ht, "added pending operation at explicit time");
    }

    /// Mark `ht` as durably decided
    ///
    /// Removes one occurrence from the pending multiset and advances the
    /// last-replicated time, then wakes waiters whose bound may now be
    /// satisfied.
    ///
    /// # Panics
    ///
    /// Panics if `ht` is not currently pending. That is a caller bug, not a
    /// runtime condition to recover from.
    pub fn replicated(&self, ht: HybridTime) {
        let mut inner = self.inner.lock();
        Self::remove_pending(&mut inner, ht, "replicated");
        inner.last_replicated = ht;
        trace!(%ht, "pending operation replicated");
        Self::wake_eligible(&inner);
    }

    /// Mark `ht` as abandoned; its write will never become durable
    ///
    /// Removes one occurrence from the pending multiset without touching the
    /// last-replicated time, then wakes waiters symmetrically with
    /// [`replicated`](MvccManager::replicated).
    ///
    /// # Panics
    ///
    /// Panics if `ht` is not currently pending.
    pub fn aborted(&self, ht: HybridTime) {
        let mut inner = self.inner.lock();
        Self::remove_pending(&mut inner, ht, "aborted");
        trace!(%ht, "pending operation aborted");
        Self::wake_eligible(&inner);
    }

    // =========================================================================
    // Read path
    // =========================================================================

    /// Current safe time with no lease bound
    ///
    /// Purely a function of the pending multiset and the clock; equivalent
    /// to [`safe_time_with_lease`](MvccManager::safe_time_with_lease) with
    /// [`HybridTime::MAX`].
    pub fn safe_time(&self) -> HybridTime {
        self.safe_time_with_lease(HybridTime::MAX)
    }

    /// Current safe time clamped by a fixed lease bound (leader mode)
    pub fn safe_time_with_lease(&self, ht_lease: HybridTime) -> HybridTime {
        let inner = self.inner.lock();
        self.compute_safe_time(&inner, &BoundSource::Lease(&|| ht_lease))
    }

    /// Block until the safe time reaches `min_allowed` (leader mode)
    ///
    /// `ht_lease_provider` is invoked once per retry iteration, never
    /// cached, because the lease may advance between retries. A `deadline`
    /// of `None` means no deadline. Returns `None` exactly when the deadline
    /// elapses before the condition is met; that is an expected outcome, not
    /// an error.
    ///
    /// With an empty pending multiset the result is limited by the lease,
    /// which by construction stays ahead of any reasonable `min_allowed`;
    /// waiting for a clock time that nothing will ever certify is a caller
    /// liveness bug.
    pub fn wait_for_safe_time<F>(
        &self,
        min_allowed: HybridTime,
        deadline: Option<Instant>,
        ht_lease_provider: F,
    ) -> Option<HybridTime>
    where
        F: Fn() -> HybridTime,
    {
        self.wait_until_safe(min_allowed, deadline, BoundSource::Lease(&ht_lease_provider))
    }

    /// Block until the safe time reaches `min_allowed` (follower mode)
    ///
    /// Ignores the local clock and lease entirely; the result is clamped by
    /// the propagated safe time received from the leader.
    pub fn safe_time_for_follower(
        &self,
        min_allowed: HybridTime,
        deadline: Option<Instant>,
    ) -> Option<HybridTime> {
        self.wait_until_safe(min_allowed, deadline, BoundSource::Propagated)
    }

    /// Raise the follower-mode lower bound on safe time
    ///
    /// The bound reflects the leader's knowledge, piggybacked on replication
    /// heartbeats, and is monotonic: a value below the current bound is
    /// ignored.
    pub fn set_propagated_safe_time(&self, ht: HybridTime) {
        let mut inner = self.inner.lock();
        if ht < inner.propagated_safe_time {
            warn!(
                current = %inner.propagated_safe_time,
                received = %ht,
                "ignoring propagated safe time regression"
            );
            return;
        }
        inner.propagated_safe_time = ht;
        Self::wake_eligible(&inner);
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Most recent hybrid time confirmed replicated
    pub fn last_replicated_hybrid_time(&self) -> HybridTime {
        self.inner.lock().last_replicated
    }

    /// Number of operations currently pending, counting duplicates
    pub fn pending_operations(&self) -> usize {
        self.inner.lock().pending.values().sum()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Remove one occurrence of `ht` from the pending multiset
    fn remove_pending(inner: &mut Inner, ht: HybridTime, op: &str) {
        match inner.pending.get_mut(&ht) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                inner.pending.remove(&ht);
            }
            None => panic!("{op} called for a hybrid time that is not pending: {ht}"),
        }
    }

    /// Notify waiters covered by the pending-set-derived limit
    ///
    /// The limit ignores lease, propagated bound, and clock, all of which
    /// only lower the final result; waking against the over-approximation
    /// can produce spurious wakeups but never missed ones. Runs under the
    /// manager lock, same as every predicate evaluation.
    fn wake_eligible(inner: &Inner) {
        let limit = match inner.pending.keys().next() {
            Some(first) => first.decremented(),
            None => HybridTime::MAX,
        };
        let woken = inner.waiters.wake_up_to(limit);
        if woken > 0 {
            trace!(%limit, woken, "woke safe time waiters");
        }
    }

    /// The safe-time computation, parameterized over the active bound source
    fn compute_safe_time(&self, inner: &Inner, source: &BoundSource<'_>) -> HybridTime {
        let pending_limit = inner.pending.keys().next().map(|first| first.decremented());
        match source {
            BoundSource::Lease(provider) => {
                let bound = provider();
                match pending_limit {
                    Some(limit) => limit.min(bound),
                    None => {
                        // Clock read first, bound applied after: the result
                        // can trail but never overtake the physical clock.
                        let result = self.clock.now().min(bound);
                        debug_assert!(result <= self.clock.now());
                        result
                    }
                }
            }
            BoundSource::Propagated => match pending_limit {
                Some(limit) => limit.min(inner.propagated_safe_time),
                None => inner.propagated_safe_time,
            },
        }
    }

    /// Shared blocking loop behind both blocking entry points
    fn wait_until_safe(
        &self,
        min_allowed: HybridTime,
        deadline: Option<Instant>,
        source: BoundSource<'_>,
    ) -> Option<HybridTime> {
        let mut inner = self.inner.lock();
        loop {
            let safe_time = self.compute_safe_time(&inner, &source);
            if safe_time >= min_allowed {
                return Some(safe_time);
            }

            let (key, waiter) = inner.waiters.register(min_allowed);
            let timed_out = match deadline {
                Some(deadline) => waiter.wait_until(&mut inner, deadline).timed_out(),
                None => {
                    waiter.wait(&mut inner);
                    false
                }
            };
            inner.waiters.deregister(key);

            if timed_out {
                // One last evaluation: the condition may have been met right
                // as the deadline fired.
                let safe_time = self.compute_safe_time(&inner, &source);
                if safe_time >= min_allowed {
                    return Some(safe_time);
                }
                debug!(%min_allowed, "safe time wait timed out");
                return None;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
