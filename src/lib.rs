//! Tidemark - MVCC safe-time engine for per-partition database replicas
//!
//! Tidemark tracks the hybrid times of in-flight writes on a replica and
//! computes the *safe time*: the highest hybrid time at which a reader is
//! guaranteed that no equal-or-lower-timestamped write is still undecided.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tidemark::{Clock, LogicalClock, MvccManager};
//!
//! let clock = Arc::new(LogicalClock::new());
//! let manager = MvccManager::new(clock.clone() as Arc<dyn Clock>);
//!
//! // Write path: allocate a pending time, then confirm it replicated.
//! let ht = manager.add_pending();
//! assert_eq!(manager.safe_time(), ht.decremented());
//! manager.replicated(ht);
//!
//! // Read path: the safe time now tracks the clock again.
//! assert!(manager.safe_time() > ht);
//! ```
//!
//! # Architecture
//!
//! The [`MvccManager`] owns the pending-operation multiset and the waiter
//! registry for blocking queries. [`HybridTime`] and the injected [`Clock`]
//! capability live in `tidemark-core`; the replication layer and the clock
//! source are external collaborators.

// Re-export the public API from the member crates
pub use tidemark_core::*;
pub use tidemark_mvcc::*;
