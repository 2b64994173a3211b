//! Core types for Tidemark
//!
//! This crate defines the foundational types used throughout the system:
//! - HybridTime: 64-bit hybrid logical timestamp ordering all operations
//! - Clock: injected capability producing monotonically advancing times
//! - LogicalClock / WallClock: clock implementations
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
pub mod clock;
pub mod error;
pub mod hybrid_time;

// Re-export commonly used types and traits
pub use clock::{Clock, ClockPtr, LogicalClock, WallClock};
pub use error::{Error, Result};
pub use hybrid_time::HybridTime;
