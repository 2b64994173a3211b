//! Error types for Tidemark
//!
//! This module defines the error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Note the deliberate split in failure handling: out-of-range values fed to
//! checked constructors surface here as `Err`, a blocking safe-time query
//! whose deadline elapses returns `None` (an expected outcome, not an error),
//! and contract violations such as resolving a hybrid time that was never
//! added panic instead of returning.

use thiserror::Error;

/// Result type alias for Tidemark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the safe-time engine
#[derive(Debug, Error)]
pub enum Error {
    /// Physical component does not fit the hybrid time encoding
    #[error("physical time component out of range: {0} microseconds")]
    PhysicalOutOfRange(u64),

    /// Logical component does not fit the hybrid time encoding
    #[error("logical time component out of range: {0}")]
    LogicalOutOfRange(u64),
}
