//! Hybrid logical timestamp type
//!
//! `HybridTime` is the canonical ordering primitive for replicated
//! operations: a 64-bit value combining a physical-clock component with a
//! logical tie-breaking counter, totally ordered so that distributed
//! operations can be ordered without synchronized clocks.
//!
//! ## Encoding
//!
//! The low 12 bits hold the logical counter (0..4096) and the high 52 bits
//! hold physical microseconds since Unix epoch. Comparing the raw `u64`
//! therefore orders first by physical time, then by logical counter.
//!
//! ## Usage
//!
//! Never expose raw arithmetic. Use the explicit operations:
//!
//! ```
//! use tidemark_core::HybridTime;
//!
//! let ht = HybridTime::from_micros(1_000);
//! assert!(ht.decremented() < ht);
//! assert_eq!(ht.add_micros(5).physical_micros(), 1_005);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of low bits reserved for the logical component
const BITS_FOR_LOGICAL: u32 = 12;

/// Mask selecting the logical component of the raw representation
const LOGICAL_MASK: u64 = (1 << BITS_FOR_LOGICAL) - 1;

/// Largest physical component representable in the remaining high bits
const MAX_PHYSICAL_MICROS: u64 = u64::MAX >> BITS_FOR_LOGICAL;

/// 64-bit hybrid logical timestamp
///
/// Totally ordered and monotonically advancing when minted through a
/// [`Clock`](crate::Clock). The value is opaque to callers; it is only
/// produced by clocks and manipulated through the operations below.
///
/// ## Invariants
///
/// - Ordering on `HybridTime` equals ordering on the raw `u64` encoding
/// - `MIN <= ht <= MAX` for every value
/// - `decremented()` and `incremented()` move by exactly one representable
///   value, saturating at `MIN`/`MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HybridTime(u64);

impl HybridTime {
    /// Smallest representable hybrid time
    pub const MIN: HybridTime = HybridTime(0);

    /// Largest representable hybrid time, used as "no bound"
    pub const MAX: HybridTime = HybridTime(u64::MAX);

    /// First value issued by a fresh clock
    pub const INITIAL: HybridTime = HybridTime(1);

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a hybrid time from its raw 64-bit encoding
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        HybridTime(raw)
    }

    /// Create a hybrid time from physical microseconds with a zero logical
    /// component
    ///
    /// Saturates at the largest representable physical component.
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        if micros > MAX_PHYSICAL_MICROS {
            HybridTime((MAX_PHYSICAL_MICROS << BITS_FOR_LOGICAL) | LOGICAL_MASK)
        } else {
            HybridTime(micros << BITS_FOR_LOGICAL)
        }
    }

    /// Create a hybrid time from explicit physical and logical components
    ///
    /// Returns an error if either component does not fit its field.
    pub fn from_components(micros: u64, logical: u64) -> Result<Self> {
        if micros > MAX_PHYSICAL_MICROS {
            return Err(Error::PhysicalOutOfRange(micros));
        }
        if logical > LOGICAL_MASK {
            return Err(Error::LogicalOutOfRange(logical));
        }
        Ok(HybridTime((micros << BITS_FOR_LOGICAL) | logical))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the raw 64-bit encoding
    #[inline]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// Get the physical component in microseconds since Unix epoch
    #[inline]
    pub const fn physical_micros(&self) -> u64 {
        self.0 >> BITS_FOR_LOGICAL
    }

    /// Get the logical tie-breaking component
    #[inline]
    pub const fn logical(&self) -> u64 {
        self.0 & LOGICAL_MASK
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// The largest hybrid time strictly less than this one
    ///
    /// Saturates at `HybridTime::MIN`, which has no predecessor.
    #[inline]
    pub const fn decremented(&self) -> Self {
        HybridTime(self.0.saturating_sub(1))
    }

    /// The smallest hybrid time strictly greater than this one
    ///
    /// Saturates at `HybridTime::MAX`, which has no successor.
    #[inline]
    pub const fn incremented(&self) -> Self {
        HybridTime(self.0.saturating_add(1))
    }

    /// Advance by a non-negative logical delta
    ///
    /// Operates on the full encoding, so a delta large enough to overflow
    /// the logical field carries into the physical component. Saturates at
    /// `HybridTime::MAX`.
    #[inline]
    pub const fn add_logical(&self, delta: u64) -> Self {
        HybridTime(self.0.saturating_add(delta))
    }

    /// Advance the physical component by the given number of microseconds
    ///
    /// Saturates at `HybridTime::MAX`.
    #[inline]
    pub const fn add_micros(&self, micros: u64) -> Self {
        if micros > MAX_PHYSICAL_MICROS {
            HybridTime::MAX
        } else {
            HybridTime(self.0.saturating_add(micros << BITS_FOR_LOGICAL))
        }
    }
}

impl Default for HybridTime {
    fn default() -> Self {
        HybridTime::MIN
    }
}

impl std::fmt::Display for HybridTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format as "physical.logical" for readability
        write!(f, "{}.{:04}", self.physical_micros(), self.logical())
    }
}

// ============================================================================
// From Implementations
// ============================================================================

impl From<u64> for HybridTime {
    /// Create from the raw encoding
    fn from(raw: u64) -> Self {
        HybridTime::from_raw(raw)
    }
}

impl From<HybridTime> for u64 {
    /// Extract the raw encoding
    fn from(ht: HybridTime) -> Self {
        ht.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_distinguished_values() {
        assert_eq!(HybridTime::MIN.as_raw(), 0);
        assert_eq!(HybridTime::MAX.as_raw(), u64::MAX);
        assert_eq!(HybridTime::INITIAL, HybridTime::MIN.incremented());
        assert!(HybridTime::MIN < HybridTime::INITIAL);
        assert!(HybridTime::INITIAL < HybridTime::MAX);
    }

    #[test]
    fn test_components_round_trip() {
        let ht = HybridTime::from_components(1_234_567, 42).unwrap();
        assert_eq!(ht.physical_micros(), 1_234_567);
        assert_eq!(ht.logical(), 42);
    }

    #[test]
    fn test_from_components_rejects_large_logical() {
        let err = HybridTime::from_components(0, 4096).unwrap_err();
        assert!(err.to_string().contains("logical"));
    }

    #[test]
    fn test_from_components_rejects_large_physical() {
        let err = HybridTime::from_components(u64::MAX, 0).unwrap_err();
        assert!(err.to_string().contains("physical"));
    }

    #[test]
    fn test_from_micros_has_zero_logical() {
        let ht = HybridTime::from_micros(500);
        assert_eq!(ht.physical_micros(), 500);
        assert_eq!(ht.logical(), 0);
    }

    #[test]
    fn test_ordering_physical_before_logical() {
        let early = HybridTime::from_components(100, 4095).unwrap();
        let late = HybridTime::from_components(101, 0).unwrap();
        assert!(early < late);
    }

    #[test]
    fn test_decremented_and_incremented() {
        let ht = HybridTime::from_micros(1_000);
        assert_eq!(ht.decremented().incremented(), ht);
        assert!(ht.decremented() < ht);
        assert!(ht.incremented() > ht);
    }

    #[test]
    fn test_decremented_saturates_at_min() {
        assert_eq!(HybridTime::MIN.decremented(), HybridTime::MIN);
    }

    #[test]
    fn test_incremented_saturates_at_max() {
        assert_eq!(HybridTime::MAX.incremented(), HybridTime::MAX);
    }

    #[test]
    fn test_add_logical_carries_into_physical() {
        let ht = HybridTime::from_components(10, 4095).unwrap();
        let next = ht.add_logical(1);
        assert_eq!(next.physical_micros(), 11);
        assert_eq!(next.logical(), 0);
    }

    #[test]
    fn test_add_micros_preserves_logical() {
        let ht = HybridTime::from_components(100, 7).unwrap();
        let later = ht.add_micros(50);
        assert_eq!(later.physical_micros(), 150);
        assert_eq!(later.logical(), 7);
    }

    #[test]
    fn test_add_micros_saturates() {
        let ht = HybridTime::from_micros(MAX_PHYSICAL_MICROS);
        assert_eq!(ht.add_micros(u64::MAX), HybridTime::MAX);
    }

    #[test]
    fn test_display() {
        let ht = HybridTime::from_components(1234, 56).unwrap();
        assert_eq!(format!("{}", ht), "1234.0056");
        assert_eq!(format!("{}", HybridTime::MIN), "0.0000");
    }

    #[test]
    fn test_raw_conversions() {
        let ht: HybridTime = 12345u64.into();
        assert_eq!(ht.as_raw(), 12345);
        let raw: u64 = ht.into();
        assert_eq!(raw, 12345);
    }

    #[test]
    fn test_default_is_min() {
        assert_eq!(HybridTime::default(), HybridTime::MIN);
    }

    #[test]
    fn test_serialization() {
        let ht = HybridTime::from_components(1_234_567, 89).unwrap();
        let json = serde_json::to_string(&ht).unwrap();
        let restored: HybridTime = serde_json::from_str(&json).unwrap();
        assert_eq!(ht, restored);
    }

    // === Property Tests ===

    proptest! {
        #[test]
        fn prop_decremented_is_strictly_less(raw in 1u64..) {
            let ht = HybridTime::from_raw(raw);
            prop_assert!(ht.decremented() < ht);
            prop_assert_eq!(ht.decremented().incremented(), ht);
        }

        #[test]
        fn prop_add_logical_is_monotone(raw in 0u64..u64::MAX / 2, delta in 0u64..u64::MAX / 2) {
            let ht = HybridTime::from_raw(raw);
            prop_assert!(ht.add_logical(delta) >= ht);
            prop_assert!(ht.add_logical(delta + 1) > ht.add_logical(delta).decremented());
        }

        #[test]
        fn prop_ordering_matches_raw(a in any::<u64>(), b in any::<u64>()) {
            let (ha, hb) = (HybridTime::from_raw(a), HybridTime::from_raw(b));
            prop_assert_eq!(ha.cmp(&hb), a.cmp(&b));
        }

        #[test]
        fn prop_components_round_trip(micros in 0..=MAX_PHYSICAL_MICROS, logical in 0..=LOGICAL_MASK) {
            let ht = HybridTime::from_components(micros, logical).unwrap();
            prop_assert_eq!(ht.physical_micros(), micros);
            prop_assert_eq!(ht.logical(), logical);
        }
    }
}
