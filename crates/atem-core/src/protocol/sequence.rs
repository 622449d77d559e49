//! Wrapping 16-bit sequence numbers.
//!
//! # Why not just compare integers? (for beginners)
//!
//! Every reliable packet carries a 16-bit sequence number.  After 65 535
//! packets the counter wraps back to 0, so a naive `a < b` comparison would
//! claim that packet 0 (sent *after* 65 535) is older.  Instead we use
//! *serial number arithmetic*: `a` precedes `b` when walking forward from `a`
//! reaches `b` in fewer than half the number space (32 768 steps).
//!
//! ```text
//!   65534  65535    0      1      2
//!  ───┼──────┼──────┼──────┼──────┼───▶ send order
//!            └──────┘
//!     65535 precedes 0 (distance 1)
//! ```
//!
//! Two numbers exactly half the space apart are ambiguous; neither precedes
//! the other.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Half of the 16-bit sequence space.
const HALF_RANGE: u16 = 0x8000;

/// A 16-bit packet sequence number with wrap-aware ordering.
///
/// `SequenceNumber` deliberately does not implement `Ord`: wrap-around
/// ordering is not transitive, so it cannot be used to sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SequenceNumber(pub u16);

impl SequenceNumber {
    /// Wraps a raw wire value.
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Returns the raw wire value.
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns the following sequence number, wrapping from 65 535 to 0.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Returns `true` if `self` comes strictly before `other` in send order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atem_core::protocol::SequenceNumber;
    ///
    /// assert!(SequenceNumber(65535).precedes(SequenceNumber(0)));
    /// assert!(!SequenceNumber(0).precedes(SequenceNumber(65535)));
    /// ```
    pub fn precedes(self, other: Self) -> bool {
        let forward = other.0.wrapping_sub(self.0);
        forward != 0 && forward < HALF_RANGE
    }

    /// Returns `true` if `self` equals `other` or precedes it.
    pub fn precedes_or_equals(self, other: Self) -> bool {
        self == other || self.precedes(other)
    }

    /// Number of forward steps from `self` to `other`, modulo 2^16.
    pub fn distance_to(self, other: Self) -> u16 {
        other.0.wrapping_sub(self.0)
    }
}

impl From<u16> for SequenceNumber {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocates outbound sequence numbers for one session.
///
/// The first number handed out is 1; 0 is left for unsequenced packets until
/// the counter wraps around, after which 0 is an ordinary value.
///
/// The counter is owned by the session state and is never shared between
/// threads, so it is a plain integer rather than an atomic.
///
/// # Examples
///
/// ```rust
/// use atem_core::protocol::{SequenceCounter, SequenceNumber};
///
/// let mut counter = SequenceCounter::new();
/// assert_eq!(counter.next(), SequenceNumber(1));
/// assert_eq!(counter.next(), SequenceNumber(2));
/// ```
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    upcoming: SequenceNumber,
}

impl SequenceCounter {
    /// Creates a counter whose first value is 1.
    pub fn new() -> Self {
        Self::starting_at(SequenceNumber(1))
    }

    /// Creates a counter whose first value is `first`.
    pub fn starting_at(first: SequenceNumber) -> Self {
        Self { upcoming: first }
    }

    /// Returns the next sequence number and advances the counter.
    pub fn next(&mut self) -> SequenceNumber {
        let current = self.upcoming;
        self.upcoming = current.next();
        current
    }

    /// Returns the value the next call to [`next`](Self::next) will hand out.
    pub fn peek(&self) -> SequenceNumber {
        self.upcoming
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedes_orders_adjacent_values() {
        assert!(SequenceNumber(10).precedes(SequenceNumber(11)));
        assert!(!SequenceNumber(11).precedes(SequenceNumber(10)));
    }

    #[test]
    fn test_precedes_across_wraparound() {
        // Arrange
        let last = SequenceNumber(u16::MAX);
        let first = SequenceNumber(0);

        // Assert – 65535 was sent before 0
        assert!(last.precedes(first));
        assert!(!first.precedes(last));
    }

    #[test]
    fn test_precedes_is_irreflexive() {
        let seq = SequenceNumber(42);
        assert!(!seq.precedes(seq));
        assert!(seq.precedes_or_equals(seq));
    }

    #[test]
    fn test_half_range_apart_is_ambiguous() {
        let a = SequenceNumber(0);
        let b = SequenceNumber(HALF_RANGE);
        assert!(!a.precedes(b));
        assert!(!b.precedes(a));
    }

    #[test]
    fn test_distance_wraps() {
        assert_eq!(SequenceNumber(65530).distance_to(SequenceNumber(4)), 10);
        assert_eq!(SequenceNumber(4).distance_to(SequenceNumber(4)), 0);
    }

    #[test]
    fn test_counter_starts_at_one() {
        let mut counter = SequenceCounter::new();
        assert_eq!(counter.next(), SequenceNumber(1));
        assert_eq!(counter.peek(), SequenceNumber(2));
    }

    #[test]
    fn test_counter_wraps_through_zero() {
        // Arrange – start the counter one step before overflow
        let mut counter = SequenceCounter::starting_at(SequenceNumber(u16::MAX));

        // Act
        let before_wrap = counter.next();
        let after_wrap = counter.next();

        // Assert
        assert_eq!(before_wrap, SequenceNumber(u16::MAX));
        assert_eq!(after_wrap, SequenceNumber(0));
        assert!(before_wrap.precedes(after_wrap));
    }

    #[test]
    fn test_counter_values_are_monotonic_in_wrap_order() {
        let mut counter = SequenceCounter::starting_at(SequenceNumber(65000));
        let values: Vec<SequenceNumber> = (0..2000).map(|_| counter.next()).collect();
        for window in values.windows(2) {
            assert!(window[0].precedes(window[1]), "{} must precede {}", window[0], window[1]);
        }
    }
}
