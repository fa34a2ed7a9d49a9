//! Sequence Number Handling
//!
//! SRT data packets carry a 31-bit sequence number (bit 31 of the first
//! header word is the control flag). All ordering between sequence numbers
//! is circular: a number is "after" another when it lies within half of the
//! sequence space ahead of it.

use std::fmt;
use std::ops::{Add, Sub};

/// Largest representable sequence number (31 bits)
pub const MAX_SEQ_NUMBER: u32 = 0x7FFF_FFFF;

/// Size of the circular sequence space
const SEQ_SPACE: i64 = MAX_SEQ_NUMBER as i64 + 1;

/// Half of the sequence space, the ordering horizon
const SEQ_HALF: i64 = SEQ_SPACE / 2;

/// Sequence number with 31-bit wraparound semantics
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct SeqNumber(u32);

impl SeqNumber {
    /// Create a new sequence number
    ///
    /// # Panics
    /// Panics if value exceeds MAX_SEQ_NUMBER
    pub fn new(value: u32) -> Self {
        assert!(
            value <= MAX_SEQ_NUMBER,
            "Sequence number {} exceeds maximum {}",
            value,
            MAX_SEQ_NUMBER
        );
        SeqNumber(value)
    }

    /// Create a sequence number, masking the value to 31 bits
    #[inline]
    pub fn new_unchecked(value: u32) -> Self {
        SeqNumber(value & MAX_SEQ_NUMBER)
    }

    #[inline]
    pub fn as_raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn next(self) -> Self {
        self + 1
    }

    #[inline]
    pub fn prev(self) -> Self {
        self - 1
    }

    /// Signed circular distance from `self` to `other`
    ///
    /// Positive when `other` is ahead of `self`.
    pub fn distance_to(self, other: SeqNumber) -> i32 {
        let mut diff = other.0 as i64 - self.0 as i64;
        if diff >= SEQ_HALF {
            diff -= SEQ_SPACE;
        } else if diff < -SEQ_HALF {
            diff += SEQ_SPACE;
        }
        diff as i32
    }

    /// Offset of `self` relative to `base` (how far `self` is ahead)
    #[inline]
    pub fn offset_from(self, base: SeqNumber) -> i32 {
        base.distance_to(self)
    }

    #[inline]
    pub fn lt(self, other: SeqNumber) -> bool {
        self.distance_to(other) > 0
    }

    #[inline]
    pub fn le(self, other: SeqNumber) -> bool {
        self.distance_to(other) >= 0
    }

    #[inline]
    pub fn gt(self, other: SeqNumber) -> bool {
        self.distance_to(other) < 0
    }

    #[inline]
    pub fn ge(self, other: SeqNumber) -> bool {
        self.distance_to(other) <= 0
    }

    /// The later of two sequence numbers in circular order
    pub fn max_of(self, other: SeqNumber) -> SeqNumber {
        if self.lt(other) {
            other
        } else {
            self
        }
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SeqNumber {
    fn from(value: u32) -> Self {
        SeqNumber::new_unchecked(value)
    }
}

impl From<SeqNumber> for u32 {
    fn from(seq: SeqNumber) -> u32 {
        seq.0
    }
}

impl Add<u32> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u32) -> SeqNumber {
        SeqNumber::new_unchecked(self.0.wrapping_add(rhs))
    }
}

impl Sub<u32> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: u32) -> SeqNumber {
        SeqNumber::new_unchecked(self.0.wrapping_sub(rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unchecked_masks() {
        let seq = SeqNumber::new_unchecked(MAX_SEQ_NUMBER + 6);
        assert_eq!(seq.as_raw(), 5);
    }

    #[test]
    #[should_panic]
    fn test_new_overflow() {
        SeqNumber::new(MAX_SEQ_NUMBER + 1);
    }

    #[test]
    fn test_next_prev_wrap() {
        assert_eq!(SeqNumber::new(MAX_SEQ_NUMBER).next().as_raw(), 0);
        assert_eq!(SeqNumber::new(0).prev().as_raw(), MAX_SEQ_NUMBER);
    }

    #[test]
    fn test_distance() {
        let a = SeqNumber::new(100);
        let b = SeqNumber::new(142);
        assert_eq!(a.distance_to(b), 42);
        assert_eq!(b.distance_to(a), -42);
        assert_eq!(b.offset_from(a), 42);
    }

    #[test]
    fn test_distance_across_wrap() {
        let a = SeqNumber::new(MAX_SEQ_NUMBER - 4);
        let b = SeqNumber::new(3);
        assert_eq!(a.distance_to(b), 8);
        assert!(a.lt(b));
        assert!(b.gt(a));
        assert_eq!(a.max_of(b), b);
    }

    #[test]
    fn test_ordering_helpers() {
        let a = SeqNumber::new(7);
        assert!(a.le(a));
        assert!(a.ge(a));
        assert!(!a.lt(a));
        assert!(a.lt(a + 1));
        assert!((a + 1).gt(a));
    }

    #[test]
    fn test_add_sub_wrap() {
        assert_eq!((SeqNumber::new(MAX_SEQ_NUMBER - 1) + 3).as_raw(), 1);
        assert_eq!((SeqNumber::new(2) - 4).as_raw(), MAX_SEQ_NUMBER - 1);
    }
}
