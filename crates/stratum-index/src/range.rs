//! Ranges over extended keys.
//!
//! A [`Range`] is an ordered pair of [`Entire`] endpoints. The empty range is
//! a distinguished sentinel, not a zero-width pair. "Positive direction"
//! means `first <= second` under the key ordering; the algebra normalizes to
//! positive direction internally, so results are tie-break-deterministic: the
//! direction always comes from the three-way comparison of the endpoints,
//! never from operand order.

use crate::entire::{Direction, Entire};
use stratum_common::{Result, StratumError};

/// An ordered pair of extended-key endpoints, or the empty sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Range<T> {
    /// The empty range.
    Empty,
    /// A range delimited by two endpoints, in either direction.
    Bounded {
        /// The endpoint the range starts from.
        first: Entire<T>,
        /// The endpoint the range runs to.
        second: Entire<T>,
    },
}

impl<T: Ord + Clone> Range<T> {
    /// Builds a range from two endpoints.
    pub fn new(first: Entire<T>, second: Entire<T>) -> Self {
        Range::Bounded { first, second }
    }

    /// The full range covering every key.
    pub fn full() -> Self {
        Range::new(Entire::min_value(), Entire::max_value())
    }

    /// A closed range over exact keys.
    pub fn closed(low: T, high: T) -> Self {
        Range::new(Entire::exact(low), Entire::exact(high))
    }

    /// The degenerate range containing exactly one key, bounded by
    /// infinitesimal shifts on both sides.
    pub fn at_key(key: T) -> Self {
        Range::new(
            Entire::shifted(key.clone(), Direction::Negative),
            Entire::shifted(key, Direction::Positive),
        )
    }

    /// True for the empty sentinel.
    pub fn is_empty(&self) -> bool {
        matches!(self, Range::Empty)
    }

    /// Direction of this range: positive when `first <= second`.
    ///
    /// The empty range reports positive.
    pub fn direction(&self) -> Direction {
        match self {
            Range::Empty => Direction::Positive,
            Range::Bounded { first, second } => {
                if first <= second {
                    Direction::Positive
                } else {
                    Direction::Negative
                }
            }
        }
    }

    /// Returns `(low, high)` endpoints in positive direction.
    pub fn endpoints(&self) -> Option<(&Entire<T>, &Entire<T>)> {
        match self {
            Range::Empty => None,
            Range::Bounded { first, second } => {
                if first <= second {
                    Some((first, second))
                } else {
                    Some((second, first))
                }
            }
        }
    }

    /// Returns a positive-direction copy of this range.
    pub fn normalized(&self) -> Self {
        match self.endpoints() {
            None => Range::Empty,
            Some((low, high)) => Range::new(low.clone(), high.clone()),
        }
    }

    /// True when the extended key lies inside the range.
    pub fn contains(&self, point: &Entire<T>) -> bool {
        match self.endpoints() {
            None => false,
            Some((low, high)) => low <= point && point <= high,
        }
    }

    /// True when the exact key lies inside the range.
    pub fn contains_key(&self, key: &T) -> bool {
        match self.endpoints() {
            None => false,
            Some((low, high)) => {
                low.asymmetric_compare(key) != std::cmp::Ordering::Greater
                    && high.asymmetric_compare(key) != std::cmp::Ordering::Less
            }
        }
    }

    /// True when the two ranges share at least one position.
    pub fn intersects(&self, other: &Self) -> bool {
        match (self.endpoints(), other.endpoints()) {
            (Some((a_lo, a_hi)), Some((b_lo, b_hi))) => a_lo.max(b_lo) <= a_hi.min(b_hi),
            _ => false,
        }
    }

    /// Intersection of two ranges.
    ///
    /// Fails with [`StratumError::RangesDisjoint`] when the operands do not
    /// intersect. The result takes the greater low endpoint and the smaller
    /// high endpoint, each decided by the endpoint comparison alone.
    pub fn intersect(&self, other: &Self) -> Result<Self> {
        match (self.endpoints(), other.endpoints()) {
            (Some((a_lo, a_hi)), Some((b_lo, b_hi))) => {
                let lo = a_lo.max(b_lo);
                let hi = a_hi.min(b_hi);
                if lo > hi {
                    return Err(StratumError::RangesDisjoint);
                }
                Ok(Range::new(lo.clone(), hi.clone()))
            }
            _ => Err(StratumError::RangesDisjoint),
        }
    }

    /// Union of two intersecting ranges into one contiguous range.
    ///
    /// Merging disjoint ranges is a logical error and fails; callers that
    /// need a union of disjoint pieces use a [`crate::RangeSet`].
    pub fn merge(&self, other: &Self) -> Result<Self> {
        if !self.intersects(other) {
            return Err(StratumError::RangesDisjoint);
        }
        let (a_lo, a_hi) = self.endpoints().ok_or(StratumError::RangesDisjoint)?;
        let (b_lo, b_hi) = other.endpoints().ok_or(StratumError::RangesDisjoint)?;
        Ok(Range::new(
            a_lo.min(b_lo).clone(),
            a_hi.max(b_hi).clone(),
        ))
    }

    /// Subtracts `other` from this range.
    ///
    /// Subtracting one convex range from another yields at most two convex
    /// pieces. Fails when the operands do not intersect.
    pub fn subtract(&self, other: &Self) -> Result<Vec<Self>> {
        if !self.intersects(other) {
            return Err(StratumError::RangesDisjoint);
        }
        let (a_lo, a_hi) = self.endpoints().ok_or(StratumError::RangesDisjoint)?;
        let (b_lo, b_hi) = other.endpoints().ok_or(StratumError::RangesDisjoint)?;

        let mut pieces = Vec::with_capacity(2);
        if a_lo < b_lo {
            pieces.push(Range::new(
                a_lo.clone(),
                b_lo.clone().step(Direction::Negative),
            ));
        }
        if b_hi < a_hi {
            pieces.push(Range::new(
                b_hi.clone().step(Direction::Positive),
                a_hi.clone(),
            ));
        }
        Ok(pieces)
    }
}
