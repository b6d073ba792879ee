//! Extended keys with infinity and infinitesimal markers.
//!
//! An [`Entire<T>`] wraps a key so that range endpoints can express unbounded
//! or "just past" positions. `NegativeInfinity` and `PositiveInfinity` compare
//! outside every exact key; `NegativeInfinitesimal(k)` and
//! `PositiveInfinitesimal(k)` denote the positions immediately before and
//! after the exact key `k`, which makes exclusive range bounds expressible
//! without a second comparison path.
//!
//! An infinitesimal shift always carries a [`Direction`]; a direction-less
//! shift is unrepresentable by construction.

use std::cmp::Ordering;

/// Direction of an ordering, an infinitesimal shift, or a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward smaller keys.
    Negative,
    /// Toward greater keys.
    Positive,
}

impl Direction {
    /// Returns the opposite direction.
    pub fn invert(self) -> Self {
        match self {
            Direction::Negative => Direction::Positive,
            Direction::Positive => Direction::Negative,
        }
    }
}

/// A key extended with infinity/infinitesimal markers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entire<T> {
    /// Below every key.
    NegativeInfinity,
    /// Immediately before the exact key.
    NegativeInfinitesimal(T),
    /// The exact key itself.
    Exact(T),
    /// Immediately after the exact key.
    PositiveInfinitesimal(T),
    /// Above every key.
    PositiveInfinity,
}

impl<T> Entire<T> {
    /// Wraps an exact key.
    pub fn exact(value: T) -> Self {
        Entire::Exact(value)
    }

    /// Wraps a key shifted infinitesimally in the given direction.
    pub fn shifted(value: T, direction: Direction) -> Self {
        match direction {
            Direction::Negative => Entire::NegativeInfinitesimal(value),
            Direction::Positive => Entire::PositiveInfinitesimal(value),
        }
    }

    /// The fully unbounded lower endpoint.
    pub fn min_value() -> Self {
        Entire::NegativeInfinity
    }

    /// The fully unbounded upper endpoint.
    pub fn max_value() -> Self {
        Entire::PositiveInfinity
    }

    /// Returns the exact key, failing when this value is not `Exact`.
    pub fn value(&self) -> stratum_common::Result<&T> {
        match self {
            Entire::Exact(v) => Ok(v),
            _ => Err(stratum_common::StratumError::NotExactKey),
        }
    }

    /// Returns the carried key for the three key-bearing variants.
    pub fn key(&self) -> Option<&T> {
        match self {
            Entire::NegativeInfinitesimal(v)
            | Entire::Exact(v)
            | Entire::PositiveInfinitesimal(v) => Some(v),
            _ => None,
        }
    }

    /// True for the `Exact` variant.
    pub fn is_exact(&self) -> bool {
        matches!(self, Entire::Exact(_))
    }

    /// True for either infinity.
    pub fn is_infinite(&self) -> bool {
        matches!(self, Entire::NegativeInfinity | Entire::PositiveInfinity)
    }

    /// Tie-break rank among the key-bearing variants at an equal key.
    fn marker_rank(&self) -> i8 {
        match self {
            Entire::NegativeInfinity => i8::MIN,
            Entire::NegativeInfinitesimal(_) => -1,
            Entire::Exact(_) => 0,
            Entire::PositiveInfinitesimal(_) => 1,
            Entire::PositiveInfinity => i8::MAX,
        }
    }
}

impl<T: Ord> Entire<T> {
    /// Compares this extended key against an exact key.
    ///
    /// Infinities compare outside every exact value. Infinitesimal shifts
    /// never compare equal: a positive shift at `k` orders just after `k`,
    /// a negative shift just before it. This is the comparison ray seeks use.
    pub fn asymmetric_compare(&self, exact: &T) -> Ordering {
        match self {
            Entire::NegativeInfinity => Ordering::Less,
            Entire::PositiveInfinity => Ordering::Greater,
            Entire::NegativeInfinitesimal(k) => k.cmp(exact).then(Ordering::Less),
            Entire::Exact(k) => k.cmp(exact),
            Entire::PositiveInfinitesimal(k) => k.cmp(exact).then(Ordering::Greater),
        }
    }

    /// Steps this endpoint outward in the given direction.
    ///
    /// Used by range subtraction and set inversion to make a bound strictly
    /// exclusive. The step stays within the marker algebra: no exact key lies
    /// strictly between an infinitesimal shift and the next representable
    /// position, so clamping at a shift loses no exact-key membership.
    pub fn step(self, direction: Direction) -> Self {
        match direction {
            Direction::Positive => match self {
                Entire::NegativeInfinitesimal(k) => Entire::Exact(k),
                Entire::Exact(k) => Entire::PositiveInfinitesimal(k),
                other => other,
            },
            Direction::Negative => match self {
                Entire::PositiveInfinitesimal(k) => Entire::Exact(k),
                Entire::Exact(k) => Entire::NegativeInfinitesimal(k),
                other => other,
            },
        }
    }
}

impl<T: Ord> PartialOrd for Entire<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for Entire<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.key(), other.key()) {
            (Some(a), Some(b)) => a.cmp(b).then(self.marker_rank().cmp(&other.marker_rank())),
            _ => self.marker_rank().cmp(&other.marker_rank()),
        }
    }
}
