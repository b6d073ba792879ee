//! Sets of pairwise-disjoint ranges.
//!
//! A [`RangeSet`] maintains positive-direction ranges sorted by left endpoint.
//! After every operation no two stored ranges intersect or touch: ranges that
//! merely abut (no exact key lies between them) are merged on insertion.

use crate::entire::{Direction, Entire};
use crate::range::Range;

/// A set of pairwise-disjoint, positive-direction ranges.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangeSet<T> {
    /// Sorted by left endpoint; pairwise disjoint and non-touching.
    ranges: Vec<Range<T>>,
}

impl<T: Ord + Clone> RangeSet<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Creates a set holding a single range.
    pub fn from_range(range: Range<T>) -> Self {
        let mut set = Self::new();
        set.unite(range);
        set
    }

    /// True when the set holds no ranges.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint ranges in the set.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// The stored ranges, sorted by left endpoint.
    pub fn ranges(&self) -> &[Range<T>] {
        &self.ranges
    }

    /// True when any stored range contains the exact key.
    pub fn contains_key(&self, key: &T) -> bool {
        self.ranges.iter().any(|r| r.contains_key(key))
    }

    /// Adds a range to the set, merging every range it intersects or touches.
    pub fn unite(&mut self, range: Range<T>) {
        let Some((mut lo, mut hi)) = range.endpoints().map(|(l, h)| (l.clone(), h.clone()))
        else {
            return;
        };

        let mut merged = Vec::with_capacity(self.ranges.len() + 1);
        let mut placed = false;
        for existing in self.ranges.drain(..) {
            let (e_lo, e_hi) = match existing.endpoints() {
                Some((l, h)) => (l.clone(), h.clone()),
                None => continue,
            };
            // Touching counts: a gap with no position in it must close.
            let overlaps = e_lo <= hi.clone().step(Direction::Positive)
                && lo.clone().step(Direction::Negative) <= e_hi;
            if overlaps {
                lo = lo.min(e_lo);
                hi = hi.max(e_hi);
            } else if e_hi < lo {
                merged.push(Range::new(e_lo, e_hi));
            } else {
                if !placed {
                    merged.push(Range::new(lo.clone(), hi.clone()));
                    placed = true;
                }
                merged.push(Range::new(e_lo, e_hi));
            }
        }
        if !placed {
            merged.push(Range::new(lo, hi));
        }
        self.ranges = merged;
    }

    /// Intersects this set with another, returning the resulting set.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for a in &self.ranges {
            for b in &other.ranges {
                if a.intersects(b) {
                    if let Ok(piece) = a.intersect(b) {
                        out.unite(piece);
                    }
                }
            }
        }
        out
    }

    /// Complements the set over the full extended-key line.
    ///
    /// Gaps are closed before the first range, between each adjacent pair,
    /// and after the last range; boundary exclusivity comes from stepping
    /// each endpoint outward with an infinitesimal shift.
    pub fn invert(&self) -> Self {
        let mut out = Self::new();
        if self.ranges.is_empty() {
            out.unite(Range::full());
            return out;
        }

        let mut cursor: Entire<T> = Entire::min_value();
        for range in &self.ranges {
            let Some((lo, hi)) = range.endpoints() else {
                continue;
            };
            if *lo != Entire::min_value() {
                let gap_hi = lo.clone().step(Direction::Negative);
                if cursor <= gap_hi {
                    out.unite(Range::new(cursor, gap_hi));
                }
            }
            cursor = hi.clone().step(Direction::Positive);
            if *hi == Entire::max_value() {
                return out;
            }
        }
        out.unite(Range::new(cursor, Entire::max_value()));
        out
    }
}
