//! Resumable, direction-aware range cursors.

use super::core::{Pointer, Tree};
use super::store::PageProvider;
use crate::entire::{Direction, Entire};
use crate::range::Range;
use std::cmp::Ordering;

#[derive(Clone, Copy)]
enum ReaderState {
    NotStarted,
    Pending(Pointer),
    At(Pointer),
    Done,
}

/// A cursor over the items of a range.
///
/// The cursor walks the leaf chain in its range's direction and can be
/// repositioned with [`IndexReader::move_to`] without restarting the scan.
pub struct IndexReader<'a, K, I, X, P> {
    tree: &'a Tree<K, I, X, P>,
    range: Range<K>,
    direction: Direction,
    state: ReaderState,
}

impl<'a, K, I, X, P> IndexReader<'a, K, I, X, P>
where
    K: Ord + Clone,
    I: Clone,
    X: Fn(&I) -> K,
    P: PageProvider<K, I>,
{
    pub(crate) fn new(tree: &'a Tree<K, I, X, P>, range: Range<K>) -> Self {
        let direction = range.direction();
        Self {
            tree,
            range: range.normalized(),
            direction,
            state: ReaderState::NotStarted,
        }
    }

    /// The direction this reader advances in.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The (normalized) range this reader covers.
    pub fn range(&self) -> &Range<K> {
        &self.range
    }

    /// Repositions the cursor at the given extended key, clamped into the
    /// reader's range. The next item returned is the first one at or past
    /// the position in the reader's direction.
    pub fn move_to(&mut self, position: &Entire<K>) {
        let target = match self.range.endpoints() {
            None => {
                self.state = ReaderState::Done;
                return;
            }
            Some((low, high)) => match self.direction {
                Direction::Positive if position < low => low.clone(),
                Direction::Negative if position > high => high.clone(),
                _ => position.clone(),
            },
        };
        self.state = match self.tree.seek_ray(&target, self.direction).pointer() {
            Some(pointer) => ReaderState::Pending(pointer),
            None => ReaderState::Done,
        };
    }

    fn next_pointer(&self) -> Option<Pointer> {
        match self.state {
            ReaderState::Done => None,
            ReaderState::Pending(pointer) => Some(pointer),
            ReaderState::At(pointer) => self.tree.advance(pointer, self.direction),
            ReaderState::NotStarted => {
                let (low, high) = self.range.endpoints()?;
                match self.direction {
                    Direction::Positive => {
                        self.tree.seek_ray(low, Direction::Positive).pointer()
                    }
                    Direction::Negative => {
                        self.tree.seek_ray(high, Direction::Negative).pointer()
                    }
                }
            }
        }
    }
}

impl<K, I, X, P> Iterator for IndexReader<'_, K, I, X, P>
where
    K: Ord + Clone,
    I: Clone,
    X: Fn(&I) -> K,
    P: PageProvider<K, I>,
{
    type Item = I;

    fn next(&mut self) -> Option<I> {
        let Some(pointer) = self.next_pointer() else {
            self.state = ReaderState::Done;
            return None;
        };
        let item = self.tree.item_at(pointer);
        let key = (self.tree.extract)(item);
        let inside = match self.range.endpoints() {
            None => false,
            Some((low, high)) => {
                low.asymmetric_compare(&key) != Ordering::Greater
                    && high.asymmetric_compare(&key) != Ordering::Less
            }
        };
        if !inside {
            self.state = ReaderState::Done;
            return None;
        }
        let item = item.clone();
        self.state = ReaderState::At(pointer);
        Some(item)
    }
}
