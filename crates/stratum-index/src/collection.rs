//! Collection-bound indexing.
//!
//! A [`CollectionIndex`] mirrors the change notifications of a live
//! collection into mutations of an underlying index implementation. The
//! uniqueness check runs on the "inserting" notification, before the
//! collection commits the insert; the index itself mutates on "inserted".
//!
//! [`SortedVecIndex`] is the simplest backend: a flat sorted sequence with
//! no pages and no incremental measures.

use crate::entire::Direction;
use crate::index::OrderedIndex;
use crate::measure::MeasureValue;
use crate::range::Range;
use std::marker::PhantomData;
use stratum_common::{Result, StratumError};

/// A flat, sorted-sequence index backend.
///
/// Lookup is a binary search; range scans are linear. Measure results are
/// intentionally not implemented: there are no pages to cache partial
/// results on.
pub struct SortedVecIndex<K, I, X> {
    items: Vec<I>,
    extract: X,
    _key: PhantomData<K>,
}

impl<K, I, X> SortedVecIndex<K, I, X>
where
    K: Ord + Clone,
    I: Clone,
    X: Fn(&I) -> K,
{
    /// Creates an empty sequence with a key extractor.
    pub fn new(extract: X) -> Self {
        Self {
            items: Vec::new(),
            extract,
            _key: PhantomData,
        }
    }

    fn search(&self, key: &K) -> std::result::Result<usize, usize> {
        self.items
            .binary_search_by(|item| (self.extract)(item).cmp(key))
    }
}

impl<K, I, X> OrderedIndex<K, I> for SortedVecIndex<K, I, X>
where
    K: Ord + Clone,
    I: Clone,
    X: Fn(&I) -> K,
{
    fn len(&self) -> usize {
        self.items.len()
    }

    fn add(&mut self, item: I) -> Result<()> {
        let key = (self.extract)(&item);
        match self.search(&key) {
            Ok(_) => Err(StratumError::DuplicateKey),
            Err(position) => {
                self.items.insert(position, item);
                Ok(())
            }
        }
    }

    fn remove_key(&mut self, key: &K) -> Result<I> {
        match self.search(key) {
            Ok(position) => Ok(self.items.remove(position)),
            Err(_) => Err(StratumError::KeyNotFound),
        }
    }

    fn replace(&mut self, item: I) -> Result<I> {
        let key = (self.extract)(&item);
        match self.search(&key) {
            Ok(position) => Ok(std::mem::replace(&mut self.items[position], item)),
            Err(_) => Err(StratumError::KeyNotFound),
        }
    }

    fn clear(&mut self) -> Result<()> {
        self.items.clear();
        Ok(())
    }

    fn get_item(&self, key: &K) -> Option<I> {
        self.search(key).ok().map(|position| self.items[position].clone())
    }

    fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_ok()
    }

    fn get_items(&self, range: &Range<K>) -> Vec<I> {
        let mut items: Vec<I> = self
            .items
            .iter()
            .filter(|item| range.contains_key(&(self.extract)(item)))
            .cloned()
            .collect();
        if range.direction() == Direction::Negative {
            items.reverse();
        }
        items
    }

    fn measure_result(&self, _name: &str) -> Result<MeasureValue> {
        Err(StratumError::NotImplemented(
            "incremental measures on a flat sorted sequence",
        ))
    }
}

/// Mirrors collection change notifications into an index backend.
pub struct CollectionIndex<K, I, X, B> {
    backend: B,
    extract: X,
    _marker: PhantomData<(K, I)>,
}

impl<K, I, X, B> CollectionIndex<K, I, X, B>
where
    K: Ord + Clone,
    I: Clone,
    X: Fn(&I) -> K,
    B: OrderedIndex<K, I>,
{
    /// Binds a backend to a collection's notification stream.
    pub fn new(backend: B, extract: X) -> Self {
        Self {
            backend,
            extract,
            _marker: PhantomData,
        }
    }

    /// The underlying index implementation.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of mirrored items.
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// True when nothing is mirrored.
    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    /// Pre-check for an insert the collection has not committed yet; a
    /// duplicate key rejects the insert before the collection applies it.
    pub fn on_inserting(&self, item: &I) -> Result<()> {
        if self.backend.contains_key(&(self.extract)(item)) {
            return Err(StratumError::DuplicateKey);
        }
        Ok(())
    }

    /// A committed insert.
    pub fn on_inserted(&mut self, item: I) -> Result<()> {
        self.backend.add(item)
    }

    /// A committed removal.
    pub fn on_removed(&mut self, item: &I) -> Result<I> {
        self.backend.remove_key(&(self.extract)(item))
    }

    /// The collection was cleared.
    pub fn on_cleared(&mut self) -> Result<()> {
        self.backend.clear()
    }

    /// An in-place item change. A changed key turns into remove + add; an
    /// unchanged key is a replace.
    pub fn on_item_changed(&mut self, old: &I, new: I) -> Result<()> {
        let old_key = (self.extract)(old);
        if old_key == (self.extract)(&new) {
            self.backend.replace(new)?;
        } else {
            self.backend.remove_key(&old_key)?;
            self.backend.add(new)?;
        }
        Ok(())
    }

    /// The mirrored item stored under a key.
    pub fn get_item(&self, key: &K) -> Option<I> {
        self.backend.get_item(key)
    }

    /// True when a mirrored item is stored under the key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.backend.contains_key(key)
    }

    /// Mirrored items inside a range.
    pub fn get_items(&self, range: &Range<K>) -> Vec<I> {
        self.backend.get_items(range)
    }

    /// A whole-index measure result, when the backend supports measures.
    pub fn measure_result(&self, name: &str) -> Result<MeasureValue> {
        self.backend.measure_result(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_backend() -> SortedVecIndex<i32, i32, fn(&i32) -> i32> {
        SortedVecIndex::new(|item: &i32| *item)
    }

    #[test]
    fn test_sorted_vec_index_basics() {
        let mut index = identity_backend();
        index.add(3).unwrap();
        index.add(1).unwrap();
        index.add(2).unwrap();
        assert!(matches!(index.add(2), Err(StratumError::DuplicateKey)));
        assert_eq!(index.len(), 3);
        assert_eq!(index.get_items(&Range::closed(1, 2)), vec![1, 2]);
        assert_eq!(index.get_items(&Range::closed(2, 1)), vec![2, 1]);
        assert!(matches!(
            index.measure_result("Count"),
            Err(StratumError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_collection_index_pre_checks_inserts() {
        let mut index = CollectionIndex::new(identity_backend(), |item: &i32| *item);
        index.on_inserting(&7).unwrap();
        index.on_inserted(7).unwrap();
        assert!(matches!(
            index.on_inserting(&7),
            Err(StratumError::DuplicateKey)
        ));
        assert!(index.contains_key(&7));
    }

    #[test]
    fn test_collection_index_item_change() {
        let mut index = CollectionIndex::new(identity_backend(), |item: &i32| *item);
        index.on_inserted(5).unwrap();
        // Key change: remove + add.
        index.on_item_changed(&5, 9).unwrap();
        assert!(!index.contains_key(&5));
        assert!(index.contains_key(&9));
        index.on_cleared().unwrap();
        assert!(index.is_empty());
    }
}
