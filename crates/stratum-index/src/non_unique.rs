//! A possibly-duplicate-key view over a unique ordered index.
//!
//! A [`NonUniqueIndex`] owns no pages. It holds a wrapped unique index whose
//! key space (`UK`) disambiguates duplicates — typically the exposed key
//! paired with a discriminator — plus a pure converter from exposed
//! extended keys into the wrapped extended-key space. Every query builds a
//! range in the exposed space, converts it, and delegates.

use crate::entire::Entire;
use crate::index::{OrderedIndex, UniqueOrderedIndex};
use crate::measure::MeasureValue;
use crate::range::Range;
use crate::tree::store::PageProvider;
use std::marker::PhantomData;
use stratum_common::Result;

/// A non-unique index over exposed keys `K`, backed by a unique index over
/// keys `UK`.
pub struct NonUniqueIndex<K, UK, I, X, C, P> {
    inner: UniqueOrderedIndex<UK, I, X, P>,
    convert: C,
    _exposed: PhantomData<K>,
}

impl<K, UK, I, X, C, P> NonUniqueIndex<K, UK, I, X, C, P>
where
    K: Ord + Clone,
    UK: Ord + Clone,
    I: Clone,
    X: Fn(&I) -> UK,
    C: Fn(&Entire<K>) -> Entire<UK>,
    P: PageProvider<UK, I>,
{
    /// Wraps a unique index with an extended-key-space converter.
    ///
    /// The converter must be pure and monotone: it preserves the exposed
    /// key order when mapped into the wrapped key space.
    pub fn new(inner: UniqueOrderedIndex<UK, I, X, P>, convert: C) -> Self {
        Self {
            inner,
            convert,
            _exposed: PhantomData,
        }
    }

    /// The wrapped unique index.
    pub fn inner(&self) -> &UniqueOrderedIndex<UK, I, X, P> {
        &self.inner
    }

    /// Number of items, across all duplicate groups.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when no items are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Inserts an item; duplicates in the exposed key space are allowed as
    /// long as the wrapped key disambiguates them.
    pub fn add(&mut self, item: I) -> Result<()> {
        self.inner.add(item)
    }

    /// Removes one item by its wrapped key.
    pub fn remove(&mut self, item: &I) -> Result<I> {
        self.inner.remove(item)
    }

    /// Swaps the item stored under an already-present wrapped key.
    pub fn replace(&mut self, item: I) -> Result<I> {
        self.inner.replace(item)
    }

    fn convert_range(&self, range: &Range<K>) -> Range<UK> {
        match range {
            Range::Empty => Range::Empty,
            Range::Bounded { first, second } => {
                Range::new((self.convert)(first), (self.convert)(second))
            }
        }
    }

    /// The degenerate range bounding exactly one exposed key, converted
    /// into the wrapped key space.
    fn key_range(&self, key: &K) -> Range<UK> {
        self.convert_range(&Range::at_key(key.clone()))
    }

    /// All items stored under an exposed key, in key order.
    pub fn get_items(&self, key: &K) -> Vec<I> {
        self.inner.get_items(&self.key_range(key))
    }

    /// Items inside an exposed-key range.
    pub fn get_items_range(&self, range: &Range<K>) -> Vec<I> {
        self.inner.get_items(&self.convert_range(range))
    }

    /// True when at least one item is stored under the exposed key.
    ///
    /// An O(height) seek through the wrapped index, not a secondary
    /// structure.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner
            .create_reader(self.key_range(key))
            .next()
            .is_some()
    }

    /// Number of items stored under an exposed key.
    pub fn key_count(&self, key: &K) -> Result<MeasureValue> {
        self.inner
            .range_measure_result(&self.key_range(key), crate::measure::COUNT)
    }

    /// Removes every item stored under an exposed key, returning them in
    /// key order.
    pub fn remove_all(&mut self, key: &K) -> Result<Vec<I>> {
        let items = self.get_items(key);
        for item in &items {
            self.inner.remove(item)?;
        }
        Ok(items)
    }

    /// A measure result restricted to an exposed-key range.
    pub fn range_measure_result(&self, range: &Range<K>, name: &str) -> Result<MeasureValue> {
        self.inner
            .range_measure_result(&self.convert_range(range), name)
    }
}
