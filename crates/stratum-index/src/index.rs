//! The unique ordered index: the public surface over the paged tree core.

use crate::entire::{Direction, Entire};
use crate::measure::{MeasureResults, MeasureSet, MeasureValue, COUNT};
use crate::range::Range;
use crate::range_set::RangeSet;
use crate::stats::{build_histogram, build_statistics, HistogramBucket, Statistics};
use crate::tree::core::{Seek, Tree};
use crate::tree::reader::IndexReader;
use crate::tree::store::{InMemoryPageStore, PageProvider};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::Arc;
use stratum_common::{IndexConfig, Result};

/// The operations shared by index implementations.
///
/// Implementations are not internally thread-safe: mutation is a multi-step
/// page sequence, so callers follow a single-writer model and serialize
/// writers externally. Readers are safe once writers are quiescent.
pub trait OrderedIndex<K, I> {
    /// Number of items in the index.
    fn len(&self) -> usize;

    /// True when the index holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts an item; fails on a duplicate key.
    fn add(&mut self, item: I) -> Result<()>;

    /// Removes and returns the item stored under a key.
    fn remove_key(&mut self, key: &K) -> Result<I>;

    /// Swaps the item stored under an already-present key.
    fn replace(&mut self, item: I) -> Result<I>;

    /// Removes every item.
    fn clear(&mut self) -> Result<()>;

    /// The item stored under a key.
    fn get_item(&self, key: &K) -> Option<I>;

    /// True when the key is present.
    fn contains_key(&self, key: &K) -> bool;

    /// Items inside a range, in range direction.
    fn get_items(&self, range: &Range<K>) -> Vec<I>;

    /// A whole-index measure result by name.
    fn measure_result(&self, name: &str) -> Result<MeasureValue>;
}

struct HistogramCache<K> {
    version: u64,
    max_key_count: usize,
    buckets: Vec<HistogramBucket<K>>,
}

/// An ordered index over unique keys, backed by a paged tree.
///
/// The key extractor and the injected page provider are fixed at
/// construction; the extractor must be a pure function of the item.
pub struct UniqueOrderedIndex<K, I, X, P = InMemoryPageStore<K, I>> {
    tree: Tree<K, I, X, P>,
    config: IndexConfig,
    count_index: usize,
    // Explicit lock around the histogram cache: readers may race after
    // writer quiescence, and a stale cache must never be served.
    histogram_cache: Mutex<Option<HistogramCache<K>>>,
}

impl<K, I, X> UniqueOrderedIndex<K, I, X>
where
    K: Ord + Clone,
    I: Clone,
    X: Fn(&I) -> K,
{
    /// Creates an in-memory index with the built-in count measure.
    pub fn new(config: IndexConfig, extract: X) -> Result<Self> {
        Self::with_parts(config, extract, MeasureSet::with_count(), InMemoryPageStore::new())
    }
}

impl<K, I, X, P> UniqueOrderedIndex<K, I, X, P>
where
    K: Ord + Clone,
    I: Clone,
    X: Fn(&I) -> K,
    P: PageProvider<K, I>,
{
    /// Creates an index from a validated configuration, a key extractor,
    /// a measure set, and an injected page provider.
    pub fn with_parts(
        config: IndexConfig,
        extract: X,
        measures: MeasureSet<I>,
        provider: P,
    ) -> Result<Self> {
        config.validate()?;
        let count_index = measures.require(COUNT)?;
        let tree = Tree::new(provider, extract, Arc::new(measures), config.page_size);
        Ok(Self {
            tree,
            config,
            count_index,
            histogram_cache: Mutex::new(None),
        })
    }

    /// The configuration this index was built with.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The injected page provider.
    pub fn provider(&self) -> &P {
        &self.tree.provider
    }

    /// Removes an item by its extracted key and returns the stored item.
    pub fn remove(&mut self, item: &I) -> Result<I> {
        let key = (self.tree.extract)(item);
        self.tree.remove_key(&key)
    }

    /// True when an equal item is stored under the item's key.
    pub fn contains(&self, item: &I) -> bool
    where
        I: PartialEq,
    {
        let key = (self.tree.extract)(item);
        self.get_item(&key).as_ref() == Some(item)
    }

    /// Seeks an exact key.
    pub fn seek_key(&self, key: &K) -> Seek {
        self.tree.seek_key(key)
    }

    /// Seeks an extended-key ray in the given direction.
    pub fn seek(&self, ray: &Entire<K>, direction: Direction) -> Seek {
        self.tree.seek_ray(ray, direction)
    }

    /// Creates a resumable cursor over a range, advancing in the range's
    /// direction.
    pub fn create_reader(&self, range: Range<K>) -> IndexReader<'_, K, I, X, P> {
        IndexReader::new(&self.tree, range)
    }

    /// Items of every range in a disjoint set, in set order.
    pub fn get_items_set(&self, ranges: &RangeSet<K>) -> Vec<I> {
        let mut items = Vec::new();
        for range in ranges.ranges() {
            items.extend(self.create_reader(range.clone()));
        }
        items
    }

    /// Keys inside a range, in range direction.
    pub fn get_keys(&self, range: &Range<K>) -> Vec<K> {
        self.create_reader(range.clone())
            .map(|item| (self.tree.extract)(&item))
            .collect()
    }

    /// All configured measure results for the whole index, O(1) from the
    /// root page cache.
    pub fn measure_results(&self) -> &MeasureResults {
        self.tree.root_measures()
    }

    /// A measure result restricted to a range, combining cached per-leaf
    /// results instead of enumerating intermediate pages.
    pub fn range_measure_result(&self, range: &Range<K>, name: &str) -> Result<MeasureValue> {
        let index = self.tree.measures.require(name)?;
        Ok(self.tree.range_measures(range).get(index))
    }

    /// All configured measure results restricted to a range.
    pub fn range_measure_results(&self, range: &Range<K>) -> MeasureResults {
        self.tree.range_measures(range)
    }

    /// Rebuilds the index from a strictly ascending item sequence.
    pub fn bulk_load(&mut self, items: impl IntoIterator<Item = I>) -> Result<()> {
        self.tree.bulk_load(items)
    }

    /// A statistics snapshot for query optimizers.
    pub fn statistics(&self) -> Statistics {
        build_statistics(&self.tree)
    }

    /// Count/size histogram bounded to `max_key_count` buckets.
    ///
    /// The result is cached under the current mutation version behind an
    /// explicit lock; any successful mutation invalidates it.
    pub fn histogram(&self, max_key_count: usize) -> Result<Vec<HistogramBucket<K>>> {
        let mut cache = self.histogram_cache.lock();
        if let Some(cached) = cache.as_ref() {
            if cached.version == self.tree.version() && cached.max_key_count == max_key_count {
                return Ok(cached.buckets.clone());
            }
        }
        let buckets = build_histogram(&self.tree, max_key_count, self.config.histogram_fill_percent)?;
        *cache = Some(HistogramCache {
            version: self.tree.version(),
            max_key_count,
            buckets: buckets.clone(),
        });
        Ok(buckets)
    }

    /// Count-only histogram projection.
    pub fn count_histogram(&self, max_key_count: usize) -> Result<Vec<(Entire<K>, i64)>> {
        Ok(self
            .histogram(max_key_count)?
            .into_iter()
            .map(|bucket| (bucket.lower, bucket.count))
            .collect())
    }

    /// The comparer over extended keys this index orders by.
    pub fn entire_key_comparer(&self) -> impl Fn(&Entire<K>, &Entire<K>) -> Ordering {
        |a: &Entire<K>, b: &Entire<K>| a.cmp(b)
    }

    /// Verifies structural and measure invariants; used by diagnostics and
    /// tests.
    pub fn check_consistency(&self) -> Result<()> {
        self.tree.check_consistency()
    }
}

impl<K, I, X, P> OrderedIndex<K, I> for UniqueOrderedIndex<K, I, X, P>
where
    K: Ord + Clone,
    I: Clone,
    X: Fn(&I) -> K,
    P: PageProvider<K, I>,
{
    fn len(&self) -> usize {
        self.tree.root_measures().get(self.count_index).get() as usize
    }

    fn add(&mut self, item: I) -> Result<()> {
        self.tree.add(item)
    }

    fn remove_key(&mut self, key: &K) -> Result<I> {
        self.tree.remove_key(key)
    }

    fn replace(&mut self, item: I) -> Result<I> {
        self.tree.replace(item)
    }

    fn clear(&mut self) -> Result<()> {
        self.tree.clear()
    }

    fn get_item(&self, key: &K) -> Option<I> {
        match self.tree.seek_key(key) {
            Seek::Exact(pointer) => Some(self.tree.item_at(pointer).clone()),
            _ => None,
        }
    }

    fn contains_key(&self, key: &K) -> bool {
        matches!(self.tree.seek_key(key), Seek::Exact(_))
    }

    fn get_items(&self, range: &Range<K>) -> Vec<I> {
        self.create_reader(range.clone()).collect()
    }

    fn measure_result(&self, name: &str) -> Result<MeasureValue> {
        let index = self.tree.measures.require(name)?;
        Ok(self.tree.root_measures().get(index))
    }
}
