//! Index operation invariants: ordering, balance, measures, readers,
//! variants, and statistics.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use stratum_common::{IndexConfig, StratumError};
use stratum_index::{
    join, CollectionIndex, Direction, Entire, InMemoryPageStore, MeasureSet, NonUniqueIndex,
    OrderedIndex, Range, RangeSet, Seek, SizeMeasure, UniqueOrderedIndex, COUNT, SIZE,
};

fn identity(item: &i32) -> i32 {
    *item
}

fn small_index() -> UniqueOrderedIndex<i32, i32, fn(&i32) -> i32> {
    UniqueOrderedIndex::new(IndexConfig::with_page_size(4), identity as fn(&i32) -> i32).unwrap()
}

type Pair = (i32, i64);

fn pair_key(item: &Pair) -> i32 {
    item.0
}

fn pair_index() -> UniqueOrderedIndex<i32, Pair, fn(&Pair) -> i32> {
    UniqueOrderedIndex::with_parts(
        IndexConfig::with_page_size(4),
        pair_key as fn(&Pair) -> i32,
        MeasureSet::with_count().add(SizeMeasure::new(|item: &Pair| item.1)),
        InMemoryPageStore::new(),
    )
    .unwrap()
}

// =============================================================================
// Ordering and balance
// =============================================================================

#[test]
fn thousand_inserts_stay_ordered_and_balanced() {
    let mut index = small_index();
    for key in 1..=1000 {
        index.add(key).unwrap();
    }
    index.check_consistency().unwrap();
    assert_eq!(index.len(), 1000);

    let items = index.get_items(&Range::full());
    let expected: Vec<i32> = (1..=1000).collect();
    assert_eq!(items, expected);
}

#[test]
fn range_query_returns_exact_slice_without_full_scan() {
    let mut index = small_index();
    for key in 1..=1000 {
        index.add(key).unwrap();
    }

    let range = Range::closed(250, 260);
    let items = index.get_items(&range);
    let expected: Vec<i32> = (250..=260).collect();
    assert_eq!(items, expected);

    // The range count combines cached leaf measures; the number of pages
    // touched stays far below the item count.
    let before = index.provider().visit_count();
    let count = index.range_measure_result(&range, COUNT).unwrap();
    let visited = index.provider().visit_count() - before;
    assert_eq!(count.get(), 11);
    assert!(visited < 100, "range aggregate touched {visited} pages");
}

#[test]
fn ascending_removal_keeps_tree_balanced() {
    let mut index = small_index();
    for key in 1..=1000 {
        index.add(key).unwrap();
    }
    for key in 1..=1000 {
        index.remove_key(&key).unwrap();
        index.check_consistency().unwrap();
        if key < 1000 {
            // A surviving key must stay reachable after every rebalance.
            let probe = key + 1 + (1000 - key - 1) / 2;
            assert!(index.contains_key(&probe), "lost key {probe} after removing {key}");
        }
    }
    assert!(index.is_empty());
}

#[test]
fn descending_removal_keeps_tree_balanced() {
    let mut index = small_index();
    for key in 1..=300 {
        index.add(key).unwrap();
    }
    for key in (1..=300).rev() {
        index.remove_key(&key).unwrap();
        index.check_consistency().unwrap();
    }
    assert!(index.is_empty());
}

#[test]
fn random_workload_matches_model() {
    let mut rng = StdRng::seed_from_u64(0x5742);
    let mut index = small_index();
    let mut model = BTreeSet::new();

    for _ in 0..4000 {
        let key = rng.gen_range(0..600);
        if rng.gen_bool(0.6) {
            match index.add(key) {
                Ok(()) => assert!(model.insert(key)),
                Err(StratumError::DuplicateKey) => assert!(model.contains(&key)),
                Err(other) => panic!("unexpected error: {other}"),
            }
        } else {
            match index.remove_key(&key) {
                Ok(item) => {
                    assert_eq!(item, key);
                    assert!(model.remove(&key));
                }
                Err(StratumError::KeyNotFound) => assert!(!model.contains(&key)),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    index.check_consistency().unwrap();
    let items = index.get_items(&Range::full());
    let expected: Vec<i32> = model.iter().copied().collect();
    assert_eq!(items, expected);
    assert_eq!(index.len(), model.len());
}

#[test]
fn random_range_measures_match_enumeration() {
    let mut rng = StdRng::seed_from_u64(0x1d4);
    let mut index = small_index();
    let mut model = BTreeSet::new();
    for _ in 0..500 {
        let key = rng.gen_range(0..1000);
        if index.add(key).is_ok() {
            model.insert(key);
        }
    }

    for _ in 0..200 {
        let a = rng.gen_range(0..1000);
        let b = rng.gen_range(0..1000);
        let (low, high) = (a.min(b), a.max(b));
        let range = Range::closed(low, high);
        let expected = model.range(low..=high).count() as i64;
        let counted = index.range_measure_result(&range, COUNT).unwrap().get();
        assert_eq!(counted, expected, "range [{low}, {high}]");
    }
}

// =============================================================================
// Point operations
// =============================================================================

#[test]
fn duplicate_add_is_rejected_before_mutation() {
    let mut index = small_index();
    for key in [5, 1, 9, 3] {
        index.add(key).unwrap();
    }
    assert!(matches!(index.add(9), Err(StratumError::DuplicateKey)));
    index.check_consistency().unwrap();
    assert_eq!(index.len(), 4);
}

#[test]
fn replace_swaps_item_and_adjusts_measures() {
    let mut index = pair_index();
    for key in 0..50 {
        index.add((key, 10)).unwrap();
    }
    assert_eq!(index.measure_result(SIZE).unwrap().get(), 500);

    let old = index.replace((7, 300)).unwrap();
    assert_eq!(old, (7, 10));
    assert_eq!(index.measure_result(SIZE).unwrap().get(), 790);
    assert_eq!(index.get_item(&7), Some((7, 300)));
    index.check_consistency().unwrap();

    assert!(matches!(
        index.replace((999, 1)),
        Err(StratumError::KeyNotFound)
    ));
}

#[test]
fn read_only_provider_rejects_writes() {
    let mut index = UniqueOrderedIndex::with_parts(
        IndexConfig::with_page_size(4),
        identity as fn(&i32) -> i32,
        MeasureSet::with_count(),
        InMemoryPageStore::read_only(),
    )
    .unwrap();
    assert!(matches!(index.add(1), Err(StratumError::ReadOnly)));
    assert!(matches!(index.remove_key(&1), Err(StratumError::ReadOnly)));
    assert!(matches!(index.replace(1), Err(StratumError::ReadOnly)));
    assert!(matches!(
        index.bulk_load([1, 2, 3]),
        Err(StratumError::ReadOnly)
    ));
}

#[test]
fn seek_reports_exact_nearest_and_none() {
    let mut index = small_index();
    for key in [10, 20, 30, 40, 50, 60, 70, 80] {
        index.add(key).unwrap();
    }
    assert!(matches!(index.seek_key(&30), Seek::Exact(_)));
    assert!(matches!(index.seek_key(&35), Seek::Nearest(_)));
    assert_eq!(index.seek_key(&99), Seek::None);

    // A positive ray just past a key finds the next one, even across a page
    // boundary.
    let seek = index.seek(&Entire::shifted(20, Direction::Positive), Direction::Positive);
    assert!(matches!(seek, Seek::Exact(_) | Seek::Nearest(_)));
    assert_eq!(
        index.seek(&Entire::max_value(), Direction::Positive),
        Seek::None
    );
}

// =============================================================================
// Readers and range sets
// =============================================================================

#[test]
fn reader_walks_forward_and_backward() {
    let mut index = small_index();
    for key in 1..=30 {
        index.add(key).unwrap();
    }

    let forward: Vec<i32> = index.create_reader(Range::closed(10, 15)).collect();
    assert_eq!(forward, vec![10, 11, 12, 13, 14, 15]);

    let backward: Vec<i32> = index.create_reader(Range::closed(15, 10)).collect();
    assert_eq!(backward, vec![15, 14, 13, 12, 11, 10]);
}

#[test]
fn reader_move_to_repositions_without_restart() {
    let mut index = small_index();
    for key in 1..=30 {
        index.add(key).unwrap();
    }

    let mut reader = index.create_reader(Range::closed(5, 25));
    assert_eq!(reader.next(), Some(5));
    assert_eq!(reader.next(), Some(6));

    reader.move_to(&Entire::exact(20));
    assert_eq!(reader.next(), Some(20));
    assert_eq!(reader.next(), Some(21));

    // Positions below the range clamp to its start.
    reader.move_to(&Entire::exact(-100));
    assert_eq!(reader.next(), Some(5));

    // Positions past the range end the scan.
    reader.move_to(&Entire::exact(26));
    assert_eq!(reader.next(), None);
}

#[test]
fn range_set_query_concatenates_disjoint_pieces() {
    let mut index = small_index();
    for key in 1..=30 {
        index.add(key).unwrap();
    }
    let mut set = RangeSet::from_range(Range::closed(3, 5));
    set.unite(Range::closed(20, 22));
    let items = index.get_items_set(&set);
    assert_eq!(items, vec![3, 4, 5, 20, 21, 22]);

    let keys = index.get_keys(&Range::closed(4, 6));
    assert_eq!(keys, vec![4, 5, 6]);
}

// =============================================================================
// Bulk load
// =============================================================================

#[test]
fn bulk_load_matches_incremental_build() {
    let mut incremental = small_index();
    for key in 0..500 {
        incremental.add(key * 2).unwrap();
    }

    let mut bulk = small_index();
    bulk.bulk_load((0..500).map(|key| key * 2)).unwrap();
    bulk.check_consistency().unwrap();

    assert_eq!(
        bulk.get_items(&Range::full()),
        incremental.get_items(&Range::full())
    );
    assert_eq!(bulk.len(), incremental.len());
    assert_eq!(
        bulk.range_measure_result(&Range::closed(100, 200), COUNT)
            .unwrap(),
        incremental
            .range_measure_result(&Range::closed(100, 200), COUNT)
            .unwrap()
    );
}

#[test]
fn bulk_load_rejects_unsorted_input() {
    let mut index = small_index();
    assert!(matches!(
        index.bulk_load([1, 3, 2]),
        Err(StratumError::UnsortedBulkLoad)
    ));
    assert!(matches!(
        index.bulk_load([1, 1]),
        Err(StratumError::UnsortedBulkLoad)
    ));
    // A rejected load leaves the index untouched.
    index.add(42).unwrap();
    assert!(index.contains_key(&42));
}

#[test]
fn bulk_load_empty_yields_empty_index() {
    let mut index = small_index();
    index.add(1).unwrap();
    index.bulk_load(std::iter::empty()).unwrap();
    assert!(index.is_empty());
    index.check_consistency().unwrap();
}

// =============================================================================
// Statistics and histograms
// =============================================================================

#[test]
fn statistics_snapshot_reads_cached_measures() {
    let mut index = pair_index();
    for key in 0..200 {
        index.add((key, 3)).unwrap();
    }
    let stats = index.statistics();
    assert_eq!(stats.item_count, 200);
    assert_eq!(stats.total_size, Some(600));
    assert!(stats.height >= 3);
    assert!(stats.leaf_count >= 50);
    assert!(stats.page_count >= stats.leaf_count);
}

#[test]
fn histogram_is_bounded_deterministic_and_complete() {
    let mut index = small_index();
    for key in 1..=1000 {
        index.add(key).unwrap();
    }

    let buckets = index.histogram(10).unwrap();
    assert!(!buckets.is_empty());
    assert!(buckets.len() <= 10);
    assert_eq!(buckets.iter().map(|b| b.count).sum::<i64>(), 1000);
    assert_eq!(buckets[0].lower, Entire::min_value());
    for pair in buckets.windows(2) {
        assert!(pair[0].lower < pair[1].lower);
    }

    // Deterministic under a fixed tree state.
    assert_eq!(index.histogram(10).unwrap(), buckets);

    // Mutation invalidates the cached histogram.
    index.add(1001).unwrap();
    let refreshed = index.histogram(10).unwrap();
    assert_eq!(refreshed.iter().map(|b| b.count).sum::<i64>(), 1001);

    assert!(matches!(
        index.histogram(0),
        Err(StratumError::InvalidParameter { .. })
    ));
}

#[test]
fn count_histogram_tracks_size_when_configured() {
    let mut index = pair_index();
    for key in 0..100 {
        index.add((key, 7)).unwrap();
    }
    let buckets = index.histogram(8).unwrap();
    assert_eq!(buckets.iter().map(|b| b.count).sum::<i64>(), 100);
    assert_eq!(
        buckets.iter().map(|b| b.size.unwrap()).sum::<i64>(),
        700
    );
    let counts = index.count_histogram(8).unwrap();
    assert_eq!(counts.len(), buckets.len());
}

// =============================================================================
// Non-unique and collection variants
// =============================================================================

type Tagged = (i32, u64);

fn tagged_identity(item: &Tagged) -> Tagged {
    *item
}

fn widen(entire: &Entire<i32>) -> Entire<Tagged> {
    match entire {
        Entire::NegativeInfinity => Entire::NegativeInfinity,
        Entire::PositiveInfinity => Entire::PositiveInfinity,
        Entire::NegativeInfinitesimal(key) => Entire::NegativeInfinitesimal((*key, u64::MIN)),
        Entire::Exact(key) => Entire::Exact((*key, u64::MIN)),
        Entire::PositiveInfinitesimal(key) => Entire::PositiveInfinitesimal((*key, u64::MAX)),
    }
}

#[test]
fn non_unique_index_groups_duplicates() {
    let inner = UniqueOrderedIndex::new(
        IndexConfig::with_page_size(4),
        tagged_identity as fn(&Tagged) -> Tagged,
    )
    .unwrap();
    let mut index = NonUniqueIndex::new(inner, widen as fn(&Entire<i32>) -> Entire<Tagged>);

    index.add((5, 0)).unwrap();
    index.add((5, 1)).unwrap();
    index.add((5, 2)).unwrap();
    index.add((8, 0)).unwrap();

    assert_eq!(index.len(), 4);
    assert_eq!(index.get_items(&5), vec![(5, 0), (5, 1), (5, 2)]);
    assert!(index.contains_key(&5));
    assert!(!index.contains_key(&6));
    assert_eq!(index.key_count(&5).unwrap().get(), 3);

    let removed = index.remove_all(&5).unwrap();
    assert_eq!(removed.len(), 3);
    assert!(!index.contains_key(&5));
    assert!(index.contains_key(&8));
}

#[test]
fn collection_index_mirrors_notifications_onto_paged_backend() {
    let backend = small_index();
    let mut index = CollectionIndex::new(backend, identity as fn(&i32) -> i32);

    for key in 0..100 {
        index.on_inserting(&key).unwrap();
        index.on_inserted(key).unwrap();
    }
    assert!(matches!(
        index.on_inserting(&50),
        Err(StratumError::DuplicateKey)
    ));
    assert_eq!(index.len(), 100);
    assert_eq!(index.measure_result(COUNT).unwrap().get(), 100);

    index.on_removed(&10).unwrap();
    assert!(!index.contains_key(&10));
    index.on_item_changed(&20, 20).unwrap();
    index.on_cleared().unwrap();
    assert!(index.is_empty());
}

// =============================================================================
// Joins over ordered streams
// =============================================================================

#[test]
fn merge_join_over_two_indexes() {
    let mut left = small_index();
    let mut right = small_index();
    for key in [1, 2, 4, 8, 16] {
        left.add(key).unwrap();
    }
    for key in [2, 3, 4, 5, 16] {
        right.add(key).unwrap();
    }

    let joined = join::merge_join(
        left.get_items(&Range::full()),
        Direction::Positive,
        right.get_items(&Range::full()),
        Direction::Positive,
        identity,
        identity,
    )
    .unwrap();
    assert_eq!(joined, vec![(2, 2), (4, 4), (16, 16)]);

    let outer = join::merge_join_left(
        left.get_items(&Range::full()),
        Direction::Positive,
        right.get_items(&Range::full()),
        Direction::Positive,
        identity,
        identity,
    )
    .unwrap();
    assert_eq!(
        outer,
        vec![
            (1, None),
            (2, Some(2)),
            (4, Some(4)),
            (8, None),
            (16, Some(16))
        ]
    );
}

#[test]
fn loop_join_probes_index_per_outer_item() {
    let mut index = small_index();
    for key in 0..20 {
        index.add(key * 3).unwrap();
    }

    let joined = join::loop_join(vec![3, 4, 9], |o: &i32| *o, &index);
    assert_eq!(joined, vec![(3, 3), (9, 9)]);

    let outer = join::loop_join_left(vec![3, 4], |o: &i32| *o, &index);
    assert_eq!(outer, vec![(3, Some(3)), (4, None)]);

    let nested = join::nested_loop_join(vec![1, 2], &[2, 3], |l: &i32, r: &i32| l == r);
    assert_eq!(nested, vec![(2, 2)]);
}
