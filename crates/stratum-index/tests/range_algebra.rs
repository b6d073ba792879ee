//! Range algebra laws and extended-key ordering properties.

use proptest::prelude::*;
use stratum_index::{Direction, Entire, Range, RangeSet};

#[test]
fn entire_bounds_every_value() {
    for v in [i64::MIN, -7, 0, 42, i64::MAX] {
        assert!(Entire::min_value() < Entire::exact(v));
        assert!(Entire::exact(v) < Entire::max_value());
    }
}

#[test]
fn positive_shift_orders_after_exact() {
    let exact = Entire::exact(10);
    let shifted = Entire::shifted(10, Direction::Positive);
    assert!(shifted > exact);
    // The asymmetric comparison treats the shift as ordering-adjacent to the
    // exact key: greater than 10 itself, less than everything above it.
    assert_eq!(
        shifted.asymmetric_compare(&10),
        std::cmp::Ordering::Greater
    );
    assert_eq!(shifted.asymmetric_compare(&11), std::cmp::Ordering::Less);
}

#[test]
fn rangeset_unite_then_intersect_scenario() {
    let mut set = RangeSet::from_range(Range::closed(1, 5));
    set.unite(Range::closed(3, 8));
    assert_eq!(set.ranges(), &[Range::closed(1, 8)]);

    let result = set.intersect(&RangeSet::from_range(Range::closed(6, 10)));
    assert_eq!(result.ranges(), &[Range::closed(6, 8)]);
}

#[test]
fn merge_requires_intersection() {
    let a = Range::closed(1, 2);
    let b = Range::closed(10, 20);
    assert!(!a.intersects(&b));
    assert!(a.merge(&b).is_err());
    assert!(a.merge(&Range::closed(2, 4)).is_ok());
}

#[test]
fn subtract_self_yields_nothing() {
    let a = Range::closed(-3, 9);
    assert!(a.subtract(&a).unwrap().is_empty());
}

fn ordered_pair() -> impl Strategy<Value = (i32, i32)> {
    (-1000i32..1000, -1000i32..1000).prop_map(|(a, b)| (a.min(b), a.max(b)))
}

proptest! {
    #[test]
    fn prop_intersect_self_is_identity((a, b) in ordered_pair()) {
        let r = Range::closed(a, b);
        prop_assert_eq!(r.intersect(&r).unwrap(), r);
    }

    #[test]
    fn prop_intersect_is_symmetric((a, b) in ordered_pair(), (c, d) in ordered_pair()) {
        let x = Range::closed(a, b);
        let y = Range::closed(c, d);
        match (x.intersect(&y), y.intersect(&x)) {
            (Ok(p), Ok(q)) => prop_assert_eq!(p, q),
            (Err(_), Err(_)) => {}
            _ => prop_assert!(false, "intersect symmetry violated"),
        }
    }

    #[test]
    fn prop_merge_succeeds_iff_intersects((a, b) in ordered_pair(), (c, d) in ordered_pair()) {
        let x = Range::closed(a, b);
        let y = Range::closed(c, d);
        prop_assert_eq!(x.merge(&y).is_ok(), x.intersects(&y));
    }

    #[test]
    fn prop_subtract_pieces_avoid_subtrahend(
        (a, b) in ordered_pair(),
        (c, d) in ordered_pair(),
        probe in -1000i32..1000,
    ) {
        let x = Range::closed(a, b);
        let y = Range::closed(c, d);
        if let Ok(pieces) = x.subtract(&y) {
            prop_assert!(pieces.len() <= 2);
            let in_pieces = pieces.iter().any(|p| p.contains_key(&probe));
            let expected = x.contains_key(&probe) && !y.contains_key(&probe);
            prop_assert_eq!(in_pieces, expected);
        }
    }

    #[test]
    fn prop_double_invert_is_identity(values in proptest::collection::btree_set(-10_000i32..10_000, 0..16)) {
        // Pair sorted distinct values into disjoint closed ranges.
        let values: Vec<i32> = values.into_iter().collect();
        let mut set = RangeSet::new();
        for pair in values.chunks(2) {
            if let [low, high] = pair {
                set.unite(Range::closed(*low, *high));
            }
        }
        prop_assert_eq!(set.invert().invert(), set);
    }

    #[test]
    fn prop_invert_flips_membership(
        values in proptest::collection::btree_set(-1000i32..1000, 0..12),
        probe in -1000i32..1000,
    ) {
        let values: Vec<i32> = values.into_iter().collect();
        let mut set = RangeSet::new();
        for pair in values.chunks(2) {
            if let [low, high] = pair {
                set.unite(Range::closed(*low, *high));
            }
        }
        prop_assert_eq!(set.invert().contains_key(&probe), !set.contains_key(&probe));
    }

    #[test]
    fn prop_entire_ordering_total(v in -1000i32..1000) {
        let ladder = [
            Entire::min_value(),
            Entire::shifted(v, Direction::Negative),
            Entire::exact(v),
            Entire::shifted(v, Direction::Positive),
            Entire::max_value(),
        ];
        for pair in ladder.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }
}
