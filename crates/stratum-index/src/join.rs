//! Set-execution algorithms over ordered item streams.
//!
//! These are pure functions over already-ordered sequences and index
//! lookups; none of them touch pages directly. The merge joins require both
//! streams to advance in the same direction and fail up front on a
//! mismatch.

use crate::entire::Direction;
use crate::index::OrderedIndex;
use std::cmp::Ordering;
use stratum_common::{Result, StratumError};

fn ordered_cmp<K: Ord>(direction: Direction, a: &K, b: &K) -> Ordering {
    match direction {
        Direction::Positive => a.cmp(b),
        Direction::Negative => b.cmp(a),
    }
}

/// Inner merge join of two key-ordered streams.
///
/// Equal-key runs on both sides produce their cross product, so duplicate
/// keys on either side are handled.
pub fn merge_join<L, R, K, FL, FR>(
    left: impl IntoIterator<Item = L>,
    left_direction: Direction,
    right: impl IntoIterator<Item = R>,
    right_direction: Direction,
    left_key: FL,
    right_key: FR,
) -> Result<Vec<(L, R)>>
where
    L: Clone,
    R: Clone,
    K: Ord,
    FL: Fn(&L) -> K,
    FR: Fn(&R) -> K,
{
    let pairs = merge_join_core(
        left,
        left_direction,
        right,
        right_direction,
        left_key,
        right_key,
        false,
    )?;
    Ok(pairs
        .into_iter()
        .filter_map(|(l, r)| r.map(|r| (l, r)))
        .collect())
}

/// Left outer merge join of two key-ordered streams.
pub fn merge_join_left<L, R, K, FL, FR>(
    left: impl IntoIterator<Item = L>,
    left_direction: Direction,
    right: impl IntoIterator<Item = R>,
    right_direction: Direction,
    left_key: FL,
    right_key: FR,
) -> Result<Vec<(L, Option<R>)>>
where
    L: Clone,
    R: Clone,
    K: Ord,
    FL: Fn(&L) -> K,
    FR: Fn(&R) -> K,
{
    merge_join_core(
        left,
        left_direction,
        right,
        right_direction,
        left_key,
        right_key,
        true,
    )
}

#[allow(clippy::too_many_arguments)]
fn merge_join_core<L, R, K, FL, FR>(
    left: impl IntoIterator<Item = L>,
    left_direction: Direction,
    right: impl IntoIterator<Item = R>,
    right_direction: Direction,
    left_key: FL,
    right_key: FR,
    keep_unmatched: bool,
) -> Result<Vec<(L, Option<R>)>>
where
    L: Clone,
    R: Clone,
    K: Ord,
    FL: Fn(&L) -> K,
    FR: Fn(&R) -> K,
{
    if left_direction != right_direction {
        return Err(StratumError::DirectionMismatch);
    }
    let direction = left_direction;

    let mut out = Vec::new();
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let ordering = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => ordered_cmp(direction, &left_key(l), &right_key(r)),
            (Some(_), None) => Ordering::Less,
            _ => break,
        };
        match ordering {
            Ordering::Less => {
                let Some(l) = left.next() else { break };
                if keep_unmatched {
                    out.push((l, None));
                }
            }
            Ordering::Greater => {
                right.next();
            }
            Ordering::Equal => {
                let key = match left.peek() {
                    Some(l) => left_key(l),
                    None => break,
                };
                let mut left_group = Vec::new();
                while left.peek().is_some_and(|l| left_key(l) == key) {
                    if let Some(l) = left.next() {
                        left_group.push(l);
                    }
                }
                let mut right_group = Vec::new();
                while right.peek().is_some_and(|r| right_key(r) == key) {
                    if let Some(r) = right.next() {
                        right_group.push(r);
                    }
                }
                for l in &left_group {
                    for r in &right_group {
                        out.push((l.clone(), Some(r.clone())));
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Inner loop join: probes an index once per outer item.
pub fn loop_join<O, K, I, F>(
    outer: impl IntoIterator<Item = O>,
    key: F,
    index: &impl OrderedIndex<K, I>,
) -> Vec<(O, I)>
where
    F: Fn(&O) -> K,
{
    outer
        .into_iter()
        .filter_map(|o| index.get_item(&key(&o)).map(|i| (o, i)))
        .collect()
}

/// Left outer loop join: every outer item is kept, with its probe result.
pub fn loop_join_left<O, K, I, F>(
    outer: impl IntoIterator<Item = O>,
    key: F,
    index: &impl OrderedIndex<K, I>,
) -> Vec<(O, Option<I>)>
where
    F: Fn(&O) -> K,
{
    outer
        .into_iter()
        .map(|o| {
            let item = index.get_item(&key(&o));
            (o, item)
        })
        .collect()
}

/// Inner nested-loop join under an arbitrary predicate.
pub fn nested_loop_join<L, R, F>(
    left: impl IntoIterator<Item = L>,
    right: &[R],
    predicate: F,
) -> Vec<(L, R)>
where
    L: Clone,
    R: Clone,
    F: Fn(&L, &R) -> bool,
{
    let mut out = Vec::new();
    for l in left {
        for r in right {
            if predicate(&l, r) {
                out.push((l.clone(), r.clone()));
            }
        }
    }
    out
}

/// Left outer nested-loop join under an arbitrary predicate.
pub fn nested_loop_join_left<L, R, F>(
    left: impl IntoIterator<Item = L>,
    right: &[R],
    predicate: F,
) -> Vec<(L, Option<R>)>
where
    L: Clone,
    R: Clone,
    F: Fn(&L, &R) -> bool,
{
    let mut out = Vec::new();
    for l in left {
        let mut matched = false;
        for r in right {
            if predicate(&l, r) {
                out.push((l.clone(), Some(r.clone())));
                matched = true;
            }
        }
        if !matched {
            out.push((l, None));
        }
    }
    out
}
