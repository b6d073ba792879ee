//! Optimizer-facing statistics and adaptive histograms.
//!
//! Histograms are built by walking the tree top-down over cached per-page
//! measures. The builder descends level by level until the frontier holds
//! enough subtrees to fill the requested bucket count, unites adjacent
//! subtrees when one more level would overshoot it, and degrades to a
//! per-leaf walk only when the tree never accumulates enough mass. Given a
//! fixed tree state and bucket count the result is identical on every call.

use crate::entire::Entire;
use crate::measure::{MeasureValue, COUNT, SIZE};
use crate::tree::core::Tree;
use crate::tree::page::PageNode;
use crate::tree::store::PageProvider;
use stratum_common::{Result, StratumError};

/// A snapshot of whole-index statistics, read from cached measures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    /// Number of items in the index.
    pub item_count: i64,
    /// Combined size of all items, when a size measure is configured.
    pub total_size: Option<i64>,
    /// Levels from root to leaves.
    pub height: u32,
    /// Number of leaf pages.
    pub leaf_count: u64,
    /// Number of live pages in the provider.
    pub page_count: u64,
}

/// One histogram bucket: the key-space lower bound of a subtree group and
/// its accumulated count and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramBucket<K> {
    /// Lower bound of the bucket in extended-key space; the first bucket is
    /// unbounded below.
    pub lower: Entire<K>,
    /// Items covered by the bucket.
    pub count: i64,
    /// Combined item size covered by the bucket, when a size measure is
    /// configured.
    pub size: Option<i64>,
}

pub(crate) fn build_statistics<K, I, X, P>(tree: &Tree<K, I, X, P>) -> Statistics
where
    K: Ord + Clone,
    X: Fn(&I) -> K,
    P: PageProvider<K, I>,
{
    let root = tree.root_measures();
    let item_count = match tree.measures.index_of(COUNT) {
        Some(index) => root.get(index).get(),
        None => 0,
    };
    let total_size = tree.measures.index_of(SIZE).map(|index| root.get(index).get());
    Statistics {
        item_count,
        total_size,
        height: tree.height(),
        leaf_count: tree.leaf_count(),
        page_count: tree.provider.page_count() as u64,
    }
}

pub(crate) fn build_histogram<K, I, X, P>(
    tree: &Tree<K, I, X, P>,
    max_key_count: usize,
    fill_percent: u32,
) -> Result<Vec<HistogramBucket<K>>>
where
    K: Ord + Clone,
    X: Fn(&I) -> K,
    P: PageProvider<K, I>,
{
    if max_key_count == 0 {
        return Err(StratumError::InvalidParameter {
            name: "max_key_count".to_string(),
            value: "0".to_string(),
        });
    }
    let count_index = tree.measures.require(COUNT)?;
    let size_index = tree.measures.index_of(SIZE);
    let target = ((max_key_count * fill_percent as usize) / 100).max(1);

    // Each frontier entry is a subtree with its key-space lower bound; the
    // leftmost subtree inherits its parent's bound.
    let mut frontier: Vec<(Entire<K>, crate::tree::page::PageRef)> =
        vec![(Entire::min_value(), tree.root)];
    loop {
        if frontier.len() >= target || frontier.len() > max_key_count {
            break;
        }
        let mut expanded = Vec::new();
        let mut any_inner = false;
        for (lower, page) in &frontier {
            match tree.provider.node(*page) {
                PageNode::Leaf(_) => expanded.push((lower.clone(), *page)),
                PageNode::Inner(inner) => {
                    any_inner = true;
                    expanded.push((lower.clone(), inner.children[0]));
                    for (slot, key) in inner.keys.iter().enumerate() {
                        expanded.push((Entire::exact(key.clone()), inner.children[slot + 1]));
                    }
                }
            }
        }
        frontier = expanded;
        if !any_inner {
            // Every frontier page is a leaf: the per-leaf fallback.
            break;
        }
    }

    // Unite adjacent subtrees when the frontier overshoots the bucket limit.
    let group_size = frontier.len().div_ceil(max_key_count).max(1);
    let mut buckets = Vec::with_capacity(frontier.len().div_ceil(group_size));
    for group in frontier.chunks(group_size) {
        let lower = group[0].0.clone();
        let mut count = MeasureValue::ZERO;
        let mut size = MeasureValue::ZERO;
        for (_, page) in group {
            let measures = tree.provider.node(*page).measures();
            count += measures.get(count_index);
            if let Some(index) = size_index {
                size += measures.get(index);
            }
        }
        buckets.push(HistogramBucket {
            lower,
            count: count.get(),
            size: size_index.map(|_| size.get()),
        });
    }
    Ok(buckets)
}
