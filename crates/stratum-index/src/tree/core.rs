//! Paged tree core: descent, mutation, and measure maintenance.
//!
//! The tree descends pages through an injected [`PageProvider`]; structural
//! changes (split, merge, root swap) are handle updates in the provider.
//! Measures are maintained incrementally on every non-structural path and
//! recomputed only for pages a split or merge rewrites.
//!
//! Not internally thread-safe: a mutation is a multi-step sequence over
//! several pages. Callers follow a single-writer model and serialize writers
//! externally.

use super::page::{InnerPage, LeafPage, PageNode, PageRef, NULL_PAGE};
use super::store::PageProvider;
use crate::entire::{Direction, Entire};
use crate::measure::{MeasureResults, MeasureSet};
use crate::range::Range;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;
use stratum_common::{Result, StratumError};
use tracing::{debug, trace};

/// A position inside a leaf page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pointer {
    /// The leaf page handle.
    pub page: PageRef,
    /// Item index within the leaf.
    pub index: usize,
}

/// Outcome of a seek: the exact key, the nearest position in seek direction,
/// or nothing on that side of the key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seek {
    /// The key was found at the pointer.
    Exact(Pointer),
    /// The pointer holds the nearest item in the seek direction.
    Nearest(Pointer),
    /// No item lies in the seek direction.
    None,
}

impl Seek {
    /// The pointer, when one exists.
    pub fn pointer(&self) -> Option<Pointer> {
        match self {
            Seek::Exact(p) | Seek::Nearest(p) => Some(*p),
            Seek::None => None,
        }
    }
}

enum AddOutcome<K> {
    Fit,
    Split { separator: K, right: PageRef },
}

/// The paged tree engine shared by the index variants.
pub(crate) struct Tree<K, I, X, P> {
    pub(crate) provider: P,
    pub(crate) extract: X,
    pub(crate) measures: Arc<MeasureSet<I>>,
    pub(crate) page_size: usize,
    pub(crate) root: PageRef,
    pub(crate) leftmost: PageRef,
    pub(crate) rightmost: PageRef,
    pub(crate) version: u64,
    _key: PhantomData<K>,
}

impl<K, I, X, P> Tree<K, I, X, P>
where
    K: Ord + Clone,
    X: Fn(&I) -> K,
    P: PageProvider<K, I>,
{
    /// Creates an empty tree whose root is a fresh leaf.
    pub fn new(mut provider: P, extract: X, measures: Arc<MeasureSet<I>>, page_size: usize) -> Self {
        let root = provider.allocate(PageNode::Leaf(LeafPage::empty(measures.len())));
        Self {
            provider,
            extract,
            measures,
            page_size,
            root,
            leftmost: root,
            rightmost: root,
            version: 0,
            _key: PhantomData,
        }
    }

    fn min_size(&self) -> usize {
        self.page_size / 2
    }

    /// Mutation counter; bumped by every successful write.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn leaf(&self, page: PageRef) -> &LeafPage<I> {
        match self.provider.node(page) {
            PageNode::Leaf(leaf) => leaf,
            PageNode::Inner(_) => unreachable!("leaf chain links only reference leaves"),
        }
    }

    fn search_leaf(&self, leaf: &LeafPage<I>, key: &K) -> std::result::Result<usize, usize> {
        leaf.items.binary_search_by(|item| (self.extract)(item).cmp(key))
    }

    fn combined_measures(&self, children: &[PageRef]) -> MeasureResults {
        let mut acc = self.measures.zeroed();
        for &child in children {
            acc.add(self.provider.node(child).measures());
        }
        acc
    }

    // =========================================================================
    // Seek
    // =========================================================================

    /// Seeks an exact key. `Nearest` points at the least item above the key,
    /// hopping onto the next leaf when the position falls past a page edge.
    pub fn seek_key(&self, key: &K) -> Seek {
        let mut page = self.root;
        loop {
            match self.provider.node(page) {
                PageNode::Inner(inner) => {
                    let slot = inner.keys.partition_point(|s| s <= key);
                    page = inner.children[slot];
                }
                PageNode::Leaf(leaf) => {
                    return match self.search_leaf(leaf, key) {
                        Ok(index) => Seek::Exact(Pointer { page, index }),
                        Err(index) if index < leaf.len() => Seek::Nearest(Pointer { page, index }),
                        Err(_) => match leaf.right {
                            NULL_PAGE => Seek::None,
                            right => Seek::Nearest(Pointer {
                                page: right,
                                index: 0,
                            }),
                        },
                    };
                }
            }
        }
    }

    /// Seeks an extended-key ray.
    ///
    /// In positive direction the result is the first item at or above the
    /// ray; in negative direction the last item at or below it. A result
    /// landing exactly on a page edge with the ray pointing further
    /// continues onto the neighboring leaf through the chain.
    pub fn seek_ray(&self, ray: &Entire<K>, direction: Direction) -> Seek {
        let mut page = self.root;
        let leaf = loop {
            match self.provider.node(page) {
                PageNode::Inner(inner) => {
                    let slot = inner
                        .keys
                        .partition_point(|s| ray.asymmetric_compare(s) != Ordering::Less);
                    page = inner.children[slot];
                }
                PageNode::Leaf(leaf) => break leaf,
            }
        };

        match direction {
            Direction::Positive => {
                let index = leaf
                    .items
                    .partition_point(|it| ray.asymmetric_compare(&(self.extract)(it)) == Ordering::Greater);
                if index < leaf.len() {
                    let found = &leaf.items[index];
                    if ray.asymmetric_compare(&(self.extract)(found)) == Ordering::Equal {
                        Seek::Exact(Pointer { page, index })
                    } else {
                        Seek::Nearest(Pointer { page, index })
                    }
                } else {
                    match leaf.right {
                        NULL_PAGE => Seek::None,
                        right => Seek::Nearest(Pointer {
                            page: right,
                            index: 0,
                        }),
                    }
                }
            }
            Direction::Negative => {
                let below = leaf
                    .items
                    .partition_point(|it| ray.asymmetric_compare(&(self.extract)(it)) != Ordering::Less);
                if below > 0 {
                    let index = below - 1;
                    let found = &leaf.items[index];
                    if ray.asymmetric_compare(&(self.extract)(found)) == Ordering::Equal {
                        Seek::Exact(Pointer { page, index })
                    } else {
                        Seek::Nearest(Pointer { page, index })
                    }
                } else {
                    match leaf.left {
                        NULL_PAGE => Seek::None,
                        left => Seek::Nearest(Pointer {
                            page: left,
                            index: self.leaf(left).len() - 1,
                        }),
                    }
                }
            }
        }
    }

    /// The item a pointer addresses.
    pub fn item_at(&self, pointer: Pointer) -> &I {
        &self.leaf(pointer.page).items[pointer.index]
    }

    /// The next position in the given direction, stepping across leaves.
    pub fn advance(&self, pointer: Pointer, direction: Direction) -> Option<Pointer> {
        let leaf = self.leaf(pointer.page);
        match direction {
            Direction::Positive => {
                if pointer.index + 1 < leaf.len() {
                    Some(Pointer {
                        page: pointer.page,
                        index: pointer.index + 1,
                    })
                } else if leaf.right != NULL_PAGE {
                    Some(Pointer {
                        page: leaf.right,
                        index: 0,
                    })
                } else {
                    None
                }
            }
            Direction::Negative => {
                if pointer.index > 0 {
                    Some(Pointer {
                        page: pointer.page,
                        index: pointer.index - 1,
                    })
                } else if leaf.left != NULL_PAGE {
                    let left = self.leaf(leaf.left);
                    Some(Pointer {
                        page: leaf.left,
                        index: left.len() - 1,
                    })
                } else {
                    None
                }
            }
        }
    }

    // =========================================================================
    // Add
    // =========================================================================

    /// Inserts an item under its extracted key.
    pub fn add(&mut self, item: I) -> Result<()> {
        if !self.provider.writable() {
            return Err(StratumError::ReadOnly);
        }
        let key = (self.extract)(&item);
        if let AddOutcome::Split { separator, right } = self.add_rec(self.root, key, item)? {
            let old_root = self.root;
            let measures = self.combined_measures(&[old_root, right]);
            let new_root = self.provider.allocate(PageNode::Inner(InnerPage {
                keys: vec![separator],
                children: vec![old_root, right],
                measures,
            }));
            self.root = new_root;
            debug!(root = new_root, "tree height increased by root split");
        }
        self.version += 1;
        Ok(())
    }

    fn add_rec(&mut self, page: PageRef, key: K, item: I) -> Result<AddOutcome<K>> {
        if self.provider.node(page).is_leaf() {
            self.add_to_leaf(page, key, item)
        } else {
            self.add_to_inner(page, key, item)
        }
    }

    fn add_to_leaf(&mut self, page: PageRef, key: K, item: I) -> Result<AddOutcome<K>> {
        let (position, len) = match self.provider.node(page) {
            PageNode::Leaf(leaf) => match self.search_leaf(leaf, &key) {
                Ok(_) => return Err(StratumError::DuplicateKey),
                Err(position) => (position, leaf.len()),
            },
            PageNode::Inner(_) => unreachable!("descent stopped at a leaf"),
        };

        if len < self.page_size {
            let delta = self.measures.of_item(&item);
            if let PageNode::Leaf(leaf) = self.provider.node_mut(page) {
                leaf.items.insert(position, item);
                leaf.measures.add(&delta);
            }
            return Ok(AddOutcome::Fit);
        }

        // Split at the fixed midpoint; the lower half stays in place.
        let mid = self.page_size / 2;
        let (right_items, old_right) = match self.provider.node_mut(page) {
            PageNode::Leaf(leaf) => (leaf.items.split_off(mid), leaf.right),
            PageNode::Inner(_) => unreachable!("descent stopped at a leaf"),
        };
        let separator = (self.extract)(&right_items[0]);
        let right_measures = self.measures.of_items(&right_items);
        let right = self.provider.allocate(PageNode::Leaf(LeafPage {
            items: right_items,
            left: page,
            right: old_right,
            measures: right_measures,
        }));

        let left_measures = match self.provider.node(page) {
            PageNode::Leaf(leaf) => self.measures.of_items(&leaf.items),
            PageNode::Inner(_) => unreachable!("descent stopped at a leaf"),
        };
        if let PageNode::Leaf(leaf) = self.provider.node_mut(page) {
            leaf.right = right;
            leaf.measures = left_measures;
        }
        if old_right == NULL_PAGE {
            self.rightmost = right;
        } else if let PageNode::Leaf(neighbor) = self.provider.node_mut(old_right) {
            neighbor.left = right;
        }
        trace!(page, right, "leaf split");

        // The new item goes into whichever half its key belongs to. A key at
        // or above the separator lands strictly inside the right half, so the
        // separator computed before insertion stays the right page's lowest.
        let target = if key < separator { page } else { right };
        let position = match self.provider.node(target) {
            PageNode::Leaf(leaf) => match self.search_leaf(leaf, &key) {
                Err(position) => position,
                Ok(_) => unreachable!("duplicate was rejected before the split"),
            },
            PageNode::Inner(_) => unreachable!("descent stopped at a leaf"),
        };
        let delta = self.measures.of_item(&item);
        if let PageNode::Leaf(leaf) = self.provider.node_mut(target) {
            leaf.items.insert(position, item);
            leaf.measures.add(&delta);
        }
        Ok(AddOutcome::Split { separator, right })
    }

    fn add_to_inner(&mut self, page: PageRef, key: K, item: I) -> Result<AddOutcome<K>> {
        let (slot, child) = match self.provider.node(page) {
            PageNode::Inner(inner) => {
                let slot = inner.keys.partition_point(|s| s <= &key);
                (slot, inner.children[slot])
            }
            PageNode::Leaf(_) => unreachable!("add_to_inner requires an inner page"),
        };

        let delta = self.measures.of_item(&item);
        let outcome = self.add_rec(child, key, item)?;

        let (separator, right) = match outcome {
            AddOutcome::Fit => {
                if let PageNode::Inner(inner) = self.provider.node_mut(page) {
                    inner.measures.add(&delta);
                }
                return Ok(AddOutcome::Fit);
            }
            AddOutcome::Split { separator, right } => (separator, right),
        };

        // The new child goes right of the seek position.
        let overflow = match self.provider.node_mut(page) {
            PageNode::Inner(inner) => {
                inner.keys.insert(slot, separator);
                inner.children.insert(slot + 1, right);
                inner.len() > self.page_size
            }
            PageNode::Leaf(_) => unreachable!("add_to_inner requires an inner page"),
        };
        if !overflow {
            if let PageNode::Inner(inner) = self.provider.node_mut(page) {
                inner.measures.add(&delta);
            }
            return Ok(AddOutcome::Fit);
        }

        // Split this inner page, promoting the middle separator.
        let mid = self.page_size / 2;
        let (promoted, right_keys, right_children) = match self.provider.node_mut(page) {
            PageNode::Inner(inner) => {
                let right_keys = inner.keys.split_off(mid + 1);
                let promoted = match inner.keys.pop() {
                    Some(k) => k,
                    None => unreachable!("an overflowing inner page has a middle key"),
                };
                let right_children = inner.children.split_off(mid + 1);
                (promoted, right_keys, right_children)
            }
            PageNode::Leaf(_) => unreachable!("add_to_inner requires an inner page"),
        };
        let right_measures = self.combined_measures(&right_children);
        let right_ref = self.provider.allocate(PageNode::Inner(InnerPage {
            keys: right_keys,
            children: right_children,
            measures: right_measures,
        }));
        let left_children = match self.provider.node(page) {
            PageNode::Inner(inner) => inner.children.clone(),
            PageNode::Leaf(_) => unreachable!("add_to_inner requires an inner page"),
        };
        let left_measures = self.combined_measures(&left_children);
        if let PageNode::Inner(inner) = self.provider.node_mut(page) {
            inner.measures = left_measures;
        }
        trace!(page, right = right_ref, "inner page split");
        Ok(AddOutcome::Split {
            separator: promoted,
            right: right_ref,
        })
    }

    // =========================================================================
    // Remove
    // =========================================================================

    /// Removes the item stored under a key and returns it.
    pub fn remove_key(&mut self, key: &K) -> Result<I> {
        if !self.provider.writable() {
            return Err(StratumError::ReadOnly);
        }
        let (item, _) = self.remove_rec(self.root, key)?;

        // An inner root left with a single child shrinks the tree.
        let collapse = match self.provider.node(self.root) {
            PageNode::Inner(inner) if inner.is_empty() => Some(inner.children[0]),
            _ => None,
        };
        if let Some(only_child) = collapse {
            self.provider.free(self.root);
            self.root = only_child;
            debug!(root = only_child, "tree height decreased by root collapse");
        }
        self.version += 1;
        Ok(item)
    }

    fn remove_rec(&mut self, page: PageRef, key: &K) -> Result<(I, bool)> {
        if self.provider.node(page).is_leaf() {
            self.remove_from_leaf(page, key)
        } else {
            self.remove_from_inner(page, key)
        }
    }

    fn remove_from_leaf(&mut self, page: PageRef, key: &K) -> Result<(I, bool)> {
        let position = match self.provider.node(page) {
            PageNode::Leaf(leaf) => match self.search_leaf(leaf, key) {
                Ok(position) => position,
                Err(_) => return Err(StratumError::KeyNotFound),
            },
            PageNode::Inner(_) => unreachable!("descent stopped at a leaf"),
        };
        let item = match self.provider.node_mut(page) {
            PageNode::Leaf(leaf) => leaf.items.remove(position),
            PageNode::Inner(_) => unreachable!("descent stopped at a leaf"),
        };
        let delta = self.measures.of_item(&item);
        let min = self.min_size();
        let underflow = match self.provider.node_mut(page) {
            PageNode::Leaf(leaf) => {
                leaf.measures.subtract(&delta);
                leaf.len() < min
            }
            PageNode::Inner(_) => unreachable!("descent stopped at a leaf"),
        };
        Ok((item, underflow))
    }

    fn remove_from_inner(&mut self, page: PageRef, key: &K) -> Result<(I, bool)> {
        let (slot, child) = match self.provider.node(page) {
            PageNode::Inner(inner) => {
                let slot = inner.keys.partition_point(|s| s <= key);
                (slot, inner.children[slot])
            }
            PageNode::Leaf(_) => unreachable!("remove_from_inner requires an inner page"),
        };

        let (item, child_underflow) = self.remove_rec(child, key)?;
        let delta = self.measures.of_item(&item);
        if let PageNode::Inner(inner) = self.provider.node_mut(page) {
            inner.measures.subtract(&delta);
        }
        if child_underflow {
            self.rebalance_child(page, slot);
        }
        let underflow = match self.provider.node(page) {
            PageNode::Inner(inner) => inner.len() < self.min_size(),
            PageNode::Leaf(_) => unreachable!("remove_from_inner requires an inner page"),
        };
        Ok((item, underflow))
    }

    /// Restores balance after `children[slot]` fell below the minimum, by
    /// merging with a neighbor or redistributing entries with it.
    fn rebalance_child(&mut self, parent: PageRef, slot: usize) {
        let left_slot = match self.provider.node(parent) {
            PageNode::Inner(inner) => {
                if inner.is_empty() {
                    // Sole child under an inner page; only a root reaches this
                    // shape and the caller collapses it.
                    return;
                }
                if slot == 0 {
                    0
                } else if slot == inner.children.len() - 1 {
                    slot - 1
                } else {
                    // Prefer the smaller neighbor to keep merge cost low.
                    let prev = self.provider.node(inner.children[slot - 1]).entry_count();
                    let next = self.provider.node(inner.children[slot + 1]).entry_count();
                    if prev <= next {
                        slot - 1
                    } else {
                        slot
                    }
                }
            }
            PageNode::Leaf(_) => unreachable!("only inner pages rebalance children"),
        };
        let (left_ref, right_ref) = match self.provider.node(parent) {
            PageNode::Inner(inner) => (inner.children[left_slot], inner.children[left_slot + 1]),
            PageNode::Leaf(_) => unreachable!("only inner pages rebalance children"),
        };
        if self.provider.node(left_ref).is_leaf() {
            self.rebalance_leaves(parent, left_slot, left_ref, right_ref);
        } else {
            self.rebalance_inners(parent, left_slot, left_ref, right_ref);
        }
    }

    fn rebalance_leaves(
        &mut self,
        parent: PageRef,
        left_slot: usize,
        left_ref: PageRef,
        right_ref: PageRef,
    ) {
        let left_len = self.provider.node(left_ref).entry_count();
        let right_len = self.provider.node(right_ref).entry_count();

        if left_len + right_len <= self.page_size {
            // Physical merge: the right leaf is absorbed and freed.
            let PageNode::Leaf(right_leaf) = self.provider.free(right_ref) else {
                unreachable!("sibling of a leaf is a leaf");
            };
            let next = right_leaf.right;
            if let PageNode::Leaf(left) = self.provider.node_mut(left_ref) {
                left.items.extend(right_leaf.items);
                left.right = next;
                left.measures.add(&right_leaf.measures);
            }
            if next == NULL_PAGE {
                self.rightmost = left_ref;
            } else if let PageNode::Leaf(neighbor) = self.provider.node_mut(next) {
                neighbor.left = left_ref;
            }
            if let PageNode::Inner(inner) = self.provider.node_mut(parent) {
                inner.keys.remove(left_slot);
                inner.children.remove(left_slot + 1);
            }
            trace!(left = left_ref, freed = right_ref, "leaf pages merged");
        } else {
            // Both halves stay page-worthy: redistribute the items and only
            // rewrite the separator in place.
            let mut items = match self.provider.node_mut(left_ref) {
                PageNode::Leaf(left) => std::mem::take(&mut left.items),
                PageNode::Inner(_) => unreachable!("sibling of a leaf is a leaf"),
            };
            match self.provider.node_mut(right_ref) {
                PageNode::Leaf(right) => items.append(&mut right.items),
                PageNode::Inner(_) => unreachable!("sibling of a leaf is a leaf"),
            }
            let right_items = items.split_off(items.len() / 2);
            let separator = (self.extract)(&right_items[0]);
            let left_measures = self.measures.of_items(&items);
            let right_measures = self.measures.of_items(&right_items);
            if let PageNode::Leaf(left) = self.provider.node_mut(left_ref) {
                left.items = items;
                left.measures = left_measures;
            }
            if let PageNode::Leaf(right) = self.provider.node_mut(right_ref) {
                right.items = right_items;
                right.measures = right_measures;
            }
            if let PageNode::Inner(inner) = self.provider.node_mut(parent) {
                inner.keys[left_slot] = separator;
            }
            trace!(left = left_ref, right = right_ref, "leaf items redistributed");
        }
    }

    fn rebalance_inners(
        &mut self,
        parent: PageRef,
        left_slot: usize,
        left_ref: PageRef,
        right_ref: PageRef,
    ) {
        let separator = match self.provider.node(parent) {
            PageNode::Inner(inner) => inner.keys[left_slot].clone(),
            PageNode::Leaf(_) => unreachable!("only inner pages rebalance children"),
        };
        let left_len = self.provider.node(left_ref).entry_count();
        let right_len = self.provider.node(right_ref).entry_count();

        if left_len + right_len + 1 <= self.page_size {
            // Pull the separator down and absorb the right page.
            let PageNode::Inner(right_inner) = self.provider.free(right_ref) else {
                unreachable!("sibling of an inner page is an inner page");
            };
            if let PageNode::Inner(left) = self.provider.node_mut(left_ref) {
                left.keys.push(separator);
                left.keys.extend(right_inner.keys);
                left.children.extend(right_inner.children);
                left.measures.add(&right_inner.measures);
            }
            if let PageNode::Inner(inner) = self.provider.node_mut(parent) {
                inner.keys.remove(left_slot);
                inner.children.remove(left_slot + 1);
            }
            trace!(left = left_ref, freed = right_ref, "inner pages merged");
        } else {
            // Rotate through the parent separator to even the halves out.
            let (mut keys, mut children) = match self.provider.node_mut(left_ref) {
                PageNode::Inner(left) => (
                    std::mem::take(&mut left.keys),
                    std::mem::take(&mut left.children),
                ),
                PageNode::Leaf(_) => unreachable!("sibling of an inner page is an inner page"),
            };
            keys.push(separator);
            match self.provider.node_mut(right_ref) {
                PageNode::Inner(right) => {
                    keys.append(&mut right.keys);
                    children.append(&mut right.children);
                }
                PageNode::Leaf(_) => unreachable!("sibling of an inner page is an inner page"),
            }
            let mid = keys.len() / 2;
            let right_keys = keys.split_off(mid + 1);
            let promoted = match keys.pop() {
                Some(k) => k,
                None => unreachable!("redistribution always leaves a middle key"),
            };
            let right_children = children.split_off(mid + 1);

            let left_measures = self.combined_measures(&children);
            let right_measures = self.combined_measures(&right_children);
            if let PageNode::Inner(left) = self.provider.node_mut(left_ref) {
                left.keys = keys;
                left.children = children;
                left.measures = left_measures;
            }
            if let PageNode::Inner(right) = self.provider.node_mut(right_ref) {
                right.keys = right_keys;
                right.children = right_children;
                right.measures = right_measures;
            }
            if let PageNode::Inner(inner) = self.provider.node_mut(parent) {
                inner.keys[left_slot] = promoted;
            }
            trace!(left = left_ref, right = right_ref, "inner entries redistributed");
        }
    }

    // =========================================================================
    // Replace
    // =========================================================================

    /// Swaps the item stored under an already-present key and returns the
    /// old item. Measures along the descent path are adjusted by the
    /// difference of the two items' contributions.
    pub fn replace(&mut self, item: I) -> Result<I> {
        if !self.provider.writable() {
            return Err(StratumError::ReadOnly);
        }
        let key = (self.extract)(&item);

        let mut path = Vec::with_capacity(8);
        let mut page = self.root;
        loop {
            path.push(page);
            match self.provider.node(page) {
                PageNode::Inner(inner) => {
                    let slot = inner.keys.partition_point(|s| s <= &key);
                    page = inner.children[slot];
                }
                PageNode::Leaf(_) => break,
            }
        }

        let position = match self.provider.node(page) {
            PageNode::Leaf(leaf) => match self.search_leaf(leaf, &key) {
                Ok(position) => position,
                Err(_) => return Err(StratumError::KeyNotFound),
            },
            PageNode::Inner(_) => unreachable!("descent stopped at a leaf"),
        };
        let new_delta = self.measures.of_item(&item);
        let old = match self.provider.node_mut(page) {
            PageNode::Leaf(leaf) => std::mem::replace(&mut leaf.items[position], item),
            PageNode::Inner(_) => unreachable!("descent stopped at a leaf"),
        };
        let old_delta = self.measures.of_item(&old);

        for &step in &path {
            let measures = match self.provider.node_mut(step) {
                PageNode::Leaf(leaf) => &mut leaf.measures,
                PageNode::Inner(inner) => &mut inner.measures,
            };
            measures.subtract(&old_delta);
            measures.add(&new_delta);
        }
        self.version += 1;
        Ok(old)
    }

    // =========================================================================
    // Bulk load
    // =========================================================================

    /// Rebuilds the tree from a strictly ascending item sequence, bypassing
    /// incremental insertion. Leaf and inner levels are packed full, with the
    /// trailing pair of pages on each level balanced so nothing falls below
    /// the minimum fill.
    pub fn bulk_load(&mut self, items: impl IntoIterator<Item = I>) -> Result<()> {
        if !self.provider.writable() {
            return Err(StratumError::ReadOnly);
        }
        let items: Vec<I> = items.into_iter().collect();
        for pair in items.windows(2) {
            if (self.extract)(&pair[0]) >= (self.extract)(&pair[1]) {
                return Err(StratumError::UnsortedBulkLoad);
            }
        }

        self.provider.clear();
        if items.is_empty() {
            let root = self
                .provider
                .allocate(PageNode::Leaf(LeafPage::empty(self.measures.len())));
            self.root = root;
            self.leftmost = root;
            self.rightmost = root;
            self.version += 1;
            return Ok(());
        }

        let sizes = level_sizes(items.len(), self.page_size, self.min_size());
        let mut level: Vec<(K, PageRef)> = Vec::with_capacity(sizes.len());
        let mut iter = items.into_iter();
        let mut prev = NULL_PAGE;
        for size in sizes {
            let chunk: Vec<I> = iter.by_ref().take(size).collect();
            let lowest = (self.extract)(&chunk[0]);
            let measures = self.measures.of_items(&chunk);
            let page = self.provider.allocate(PageNode::Leaf(LeafPage {
                items: chunk,
                left: prev,
                right: NULL_PAGE,
                measures,
            }));
            if prev != NULL_PAGE {
                if let PageNode::Leaf(previous) = self.provider.node_mut(prev) {
                    previous.right = page;
                }
            }
            level.push((lowest, page));
            prev = page;
        }
        self.leftmost = level[0].1;
        self.rightmost = prev;

        while level.len() > 1 {
            level = self.build_inner_level(level);
        }
        self.root = level[0].1;
        self.version += 1;
        debug!(root = self.root, "tree rebuilt by bulk load");
        Ok(())
    }

    fn build_inner_level(&mut self, children: Vec<(K, PageRef)>) -> Vec<(K, PageRef)> {
        // An inner page at capacity carries page_size separators and one more
        // child reference.
        let sizes = level_sizes(children.len(), self.page_size + 1, self.min_size() + 1);
        let mut next = Vec::with_capacity(sizes.len());
        let mut iter = children.into_iter();
        for size in sizes {
            let group: Vec<(K, PageRef)> = iter.by_ref().take(size).collect();
            let lowest = group[0].0.clone();
            let refs: Vec<PageRef> = group.iter().map(|(_, page)| *page).collect();
            let keys: Vec<K> = group.into_iter().skip(1).map(|(key, _)| key).collect();
            let measures = self.combined_measures(&refs);
            let page = self.provider.allocate(PageNode::Inner(InnerPage {
                keys,
                children: refs,
                measures,
            }));
            next.push((lowest, page));
        }
        next
    }

    /// Drops every page and resets to an empty tree.
    pub fn clear(&mut self) -> Result<()> {
        if !self.provider.writable() {
            return Err(StratumError::ReadOnly);
        }
        self.provider.clear();
        let root = self
            .provider
            .allocate(PageNode::Leaf(LeafPage::empty(self.measures.len())));
        self.root = root;
        self.leftmost = root;
        self.rightmost = root;
        self.version += 1;
        Ok(())
    }

    // =========================================================================
    // Measures over ranges
    // =========================================================================

    /// Measure results cached for the whole tree.
    pub fn root_measures(&self) -> &MeasureResults {
        self.provider.node(self.root).measures()
    }

    /// Combined measure results over a range.
    ///
    /// Both endpoints are sought to leaf pointers; items are enumerated only
    /// on the two boundary leaves, while every whole leaf strictly between
    /// them contributes its cached results through the leaf chain.
    pub fn range_measures(&self, range: &Range<K>) -> MeasureResults {
        let zero = self.measures.zeroed();
        let Some((low, high)) = range.endpoints() else {
            return zero;
        };
        let Some(first) = self.seek_ray(low, Direction::Positive).pointer() else {
            return zero;
        };
        let Some(last) = self.seek_ray(high, Direction::Negative).pointer() else {
            return zero;
        };

        // A range falling entirely into a gap yields crossed pointers.
        let first_key = (self.extract)(self.item_at(first));
        if high.asymmetric_compare(&first_key) == Ordering::Less {
            return zero;
        }
        let last_key = (self.extract)(self.item_at(last));
        if low.asymmetric_compare(&last_key) == Ordering::Greater {
            return zero;
        }

        if first.page == last.page {
            let leaf = self.leaf(first.page);
            return self.measures.of_items(&leaf.items[first.index..=last.index]);
        }

        let mut acc = zero;
        let first_leaf = self.leaf(first.page);
        acc.add(&self.measures.of_items(&first_leaf.items[first.index..]));
        let mut page = first_leaf.right;
        while page != last.page {
            let leaf = self.leaf(page);
            acc.add(&leaf.measures);
            page = leaf.right;
        }
        acc.add(&self.measures.of_items(&self.leaf(last.page).items[..=last.index]));
        acc
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of levels from root to leaves.
    pub fn height(&self) -> u32 {
        let mut height = 1;
        let mut page = self.root;
        loop {
            match self.provider.node(page) {
                PageNode::Inner(inner) => {
                    page = inner.children[0];
                    height += 1;
                }
                PageNode::Leaf(_) => return height,
            }
        }
    }

    /// Number of leaf pages, walking the chain.
    pub fn leaf_count(&self) -> u64 {
        let mut count = 0;
        let mut page = self.leftmost;
        loop {
            count += 1;
            match self.leaf(page).right {
                NULL_PAGE => return count,
                right => page = right,
            }
        }
    }

    /// Verifies structural and measure invariants, for diagnostics and tests:
    /// page fill bounds, leaf-chain ordering, separator placement, and cached
    /// measure consistency.
    pub fn check_consistency(&self) -> Result<()> {
        self.check_page(self.root, true, None, None)?;

        // The leaf chain yields strictly ascending keys.
        let mut page = self.leftmost;
        let mut previous: Option<K> = None;
        loop {
            let leaf = self.leaf(page);
            for item in &leaf.items {
                let key = (self.extract)(item);
                if let Some(prev) = &previous {
                    if *prev >= key {
                        return Err(StratumError::Corrupted(format!(
                            "leaf chain out of order at page {page}"
                        )));
                    }
                }
                previous = Some(key);
            }
            match leaf.right {
                NULL_PAGE => break,
                right => page = right,
            }
        }
        Ok(())
    }

    /// A separator is a routing bound: every key left of it is below it,
    /// every key at or right of it is at or above it. Removal may leave a
    /// separator pointing at a key that no longer exists, which is valid.
    fn check_page(
        &self,
        page: PageRef,
        is_root: bool,
        lower: Option<&K>,
        upper: Option<&K>,
    ) -> Result<()> {
        match self.provider.node(page) {
            PageNode::Leaf(leaf) => {
                if !is_root && (leaf.len() < self.min_size() || leaf.len() > self.page_size) {
                    return Err(StratumError::Corrupted(format!(
                        "leaf {page} holds {} items outside the fill bounds",
                        leaf.len()
                    )));
                }
                for item in &leaf.items {
                    let key = (self.extract)(item);
                    let in_bounds = lower.map_or(true, |bound| *bound <= key)
                        && upper.map_or(true, |bound| key < *bound);
                    if !in_bounds {
                        return Err(StratumError::Corrupted(format!(
                            "leaf {page} holds a key outside its separator bounds"
                        )));
                    }
                }
                if leaf.measures != self.measures.of_items(&leaf.items) {
                    return Err(StratumError::Corrupted(format!(
                        "leaf {page} caches stale measures"
                    )));
                }
                Ok(())
            }
            PageNode::Inner(inner) => {
                if !is_root && (inner.len() < self.min_size() || inner.len() > self.page_size) {
                    return Err(StratumError::Corrupted(format!(
                        "inner page {page} holds {} keys outside the fill bounds",
                        inner.len()
                    )));
                }
                if inner.children.len() != inner.len() + 1 {
                    return Err(StratumError::Corrupted(format!(
                        "inner page {page} has mismatched key and child counts"
                    )));
                }
                for pair in inner.keys.windows(2) {
                    if pair[0] >= pair[1] {
                        return Err(StratumError::Corrupted(format!(
                            "inner page {page} has unsorted separators"
                        )));
                    }
                }
                let last = inner.len();
                for (slot, child) in inner.children.iter().enumerate() {
                    let child_lower = if slot == 0 {
                        lower
                    } else {
                        Some(&inner.keys[slot - 1])
                    };
                    let child_upper = if slot == last {
                        upper
                    } else {
                        Some(&inner.keys[slot])
                    };
                    self.check_page(*child, false, child_lower, child_upper)?;
                }
                if inner.measures != self.combined_measures(&inner.children) {
                    return Err(StratumError::Corrupted(format!(
                        "inner page {page} caches stale measures"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Chunk sizes for one bulk-load level: full pages, with the trailing pair
/// rebalanced when the remainder would fall below the minimum.
fn level_sizes(total: usize, capacity: usize, minimum: usize) -> Vec<usize> {
    let full = total / capacity;
    let remainder = total % capacity;
    let mut sizes = vec![capacity; full];
    if remainder > 0 {
        if full > 0 && remainder < minimum {
            let combined = capacity + remainder;
            let last = sizes.len() - 1;
            sizes[last] = combined - combined / 2;
            sizes.push(combined / 2);
        } else {
            sizes.push(remainder);
        }
    }
    sizes
}
