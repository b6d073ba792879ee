//! StratumDB ordered index core.
//!
//! A generic, ordered, paged index (a B+Tree variant) with incrementally
//! maintained aggregate measures, infinite/semi-infinite range queries, and
//! optimizer-facing statistics:
//!
//! - [`Entire`]: keys extended with infinity/infinitesimal markers, so range
//!   endpoints can express unbounded and exclusive bounds.
//! - [`Range`] / [`RangeSet`]: range algebra over extended keys.
//! - [`UniqueOrderedIndex`]: the paged tree with seek/add/remove/replace,
//!   range readers, measures, and histograms, over an injected
//!   [`PageProvider`].
//! - [`NonUniqueIndex`] / [`CollectionIndex`]: key-space and
//!   collection-notification wrappers that own no pages.
//! - [`join`]: merge/loop/nested-loop set execution over ordered streams.
//!
//! The core is not internally thread-safe; callers follow a single-writer
//! model and serialize writers externally. All page access goes through the
//! injected provider, which is the only place blocking I/O may occur.

pub mod collection;
pub mod entire;
pub mod index;
pub mod join;
pub mod measure;
pub mod non_unique;
pub mod range;
pub mod range_set;
pub mod stats;
pub mod tree;

pub use collection::{CollectionIndex, SortedVecIndex};
pub use entire::{Direction, Entire};
pub use index::{OrderedIndex, UniqueOrderedIndex};
pub use measure::{CountMeasure, Measure, MeasureResults, MeasureSet, MeasureValue, SizeMeasure, COUNT, SIZE};
pub use non_unique::NonUniqueIndex;
pub use range::Range;
pub use range_set::RangeSet;
pub use stats::{HistogramBucket, Statistics};
pub use tree::{
    IndexReader, InMemoryPageStore, InnerPage, LeafPage, PageNode, PageProvider, PageRef, Pointer,
    Seek, NULL_PAGE,
};
