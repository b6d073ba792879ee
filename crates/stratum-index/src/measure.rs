//! Incrementally maintained aggregate measures.
//!
//! A [`Measure`] maps an item to an additive value; the tree caches the sum
//! of each configured measure per page, so whole-index aggregates read the
//! root cache in O(1) and range aggregates combine cached page sums instead
//! of enumerating items. Values form an additive group (not just a monoid):
//! removal and replacement decrement without re-enumeration.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use stratum_common::{Result, StratumError};

/// Name of the built-in count measure, present on every index.
pub const COUNT: &str = "Count";

/// Name of the conventional size measure.
pub const SIZE: &str = "Size";

/// A single additive measure value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MeasureValue(pub i64);

impl MeasureValue {
    /// The group identity.
    pub const ZERO: MeasureValue = MeasureValue(0);

    /// Raw value accessor.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl Add for MeasureValue {
    type Output = MeasureValue;
    fn add(self, rhs: Self) -> Self {
        MeasureValue(self.0 + rhs.0)
    }
}

impl AddAssign for MeasureValue {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for MeasureValue {
    type Output = MeasureValue;
    fn sub(self, rhs: Self) -> Self {
        MeasureValue(self.0 - rhs.0)
    }
}

impl SubAssign for MeasureValue {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for MeasureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An aggregate definition over items of type `I`.
///
/// Implementations must be pure: the value of an item never changes while the
/// item is in the index.
pub trait Measure<I>: Send + Sync {
    /// Unique name the measure is addressed by.
    fn name(&self) -> &str;

    /// The measure value contributed by a single item.
    fn of(&self, item: &I) -> MeasureValue;
}

/// Counts items; every item contributes 1.
pub struct CountMeasure;

impl<I> Measure<I> for CountMeasure {
    fn name(&self) -> &str {
        COUNT
    }

    fn of(&self, _item: &I) -> MeasureValue {
        MeasureValue(1)
    }
}

/// Sums a per-item size supplied by a strategy closure.
pub struct SizeMeasure<I> {
    size_of: Box<dyn Fn(&I) -> i64 + Send + Sync>,
}

impl<I> SizeMeasure<I> {
    /// Creates a size measure from a pure sizing function.
    pub fn new(size_of: impl Fn(&I) -> i64 + Send + Sync + 'static) -> Self {
        Self {
            size_of: Box::new(size_of),
        }
    }
}

impl<I> Measure<I> for SizeMeasure<I> {
    fn name(&self) -> &str {
        SIZE
    }

    fn of(&self, item: &I) -> MeasureValue {
        MeasureValue((self.size_of)(item))
    }
}

/// An ordered registry of the measures configured on an index.
pub struct MeasureSet<I> {
    measures: Vec<Box<dyn Measure<I>>>,
}

impl<I> MeasureSet<I> {
    /// Creates a set holding only the built-in count measure.
    pub fn with_count() -> Self {
        Self {
            measures: vec![Box::new(CountMeasure)],
        }
    }

    /// Adds a measure to the set.
    pub fn add(mut self, measure: impl Measure<I> + 'static) -> Self {
        self.measures.push(Box::new(measure));
        self
    }

    /// Number of configured measures.
    pub fn len(&self) -> usize {
        self.measures.len()
    }

    /// True when no measures are configured.
    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    /// Position of a measure by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.measures.iter().position(|m| m.name() == name)
    }

    /// Position of a measure by name, failing when absent.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| StratumError::MeasureNotFound(name.to_string()))
    }

    /// Names of all configured measures, in registry order.
    pub fn names(&self) -> Vec<&str> {
        self.measures.iter().map(|m| m.name()).collect()
    }

    /// The contributions of a single item, one value per measure.
    pub fn of_item(&self, item: &I) -> MeasureResults {
        MeasureResults {
            values: self.measures.iter().map(|m| m.of(item)).collect(),
        }
    }

    /// The combined contributions of a sequence of items.
    pub fn of_items<'a>(&self, items: impl IntoIterator<Item = &'a I>) -> MeasureResults
    where
        I: 'a,
    {
        let mut acc = MeasureResults::zeroed(self.len());
        for item in items {
            acc.add(&self.of_item(item));
        }
        acc
    }

    /// The group identity for this set.
    pub fn zeroed(&self) -> MeasureResults {
        MeasureResults::zeroed(self.len())
    }
}

/// Cached partial results for every configured measure, parallel to the
/// owning [`MeasureSet`] registry order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeasureResults {
    values: Vec<MeasureValue>,
}

impl MeasureResults {
    /// All-zero results for `len` measures.
    pub fn zeroed(len: usize) -> Self {
        Self {
            values: vec![MeasureValue::ZERO; len],
        }
    }

    /// The value at a measure position.
    pub fn get(&self, index: usize) -> MeasureValue {
        self.values[index]
    }

    /// All values in registry order.
    pub fn values(&self) -> &[MeasureValue] {
        &self.values
    }

    /// Adds another result vector component-wise.
    pub fn add(&mut self, other: &MeasureResults) {
        for (v, o) in self.values.iter_mut().zip(&other.values) {
            *v += *o;
        }
    }

    /// Subtracts another result vector component-wise.
    pub fn subtract(&mut self, other: &MeasureResults) {
        for (v, o) in self.values.iter_mut().zip(&other.values) {
            *v -= *o;
        }
    }
}
