//! Per-block timestamp ranges for a single field path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Microseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const MIN: Self = Self(i64::MIN);
    pub const MAX: Self = Self(i64::MAX);

    #[inline]
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    #[inline]
    #[must_use]
    pub const fn as_micros(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Inclusive `[min, max]` bounds of one block's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub min: Timestamp,
    pub max: Timestamp,
}

impl Span {
    /// Bounds given in either order.
    #[must_use]
    pub fn new(a: Timestamp, b: Timestamp) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    #[must_use]
    pub fn widen(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn overlaps(self, lo: Timestamp, hi: Timestamp) -> bool {
        self.min <= hi && lo <= self.max
    }
}

/// Optional range per block, indexed by block number.
///
/// A block without a range holds no known values for the path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeIndex {
    ranges: Vec<Option<Span>>,
}

impl TimeIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one block covering `[min, max]`.
    pub fn push(&mut self, min: Timestamp, max: Timestamp) {
        self.ranges.push(Some(Span::new(min, max)));
    }

    /// Append `n` blocks with no range.
    pub fn push_empty(&mut self, n: usize) {
        self.ranges.resize(self.ranges.len() + n, None);
    }

    /// Widen the latest block to also cover `[min, max]`.
    ///
    /// With no blocks yet this behaves like [`TimeIndex::push`].
    pub fn edit_latest(&mut self, min: Timestamp, max: Timestamp) {
        let span = Span::new(min, max);
        match self.ranges.last_mut() {
            Some(Some(latest)) => *latest = latest.widen(span),
            Some(slot @ None) => *slot = Some(span),
            None => self.ranges.push(Some(span)),
        }
    }

    #[must_use]
    pub fn blocks(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn range(&self, block: usize) -> Option<Span> {
        self.ranges.get(block).copied().flatten()
    }

    /// Smallest minimum over all blocks.
    #[must_use]
    pub fn min(&self) -> Option<Timestamp> {
        self.ranges.iter().flatten().map(|span| span.min).min()
    }

    /// Largest maximum over all blocks.
    #[must_use]
    pub fn max(&self) -> Option<Timestamp> {
        self.ranges.iter().flatten().map(|span| span.max).max()
    }

    /// Blocks that may hold values in `[lo, hi]`.
    ///
    /// Blocks with no range are included: nothing is known about them.
    #[must_use]
    pub fn overlapping(&self, lo: Timestamp, hi: Timestamp) -> Vec<usize> {
        self.ranges
            .iter()
            .enumerate()
            .filter(|(_, span)| span.is_none_or(|span| span.overlaps(lo, hi)))
            .map(|(block, _)| block)
            .collect()
    }
}
