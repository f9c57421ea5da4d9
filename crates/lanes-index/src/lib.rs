//! Sparse per-path time-range index over record blocks.
//!
//! Every indexed field path owns a [`TimeIndex`] with exactly one entry per
//! block. The index is consulted before execution to decide which blocks
//! need to be fed to the interpreter at all.

pub mod time_index;

use serde::{Deserialize, Serialize};

pub use time_index::{Span, TimeIndex, Timestamp};

/// The observed range of one field path within one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub path: Vec<String>,
    pub min: Timestamp,
    pub max: Timestamp,
}

impl BlockRange {
    #[must_use]
    pub fn new<S: Into<String>>(
        path: impl IntoIterator<Item = S>,
        min: Timestamp,
        max: Timestamp,
    ) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            min,
            max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PathIndex {
    path: Vec<String>,
    ranges: TimeIndex,
}

/// Time-range indices for many paths, kept sorted by path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SparseIndex {
    indices: Vec<PathIndex>,
    blocks: usize,
}

impl SparseIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed paths.
    #[must_use]
    pub fn fields(&self) -> usize {
        self.indices.len()
    }

    /// Number of blocks covered.
    #[must_use]
    pub const fn blocks(&self) -> usize {
        self.blocks
    }

    /// Indexed paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &[String]> {
        self.indices.iter().map(|idx| idx.path.as_slice())
    }

    fn search<S: AsRef<str>>(&self, path: &[S]) -> Result<usize, usize> {
        self.indices.binary_search_by(|idx| {
            idx.path
                .iter()
                .map(String::as_str)
                .cmp(path.iter().map(AsRef::<str>::as_ref))
        })
    }

    /// The index for `path`, if any block ever recorded it.
    #[must_use]
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&TimeIndex> {
        self.search(path).ok().map(|at| &self.indices[at].ranges)
    }

    /// Overall `(min, max)` of `path` across all blocks.
    #[must_use]
    pub fn min_max<S: AsRef<str>>(&self, path: &[S]) -> Option<(Timestamp, Timestamp)> {
        let idx = self.get(path)?;
        Some((idx.min()?, idx.max()?))
    }

    /// Blocks that may hold values of `path` in `[lo, hi]`.
    ///
    /// `None` means the path is not indexed and every block must be read.
    #[must_use]
    pub fn overlapping_blocks<S: AsRef<str>>(
        &self,
        path: &[S],
        lo: Timestamp,
        hi: Timestamp,
    ) -> Option<Vec<usize>> {
        self.get(path).map(|idx| idx.overlapping(lo, hi))
    }

    /// Add one block described by `ranges`.
    ///
    /// Paths not mentioned get an empty entry for the new block. A path
    /// listed twice has its two ranges merged.
    pub fn push(&mut self, ranges: &[BlockRange]) {
        for range in ranges {
            self.record(&range.path, range.min, range.max);
        }
        self.bump();
    }

    /// Widen the latest block with the overall ranges of `from`.
    ///
    /// Does not add a block. On an empty index this starts block 0.
    pub fn update_summary(&mut self, from: &Self) {
        if self.blocks == 0 {
            self.push_summary(from);
            return;
        }
        let latest = self.blocks - 1;
        for (path, min, max) in from.summaries() {
            match self.search(path) {
                Ok(at) => self.indices[at].ranges.edit_latest(min, max),
                Err(at) => {
                    let mut ranges = TimeIndex::new();
                    ranges.push_empty(latest);
                    ranges.push(min, max);
                    self.insert(at, path, ranges);
                }
            }
        }
        tracing::debug!(block = latest, paths = from.fields(), "updated latest block summary");
    }

    /// Append one block from the overall ranges of `from`.
    pub fn push_summary(&mut self, from: &Self) {
        for (path, min, max) in from.summaries() {
            self.record(path, min, max);
        }
        self.bump();
    }

    fn summaries(&self) -> impl Iterator<Item = (&[String], Timestamp, Timestamp)> {
        self.indices.iter().filter_map(|idx| {
            Some((idx.path.as_slice(), idx.ranges.min()?, idx.ranges.max()?))
        })
    }

    fn insert(&mut self, at: usize, path: &[String], ranges: TimeIndex) {
        self.indices.insert(
            at,
            PathIndex {
                path: path.to_vec(),
                ranges,
            },
        );
    }

    /// Record `[min, max]` for `path` in the block being built.
    fn record(&mut self, path: &[String], min: Timestamp, max: Timestamp) {
        let pending = self.blocks;
        match self.search(path) {
            Ok(at) => {
                let ranges = &mut self.indices[at].ranges;
                if ranges.blocks() > pending {
                    ranges.edit_latest(min, max);
                } else {
                    ranges.push_empty(pending - ranges.blocks());
                    ranges.push(min, max);
                }
            }
            Err(at) => {
                let mut ranges = TimeIndex::new();
                ranges.push_empty(pending);
                ranges.push(min, max);
                self.insert(at, path, ranges);
            }
        }
    }

    /// Close the block being built, padding every path to the same length.
    fn bump(&mut self) {
        self.blocks += 1;
        for idx in &mut self.indices {
            let have = idx.ranges.blocks();
            if have < self.blocks {
                idx.ranges.push_empty(self.blocks - have);
            }
        }
        tracing::trace!(blocks = self.blocks, fields = self.indices.len(), "block pushed");
    }
}
