//! Row batches and the scratch buffers they borrow from.
//!
//! A scratch buffer holds encoded struct records followed by the program's
//! literal pool. A [`Batch`] is a view of up to [`LANES`] of those records,
//! each referenced by its struct *body* so `findsym` can scan it directly.

use lanes_error::{LaneError, Result};
use lanes_types::limits::mask_for_rows;
use lanes_types::{ALL_LANES, IonType, IonValue, LANES, LaneMask, ValueRef, ion};

/// One invocation's input: a read-only scratch buffer and up to
/// [`LANES`] row bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    scratch: &'a [u8],
    rows: [ValueRef; LANES],
    valid: LaneMask,
    literal_base: u32,
}

impl<'a> Batch<'a> {
    /// Build a batch over `rows`, lanes `0..rows.len()` valid.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::BatchTooLarge`] when `rows` has more than
    /// [`LANES`] entries.
    pub fn new(scratch: &'a [u8], rows: &[ValueRef], literal_base: u32) -> Result<Self> {
        let valid = mask_for_rows(rows.len()).ok_or(LaneError::BatchTooLarge {
            rows: rows.len(),
            lanes: LANES,
        })?;
        let mut lanes = [ValueRef::EMPTY; LANES];
        lanes[..rows.len()].copy_from_slice(rows);
        Ok(Self {
            scratch,
            rows: lanes,
            valid,
            literal_base,
        })
    }

    #[must_use]
    pub const fn scratch(&self) -> &'a [u8] {
        self.scratch
    }

    #[must_use]
    pub const fn rows(&self) -> &[ValueRef; LANES] {
        &self.rows
    }

    /// Mask of lanes that hold a row.
    #[must_use]
    pub const fn valid(&self) -> LaneMask {
        self.valid
    }

    #[must_use]
    pub const fn literal_base(&self) -> u32 {
        self.literal_base
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.valid.count_ones() as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.valid == 0
    }
}

/// Accumulates encoded struct records into one scratch buffer.
#[derive(Debug, Default, Clone)]
pub struct ScratchBuilder {
    buf: Vec<u8>,
    rows: Vec<ValueRef>,
}

impl ScratchBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one encoded struct record and return its body range.
    ///
    /// # Errors
    ///
    /// Fails when `encoded` is not exactly one non-null struct, or the
    /// buffer outgrows 32-bit addressing.
    pub fn push_record(&mut self, encoded: &[u8]) -> Result<ValueRef> {
        let extent = ion::extent(encoded)
            .filter(|e| e.size == encoded.len())
            .ok_or_else(|| LaneError::corrupt("record is not exactly one encoded value"))?;
        let tag = encoded[0];
        if IonType::from_tag(tag) != IonType::Struct || ion::is_typed_null(tag) {
            return Err(LaneError::corrupt(format!(
                "record has type {} (descriptor 0x{tag:02x}), expected struct",
                IonType::from_tag(tag).name()
            )));
        }
        let body = ValueRef::from_span(self.buf.len() + extent.header, extent.body_len())?;
        self.buf.extend_from_slice(encoded);
        self.rows.push(body);
        Ok(body)
    }

    /// Encode and append one struct record.
    ///
    /// # Errors
    ///
    /// See [`ScratchBuilder::push_record`].
    pub fn push_value(&mut self, value: &IonValue) -> Result<ValueRef> {
        self.push_record(&value.encode())
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Append the literal pool and freeze the buffer.
    ///
    /// # Errors
    ///
    /// Fails when the buffer outgrows 32-bit addressing.
    pub fn finish(mut self, literals: &[u8]) -> Result<Scratch> {
        let literal_base = u32::try_from(self.buf.len())
            .map_err(|_| LaneError::corrupt("scratch buffer exceeds 32-bit addressing"))?;
        self.buf.extend_from_slice(literals);
        Ok(Scratch {
            buf: self.buf,
            rows: self.rows,
            literal_base,
        })
    }
}

/// An owned, immutable scratch buffer with its row index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scratch {
    buf: Vec<u8>,
    rows: Vec<ValueRef>,
    literal_base: u32,
}

impl Scratch {
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    #[must_use]
    pub fn rows(&self) -> &[ValueRef] {
        &self.rows
    }

    #[must_use]
    pub const fn literal_base(&self) -> u32 {
        self.literal_base
    }

    /// Number of batches [`Scratch::batches`] yields.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.rows.len().div_ceil(LANES)
    }

    /// Batches of up to [`LANES`] consecutive rows.
    pub fn batches(&self) -> impl Iterator<Item = Batch<'_>> + '_ {
        self.rows.chunks(LANES).map(move |chunk| {
            let mut rows = [ValueRef::EMPTY; LANES];
            rows[..chunk.len()].copy_from_slice(chunk);
            Batch {
                scratch: &self.buf,
                rows,
                valid: mask_for_rows(chunk.len()).unwrap_or(ALL_LANES),
                literal_base: self.literal_base,
            }
        })
    }
}
