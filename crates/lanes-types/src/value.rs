use std::fmt;

use lanes_error::{LaneError, Result};

/// A borrowed view of one encoded value inside the batch's scratch buffer.
///
/// A `ValueRef` is an `(offset, size)` pair; it never owns or copies payload
/// bytes. Offsets are relative to the start of the scratch buffer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ValueRef {
    pub offset: u32,
    pub size: u32,
}

impl ValueRef {
    /// The empty reference used for zeroed lanes.
    pub const EMPTY: Self = Self { offset: 0, size: 0 };

    #[inline]
    #[must_use]
    pub const fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    /// One past the last byte, widened so it cannot overflow.
    #[inline]
    #[must_use]
    pub const fn end(self) -> u64 {
        self.offset as u64 + self.size as u64
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.size == 0
    }

    /// Build a reference from `usize` bounds.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::Corrupt`] when either bound does not fit the
    /// 32-bit addressing model.
    pub fn from_span(offset: usize, size: usize) -> Result<Self> {
        match (u32::try_from(offset), u32::try_from(size)) {
            (Ok(offset), Ok(size)) => Ok(Self { offset, size }),
            _ => Err(LaneError::corrupt(format!(
                "span {offset}+{size} exceeds 32-bit addressing"
            ))),
        }
    }
}

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}+{}]", self.offset, self.size)
    }
}

/// Resolve `value` against the scratch buffer.
///
/// # Errors
///
/// Returns [`LaneError::OutOfBounds`] when the span does not lie entirely
/// within `buf`. This is a corruption fault: the reference itself is bad.
#[inline]
pub fn resolve(buf: &[u8], value: ValueRef) -> Result<&[u8]> {
    let start = value.offset as usize;
    let end = start.checked_add(value.size as usize);
    match end {
        Some(end) if end <= buf.len() => Ok(&buf[start..end]),
        _ => Err(LaneError::OutOfBounds {
            offset: u64::from(value.offset),
            size: u64::from(value.size),
            len: buf.len(),
        }),
    }
}
