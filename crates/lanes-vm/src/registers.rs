//! Fixed-width vector registers and the typed register files that hold them.
//!
//! Every register carries exactly [`LANES`] slots in struct-of-arrays
//! layout. Registers are plain `Copy` data: handlers read their inputs by
//! value before writing outputs, so a destination may alias a source.

use lanes_error::{LaneError, Result};
use lanes_types::{LANES, LaneMask, ValueRef, active_lanes};

// ── Value-vector register ───────────────────────────────────────────────────

/// Per-lane references to encoded values, including their descriptor byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VReg {
    pub offsets: [u32; LANES],
    pub sizes: [u32; LANES],
    /// Raw descriptor byte; the high nibble is the wire type.
    pub tags: [u8; LANES],
    /// TLV header bytes preceding the body.
    pub header_sizes: [u8; LANES],
}

impl VReg {
    pub const ZERO: Self = Self {
        offsets: [0; LANES],
        sizes: [0; LANES],
        tags: [0; LANES],
        header_sizes: [0; LANES],
    };

    #[inline]
    #[must_use]
    pub const fn value_ref(&self, lane: usize) -> ValueRef {
        ValueRef::new(self.offsets[lane], self.sizes[lane])
    }

    #[inline]
    pub fn set(&mut self, lane: usize, value: ValueRef, tag: u8, header_size: u8) {
        self.offsets[lane] = value.offset;
        self.sizes[lane] = value.size;
        self.tags[lane] = tag;
        self.header_sizes[lane] = header_size;
    }

    #[inline]
    pub fn clear_lane(&mut self, lane: usize) {
        self.set(lane, ValueRef::EMPTY, 0, 0);
    }

    /// Copy lane `lane` of `src` into this register.
    #[inline]
    pub fn copy_lane(&mut self, src: &Self, lane: usize) {
        self.offsets[lane] = src.offsets[lane];
        self.sizes[lane] = src.sizes[lane];
        self.tags[lane] = src.tags[lane];
        self.header_sizes[lane] = src.header_sizes[lane];
    }

    /// Lanes that are set in `mask` and satisfy `pred` on their tag.
    #[inline]
    pub fn select_tags(&self, mask: LaneMask, pred: impl Fn(u8) -> bool) -> LaneMask {
        active_lanes(mask)
            .filter(|&lane| pred(self.tags[lane]))
            .fold(0, |acc, lane| acc | (1 << lane))
    }
}

// ── Byte-range register ─────────────────────────────────────────────────────

/// Per-lane container bodies (no descriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BReg {
    pub offsets: [u32; LANES],
    pub sizes: [u32; LANES],
}

impl BReg {
    pub const ZERO: Self = Self {
        offsets: [0; LANES],
        sizes: [0; LANES],
    };

    #[inline]
    #[must_use]
    pub const fn range(&self, lane: usize) -> ValueRef {
        ValueRef::new(self.offsets[lane], self.sizes[lane])
    }

    #[inline]
    pub fn set(&mut self, lane: usize, range: ValueRef) {
        self.offsets[lane] = range.offset;
        self.sizes[lane] = range.size;
    }
}

// ── Integer and mask registers ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IReg {
    pub values: [i64; LANES],
}

impl IReg {
    pub const ZERO: Self = Self {
        values: [0; LANES],
    };
}

/// Predicate mask: bit `i` set means lane `i` is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KReg {
    pub mask: LaneMask,
}

impl KReg {
    #[inline]
    #[must_use]
    pub const fn new(mask: LaneMask) -> Self {
        Self { mask }
    }
}

// ── Register files ──────────────────────────────────────────────────────────

/// Number of registers a program allocates in each file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize,
)]
pub struct RegisterCounts {
    pub values: u16,
    pub ranges: u16,
    pub ints: u16,
    pub masks: u16,
}

impl RegisterCounts {
    /// Largest per-file count and the file it belongs to.
    #[must_use]
    pub fn largest(&self) -> (&'static str, u16) {
        [
            (VALUE_FILE, self.values),
            (RANGE_FILE, self.ranges),
            (INT_FILE, self.ints),
            (MASK_FILE, self.masks),
        ]
        .into_iter()
        .max_by_key(|&(_, count)| count)
        .unwrap_or((VALUE_FILE, 0))
    }
}

pub const VALUE_FILE: &str = "value";
pub const RANGE_FILE: &str = "range";
pub const INT_FILE: &str = "int";
pub const MASK_FILE: &str = "mask";

/// A typed, bounds-checked register file.
#[derive(Debug, Clone)]
pub struct RegisterFile<T> {
    name: &'static str,
    slots: Vec<T>,
}

impl<T: Copy + Default> RegisterFile<T> {
    #[must_use]
    pub fn new(name: &'static str, count: u16) -> Self {
        Self {
            name,
            slots: vec![T::default(); usize::from(count)],
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn count(&self) -> u16 {
        self.slots.len() as u16
    }

    fn out_of_range(&self, pc: usize, index: u16) -> LaneError {
        LaneError::InvalidRegister {
            pc,
            file: self.name,
            index,
            count: self.count(),
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: u16) -> Option<T> {
        self.slots.get(usize::from(index)).copied()
    }

    /// Read register `index` by value.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::InvalidRegister`] when `index` is not allocated.
    #[inline]
    pub fn read(&self, pc: usize, index: u16) -> Result<T> {
        self.slots
            .get(usize::from(index))
            .copied()
            .ok_or_else(|| self.out_of_range(pc, index))
    }

    /// Overwrite register `index`.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::InvalidRegister`] when `index` is not allocated.
    #[inline]
    pub fn write(&mut self, pc: usize, index: u16, value: T) -> Result<()> {
        match self.slots.get_mut(usize::from(index)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.out_of_range(pc, index)),
        }
    }

    /// Zero every register.
    pub fn reset(&mut self) {
        self.slots.fill(T::default());
    }
}

/// All four register files of one interpreter.
#[derive(Debug, Clone)]
pub struct Registers {
    pub v: RegisterFile<VReg>,
    pub b: RegisterFile<BReg>,
    pub i: RegisterFile<IReg>,
    pub k: RegisterFile<KReg>,
}

impl Registers {
    #[must_use]
    pub fn new(counts: RegisterCounts) -> Self {
        Self {
            v: RegisterFile::new(VALUE_FILE, counts.values),
            b: RegisterFile::new(RANGE_FILE, counts.ranges),
            i: RegisterFile::new(INT_FILE, counts.ints),
            k: RegisterFile::new(MASK_FILE, counts.masks),
        }
    }

    pub fn reset(&mut self) {
        self.v.reset();
        self.b.reset();
        self.i.reset();
        self.k.reset();
    }
}
