/// Number of rows processed in lockstep by one instruction.
///
/// Every register type holds exactly this many slots. Must stay a power of
/// two no larger than the width of [`LaneMask`].
pub const LANES: usize = 16;

/// One bit per lane; bit `i` set means lane `i` is active.
pub type LaneMask = u16;

/// Mask with every lane active.
pub const ALL_LANES: LaneMask = LaneMask::MAX;

/// Longest VarUInt accepted by the decoder (enough for a `u64`).
pub const MAX_VARUINT_LEN: usize = 10;

/// Default cap on instruction stream size in bytes.
pub const DEFAULT_MAX_PROGRAM_BYTES: usize = 1 << 20;

/// Default cap on registers per register file.
pub const DEFAULT_MAX_REGISTERS: u16 = 4096;

/// Build the mask covering the first `rows` lanes.
///
/// Returns `None` when `rows` exceeds [`LANES`].
#[must_use]
pub const fn mask_for_rows(rows: usize) -> Option<LaneMask> {
    if rows > LANES {
        return None;
    }
    if rows == LANES {
        return Some(ALL_LANES);
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(((1_u32 << rows) - 1) as LaneMask)
}

const _: () = assert!(LANES.is_power_of_two());
const _: () = assert!(LANES == LaneMask::BITS as usize);
