//! Core types shared by the lanes interpreter: lane limits, the binary TLV
//! wire contract, the type-bit lattice and value references into the
//! scratch buffer.

pub mod encoding;
pub mod ion;
pub mod ion_value;
pub mod limits;
pub mod typebits;
pub mod value;

pub use ion::{FALSE_TAG, IonType, NULL_TAG, TRUE_TAG};
pub use ion_value::IonValue;
pub use limits::{ALL_LANES, LANES, LaneMask};
pub use typebits::{TYPE_BITS, TypeBits, classify_tag};
pub use value::{ValueRef, resolve};

/// Iterate the indices of set lanes in `mask`, lowest first.
#[inline]
pub fn active_lanes(mask: LaneMask) -> impl Iterator<Item = usize> {
    let mut rest = mask;
    std::iter::from_fn(move || {
        if rest == 0 {
            return None;
        }
        let lane = rest.trailing_zeros() as usize;
        rest &= rest - 1;
        Some(lane)
    })
}
