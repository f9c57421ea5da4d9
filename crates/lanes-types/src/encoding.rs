//! Little-endian helpers for the instruction stream operand contract.
//!
//! Instruction operands are never reinterpreted in place; every field is read
//! at an explicit byte offset with an explicit width.

#[inline]
#[must_use]
pub fn read_u8(src: &[u8]) -> Option<u8> {
    src.first().copied()
}

#[inline]
#[must_use]
pub fn read_u16_le(src: &[u8]) -> Option<u16> {
    Some(u16::from_le_bytes(src.get(..2)?.try_into().ok()?))
}

#[inline]
#[must_use]
pub fn read_u32_le(src: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(src.get(..4)?.try_into().ok()?))
}

#[inline]
#[must_use]
pub fn read_i64_le(src: &[u8]) -> Option<i64> {
    Some(i64::from_le_bytes(src.get(..8)?.try_into().ok()?))
}

#[inline]
pub fn append_u16_le(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn append_u32_le(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn append_i64_le(buf: &mut Vec<u8>, value: i64) {
    buf.extend_from_slice(&value.to_le_bytes());
}
