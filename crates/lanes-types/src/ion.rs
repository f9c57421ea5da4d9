//! Binary TLV (Ion) value framing.
//!
//! Every value starts with a one-byte descriptor. The high nibble is the
//! wire type code; the low nibble `L` describes the length:
//!
//! | Descriptor          | Header bytes      | Total size                |
//! |---------------------|-------------------|---------------------------|
//! | `L == 0xF`          | 1                 | 1 (typed null)            |
//! | type `bool`         | 1                 | 1 (`L` is the value)      |
//! | `L == 0xE`          | 1 + VarUInt bytes | header + VarUInt length   |
//! | `struct`, `L == 1`  | 1 + VarUInt bytes | header + VarUInt length   |
//! | otherwise           | 1                 | 1 + `L`                   |
//!
//! The nibble split is a wire contract: registers carry the raw descriptor
//! byte and classification always shifts it right by four.

use crate::limits::MAX_VARUINT_LEN;

/// Canonical null (`null.null`).
pub const NULL_TAG: u8 = 0x0F;
/// Boolean `true`.
pub const TRUE_TAG: u8 = 0x11;
/// Boolean `false`.
pub const FALSE_TAG: u8 = 0x10;

/// Wire type codes carried in the descriptor's high nibble.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IonType {
    Null = 0,
    Bool = 1,
    PosInt = 2,
    NegInt = 3,
    Float = 4,
    Decimal = 5,
    Timestamp = 6,
    Symbol = 7,
    String = 8,
    Clob = 9,
    Blob = 10,
    List = 11,
    Sexp = 12,
    Struct = 13,
    Annotation = 14,
    Reserved = 15,
}

impl IonType {
    /// Classify a raw descriptor byte by its high nibble.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Self {
        match tag >> 4 {
            0 => Self::Null,
            1 => Self::Bool,
            2 => Self::PosInt,
            3 => Self::NegInt,
            4 => Self::Float,
            5 => Self::Decimal,
            6 => Self::Timestamp,
            7 => Self::Symbol,
            8 => Self::String,
            9 => Self::Clob,
            10 => Self::Blob,
            11 => Self::List,
            12 => Self::Sexp,
            13 => Self::Struct,
            14 => Self::Annotation,
            _ => Self::Reserved,
        }
    }

    /// Human-readable type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::PosInt | Self::NegInt => "int",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Timestamp => "timestamp",
            Self::Symbol => "symbol",
            Self::String => "string",
            Self::Clob => "clob",
            Self::Blob => "blob",
            Self::List => "list",
            Self::Sexp => "sexp",
            Self::Struct => "struct",
            Self::Annotation => "annotation",
            Self::Reserved => "reserved",
        }
    }
}

/// True when the descriptor denotes a typed null of any type.
#[inline]
#[must_use]
pub const fn is_typed_null(tag: u8) -> bool {
    tag & 0x0F == 0x0F
}

/// Header and total size of one encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// Bytes consumed by the descriptor and any length prefix.
    pub header: usize,
    /// Header plus body.
    pub size: usize,
}

impl Extent {
    /// Body length in bytes.
    #[must_use]
    pub const fn body_len(self) -> usize {
        self.size - self.header
    }
}

/// Read a VarUInt: 7 bits per byte, most significant group first, the final
/// byte flagged by its high bit. Returns `(value, bytes_consumed)`.
#[must_use]
pub fn read_varuint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate().take(MAX_VARUINT_LEN) {
        if value > (u64::MAX >> 7) {
            return None;
        }
        value = (value << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 != 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Number of bytes needed to encode `value` as a VarUInt.
#[must_use]
pub const fn varuint_len(value: u64) -> usize {
    let mut len = 1;
    let mut rest = value >> 7;
    while rest != 0 {
        len += 1;
        rest >>= 7;
    }
    len
}

/// Append `value` as a VarUInt.
#[allow(clippy::cast_possible_truncation)]
pub fn append_varuint(buf: &mut Vec<u8>, value: u64) {
    let len = varuint_len(value);
    for group in (0..len).rev() {
        let mut byte = ((value >> (7 * group)) & 0x7F) as u8;
        if group == 0 {
            byte |= 0x80;
        }
        buf.push(byte);
    }
}

const fn is_single_byte(tag: u8) -> bool {
    is_typed_null(tag) || tag >> 4 == IonType::Bool as u8
}

const fn has_length_prefix(tag: u8) -> bool {
    let low = tag & 0x0F;
    low == 0x0E || (tag >> 4 == IonType::Struct as u8 && low == 0x01)
}

/// Decode the framing of the value starting at `buf[0]`.
///
/// Returns `None` when the descriptor or length prefix is missing or
/// malformed. The reported size is not checked against `buf.len()`;
/// callers compare it with the bytes they actually hold.
#[must_use]
pub fn extent(buf: &[u8]) -> Option<Extent> {
    let &tag = buf.first()?;
    if is_single_byte(tag) {
        return Some(Extent { header: 1, size: 1 });
    }
    if has_length_prefix(tag) {
        let (len, consumed) = read_varuint(&buf[1..])?;
        let header = 1 + consumed;
        let size = header.checked_add(usize::try_from(len).ok()?)?;
        return Some(Extent { header, size });
    }
    Some(Extent {
        header: 1,
        size: 1 + usize::from(tag & 0x0F),
    })
}

/// Total encoded size of the value at `buf[0]`, header included.
#[must_use]
pub fn size_of(buf: &[u8]) -> Option<usize> {
    extent(buf).map(|e| e.size)
}

/// Header size of the value at `buf[0]`.
#[must_use]
pub fn header_size_of(buf: &[u8]) -> Option<usize> {
    extent(buf).map(|e| e.header)
}

/// Read a struct field label (symbol id), returning it with the bytes that
/// follow it.
#[must_use]
pub fn read_label(buf: &[u8]) -> Option<(u32, &[u8])> {
    let (symbol, consumed) = read_varuint(buf)?;
    let symbol = u32::try_from(symbol).ok()?;
    Some((symbol, &buf[consumed..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varuint_single_and_multi_byte() {
        assert_eq!(read_varuint(&[0x81]), Some((1, 1)));
        assert_eq!(read_varuint(&[0xFF]), Some((127, 1)));
        assert_eq!(read_varuint(&[0x01, 0x80]), Some((128, 2)));
        assert_eq!(read_varuint(&[0x7F, 0xFF]), Some((16_383, 2)));
        assert_eq!(read_varuint(&[0x01, 0x00, 0x80]), Some((16_384, 3)));
    }

    #[test]
    fn varuint_rejects_unterminated_and_overlong() {
        assert_eq!(read_varuint(&[]), None);
        assert_eq!(read_varuint(&[0x01, 0x02]), None);
        assert_eq!(read_varuint(&[0x7F; MAX_VARUINT_LEN + 1]), None);
    }

    #[test]
    fn varuint_append_matches_len() {
        for value in [0_u64, 1, 127, 128, 16_383, 16_384, u64::from(u32::MAX), u64::MAX] {
            let mut buf = Vec::new();
            append_varuint(&mut buf, value);
            assert_eq!(buf.len(), varuint_len(value), "value={value}");
            assert_eq!(read_varuint(&buf), Some((value, buf.len())), "value={value}");
        }
    }

    #[test]
    fn extent_of_short_values() {
        // int 7: 0x21 0x07
        assert_eq!(extent(&[0x21, 0x07]), Some(Extent { header: 1, size: 2 }));
        // string "ab"
        assert_eq!(size_of(&[0x82, b'a', b'b']), Some(3));
        // empty list
        assert_eq!(size_of(&[0xB0]), Some(1));
    }

    #[test]
    fn extent_of_single_byte_values() {
        assert_eq!(size_of(&[NULL_TAG]), Some(1));
        assert_eq!(size_of(&[TRUE_TAG]), Some(1));
        assert_eq!(size_of(&[FALSE_TAG]), Some(1));
        assert_eq!(size_of(&[0x8F]), Some(1), "null.string");
        assert_eq!(size_of(&[0xDF]), Some(1), "null.struct");
    }

    #[test]
    fn extent_of_length_prefixed_values() {
        let mut buf = vec![0x8E];
        append_varuint(&mut buf, 200);
        buf.extend(std::iter::repeat_n(b'x', 200));
        assert_eq!(extent(&buf), Some(Extent { header: 3, size: 203 }));
        assert_eq!(header_size_of(&buf), Some(3));

        // sorted struct uses L=1 with a length prefix
        assert_eq!(extent(&[0xD1, 0x83]), Some(Extent { header: 2, size: 5 }));
    }

    #[test]
    fn extent_rejects_missing_length() {
        assert_eq!(extent(&[]), None);
        assert_eq!(extent(&[0xBE]), None);
        assert_eq!(extent(&[0xBE, 0x01]), None);
    }

    #[test]
    fn label_reads_symbol_and_rest() {
        let buf = [0x85, 0x21, 0x01];
        let (symbol, rest) = read_label(&buf).expect("label");
        assert_eq!(symbol, 5);
        assert_eq!(rest, &[0x21, 0x01]);
        assert!(read_label(&[0x05]).is_none());
    }

    #[test]
    fn label_rejects_symbols_wider_than_u32() {
        let mut buf = Vec::new();
        append_varuint(&mut buf, u64::from(u32::MAX) + 1);
        assert!(read_label(&buf).is_none());
    }

    proptest::proptest! {
        #[test]
        fn extent_total_over_arbitrary_bytes(bytes in proptest::collection::vec(proptest::num::u8::ANY, 0..32)) {
            if let Some(e) = extent(&bytes) {
                proptest::prop_assert!(e.header >= 1);
                proptest::prop_assert!(e.size >= e.header);
                proptest::prop_assert!(e.header <= bytes.len().max(1));
            }
        }
    }

    #[test]
    fn type_codes_from_high_nibble() {
        assert_eq!(IonType::from_tag(NULL_TAG), IonType::Null);
        assert_eq!(IonType::from_tag(TRUE_TAG), IonType::Bool);
        assert_eq!(IonType::from_tag(0xB3), IonType::List);
        assert_eq!(IonType::from_tag(0xDE), IonType::Struct);
        assert_eq!(IonType::from_tag(0xF0), IonType::Reserved);
        assert!(is_typed_null(0x8F));
        assert!(!is_typed_null(0x80));
    }
}
