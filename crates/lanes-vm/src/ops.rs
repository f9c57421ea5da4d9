//! Opcode library: pure functions over registers.
//!
//! Each function reads input slots only for lanes whose mask bit is set and
//! returns fresh output registers. Locally inapplicable lanes (a value of
//! the wrong type, an unreadable list child) clear their output bit.
//! Malformed scratch bytes in an active lane are fatal and return an error
//! for the whole batch.
//!
//! Masked-out output lanes follow a per-opcode policy:
//!
//! | Function               | Masked-out lanes                 |
//! |------------------------|----------------------------------|
//! | [`literal_ref`]        | zeroed                           |
//! | [`mov_v`]              | retained from the destination    |
//! | [`broadcast_i64`]      | zeroed                           |
//! | `is_*` predicates      | mask bit 0                       |
//! | [`type_bits`]          | zeroed                           |
//! | [`check_tag`]          | zeroed                           |
//! | [`tuple`]              | zeroed                           |
//! | [`object_size`]        | zeroed                           |
//! | [`find_symbol`]        | zeroed                           |
//! | [`find_symbol_resume`] | retained from the prior match    |
//! | [`compare_i64_imm`]    | mask bit 0                       |

use lanes_error::{LaneError, Result};
use lanes_types::ion::{self, Extent, IonType};
use lanes_types::{
    FALSE_TAG, LaneMask, NULL_TAG, TRUE_TAG, TypeBits, ValueRef, active_lanes, classify_tag,
    resolve,
};

use crate::registers::{BReg, IReg, VReg};

#[inline]
const fn bit(lane: usize) -> LaneMask {
    1 << lane
}

fn to_u32(n: usize, what: &str) -> Result<u32> {
    u32::try_from(n).map_err(|_| LaneError::corrupt(format!("{what} {n} exceeds 32-bit addressing")))
}

// ── Comparison Predicate ────────────────────────────────────────────────────

/// Comparison operation for integer predicates.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq = 0,
    Ne = 1,
    Lt = 2,
    Le = 3,
    Gt = 4,
    Ge = 5,
}

impl CompareOp {
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Eq,
            1 => Self::Ne,
            2 => Self::Lt,
            3 => Self::Le,
            4 => Self::Gt,
            5 => Self::Ge,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

#[inline]
const fn compare_i64(lhs: i64, op: CompareOp, rhs: i64) -> bool {
    match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::Ne => lhs != rhs,
        CompareOp::Lt => lhs < rhs,
        CompareOp::Le => lhs <= rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::Ge => lhs >= rhs,
    }
}

/// Keep active lanes where `src[lane] <op> imm` holds.
#[must_use]
pub fn compare_i64_imm(src: &IReg, op: CompareOp, imm: i64, mask: LaneMask) -> LaneMask {
    active_lanes(mask)
        .filter(|&lane| compare_i64(src.values[lane], op, imm))
        .fold(0, |acc, lane| acc | bit(lane))
}

// ── Values ──────────────────────────────────────────────────────────────────

/// Broadcast one literal reference to every active lane.
///
/// `base` is where the literal pool starts in the scratch buffer.
///
/// # Errors
///
/// Returns a corruption fault when `base + offset` overflows `u32`.
pub fn literal_ref(
    base: u32,
    offset: u32,
    size: u32,
    tag: u8,
    header_size: u8,
    mask: LaneMask,
) -> Result<VReg> {
    let absolute = base.checked_add(offset).ok_or_else(|| {
        LaneError::corrupt(format!("literal offset {offset} overflows pool base {base}"))
    })?;
    let value = ValueRef::new(absolute, size);
    let mut out = VReg::ZERO;
    for lane in active_lanes(mask) {
        out.set(lane, value, tag, header_size);
    }
    Ok(out)
}

/// Blend the active lanes of `src` over `dst`.
#[must_use]
pub fn mov_v(dst: &VReg, src: &VReg, mask: LaneMask) -> VReg {
    let mut out = *dst;
    for lane in active_lanes(mask) {
        out.copy_lane(src, lane);
    }
    out
}

#[must_use]
pub fn broadcast_i64(imm: i64, mask: LaneMask) -> IReg {
    let mut out = IReg::ZERO;
    for lane in active_lanes(mask) {
        out.values[lane] = imm;
    }
    out
}

// ── Null / Boolean Predicates ───────────────────────────────────────────────

/// Active lanes holding the untyped null `0x0F`.
#[must_use]
pub fn is_null(src: &VReg, mask: LaneMask) -> LaneMask {
    src.select_tags(mask, |tag| tag == NULL_TAG)
}

/// Exact complement of [`is_null`] within `mask`.
#[must_use]
pub fn is_not_null(src: &VReg, mask: LaneMask) -> LaneMask {
    src.select_tags(mask, |tag| tag != NULL_TAG)
}

#[must_use]
pub fn is_true(src: &VReg, mask: LaneMask) -> LaneMask {
    src.select_tags(mask, |tag| tag == TRUE_TAG)
}

#[must_use]
pub fn is_false(src: &VReg, mask: LaneMask) -> LaneMask {
    src.select_tags(mask, |tag| tag == FALSE_TAG)
}

// ── Type Tests ──────────────────────────────────────────────────────────────

/// Classify every active lane into its [`TypeBits`] set.
#[must_use]
pub fn type_bits(src: &VReg, mask: LaneMask) -> IReg {
    let mut out = IReg::ZERO;
    for lane in active_lanes(mask) {
        out.values[lane] = i64::from(classify_tag(src.tags[lane]).bits());
    }
    out
}

/// Pass through the active lanes whose type intersects `accept`.
#[must_use]
pub fn check_tag(src: &VReg, accept: TypeBits, mask: LaneMask) -> (VReg, LaneMask) {
    let mut out = VReg::ZERO;
    let mut kept = 0;
    for lane in active_lanes(mask) {
        if accept.accepts_tag(src.tags[lane]) {
            out.copy_lane(src, lane);
            kept |= bit(lane);
        }
    }
    (out, kept)
}

// ── Structural Navigation ───────────────────────────────────────────────────

const fn is_container(tag: u8, ty: IonType) -> bool {
    !ion::is_typed_null(tag) && IonType::from_tag(tag) as u8 == ty as u8
}

const fn is_null_container(tag: u8) -> bool {
    ion::is_typed_null(tag)
        && matches!(IonType::from_tag(tag), IonType::List | IonType::Struct)
}

/// Resolve an active value lane and split off its header.
fn value_body<'a>(buf: &'a [u8], src: &VReg, lane: usize) -> Result<&'a [u8]> {
    let bytes = resolve(buf, src.value_ref(lane))?;
    let header = usize::from(src.header_sizes[lane]);
    bytes.get(header..).ok_or_else(|| {
        LaneError::corrupt(format!(
            "header of {header} bytes exceeds value of {} bytes",
            bytes.len()
        ))
    })
}

/// Convert active struct values into their body byte ranges.
///
/// # Errors
///
/// Fails when a struct lane's reference lies outside `buf` or its header is
/// larger than the value.
pub fn tuple(buf: &[u8], src: &VReg, mask: LaneMask) -> Result<(BReg, LaneMask)> {
    let mut out = BReg::ZERO;
    let mut kept = 0;
    for lane in active_lanes(mask) {
        if !is_container(src.tags[lane], IonType::Struct) {
            continue;
        }
        let body = value_body(buf, src, lane)?;
        let start = src.offsets[lane]
            .checked_add(u32::from(src.header_sizes[lane]))
            .ok_or_else(|| LaneError::corrupt("struct body start overflows 32-bit addressing"))?;
        out.set(lane, ValueRef::new(start, to_u32(body.len(), "struct body")?));
        kept |= bit(lane);
    }
    Ok((out, kept))
}

fn count_list_values(mut body: &[u8]) -> Option<usize> {
    let mut count = 0;
    while !body.is_empty() {
        let size = ion::size_of(body)?;
        if size == 0 || size > body.len() {
            return None;
        }
        body = &body[size..];
        count += 1;
    }
    Some(count)
}

fn count_struct_fields(mut body: &[u8]) -> Option<usize> {
    let mut count = 0;
    while !body.is_empty() {
        let (_, value) = ion::read_label(body)?;
        let size = ion::size_of(value)?;
        if size == 0 || size > value.len() {
            return None;
        }
        body = &value[size..];
        count += 1;
    }
    Some(count)
}

/// Count the children of active list and struct lanes.
///
/// Non-containers and bodies whose children cannot be walked clear their
/// bit. An empty container counts 0 with its bit set, and so do the typed
/// nulls `null.list` and `null.struct`.
///
/// # Errors
///
/// Fails when an active container lane's reference lies outside `buf` or its
/// header is larger than the value.
pub fn object_size(buf: &[u8], src: &VReg, mask: LaneMask) -> Result<(IReg, LaneMask)> {
    let mut out = IReg::ZERO;
    let mut kept = 0;
    for lane in active_lanes(mask) {
        let tag = src.tags[lane];
        let count = if is_null_container(tag) {
            Some(0)
        } else if is_container(tag, IonType::List) {
            count_list_values(value_body(buf, src, lane)?)
        } else if is_container(tag, IonType::Struct) {
            count_struct_fields(value_body(buf, src, lane)?)
        } else {
            None
        };
        if let Some(count) = count {
            out.values[lane] = i64::try_from(count).unwrap_or(i64::MAX);
            kept |= bit(lane);
        }
    }
    Ok((out, kept))
}

/// A field located by [`scan_struct`], relative to the scanned bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldMatch {
    offset: usize,
    extent: Extent,
    tag: u8,
}

/// Scan `(symbol, value)` pairs in ascending order for `symbol`.
fn scan_struct(fields: &[u8], symbol: u32) -> Result<Option<FieldMatch>> {
    let mut pos = 0;
    while pos < fields.len() {
        let (label, rest) = ion::read_label(&fields[pos..])
            .ok_or_else(|| LaneError::corrupt(format!("unreadable struct field label at +{pos}")))?;
        if label > symbol {
            return Ok(None);
        }
        let value_pos = fields.len() - rest.len();
        let extent = ion::extent(rest).ok_or_else(|| {
            LaneError::corrupt(format!("field ${label} value has no decodable size"))
        })?;
        if extent.size > rest.len() {
            return Err(LaneError::corrupt(format!(
                "field ${label} value of {} bytes overruns struct body ({} left)",
                extent.size,
                rest.len()
            )));
        }
        if label == symbol {
            return Ok(Some(FieldMatch {
                offset: value_pos,
                extent,
                tag: rest[0],
            }));
        }
        pos = value_pos + extent.size;
    }
    Ok(None)
}

#[allow(clippy::cast_possible_truncation)]
fn store_match(out: &mut VReg, lane: usize, base: u32, found: FieldMatch) -> Result<()> {
    let offset = base
        .checked_add(to_u32(found.offset, "field offset")?)
        .ok_or_else(|| LaneError::corrupt("field offset overflows 32-bit addressing"))?;
    let size = to_u32(found.extent.size, "field size")?;
    // header is at most 1 + MAX_VARUINT_LEN bytes
    out.set(
        lane,
        ValueRef::new(offset, size),
        found.tag,
        found.extent.header as u8,
    );
    Ok(())
}

/// Look up `symbol` in each active struct body, scanning from its start.
///
/// Found lanes hold the field's value (label excluded) and set their bit.
/// Absent fields leave the lane zeroed and cleared.
///
/// # Errors
///
/// Any unreadable label or undecodable value in an active lane is a
/// corruption fault for the whole batch.
pub fn find_symbol(
    buf: &[u8],
    src: &BReg,
    symbol: u32,
    mask: LaneMask,
) -> Result<(VReg, LaneMask)> {
    let mut out = VReg::ZERO;
    let mut found = 0;
    for lane in active_lanes(mask) {
        let body = src.range(lane);
        let fields = resolve(buf, body)?;
        if let Some(m) = scan_struct(fields, symbol)? {
            store_match(&mut out, lane, body.offset, m)?;
            found |= bit(lane);
        }
    }
    Ok((out, found))
}

/// Continue a field lookup after a previous match.
///
/// Lanes with their `prior_mask` bit set start scanning at the end of the
/// prior match; the others scan from the body start. Starting at or past
/// the body end means not found. Correct when symbols looked up in one lane
/// are non-decreasing. Masked-out lanes keep the prior match.
///
/// # Errors
///
/// A resume position before the body start, or any unreadable label or
/// value, is a corruption fault.
pub fn find_symbol_resume(
    buf: &[u8],
    src: &BReg,
    prior: &VReg,
    prior_mask: LaneMask,
    symbol: u32,
    mask: LaneMask,
) -> Result<(VReg, LaneMask)> {
    let mut out = *prior;
    let mut found = 0;
    for lane in active_lanes(mask) {
        let body = src.range(lane);
        let start = if prior_mask & bit(lane) != 0 {
            prior.value_ref(lane).end()
        } else {
            u64::from(body.offset)
        };
        if start < u64::from(body.offset) {
            return Err(LaneError::corrupt(format!(
                "resume position {start} precedes struct body at {}",
                body.offset
            )));
        }
        out.clear_lane(lane);
        if start >= body.end() {
            continue;
        }
        let fields = resolve(buf, body)?;
        let skip = usize::try_from(start - u64::from(body.offset))
            .map_err(|_| LaneError::corrupt("resume position exceeds addressing"))?;
        let window = &fields[skip..];
        let window_base = to_u32(body.offset as usize + skip, "resume position")?;
        if let Some(m) = scan_struct(window, symbol)? {
            store_match(&mut out, lane, window_base, m)?;
            found |= bit(lane);
        }
    }
    Ok((out, found))
}

// ── Mask Algebra ────────────────────────────────────────────────────────────

/// Lanes of `mask` not set in `src`.
#[inline]
#[must_use]
pub const fn not_mask(src: LaneMask, mask: LaneMask) -> LaneMask {
    !src & mask
}

#[inline]
#[must_use]
pub const fn and_mask(a: LaneMask, b: LaneMask) -> LaneMask {
    a & b
}

#[inline]
#[must_use]
pub const fn or_mask(a: LaneMask, b: LaneMask) -> LaneMask {
    a | b
}

#[inline]
#[must_use]
pub const fn andn_mask(a: LaneMask, b: LaneMask) -> LaneMask {
    a & !b
}

#[inline]
#[must_use]
pub const fn xor_mask(a: LaneMask, b: LaneMask) -> LaneMask {
    a ^ b
}

#[cfg(test)]
mod tests {
    use lanes_types::{ALL_LANES, IonValue, LANES};

    use super::*;

    const POISON_OFFSET: u32 = 0xDEAD_BEEF;
    const POISON_SIZE: u32 = 0xFFFF_FFF0;
    const POISON_TAG: u8 = 0xEE;

    /// Scratch buffer holding `values` back to back, and a register with one
    /// value per lane. Lanes beyond `values` are poisoned.
    fn load(values: &[IonValue]) -> (Vec<u8>, VReg) {
        let mut buf = Vec::new();
        let mut reg = poisoned_vreg();
        for (lane, value) in values.iter().enumerate() {
            let offset = buf.len();
            value.encode_into(&mut buf);
            let extent = ion::extent(&buf[offset..]).expect("fixture encodes");
            #[allow(clippy::cast_possible_truncation)]
            reg.set(
                lane,
                ValueRef::new(offset as u32, extent.size as u32),
                buf[offset],
                extent.header as u8,
            );
        }
        (buf, reg)
    }

    fn poisoned_vreg() -> VReg {
        VReg {
            offsets: [POISON_OFFSET; LANES],
            sizes: [POISON_SIZE; LANES],
            tags: [POISON_TAG; LANES],
            header_sizes: [0xFF; LANES],
        }
    }

    fn poisoned_breg() -> BReg {
        BReg {
            offsets: [POISON_OFFSET; LANES],
            sizes: [POISON_SIZE; LANES],
        }
    }

    /// A register of struct bodies, one per lane, lanes beyond poisoned.
    fn load_bodies(structs: &[IonValue]) -> (Vec<u8>, BReg) {
        let (buf, values) = load(structs);
        let mask = (1_u16 << structs.len()) - 1;
        let (mut bodies, kept) = tuple(&buf, &values, mask).expect("structs");
        assert_eq!(kept, mask);
        for lane in structs.len()..LANES {
            bodies.offsets[lane] = POISON_OFFSET;
            bodies.sizes[lane] = POISON_SIZE;
        }
        (buf, bodies)
    }

    fn abc_struct() -> IonValue {
        IonValue::structure([
            (2, IonValue::from("A")),
            (5, IonValue::from("B")),
            (9, IonValue::from("C")),
        ])
    }

    // ── predicates ──

    #[test]
    fn sentinel_tags_classify_exactly() {
        let (_, reg) = load(&[
            IonValue::Null,
            IonValue::Bool(true),
            IonValue::Bool(false),
            IonValue::TypedNull(IonType::Bool),
            IonValue::Int(1),
        ]);
        let mask = 0b1_1111;
        assert_eq!(is_null(&reg, mask), 0b0_0001);
        assert_eq!(is_not_null(&reg, mask), 0b1_1110);
        assert_eq!(is_true(&reg, mask), 0b0_0010);
        assert_eq!(is_false(&reg, mask), 0b0_0100);
    }

    #[test]
    fn predicates_ignore_poisoned_lanes() {
        let reg = poisoned_vreg();
        assert_eq!(is_null(&reg, 0), 0);
        assert_eq!(is_not_null(&reg, 0), 0);
        let mut nulls = poisoned_vreg();
        nulls.tags = [NULL_TAG; LANES];
        assert_eq!(is_null(&nulls, 0b1010), 0b1010, "bits outside mask stay 0");
    }

    // ── values ──

    #[test]
    fn literal_ref_zeroes_masked_out_lanes() {
        let reg = literal_ref(100, 4, 3, 0x82, 1, 0b0101).expect("no overflow");
        assert_eq!(reg.value_ref(0), ValueRef::new(104, 3));
        assert_eq!(reg.value_ref(2), ValueRef::new(104, 3));
        assert_eq!(reg.tags[2], 0x82);
        assert_eq!(reg.value_ref(1), ValueRef::EMPTY);
        assert_eq!(reg.tags[1], 0);
        assert!(literal_ref(u32::MAX, 1, 1, 0x20, 1, ALL_LANES).is_err());
    }

    #[test]
    fn mov_v_blends() {
        let dst = poisoned_vreg();
        let (_, src) = load(&[IonValue::Int(1), IonValue::Int(2)]);
        let out = mov_v(&dst, &src, 0b10);
        assert_eq!(out.value_ref(1), src.value_ref(1));
        assert_eq!(out.tags[0], POISON_TAG, "masked-out lane retained");
    }

    #[test]
    fn broadcast_and_compare() {
        let reg = broadcast_i64(7, 0b0110);
        assert_eq!(reg.values[0], 0);
        assert_eq!(reg.values[1], 7);
        assert_eq!(compare_i64_imm(&reg, CompareOp::Eq, 7, ALL_LANES), 0b0110);
        assert_eq!(compare_i64_imm(&reg, CompareOp::Lt, 7, 0b0011), 0b0001);
        assert_eq!(compare_i64_imm(&reg, CompareOp::Ge, 0, 0b1000), 0b1000);
        assert_eq!(compare_i64_imm(&reg, CompareOp::Ne, 7, 0b0110), 0);
        assert_eq!(compare_i64_imm(&reg, CompareOp::Gt, 6, 0b0010), 0b0010);
        assert_eq!(compare_i64_imm(&reg, CompareOp::Le, -1, ALL_LANES), 0);
    }

    #[test]
    fn compare_op_codes() {
        for code in 0..6 {
            let op = CompareOp::from_u8(code).expect("known");
            assert_eq!(op.code(), code);
        }
        assert_eq!(CompareOp::from_u8(6), None);
        assert_eq!(CompareOp::Le.symbol(), "<=");
    }

    // ── type tests ──

    #[test]
    fn type_bits_per_lane() {
        let (_, reg) = load(&[
            IonValue::Null,
            IonValue::Int(-3),
            IonValue::from("s"),
            IonValue::Blob(vec![1]),
            abc_struct(),
        ]);
        let bits = type_bits(&reg, 0b1_1111);
        assert_eq!(bits.values[0], i64::from(TypeBits::NULL.bits()));
        assert_eq!(bits.values[1], i64::from(TypeBits::NUMBER.bits()));
        assert_eq!(bits.values[2], i64::from(TypeBits::STRING.bits()));
        assert_eq!(bits.values[3], 0);
        assert_eq!(bits.values[4], i64::from(TypeBits::STRUCT.bits()));
        assert_eq!(bits.values[5], 0, "masked-out lane zeroed");
    }

    #[test]
    fn check_tag_filters_and_zeroes_rejects() {
        let (_, reg) = load(&[
            IonValue::Int(5),
            IonValue::from("x"),
            IonValue::Blob(vec![]),
            IonValue::Null,
        ]);
        let (out, kept) = check_tag(&reg, TypeBits::NUMBER | TypeBits::STRING, 0b1111);
        assert_eq!(kept, 0b0011);
        assert_eq!(out.value_ref(1), reg.value_ref(1));
        assert_eq!(out.value_ref(2), ValueRef::EMPTY, "blob never passes");
        assert_eq!(out.tags[3], 0);
        let (_, none) = check_tag(&reg, TypeBits::all(), 0);
        assert_eq!(none, 0);
    }

    // ── object size ──

    #[test]
    fn object_size_counts_children() {
        let (buf, reg) = load(&[
            IonValue::list((0..5).map(IonValue::Int)),
            IonValue::list([]),
            abc_struct(),
            IonValue::structure([]),
            IonValue::from("not a container"),
            IonValue::TypedNull(IonType::List),
        ]);
        let (sizes, kept) = object_size(&buf, &reg, 0b11_1111).expect("well formed");
        assert_eq!(kept, 0b10_1111);
        assert_eq!(sizes.values[..4], [5, 0, 3, 0]);
        assert_eq!(sizes.values[4], 0);
        assert_eq!(sizes.values[5], 0);
    }

    #[test]
    fn object_size_typed_null_containers_are_empty() {
        let (buf, reg) = load(&[
            IonValue::TypedNull(IonType::List),
            IonValue::TypedNull(IonType::Struct),
            IonValue::TypedNull(IonType::String),
            IonValue::Null,
        ]);
        assert_eq!(reg.tags[..2], [0xBF, 0xDF]);
        let (sizes, kept) = object_size(&buf, &reg, 0b1111).expect("well formed");
        assert_eq!(kept, 0b0011);
        assert_eq!(sizes.values[..4], [0, 0, 0, 0]);
    }

    #[test]
    fn object_size_truncated_child_is_local() {
        // list claiming 3 body bytes: one int (2 bytes) then a string header
        // promising 5 bytes that are not there.
        let buf = vec![0xB3, 0x21, 0x01, 0x85];
        let mut reg = VReg::ZERO;
        reg.set(0, ValueRef::new(0, 4), 0xB3, 1);
        let (_, kept) = object_size(&buf, &reg, 0b1).expect("local failure only");
        assert_eq!(kept, 0);

        // struct whose body ends mid-label
        let buf = vec![0xD1, 0x81, 0x05];
        let mut reg = VReg::ZERO;
        reg.set(0, ValueRef::new(0, 3), 0xD1, 2);
        let (_, kept) = object_size(&buf, &reg, 0b1).expect("local failure only");
        assert_eq!(kept, 0);
    }

    #[test]
    fn object_size_out_of_bounds_is_fatal() {
        let buf = vec![0xB0];
        let mut reg = VReg::ZERO;
        reg.set(0, ValueRef::new(0, 9), 0xB8, 1);
        let err = object_size(&buf, &reg, 0b1).expect_err("reference past buffer");
        assert!(err.is_corruption());
    }

    #[test]
    fn object_size_ignores_poisoned_lanes() {
        let (buf, reg) = load(&[IonValue::list([IonValue::Null])]);
        let (sizes, kept) = object_size(&buf, &reg, 0b1).expect("poison untouched");
        assert_eq!((sizes.values[0], kept), (1, 0b1));
    }

    // ── tuple ──

    #[test]
    fn tuple_extracts_struct_bodies() {
        let (buf, reg) = load(&[abc_struct(), IonValue::Int(3), IonValue::TypedNull(IonType::Struct)]);
        let (bodies, kept) = tuple(&buf, &reg, 0b111).expect("in bounds");
        assert_eq!(kept, 0b001);
        let body = resolve(&buf, bodies.range(0)).expect("body resolves");
        assert_eq!(body[0], 0x82, "first label");
        assert_eq!(bodies.range(1), ValueRef::EMPTY);
    }

    // ── find symbol ──

    #[test]
    fn find_symbol_hits_and_misses() {
        let (buf, bodies) = load_bodies(&[abc_struct()]);
        let (out, found) = find_symbol(&buf, &bodies, 5, 0b1).expect("well formed");
        assert_eq!(found, 0b1);
        assert_eq!(resolve(&buf, out.value_ref(0)).expect("match"), IonValue::from("B").encode());
        assert_eq!(out.tags[0], 0x81);
        assert_eq!(out.header_sizes[0], 1);

        let (out, found) = find_symbol(&buf, &bodies, 7, 0b1).expect("well formed");
        assert_eq!(found, 0);
        assert_eq!(out, VReg::ZERO);

        let (_, found) = find_symbol(&buf, &bodies, 10, 0b1).expect("past last field");
        assert_eq!(found, 0);
    }

    #[test]
    fn find_symbol_poisoned_lanes_never_fault() {
        let (buf, bodies) = load_bodies(&[abc_struct(), abc_struct()]);
        let (out, found) = find_symbol(&buf, &bodies, 9, 0b11).expect("poison outside mask");
        assert_eq!(found, 0b11);
        for lane in 2..LANES {
            assert_eq!(out.value_ref(lane), ValueRef::EMPTY);
        }
    }

    #[test]
    fn find_symbol_corrupt_label_is_fatal() {
        // body holds a label without a terminating byte
        let buf = vec![0x05, 0x06];
        let mut bodies = BReg::ZERO;
        bodies.set(0, ValueRef::new(0, 2));
        let err = find_symbol(&buf, &bodies, 9, 0b1).expect_err("corrupt label");
        assert!(err.is_corruption());

        // label read but value overruns the body
        let buf = vec![0x81, 0x85, b'a'];
        bodies.set(0, ValueRef::new(0, 3));
        assert!(find_symbol(&buf, &bodies, 1, 0b1).is_err());
    }

    #[test]
    fn find_symbol_stops_before_larger_label() {
        // garbage after a larger label is never read
        let mut buf = IonValue::from("x").encode();
        buf.insert(0, 0x88);
        buf.extend_from_slice(&[0x05, 0x05]);
        let mut bodies = BReg::ZERO;
        #[allow(clippy::cast_possible_truncation)]
        bodies.set(0, ValueRef::new(0, buf.len() as u32));
        let (_, found) = find_symbol(&buf, &bodies, 3, 0b1).expect("stops at $8");
        assert_eq!(found, 0);
    }

    #[test]
    fn resume_matches_fresh_lookup() {
        let (buf, bodies) = load_bodies(&[abc_struct(), abc_struct()]);
        let (first, first_found) = find_symbol(&buf, &bodies, 2, 0b11).expect("fresh");
        let (resumed, found) =
            find_symbol_resume(&buf, &bodies, &first, first_found, 9, 0b11).expect("resume");
        let (fresh, fresh_found) = find_symbol(&buf, &bodies, 9, 0b11).expect("fresh");
        assert_eq!(found, fresh_found);
        for lane in 0..2 {
            assert_eq!(resumed.value_ref(lane), fresh.value_ref(lane));
        }
    }

    #[test]
    fn resume_without_prior_scans_from_start() {
        let (buf, bodies) = load_bodies(&[abc_struct()]);
        let (out, found) =
            find_symbol_resume(&buf, &bodies, &VReg::ZERO, 0, 5, 0b1).expect("resume");
        assert_eq!(found, 0b1);
        assert_eq!(resolve(&buf, out.value_ref(0)).expect("hit"), IonValue::from("B").encode());
    }

    #[test]
    fn resume_after_last_field_is_not_found() {
        let (buf, bodies) = load_bodies(&[abc_struct()]);
        let (last, last_found) = find_symbol(&buf, &bodies, 9, 0b1).expect("fresh");
        let (out, found) =
            find_symbol_resume(&buf, &bodies, &last, last_found, 12, 0b1).expect("at end");
        assert_eq!(found, 0);
        assert_eq!(out.value_ref(0), ValueRef::EMPTY, "active miss zeroed");
    }

    #[test]
    fn resume_keeps_prior_in_masked_out_lanes() {
        let (buf, bodies) = load_bodies(&[abc_struct(), abc_struct()]);
        let (first, first_found) = find_symbol(&buf, &bodies, 2, 0b11).expect("fresh");
        let (out, found) =
            find_symbol_resume(&buf, &bodies, &first, first_found, 5, 0b01).expect("resume");
        assert_eq!(found, 0b01);
        assert_eq!(out.value_ref(1), first.value_ref(1), "stale prior retained");
    }

    #[test]
    fn resume_before_body_is_fatal() {
        let (buf, bodies) = load_bodies(&[abc_struct()]);
        let mut prior = VReg::ZERO;
        prior.set(0, ValueRef::new(0, 0), 0x81, 1);
        let err = find_symbol_resume(&buf, &bodies, &prior, 0b1, 5, 0b1)
            .expect_err("position 0 precedes the body");
        assert!(err.is_corruption());
    }

    // ── masks ──

    #[test]
    fn mask_algebra() {
        assert_eq!(not_mask(0b0101, 0b0111), 0b0010);
        assert_eq!(and_mask(0b0110, 0b0011), 0b0010);
        assert_eq!(or_mask(0b0100, 0b0001), 0b0101);
        assert_eq!(andn_mask(0b0111, 0b0010), 0b0101);
        assert_eq!(xor_mask(0b0110, 0b0011), 0b0101);
    }
}
