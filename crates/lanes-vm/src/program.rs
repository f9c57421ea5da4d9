//! Validated instruction streams and the builder that emits them.

use std::collections::HashMap;
use std::fmt::Write as _;

use lanes_error::{LaneError, Result};
use lanes_types::encoding::{
    append_i64_le, append_u16_le, append_u32_le, read_i64_le, read_u8, read_u16_le, read_u32_le,
};
use lanes_types::{IonValue, TypeBits, ion};

use crate::opcode::{OPCODE_BYTES, Opcode, OperandKind};
use crate::ops::CompareOp;
use crate::registers::{INT_FILE, MASK_FILE, RANGE_FILE, RegisterCounts, VALUE_FILE};

// ── Decoding ────────────────────────────────────────────────────────────────

/// Decode the instruction at `pc`, returning its opcode and operand bytes.
pub(crate) fn decode_at(code: &[u8], pc: usize) -> Result<(Opcode, &[u8])> {
    let available = code.len().saturating_sub(pc);
    let raw = code
        .get(pc..)
        .and_then(read_u16_le)
        .ok_or(LaneError::TruncatedInstruction {
            pc,
            needed: OPCODE_BYTES,
            available,
        })?;
    let op = Opcode::from_u16(raw).ok_or(LaneError::InvalidOpcode { pc, opcode: raw })?;
    let start = pc + OPCODE_BYTES;
    let operands = code
        .get(start..start + op.operand_width())
        .ok_or(LaneError::TruncatedInstruction {
            pc,
            needed: op.instruction_len(),
            available,
        })?;
    Ok((op, operands))
}

fn check_operands(pc: usize, op: Opcode, operands: &[u8], counts: RegisterCounts) -> Result<()> {
    let mut offset = 0;
    for &kind in op.operands() {
        let field = &operands[offset..];
        let limit = match kind {
            OperandKind::V => Some((VALUE_FILE, counts.values)),
            OperandKind::B => Some((RANGE_FILE, counts.ranges)),
            OperandKind::I => Some((INT_FILE, counts.ints)),
            OperandKind::K => Some((MASK_FILE, counts.masks)),
            _ => None,
        };
        if let Some((file, count)) = limit {
            let index = read_u16_le(field).ok_or_else(|| LaneError::internal("operand width"))?;
            if index >= count {
                return Err(LaneError::InvalidRegister {
                    pc,
                    file,
                    index,
                    count,
                });
            }
        }
        offset += kind.width();
    }

    match op {
        Opcode::CmpI64Imm => {
            let code = operands.get(4).copied().unwrap_or(u8::MAX);
            if CompareOp::from_u8(code).is_none() {
                return Err(LaneError::InvalidOperand {
                    pc,
                    detail: "unknown comparison operator",
                });
            }
        }
        Opcode::CheckTag => {
            let bits = operands.get(6..).and_then(read_u16_le).unwrap_or(u16::MAX);
            let known = u8::try_from(bits)
                .ok()
                .and_then(TypeBits::from_bits)
                .is_some();
            if !known {
                return Err(LaneError::InvalidOperand {
                    pc,
                    detail: "type set has unknown bits",
                });
            }
        }
        _ => {}
    }
    Ok(())
}

// ── Program ─────────────────────────────────────────────────────────────────

/// A structurally valid instruction stream with its register counts and
/// literal pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    code: Vec<u8>,
    registers: RegisterCounts,
    literals: Vec<u8>,
}

impl Program {
    /// Validate `code` against `registers` before any execution.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::InvalidOpcode`], [`LaneError::TruncatedInstruction`],
    /// [`LaneError::InvalidRegister`] or [`LaneError::InvalidOperand`] for the
    /// first malformed instruction.
    pub fn new(code: Vec<u8>, registers: RegisterCounts, literals: Vec<u8>) -> Result<Self> {
        let mut pc = 0;
        while pc < code.len() {
            let (op, operands) = decode_at(&code, pc)?;
            check_operands(pc, op, operands, registers)?;
            pc += op.instruction_len();
        }
        Ok(Self {
            code,
            registers,
            literals,
        })
    }

    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[must_use]
    pub const fn registers(&self) -> RegisterCounts {
        self.registers
    }

    /// Literal payloads referenced by `lit.ref`, to be placed in the scratch
    /// buffer at the batch's literal base.
    #[must_use]
    pub fn literals(&self) -> &[u8] {
        &self.literals
    }

    /// `(pc, opcode)` for every instruction in order.
    #[must_use]
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            code: &self.code,
            pc: 0,
        }
    }

    /// Human-readable listing, one instruction per line.
    #[must_use]
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (pc, op) in self.instructions() {
            let start = pc + OPCODE_BYTES;
            let operands = self
                .code
                .get(start..start + op.operand_width())
                .unwrap_or_default();
            let _ = write!(out, "{pc:04}: {}", op.name());
            let mut offset = 0;
            for (n, &kind) in op.operands().iter().enumerate() {
                let text = operand_text(op, kind, operands.get(offset..).unwrap_or_default());
                let sep = if n == 0 { " " } else { ", " };
                let _ = write!(out, "{sep}{text}");
                offset += kind.width();
            }
            out.push('\n');
        }
        out
    }
}

fn operand_text(op: Opcode, kind: OperandKind, field: &[u8]) -> String {
    let text = match kind {
        OperandKind::V => read_u16_le(field).map(|i| format!("v{i}")),
        OperandKind::B => read_u16_le(field).map(|i| format!("b{i}")),
        OperandKind::I => read_u16_le(field).map(|i| format!("i{i}")),
        OperandKind::K => read_u16_le(field).map(|i| format!("k{i}")),
        OperandKind::Imm8 if op == Opcode::CmpI64Imm => read_u8(field)
            .and_then(CompareOp::from_u8)
            .map(|cmp| cmp.symbol().to_owned()),
        OperandKind::Imm8 => read_u8(field).map(|v| format!("0x{v:02x}")),
        OperandKind::Imm16 => read_u16_le(field).map(|v| format!("0x{v:04x}")),
        OperandKind::Imm32 if matches!(op, Opcode::FindSym | Opcode::FindSymResume) => {
            read_u32_le(field).map(|v| format!("${v}"))
        }
        OperandKind::Imm32 => read_u32_le(field).map(|v| v.to_string()),
        OperandKind::Imm64 => read_i64_le(field).map(|v| v.to_string()),
    };
    text.unwrap_or_else(|| "?".to_owned())
}

/// Iterator over `(pc, opcode)` pairs of a validated program.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    code: &'a [u8],
    pc: usize,
}

impl Iterator for Instructions<'_> {
    type Item = (usize, Opcode);

    fn next(&mut self) -> Option<Self::Item> {
        let raw = read_u16_le(self.code.get(self.pc..)?)?;
        let op = Opcode::from_u16(raw)?;
        let pc = self.pc;
        self.pc += op.instruction_len();
        Some((pc, op))
    }
}

// ── Register ids ────────────────────────────────────────────────────────────

macro_rules! register_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u16);

        impl $name {
            #[must_use]
            pub const fn new(index: u16) -> Self {
                Self(index)
            }

            #[must_use]
            pub const fn index(self) -> u16 {
                self.0
            }
        }
    };
}

register_id!(
    /// Index into the value-vector register file.
    VRegId
);
register_id!(
    /// Index into the byte-range register file.
    BRegId
);
register_id!(
    /// Index into the integer register file.
    IRegId
);
register_id!(
    /// Index into the mask register file.
    KRegId
);

// ── Builder ─────────────────────────────────────────────────────────────────

/// Location of an interned literal within the program's literal pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    pub offset: u32,
    pub size: u32,
    pub tag: u8,
    pub header_size: u8,
}

/// Emits instructions, allocates registers and interns literals.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    code: Vec<u8>,
    counts: RegisterCounts,
    literals: Vec<u8>,
    interned: HashMap<Vec<u8>, Literal>,
}

impl ProgramBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value_reg(&mut self) -> VRegId {
        let id = VRegId(self.counts.values);
        self.counts.values = self.counts.values.saturating_add(1);
        id
    }

    pub fn range_reg(&mut self) -> BRegId {
        let id = BRegId(self.counts.ranges);
        self.counts.ranges = self.counts.ranges.saturating_add(1);
        id
    }

    pub fn int_reg(&mut self) -> IRegId {
        let id = IRegId(self.counts.ints);
        self.counts.ints = self.counts.ints.saturating_add(1);
        id
    }

    pub fn mask_reg(&mut self) -> KRegId {
        let id = KRegId(self.counts.masks);
        self.counts.masks = self.counts.masks.saturating_add(1);
        id
    }

    /// Intern one encoded value into the literal pool.
    ///
    /// Identical payloads share a pool entry.
    ///
    /// # Errors
    ///
    /// Fails when `encoded` is not exactly one well-formed value, or the
    /// pool outgrows 32-bit addressing.
    pub fn literal(&mut self, encoded: &[u8]) -> Result<Literal> {
        if let Some(&lit) = self.interned.get(encoded) {
            return Ok(lit);
        }
        let extent = ion::extent(encoded)
            .filter(|e| e.size == encoded.len())
            .ok_or_else(|| LaneError::corrupt("literal is not exactly one encoded value"))?;
        let offset = u32::try_from(self.literals.len())
            .map_err(|_| LaneError::corrupt("literal pool exceeds 32-bit addressing"))?;
        let size = u32::try_from(encoded.len())
            .map_err(|_| LaneError::corrupt("literal exceeds 32-bit addressing"))?;
        let header_size = u8::try_from(extent.header)
            .map_err(|_| LaneError::corrupt("literal header too long"))?;
        let lit = Literal {
            offset,
            size,
            tag: encoded[0],
            header_size,
        };
        self.literals.extend_from_slice(encoded);
        self.interned.insert(encoded.to_vec(), lit);
        Ok(lit)
    }

    /// Encode and intern `value`.
    ///
    /// # Errors
    ///
    /// See [`ProgramBuilder::literal`].
    pub fn literal_value(&mut self, value: &IonValue) -> Result<Literal> {
        self.literal(&value.encode())
    }

    fn op(&mut self, op: Opcode) -> &mut Self {
        append_u16_le(&mut self.code, op.code());
        self
    }

    fn reg(&mut self, index: u16) -> &mut Self {
        append_u16_le(&mut self.code, index);
        self
    }

    fn imm8(&mut self, value: u8) -> &mut Self {
        self.code.push(value);
        self
    }

    fn imm16(&mut self, value: u16) -> &mut Self {
        append_u16_le(&mut self.code, value);
        self
    }

    fn imm32(&mut self, value: u32) -> &mut Self {
        append_u32_le(&mut self.code, value);
        self
    }

    fn imm64(&mut self, value: i64) -> &mut Self {
        append_i64_le(&mut self.code, value);
        self
    }

    pub fn ret(&mut self) -> &mut Self {
        self.op(Opcode::Ret)
    }

    /// Load row bodies into `rows` and the valid-lane mask into `valid`.
    pub fn init(&mut self, rows: BRegId, valid: KRegId) -> &mut Self {
        self.op(Opcode::Init).reg(rows.0).reg(valid.0)
    }

    pub fn lit_ref(&mut self, dst: VRegId, lit: Literal, mask: KRegId) -> &mut Self {
        self.op(Opcode::LitRef)
            .reg(dst.0)
            .imm32(lit.offset)
            .imm32(lit.size)
            .imm8(lit.tag)
            .imm8(lit.header_size)
            .reg(mask.0)
    }

    pub fn mov_v(&mut self, dst: VRegId, src: VRegId, mask: KRegId) -> &mut Self {
        self.op(Opcode::MovV).reg(dst.0).reg(src.0).reg(mask.0)
    }

    pub fn bcst_i64(&mut self, dst: IRegId, imm: i64, mask: KRegId) -> &mut Self {
        self.op(Opcode::BcstI64).reg(dst.0).imm64(imm).reg(mask.0)
    }

    fn predicate(&mut self, op: Opcode, dst: KRegId, src: VRegId, mask: KRegId) -> &mut Self {
        self.op(op).reg(dst.0).reg(src.0).reg(mask.0)
    }

    pub fn is_null(&mut self, dst: KRegId, src: VRegId, mask: KRegId) -> &mut Self {
        self.predicate(Opcode::IsNull, dst, src, mask)
    }

    pub fn is_not_null(&mut self, dst: KRegId, src: VRegId, mask: KRegId) -> &mut Self {
        self.predicate(Opcode::IsNotNull, dst, src, mask)
    }

    pub fn is_true(&mut self, dst: KRegId, src: VRegId, mask: KRegId) -> &mut Self {
        self.predicate(Opcode::IsTrue, dst, src, mask)
    }

    pub fn is_false(&mut self, dst: KRegId, src: VRegId, mask: KRegId) -> &mut Self {
        self.predicate(Opcode::IsFalse, dst, src, mask)
    }

    pub fn type_bits(&mut self, dst: IRegId, src: VRegId, mask: KRegId) -> &mut Self {
        self.op(Opcode::TypeBits).reg(dst.0).reg(src.0).reg(mask.0)
    }

    pub fn check_tag(
        &mut self,
        dst: VRegId,
        dst_mask: KRegId,
        src: VRegId,
        accept: TypeBits,
        mask: KRegId,
    ) -> &mut Self {
        self.op(Opcode::CheckTag)
            .reg(dst.0)
            .reg(dst_mask.0)
            .reg(src.0)
            .imm16(u16::from(accept.bits()))
            .reg(mask.0)
    }

    pub fn tuple(&mut self, dst: BRegId, dst_mask: KRegId, src: VRegId, mask: KRegId) -> &mut Self {
        self.op(Opcode::Tuple)
            .reg(dst.0)
            .reg(dst_mask.0)
            .reg(src.0)
            .reg(mask.0)
    }

    pub fn object_size(
        &mut self,
        dst: IRegId,
        dst_mask: KRegId,
        src: VRegId,
        mask: KRegId,
    ) -> &mut Self {
        self.op(Opcode::ObjectSize)
            .reg(dst.0)
            .reg(dst_mask.0)
            .reg(src.0)
            .reg(mask.0)
    }

    pub fn find_sym(
        &mut self,
        dst: VRegId,
        dst_mask: KRegId,
        src: BRegId,
        symbol: u32,
        mask: KRegId,
    ) -> &mut Self {
        self.op(Opcode::FindSym)
            .reg(dst.0)
            .reg(dst_mask.0)
            .reg(src.0)
            .imm32(symbol)
            .reg(mask.0)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn find_sym_resume(
        &mut self,
        dst: VRegId,
        dst_mask: KRegId,
        src: BRegId,
        prior: VRegId,
        prior_mask: KRegId,
        symbol: u32,
        mask: KRegId,
    ) -> &mut Self {
        self.op(Opcode::FindSymResume)
            .reg(dst.0)
            .reg(dst_mask.0)
            .reg(src.0)
            .reg(prior.0)
            .reg(prior_mask.0)
            .imm32(symbol)
            .reg(mask.0)
    }

    pub fn false_k(&mut self, dst: KRegId) -> &mut Self {
        self.op(Opcode::FalseK).reg(dst.0)
    }

    pub fn mov_k(&mut self, dst: KRegId, src: KRegId) -> &mut Self {
        self.op(Opcode::MovK).reg(dst.0).reg(src.0)
    }

    /// `dst = !src & mask`
    pub fn not_k(&mut self, dst: KRegId, src: KRegId, mask: KRegId) -> &mut Self {
        self.op(Opcode::NotK).reg(dst.0).reg(src.0).reg(mask.0)
    }

    fn binary_k(&mut self, op: Opcode, dst: KRegId, a: KRegId, b: KRegId) -> &mut Self {
        self.op(op).reg(dst.0).reg(a.0).reg(b.0)
    }

    pub fn and_k(&mut self, dst: KRegId, a: KRegId, b: KRegId) -> &mut Self {
        self.binary_k(Opcode::AndK, dst, a, b)
    }

    pub fn or_k(&mut self, dst: KRegId, a: KRegId, b: KRegId) -> &mut Self {
        self.binary_k(Opcode::OrK, dst, a, b)
    }

    /// `dst = a & !b`
    pub fn andn_k(&mut self, dst: KRegId, a: KRegId, b: KRegId) -> &mut Self {
        self.binary_k(Opcode::AndnK, dst, a, b)
    }

    pub fn xor_k(&mut self, dst: KRegId, a: KRegId, b: KRegId) -> &mut Self {
        self.binary_k(Opcode::XorK, dst, a, b)
    }

    pub fn cmp_i64_imm(
        &mut self,
        dst: KRegId,
        src: IRegId,
        op: CompareOp,
        imm: i64,
        mask: KRegId,
    ) -> &mut Self {
        self.op(Opcode::CmpI64Imm)
            .reg(dst.0)
            .reg(src.0)
            .imm8(op.code())
            .imm64(imm)
            .reg(mask.0)
    }

    /// Finish and validate the program.
    ///
    /// # Errors
    ///
    /// See [`Program::new`].
    pub fn build(self) -> Result<Program> {
        Program::new(self.code, self.counts, self.literals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(n: u16) -> RegisterCounts {
        RegisterCounts {
            values: n,
            ranges: n,
            ints: n,
            masks: n,
        }
    }

    #[test]
    fn builder_emits_contract_layout() {
        let mut b = ProgramBuilder::new();
        let rows = b.range_reg();
        let valid = b.mask_reg();
        let v = b.value_reg();
        let found = b.mask_reg();
        b.init(rows, valid)
            .find_sym(v, found, rows, 0x0102_0304, valid)
            .ret();
        let program = b.build().expect("valid");
        let code = program.code();
        assert_eq!(code.len(), 2 + 4 + 2 + 12 + 2);
        // findsym at pc 6: opcode, dst v0, dst k1, src b0, symbol, mask k0
        assert_eq!(&code[6..8], &[0x42, 0x00]);
        assert_eq!(&code[8..14], &[0, 0, 1, 0, 0, 0]);
        assert_eq!(&code[14..18], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&code[18..20], &[0, 0]);
        let ops: Vec<_> = program.instructions().collect();
        assert_eq!(
            ops,
            vec![(0, Opcode::Init), (6, Opcode::FindSym), (20, Opcode::Ret)]
        );
    }

    #[test]
    fn validation_rejects_unknown_opcode() {
        let err = Program::new(vec![0x01, 0x00, 0, 0, 0, 0, 0xAB, 0x00], counts(1), Vec::new())
            .expect_err("unknown opcode");
        assert!(matches!(
            err,
            LaneError::InvalidOpcode {
                pc: 6,
                opcode: 0x00AB
            }
        ));
    }

    #[test]
    fn validation_rejects_truncated_stream() {
        // findsym needs 12 operand bytes; give it 5
        let err = Program::new(vec![0x42, 0x00, 0, 0, 0, 0, 0], counts(1), Vec::new())
            .expect_err("truncated");
        assert!(matches!(
            err,
            LaneError::TruncatedInstruction {
                pc: 0,
                needed: 14,
                available: 7
            }
        ));
        let err = Program::new(vec![0x00], counts(1), Vec::new()).expect_err("half an opcode");
        assert!(matches!(
            err,
            LaneError::TruncatedInstruction { needed: 2, .. }
        ));
    }

    #[test]
    fn validation_rejects_out_of_range_register() {
        let mut b = ProgramBuilder::new();
        let k = b.mask_reg();
        b.false_k(KRegId::new(3)).mov_k(k, k);
        let err = b.build().expect_err("k3 not allocated");
        assert!(matches!(
            err,
            LaneError::InvalidRegister {
                pc: 0,
                file: "mask",
                index: 3,
                count: 1
            }
        ));
    }

    #[test]
    fn validation_rejects_bad_immediates() {
        let mut code = Vec::new();
        append_u16_le(&mut code, Opcode::CmpI64Imm.code());
        code.extend_from_slice(&[0, 0, 0, 0, 9]);
        append_i64_le(&mut code, 1);
        code.extend_from_slice(&[0, 0]);
        let err = Program::new(code, counts(1), Vec::new()).expect_err("op 9");
        assert!(matches!(err, LaneError::InvalidOperand { pc: 0, .. }));

        let mut code = Vec::new();
        append_u16_le(&mut code, Opcode::CheckTag.code());
        code.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0x80, 0x00, 0, 0]);
        assert!(Program::new(code, counts(1), Vec::new()).is_err());
    }

    #[test]
    fn literals_are_interned() {
        let mut b = ProgramBuilder::new();
        let a = b.literal_value(&IonValue::from("abc")).expect("lit");
        let n = b.literal_value(&IonValue::Null).expect("lit");
        let again = b.literal_value(&IonValue::from("abc")).expect("lit");
        assert_eq!(a, again);
        assert_eq!(
            a,
            Literal {
                offset: 0,
                size: 4,
                tag: 0x83,
                header_size: 1
            }
        );
        assert_eq!(n.offset, 4);
        let program = b.build().expect("empty program");
        assert_eq!(program.literals(), &[0x83, b'a', b'b', b'c', 0x0F]);
        assert!(ProgramBuilder::new().literal(&[0x21]).is_err(), "truncated int");
        assert!(ProgramBuilder::new().literal(&[0x0F, 0x0F]).is_err(), "two values");
    }

    #[test]
    fn disassembly_lists_operands() {
        let mut b = ProgramBuilder::new();
        let rows = b.range_reg();
        let valid = b.mask_reg();
        let v = b.value_reg();
        let found = b.mask_reg();
        let size = b.int_reg();
        let big = b.mask_reg();
        b.init(rows, valid)
            .find_sym(v, found, rows, 7, valid)
            .object_size(size, big, v, found)
            .cmp_i64_imm(big, size, CompareOp::Gt, 2, big)
            .check_tag(v, found, v, TypeBits::LIST, found)
            .ret();
        let text = b.build().expect("valid").disassemble();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "0000: init b0, k0");
        assert_eq!(lines[1], "0006: findsym v0, k1, b0, $7, k0");
        assert_eq!(lines[2], "0020: objectsize i0, k2, v0, k1");
        assert_eq!(lines[3], "0030: cmp.i64.imm k2, i0, >, 2, k2");
        assert_eq!(lines[4], "0047: checktag v0, k1, v0, 0x0020, k1");
        assert_eq!(lines[5], "0059: ret");
    }
}
