//! Opcode catalogue and operand layout.
//!
//! An instruction is a 2-byte little-endian opcode followed by a fixed
//! operand block. Register operands are `u16` indices into the register file
//! named by their [`OperandKind`]; immediates are little-endian. Operand
//! offsets are relative to the first operand byte, and the next instruction
//! starts at `operand_start + operand_width()`.

use std::fmt;

/// Width of the opcode field.
pub const OPCODE_BYTES: usize = 2;

/// Kind and width of one operand field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// Value-vector register index.
    V,
    /// Byte-range register index.
    B,
    /// Integer register index.
    I,
    /// Mask register index.
    K,
    Imm8,
    Imm16,
    Imm32,
    Imm64,
}

impl OperandKind {
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Imm8 => 1,
            Self::V | Self::B | Self::I | Self::K | Self::Imm16 => 2,
            Self::Imm32 => 4,
            Self::Imm64 => 8,
        }
    }

}

/// Every opcode the interpreter understands.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // control
    Ret = 0x0000,
    Init = 0x0001,
    // values
    LitRef = 0x0010,
    MovV = 0x0011,
    BcstI64 = 0x0012,
    // null / boolean predicates
    IsNull = 0x0020,
    IsNotNull = 0x0021,
    IsTrue = 0x0022,
    IsFalse = 0x0023,
    // type tests
    TypeBits = 0x0030,
    CheckTag = 0x0031,
    // structural navigation
    Tuple = 0x0040,
    ObjectSize = 0x0041,
    FindSym = 0x0042,
    FindSymResume = 0x0043,
    // mask algebra
    FalseK = 0x0050,
    MovK = 0x0051,
    NotK = 0x0052,
    AndK = 0x0053,
    OrK = 0x0054,
    AndnK = 0x0055,
    XorK = 0x0056,
    // integer comparison
    CmpI64Imm = 0x0060,
}

use OperandKind::{B, I, Imm8, Imm16, Imm32, Imm64, K, V};

impl Opcode {
    pub const ALL: [Self; 23] = [
        Self::Ret,
        Self::Init,
        Self::LitRef,
        Self::MovV,
        Self::BcstI64,
        Self::IsNull,
        Self::IsNotNull,
        Self::IsTrue,
        Self::IsFalse,
        Self::TypeBits,
        Self::CheckTag,
        Self::Tuple,
        Self::ObjectSize,
        Self::FindSym,
        Self::FindSymResume,
        Self::FalseK,
        Self::MovK,
        Self::NotK,
        Self::AndK,
        Self::OrK,
        Self::AndnK,
        Self::XorK,
        Self::CmpI64Imm,
    ];

    /// Decode a raw opcode.
    #[must_use]
    pub const fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            0x0000 => Self::Ret,
            0x0001 => Self::Init,
            0x0010 => Self::LitRef,
            0x0011 => Self::MovV,
            0x0012 => Self::BcstI64,
            0x0020 => Self::IsNull,
            0x0021 => Self::IsNotNull,
            0x0022 => Self::IsTrue,
            0x0023 => Self::IsFalse,
            0x0030 => Self::TypeBits,
            0x0031 => Self::CheckTag,
            0x0040 => Self::Tuple,
            0x0041 => Self::ObjectSize,
            0x0042 => Self::FindSym,
            0x0043 => Self::FindSymResume,
            0x0050 => Self::FalseK,
            0x0051 => Self::MovK,
            0x0052 => Self::NotK,
            0x0053 => Self::AndK,
            0x0054 => Self::OrK,
            0x0055 => Self::AndnK,
            0x0056 => Self::XorK,
            0x0060 => Self::CmpI64Imm,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Mnemonic used in disassembly and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ret => "ret",
            Self::Init => "init",
            Self::LitRef => "lit.ref",
            Self::MovV => "mov.v",
            Self::BcstI64 => "bcst.i64",
            Self::IsNull => "isnull.v",
            Self::IsNotNull => "isnotnull.v",
            Self::IsTrue => "istrue.v",
            Self::IsFalse => "isfalse.v",
            Self::TypeBits => "typebits",
            Self::CheckTag => "checktag",
            Self::Tuple => "tuple",
            Self::ObjectSize => "objectsize",
            Self::FindSym => "findsym",
            Self::FindSymResume => "findsym.resume",
            Self::FalseK => "false.k",
            Self::MovK => "mov.k",
            Self::NotK => "not.k",
            Self::AndK => "and.k",
            Self::OrK => "or.k",
            Self::AndnK => "andn.k",
            Self::XorK => "xor.k",
            Self::CmpI64Imm => "cmp.i64.imm",
        }
    }

    /// Operand fields in encoding order.
    #[must_use]
    pub const fn operands(self) -> &'static [OperandKind] {
        match self {
            Self::Ret => &[],
            Self::Init => &[B, K],
            Self::LitRef => &[V, Imm32, Imm32, Imm8, Imm8, K],
            Self::MovV => &[V, V, K],
            Self::BcstI64 => &[I, Imm64, K],
            Self::IsNull | Self::IsNotNull | Self::IsTrue | Self::IsFalse => &[K, V, K],
            Self::TypeBits => &[I, V, K],
            Self::CheckTag => &[V, K, V, Imm16, K],
            Self::Tuple => &[B, K, V, K],
            Self::ObjectSize => &[I, K, V, K],
            Self::FindSym => &[V, K, B, Imm32, K],
            Self::FindSymResume => &[V, K, B, V, K, Imm32, K],
            Self::FalseK => &[K],
            Self::MovK => &[K, K],
            Self::NotK | Self::AndK | Self::OrK | Self::AndnK | Self::XorK => &[K, K, K],
            Self::CmpI64Imm => &[K, I, Imm8, Imm64, K],
        }
    }

    /// Total operand bytes following the opcode.
    #[must_use]
    pub const fn operand_width(self) -> usize {
        let operands = self.operands();
        let mut width = 0;
        let mut i = 0;
        while i < operands.len() {
            width += operands[i].width();
            i += 1;
        }
        width
    }

    /// Opcode plus operands.
    #[must_use]
    pub const fn instruction_len(self) -> usize {
        OPCODE_BYTES + self.operand_width()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
