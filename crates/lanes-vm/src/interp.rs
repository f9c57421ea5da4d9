//! The dispatch loop.
//!
//! Each step decodes one opcode, reads its operands at fixed offsets, runs
//! the matching function from [`crate::ops`] and returns where to continue.
//! A fault stops the loop immediately; register contents written before the
//! fault are not meaningful.

use lanes_error::{LaneError, Result};
use lanes_types::encoding::{read_i64_le, read_u8, read_u16_le, read_u32_le};
use lanes_types::{LaneMask, TypeBits, active_lanes};

use crate::batch::Batch;
use crate::config::InterpConfig;
use crate::metrics;
use crate::opcode::{OPCODE_BYTES, Opcode};
use crate::ops::{self, CompareOp};
use crate::program::{BRegId, IRegId, KRegId, Program, VRegId, decode_at};
use crate::registers::{BReg, IReg, KReg, Registers, VReg};

/// Outcome of one dispatch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Continue at this program counter.
    Continue(usize),
    /// `ret` reached.
    Halt,
}

/// Statistics for one completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Instructions dispatched, `ret` included.
    pub instructions: u64,
    /// Valid lanes the batch started with.
    pub initial_lanes: u32,
}

/// Operand bytes of one instruction, read at explicit offsets.
#[derive(Debug, Clone, Copy)]
struct Operands<'a> {
    pc: usize,
    bytes: &'a [u8],
}

impl Operands<'_> {
    fn truncated(&self, end: usize) -> LaneError {
        LaneError::TruncatedInstruction {
            pc: self.pc,
            needed: OPCODE_BYTES + end,
            available: OPCODE_BYTES + self.bytes.len(),
        }
    }

    fn reg(&self, at: usize) -> Result<u16> {
        self.bytes
            .get(at..)
            .and_then(read_u16_le)
            .ok_or_else(|| self.truncated(at + 2))
    }

    fn imm8(&self, at: usize) -> Result<u8> {
        self.bytes
            .get(at..)
            .and_then(read_u8)
            .ok_or_else(|| self.truncated(at + 1))
    }

    fn imm16(&self, at: usize) -> Result<u16> {
        self.reg(at)
    }

    fn imm32(&self, at: usize) -> Result<u32> {
        self.bytes
            .get(at..)
            .and_then(read_u32_le)
            .ok_or_else(|| self.truncated(at + 4))
    }

    fn imm64(&self, at: usize) -> Result<i64> {
        self.bytes
            .get(at..)
            .and_then(read_i64_le)
            .ok_or_else(|| self.truncated(at + 8))
    }

    fn compare_op(&self, at: usize) -> Result<CompareOp> {
        CompareOp::from_u8(self.imm8(at)?).ok_or(LaneError::InvalidOperand {
            pc: self.pc,
            detail: "unknown comparison operator",
        })
    }

    fn type_set(&self, at: usize) -> Result<TypeBits> {
        u8::try_from(self.imm16(at)?)
            .ok()
            .and_then(TypeBits::from_bits)
            .ok_or(LaneError::InvalidOperand {
                pc: self.pc,
                detail: "type set has unknown bits",
            })
    }
}

/// Executes one [`Program`] over batches, one batch at a time.
#[derive(Debug)]
pub struct Interpreter<'p> {
    program: &'p Program,
    config: InterpConfig,
    regs: Registers,
}

impl<'p> Interpreter<'p> {
    /// Allocate registers for `program`.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::ProgramTooLarge`] or
    /// [`LaneError::TooManyRegisters`] when the program exceeds `config`.
    pub fn new(program: &'p Program, config: &InterpConfig) -> Result<Self> {
        let len = program.code().len();
        if len > config.max_program_bytes {
            return Err(LaneError::ProgramTooLarge {
                len,
                max: config.max_program_bytes,
            });
        }
        let (file, count) = program.registers().largest();
        if count > config.max_registers {
            return Err(LaneError::TooManyRegisters {
                file,
                count,
                max: config.max_registers,
            });
        }
        Ok(Self {
            program,
            config: *config,
            regs: Registers::new(program.registers()),
        })
    }

    /// Run the program over `batch`.
    ///
    /// Registers are zeroed first. Dispatch stops at `ret`, at the end of
    /// the code, or at the first fault.
    ///
    /// # Errors
    ///
    /// Returns the fault that stopped dispatch. Corruption faults
    /// ([`LaneError::is_corruption`]) mean the batch's scratch data is
    /// malformed.
    pub fn run(&mut self, batch: &Batch<'_>) -> Result<RunSummary> {
        let program = self.program;
        let code = program.code();
        let initial_lanes = batch.valid().count_ones();
        let _span = tracing::debug_span!(
            "lanes_batch",
            program_bytes = code.len(),
            initial_lanes,
        )
        .entered();

        metrics::record_batch_started(initial_lanes);
        self.regs.reset();

        let mut pc = 0;
        let mut executed: u64 = 0;
        while pc < code.len() {
            executed += 1;
            match self.step(batch, pc) {
                Ok(Step::Continue(next)) => pc = next,
                Ok(Step::Halt) => break,
                Err(err) => {
                    metrics::record_fault(executed);
                    tracing::warn!(
                        pc,
                        opcode = opcode_name_at(code, pc),
                        error = %err,
                        "batch faulted"
                    );
                    return Err(err);
                }
            }
        }

        metrics::record_batch_finished(executed);
        tracing::debug!(instructions = executed, initial_lanes, "batch complete");
        Ok(RunSummary {
            instructions: executed,
            initial_lanes,
        })
    }

    /// Decode and execute the instruction at `pc`.
    ///
    /// # Errors
    ///
    /// Returns any program error or corruption fault raised by the handler.
    pub fn step(&mut self, batch: &Batch<'_>, pc: usize) -> Result<Step> {
        let program = self.program;
        let (op, bytes) = decode_at(program.code(), pc)?;
        if self.config.trace_dispatch {
            tracing::trace!(pc, opcode = op.name(), "dispatch");
        }
        self.execute(batch, op, Operands { pc, bytes })?;
        Ok(match op {
            Opcode::Ret => Step::Halt,
            _ => Step::Continue(pc + op.instruction_len()),
        })
    }

    #[allow(clippy::too_many_lines)]
    fn execute(&mut self, batch: &Batch<'_>, op: Opcode, o: Operands<'_>) -> Result<()> {
        let pc = o.pc;
        let buf = batch.scratch();
        let regs = &mut self.regs;
        let mask_at = |regs: &Registers, at: usize| -> Result<LaneMask> {
            Ok(regs.k.read(pc, o.reg(at)?)?.mask)
        };

        match op {
            Opcode::Ret => {}
            Opcode::Init => {
                let mut rows = BReg::ZERO;
                for lane in active_lanes(batch.valid()) {
                    rows.set(lane, batch.rows()[lane]);
                }
                regs.b.write(pc, o.reg(0)?, rows)?;
                regs.k.write(pc, o.reg(2)?, KReg::new(batch.valid()))?;
            }
            Opcode::LitRef => {
                let mask = mask_at(regs, 12)?;
                let out = ops::literal_ref(
                    batch.literal_base(),
                    o.imm32(2)?,
                    o.imm32(6)?,
                    o.imm8(10)?,
                    o.imm8(11)?,
                    mask,
                )?;
                regs.v.write(pc, o.reg(0)?, out)?;
            }
            Opcode::MovV => {
                let dst = o.reg(0)?;
                let prev = regs.v.read(pc, dst)?;
                let src = regs.v.read(pc, o.reg(2)?)?;
                let mask = mask_at(regs, 4)?;
                regs.v.write(pc, dst, ops::mov_v(&prev, &src, mask))?;
            }
            Opcode::BcstI64 => {
                let mask = mask_at(regs, 10)?;
                regs.i
                    .write(pc, o.reg(0)?, ops::broadcast_i64(o.imm64(2)?, mask))?;
            }
            Opcode::IsNull | Opcode::IsNotNull | Opcode::IsTrue | Opcode::IsFalse => {
                let src = regs.v.read(pc, o.reg(2)?)?;
                let mask = mask_at(regs, 4)?;
                let out = match op {
                    Opcode::IsNull => ops::is_null(&src, mask),
                    Opcode::IsNotNull => ops::is_not_null(&src, mask),
                    Opcode::IsTrue => ops::is_true(&src, mask),
                    _ => ops::is_false(&src, mask),
                };
                regs.k.write(pc, o.reg(0)?, KReg::new(out))?;
            }
            Opcode::TypeBits => {
                let src = regs.v.read(pc, o.reg(2)?)?;
                let mask = mask_at(regs, 4)?;
                regs.i.write(pc, o.reg(0)?, ops::type_bits(&src, mask))?;
            }
            Opcode::CheckTag => {
                let src = regs.v.read(pc, o.reg(4)?)?;
                let mask = mask_at(regs, 8)?;
                let (out, kept) = ops::check_tag(&src, o.type_set(6)?, mask);
                regs.v.write(pc, o.reg(0)?, out)?;
                regs.k.write(pc, o.reg(2)?, KReg::new(kept))?;
            }
            Opcode::Tuple => {
                let src = regs.v.read(pc, o.reg(4)?)?;
                let mask = mask_at(regs, 6)?;
                let (out, kept) = ops::tuple(buf, &src, mask)?;
                regs.b.write(pc, o.reg(0)?, out)?;
                regs.k.write(pc, o.reg(2)?, KReg::new(kept))?;
            }
            Opcode::ObjectSize => {
                let src = regs.v.read(pc, o.reg(4)?)?;
                let mask = mask_at(regs, 6)?;
                let (out, kept) = ops::object_size(buf, &src, mask)?;
                regs.i.write(pc, o.reg(0)?, out)?;
                regs.k.write(pc, o.reg(2)?, KReg::new(kept))?;
            }
            Opcode::FindSym => {
                let src = regs.b.read(pc, o.reg(4)?)?;
                let mask = mask_at(regs, 10)?;
                let (out, found) = ops::find_symbol(buf, &src, o.imm32(6)?, mask)?;
                regs.v.write(pc, o.reg(0)?, out)?;
                regs.k.write(pc, o.reg(2)?, KReg::new(found))?;
            }
            Opcode::FindSymResume => {
                let src = regs.b.read(pc, o.reg(4)?)?;
                let prior = regs.v.read(pc, o.reg(6)?)?;
                let prior_mask = mask_at(regs, 8)?;
                let mask = mask_at(regs, 14)?;
                let (out, found) =
                    ops::find_symbol_resume(buf, &src, &prior, prior_mask, o.imm32(10)?, mask)?;
                regs.v.write(pc, o.reg(0)?, out)?;
                regs.k.write(pc, o.reg(2)?, KReg::new(found))?;
            }
            Opcode::FalseK => regs.k.write(pc, o.reg(0)?, KReg::new(0))?,
            Opcode::MovK => {
                let src = regs.k.read(pc, o.reg(2)?)?;
                regs.k.write(pc, o.reg(0)?, src)?;
            }
            Opcode::NotK | Opcode::AndK | Opcode::OrK | Opcode::AndnK | Opcode::XorK => {
                let a = mask_at(regs, 2)?;
                let b = mask_at(regs, 4)?;
                let out = match op {
                    Opcode::NotK => ops::not_mask(a, b),
                    Opcode::AndK => ops::and_mask(a, b),
                    Opcode::OrK => ops::or_mask(a, b),
                    Opcode::AndnK => ops::andn_mask(a, b),
                    _ => ops::xor_mask(a, b),
                };
                regs.k.write(pc, o.reg(0)?, KReg::new(out))?;
            }
            Opcode::CmpI64Imm => {
                let src = regs.i.read(pc, o.reg(2)?)?;
                let mask = mask_at(regs, 13)?;
                let out = ops::compare_i64_imm(&src, o.compare_op(4)?, o.imm64(5)?, mask);
                regs.k.write(pc, o.reg(0)?, KReg::new(out))?;
            }
        }
        Ok(())
    }

    // ── Outputs ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn value(&self, id: VRegId) -> Option<VReg> {
        self.regs.v.get(id.index())
    }

    #[must_use]
    pub fn range(&self, id: BRegId) -> Option<BReg> {
        self.regs.b.get(id.index())
    }

    #[must_use]
    pub fn int(&self, id: IRegId) -> Option<IReg> {
        self.regs.i.get(id.index())
    }

    #[must_use]
    pub fn mask(&self, id: KRegId) -> Option<LaneMask> {
        self.regs.k.get(id.index()).map(|k| k.mask)
    }
}

fn opcode_name_at(code: &[u8], pc: usize) -> &'static str {
    code.get(pc..)
        .and_then(read_u16_le)
        .and_then(Opcode::from_u16)
        .map_or("?", Opcode::name)
}
