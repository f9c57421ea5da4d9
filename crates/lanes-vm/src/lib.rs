//! Masked 16-lane bytecode interpreter over TLV-encoded records.
//!
//! A [`Program`] is a flat little-endian instruction stream built with
//! [`ProgramBuilder`]. An [`Interpreter`] runs it over one [`Batch`] of up to
//! sixteen rows at a time; every opcode takes a predicate mask and leaves
//! inactive lanes alone. [`BatchScheduler`] fans a program out over many
//! batches on a work-stealing thread pool.

pub mod batch;
pub mod config;
pub mod interp;
pub mod metrics;
pub mod opcode;
pub mod ops;
pub mod program;
pub mod registers;
pub mod scheduler;

mod prop_tests;

pub use batch::{Batch, Scratch, ScratchBuilder};
pub use config::{InterpConfig, SchedulerConfig};
pub use interp::{Interpreter, RunSummary, Step};
pub use metrics::{VmMetricsSnapshot, vm_metrics_snapshot};
pub use opcode::{Opcode, OperandKind};
pub use ops::CompareOp;
pub use program::{BRegId, IRegId, KRegId, Literal, Program, ProgramBuilder, VRegId};
pub use registers::{BReg, IReg, KReg, RegisterCounts, VReg};
pub use scheduler::BatchScheduler;
