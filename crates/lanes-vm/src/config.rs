//! Interpreter and scheduler configuration.

use std::thread;

use lanes_error::{LaneError, Result};
use lanes_types::limits::{DEFAULT_MAX_PROGRAM_BYTES, DEFAULT_MAX_REGISTERS};

/// Resource limits and diagnostics for one interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InterpConfig {
    /// Largest accepted instruction stream, in bytes.
    pub max_program_bytes: usize,
    /// Largest accepted register count, per register file.
    pub max_registers: u16,
    /// Emit a `trace!` event for every dispatched instruction.
    pub trace_dispatch: bool,
}

impl Default for InterpConfig {
    fn default() -> Self {
        Self {
            max_program_bytes: DEFAULT_MAX_PROGRAM_BYTES,
            max_registers: DEFAULT_MAX_REGISTERS,
            trace_dispatch: false,
        }
    }
}

/// Batch scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub worker_threads: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map_or(2, std::num::NonZeroUsize::get)
            .saturating_sub(1)
            .max(1);
        Self {
            worker_threads: workers,
        }
    }
}

impl SchedulerConfig {
    /// Reject configurations the scheduler cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::InvalidConfig`] when `worker_threads` is zero.
    pub const fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(LaneError::InvalidConfig(
                "worker_threads must be greater than zero",
            ));
        }
        Ok(())
    }
}
