use thiserror::Error;

/// Primary error type for lanes operations.
///
/// Faults fall into a small number of classes: buffer corruption (the scratch
/// buffer or a value reference is malformed), program errors (the instruction
/// stream is malformed), resource limits, and caller misuse. Per-lane
/// inapplicability is never an error; it is expressed by clearing mask bits.
#[derive(Error, Debug)]
pub enum LaneError {
    // === Buffer Corruption ===
    /// A TLV value or struct label could not be decoded.
    #[error("scratch buffer is malformed: {detail}")]
    Corrupt { detail: String },

    /// A value reference addresses bytes outside the scratch buffer.
    #[error("value reference {offset}+{size} exceeds scratch buffer of {len} bytes")]
    OutOfBounds { offset: u64, size: u64, len: usize },

    // === Program Errors ===
    /// Unknown opcode in the instruction stream.
    #[error("invalid opcode 0x{opcode:04x} at pc {pc}")]
    InvalidOpcode { pc: usize, opcode: u16 },

    /// An instruction's operands run past the end of the stream.
    #[error("truncated instruction at pc {pc}: need {needed} bytes, {available} available")]
    TruncatedInstruction {
        pc: usize,
        needed: usize,
        available: usize,
    },

    /// A register operand does not name an allocated register.
    #[error("{file} register {index} out of range at pc {pc} (file holds {count})")]
    InvalidRegister {
        pc: usize,
        file: &'static str,
        index: u16,
        count: u16,
    },

    /// An immediate operand holds a value the opcode does not accept.
    #[error("invalid operand at pc {pc}: {detail}")]
    InvalidOperand { pc: usize, detail: &'static str },

    // === Limit Errors ===
    /// Program exceeds the configured code size.
    #[error("program too large: {len} bytes (max {max})")]
    ProgramTooLarge { len: usize, max: usize },

    /// Program allocates more registers than configured.
    #[error("too many {file} registers: {count} (max {max})")]
    TooManyRegisters {
        file: &'static str,
        count: u16,
        max: u16,
    },

    /// A batch was assembled with more rows than there are lanes.
    #[error("batch holds {rows} rows but only {lanes} lanes are available")]
    BatchTooLarge { rows: usize, lanes: usize },

    // === Configuration ===
    /// Configuration value rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    // === Scheduler ===
    /// A scheduler worker thread panicked.
    #[error("worker thread panicked while executing a batch")]
    WorkerPanicked,

    // === Internal Errors ===
    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error classes, stable for callers that map faults onto task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Internal logic error.
    Internal = 2,
    /// Work was abandoned because a worker died.
    Abort = 4,
    /// Input block is malformed.
    Corrupt = 11,
    /// Library used incorrectly (malformed program or batch).
    Misuse = 21,
    /// A configured limit was exceeded.
    Range = 25,
    /// Configuration rejected.
    Config = 26,
}

impl LaneError {
    /// Map this error to its coarse class.
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Corrupt { .. } | Self::OutOfBounds { .. } => ErrorCode::Corrupt,
            Self::InvalidOpcode { .. }
            | Self::TruncatedInstruction { .. }
            | Self::InvalidRegister { .. }
            | Self::InvalidOperand { .. }
            | Self::BatchTooLarge { .. } => ErrorCode::Misuse,
            Self::ProgramTooLarge { .. } | Self::TooManyRegisters { .. } => ErrorCode::Range,
            Self::InvalidConfig(_) => ErrorCode::Config,
            Self::WorkerPanicked => ErrorCode::Abort,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Whether this fault means the input block itself is malformed.
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupt { .. } | Self::OutOfBounds { .. })
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Corrupt { .. } | Self::OutOfBounds { .. } => {
                Some("Re-encode the input block; partial results for this batch are invalid")
            }
            Self::InvalidOpcode { .. }
            | Self::TruncatedInstruction { .. }
            | Self::InvalidRegister { .. }
            | Self::InvalidOperand { .. } => Some("Recompile the query plan"),
            Self::ProgramTooLarge { .. } | Self::TooManyRegisters { .. } => {
                Some("Raise the interpreter limits or split the expression")
            }
            Self::BatchTooLarge { .. } => Some("Split rows into chunks of at most LANES rows"),
            _ => None,
        }
    }

    /// Process exit status for callers that surface faults to a shell.
    pub const fn exit_code(&self) -> i32 {
        self.error_code() as i32
    }

    /// Create a corruption fault.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::Corrupt {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `LaneError`.
pub type Result<T> = std::result::Result<T, LaneError>;
