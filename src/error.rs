//! Error type shared by model construction, compilation and execution
//!
//! Every error here is a construction-time fault: the call that raises it
//! is aborted and nothing usable is produced. There is no recovery mode.

/// Errors raised while building, compiling, loading or running a network
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A boolean operator received something that is neither a slot nor an expression
    #[error("unknown operand type in {context}: {found}")]
    TypeMismatch { context: String, found: String },

    /// A slot received a second definition
    #[error("node '{name}' is already defined")]
    AlreadyDefined { name: String },

    /// A slot has neither an input marking nor a definition
    #[error("node '{name}' is not defined")]
    Undefined { name: String },

    /// An assignment target received a value that is neither an expression nor a mapping
    #[error("it is forbidden to assign a {found} to node '{name}'")]
    ForbiddenAssignment { name: String, found: String },

    /// A slot handle that was not issued by this model
    #[error("slot handle #{0} does not belong to this model")]
    UnknownSlot(usize),

    #[error("bytecode is {len} bytes long, shorter than its 4-byte header")]
    MissingHeader { len: usize },

    #[error("truncated operand for opcode {opcode} at byte {offset}")]
    Truncated { offset: usize, opcode: u8 },

    #[error("unknown opcode {opcode} at byte {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },

    #[error("slot {slot} is out of range for a state vector of {size} slots")]
    SlotOutOfRange { slot: usize, size: usize },

    #[error("program declares {size} slots, above the configured maximum of {limit}")]
    TooManySlots { size: usize, limit: usize },

    #[error("cannot allocate state for {slots} slots")]
    OutOfMemory { slots: usize },

    #[error("evaluation stack overflow at instruction {pc} (limit {limit})")]
    StackOverflow { pc: usize, limit: usize },

    #[error("evaluation stack underflow at instruction {pc}")]
    StackUnderflow { pc: usize },

    #[error("{depth} value(s) left on the evaluation stack after instruction {pc}")]
    UnbalancedStack { pc: usize, depth: usize },

    #[error("invalid netlist: {0}")]
    InvalidNetlist(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "jit")]
    #[error("JIT compilation failed: {0}")]
    Jit(String),
}

pub type Result<T> = std::result::Result<T, Error>;
