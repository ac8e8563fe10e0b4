//! WebAssembly runtime implementation
//!
//! This module provides the execution engine for decoded function bodies,
//! including the stack machine, value representation, and instruction interpreter.

pub mod code;
pub mod control;
pub mod executor;
pub mod frame;
pub mod function;
pub mod host;
pub mod instance;
pub mod memory;
pub mod opcode;
pub mod ops;
pub mod stack;
pub mod table;
pub mod test_utils;
pub mod value;

pub use function::{DefinedFunction, Function};
pub use host::{HostEnv, HostError, HostFunction, NativeKind, NativeTuple, NativeType, NativeValue};
pub use instance::{Instance, InstanceBuilder};
pub use memory::{Memory, SharedMemory};
pub use table::Table;
pub use value::{FunctionType, Value, ValueType};

/// An abnormal termination defined by the WebAssembly execution semantics.
///
/// Traps stop the current call tree and are reported to the embedder. Any
/// memory or global writes made before the trap remain visible.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Trap {
    #[error("unreachable")]
    Unreachable,
    #[error("integer divide by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversion,
    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    #[error("undefined element: {0}")]
    UndefinedElement(u32),
    #[error("uninitialized element: {0}")]
    UninitializedElement(u32),
    #[error("indirect call type mismatch: expected {expected}, got {actual}")]
    IndirectCallTypeMismatch { expected: FunctionType, actual: FunctionType },
    #[error("call stack exhausted")]
    CallStackExhausted,
    #[error("host trap: {0}")]
    Host(String),
}

/// A broken invariant that decoding or validation should have ruled out.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Fault {
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Invalid label: {0}")]
    InvalidLabel(u32),
    #[error("Local variable index out of bounds: {0}")]
    LocalIndexOutOfBounds(u32),
    #[error("Global variable index out of bounds: {0}")]
    GlobalIndexOutOfBounds(u32),
    #[error("Function index out of bounds: {0}")]
    FunctionIndexOutOfBounds(u32),
    #[error("Type index out of bounds: {0}")]
    TypeIndexOutOfBounds(u32),
    #[error("Unknown opcode {opcode:#04x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    #[error("Truncated immediate at offset {0}")]
    TruncatedImmediate(usize),
    #[error("Malformed immediate at offset {0}")]
    MalformedImmediate(usize),
    #[error("Unbalanced block structure at offset {0}")]
    UnbalancedBlock(usize),
    #[error("No memory instance available")]
    MissingMemory,
    #[error("No table instance available")]
    MissingTable,
    #[error("Host function results do not match its declared kinds")]
    HostResultMismatch,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Trap: {0}")]
    Trap(#[from] Trap),
    #[error("Fault: {0}")]
    Fault(#[from] Fault),
    #[error("Argument mismatch: expected {expected}, got {actual}")]
    ArgumentMismatch { expected: String, actual: String },
    #[error("Memory error: {0}")]
    Memory(String),
    #[error("Host function error: {0}")]
    Host(#[from] HostError),
    #[error("Instruction budget exhausted")]
    InstructionBudgetExhausted,
}

impl RuntimeError {
    /// The trap carried by this error, if it is one
    pub fn trap(&self) -> Option<&Trap> {
        match self {
            RuntimeError::Trap(trap) => Some(trap),
            _ => None,
        }
    }

    /// The fault carried by this error, if it is one
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            RuntimeError::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}
