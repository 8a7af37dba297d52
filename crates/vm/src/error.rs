//! Error types for the VM crate.

use thiserror::Error;

/// The result type for VM operations.
pub type VmResult<T> = std::result::Result<T, VmError>;

/// Errors raised while parsing or executing a script.
///
/// Execution errors never escape the engine as panics; the stepper converts
/// them into a FAULT state and keeps the faulting error observable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Parse error with context.
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// The byte at the decoded position is not a known opcode.
    #[error("Invalid opcode: {opcode:#04x} at offset {offset}")]
    InvalidOpCode { opcode: u8, offset: usize },

    /// An instruction's inline operand runs past the end of the script.
    #[error("Truncated operand: {opcode} at offset {offset} needs {needed} more bytes")]
    TruncatedOperand {
        opcode: String,
        offset: usize,
        needed: usize,
    },

    /// Invalid operation with context.
    #[error("Invalid operation: {operation}, reason: {reason}")]
    InvalidOperation { operation: String, reason: String },

    /// Stack underflow.
    #[error("Stack underflow: requested {requested} items, {available} available")]
    StackUnderflow { requested: usize, available: usize },

    /// A jump or call target lies outside the script.
    #[error("Jump target {target} outside script of length {length}")]
    BadJumpTarget { target: isize, length: usize },

    /// Division or modulo by zero.
    #[error("Division by zero in operation: {operation}")]
    DivisionByZero { operation: String },

    /// An integer operand exceeds the permitted size for the operation.
    #[error("Integer of {size} bytes exceeds the {limit}-byte limit in {operation}")]
    IntegerOverflow {
        operation: String,
        size: usize,
        limit: usize,
    },

    /// The invocation stack grew past its limit.
    #[error("Call depth limit exceeded: depth {depth}, limit {limit}")]
    CallDepthExceeded { depth: usize, limit: usize },

    /// A composite item grew past its limit.
    #[error("Item size limit exceeded: size {size}, limit {limit}")]
    ItemTooLarge { size: usize, limit: usize },

    /// A type coercion failed.
    #[error("Invalid cast: cannot convert {from} to {to}")]
    InvalidCast { from: String, to: String },

    /// SYSCALL named a method the interop registry does not know.
    #[error("Unknown syscall: {name}")]
    UnknownSyscall { name: String },

    /// An interop handler reported failure.
    #[error("Syscall failed: {name}")]
    SyscallFailed { name: String },

    /// An APPCALL target has no deployed script.
    #[error("No contract deployed under script hash {hash}")]
    ContractNotFound { hash: String },

    /// THROW or a failed THROWIFNOT.
    #[error("Script threw: {reason}")]
    Thrown { reason: String },
}

impl VmError {
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn invalid_operation<O: Into<String>, R: Into<String>>(operation: O, reason: R) -> Self {
        Self::InvalidOperation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn stack_underflow(requested: usize, available: usize) -> Self {
        Self::StackUnderflow {
            requested,
            available,
        }
    }

    pub fn invalid_cast<F: Into<String>, T: Into<String>>(from: F, to: T) -> Self {
        Self::InvalidCast {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn division_by_zero<S: Into<String>>(operation: S) -> Self {
        Self::DivisionByZero {
            operation: operation.into(),
        }
    }
}
