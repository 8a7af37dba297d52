//! NEO 2 virtual machine with debugger hooks.
//!
//! This crate provides the stack-machine interpreter behind the neodbg
//! emulator: opcode decoding, the execution engine with breakpoint and
//! single-step support, the syscall registry, a script builder, and a
//! disassembler for the assembly view. Chain state lives behind the
//! [`host::VmHost`] seam so the engine itself stays storage-agnostic.

pub mod disassembler;
pub mod error;
pub mod evaluation_stack;
pub mod execution_context;
pub mod execution_engine;
pub mod host;
pub mod instruction;
pub mod interop_service;
pub mod op_code;
pub mod script;
pub mod script_builder;
pub mod stack_item;
pub mod vm_state;

pub use disassembler::{AssemblyLine, Disassembler};
pub use error::{VmError, VmResult};
pub use evaluation_stack::EvaluationStack;
pub use execution_context::ExecutionContext;
pub use execution_engine::{ExecutionEngine, MAX_INVOCATION_DEPTH};
pub use host::{NullHost, VmHost};
pub use instruction::Instruction;
pub use interop_service::{InteropDescriptor, InteropHandler, InteropService};
pub use op_code::{OpCode, OperandEncoding};
pub use script::Script;
pub use script_builder::ScriptBuilder;
pub use stack_item::{
    bigint_from_bytes, bigint_to_bytes, InteropInterface, StackItem, MAX_ARRAY_SIZE,
    MAX_INTEGER_SIZE, MAX_ITEM_SIZE,
};
pub use vm_state::VMState;
