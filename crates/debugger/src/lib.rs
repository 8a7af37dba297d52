//! Source-level debugger and emulator core for NEO VM contracts.
//!
//! The crate wires the interpreter from `neodbg-vm` to the simulated
//! chain from `neodbg-chain` and exposes the pieces a debugger UI drives:
//!
//! - [`Emulator`] — the stepper: gas accounting, breakpoints, resets.
//! - [`DebugManager`] — the session façade: artifact loading, line-level
//!   breakpoints, the source/assembly view toggle, chain persistence.
//! - [`DebugMap`] — bytecode-offset ↔ source-line resolution.
//! - [`Profiler`] — per-opcode and per-line cost tallies with a CSV dump.
//!
//! Everything is synchronous; one session owns one emulator and one chain
//! snapshot, and the façade serializes all access on a session mutex.

pub mod abi;
pub mod arguments;
pub mod debug_manager;
pub mod debug_map;
pub mod emulator;
pub mod error;
pub mod host;
pub mod interop;
pub mod profiler;

pub use abi::{AbiFunction, AbiParameter, AbiType, ContractAbi};
pub use arguments::{build_loader_script, ArgValue};
pub use debug_manager::{DebugManager, DebugParameters, DebugView};
pub use debug_map::{DebugMap, DebugMapEntry};
pub use emulator::{DebuggerState, DebuggerStateKind, Emulator};
pub use error::{DebugError, DebugResult};
pub use host::{EmulatorHost, RuntimeEvent, TriggerType, WitnessMode};
pub use interop::{register_default_interops, StorageContext};
pub use profiler::{LineStats, OpcodeStats, Profiler};
