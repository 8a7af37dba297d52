//! Error types for the debugger crate.

use thiserror::Error;

/// The result type for debugger operations.
pub type DebugResult<T> = std::result::Result<T, DebugError>;

/// Errors surfaced to the UI.
///
/// VM faults are deliberately absent: they are reported as
/// `DebuggerState` transitions so the stack can be inspected at the point
/// of fault, never as errors.
#[derive(Error, Debug)]
pub enum DebugError {
    /// An artifact file could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A `.neomap` file from the retired toolchain sits next to the
    /// `.avm`; the contract must be recompiled to get a `.debug.json`.
    #[error("{path} uses the retired .neomap format; recompile the contract to produce a .debug.json")]
    LegacyMapFile { path: String },

    /// An artifact parsed but its content is malformed.
    #[error("Malformed {path}: {reason}")]
    MalformedArtifact { path: String, reason: String },

    /// The contract bytecode could not be disassembled.
    #[error("Disassembly failed: {0}")]
    Disassemble(#[source] neodbg_vm::VmError),

    /// The simulated chain rejected an operation.
    #[error(transparent)]
    Chain(#[from] neodbg_chain::ChainError),

    /// The deployed contract vanished from the chain snapshot.
    #[error("No contract deployed under script hash {hash}")]
    ContractMissing { hash: String },

    /// An invocation argument cannot be encoded into a loader script.
    #[error("Cannot marshal argument: {reason}")]
    ArgMarshal { reason: String },
}

impl DebugError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn malformed<R: Into<String>>(path: &std::path::Path, reason: R) -> Self {
        Self::MalformedArtifact {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    pub fn arg_marshal<R: Into<String>>(reason: R) -> Self {
        Self::ArgMarshal {
            reason: reason.into(),
        }
    }
}
