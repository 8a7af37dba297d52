//! Simulated blockchain for the neodbg emulator.
//!
//! One debugger session owns one [`Blockchain`] snapshot: an ordered list
//! of blocks plus named addresses carrying contract bytecode, optional key
//! pairs and per-address key/value storage. The whole document persists to
//! a versioned JSON `.chain` file and round-trips byte-identically.

pub mod address;
pub mod block;
pub mod blockchain;
pub mod serde_hex;
pub mod transaction;

pub use address::Address;
pub use block::Block;
pub use blockchain::{Blockchain, CHAIN_FORMAT_VERSION};
pub use transaction::{Input, Output, Transaction};

use thiserror::Error;

/// Result alias for this crate.
pub type ChainResult<T> = std::result::Result<T, ChainError>;

/// Errors raised while loading, saving or mutating the simulated chain.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed chain document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported chain format version {found}, supported version is {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("No address named {name}")]
    AddressNotFound { name: String },

    #[error(transparent)]
    Crypto(#[from] neodbg_crypto::CryptoError),
}

impl ChainError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
