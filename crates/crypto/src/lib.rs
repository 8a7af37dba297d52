//! Hash primitives and signature verification for the neodbg emulator.
//!
//! The simulated chain uses the same hash pipeline as the production
//! network (RIPEMD-160 over SHA-256 for script hashes, double SHA-256 for
//! transaction hashes) and real secp256r1 ECDSA verification for the
//! CHECKSIG family of opcodes.

pub mod hash;
pub mod keys;

pub use hash::{hash160, hash256, ripemd160, sha1, sha256};
pub use keys::{verify_signature, KeyPair};

use thiserror::Error;

/// Result alias for this crate.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Errors raised by key handling and signature verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A public key could not be decoded from its SEC1 form.
    #[error("Invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    /// A private key was malformed.
    #[error("Invalid private key: {reason}")]
    InvalidPrivateKey { reason: String },

    /// A signature was not 64 bytes of `r || s`.
    #[error("Invalid signature encoding: {reason}")]
    InvalidSignature { reason: String },
}

impl CryptoError {
    pub fn invalid_public_key<S: Into<String>>(reason: S) -> Self {
        Self::InvalidPublicKey {
            reason: reason.into(),
        }
    }

    pub fn invalid_private_key<S: Into<String>>(reason: S) -> Self {
        Self::InvalidPrivateKey {
            reason: reason.into(),
        }
    }

    pub fn invalid_signature<S: Into<String>>(reason: S) -> Self {
        Self::InvalidSignature {
            reason: reason.into(),
        }
    }
}
