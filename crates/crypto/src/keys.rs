//! Simulated account key pairs and ECDSA verification.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;

use crate::{CryptoError, CryptoResult};

/// A secp256r1 key pair backing a simulated account.
///
/// Key pairs never leave the debugger process; they exist so witness checks
/// and CHECKSIG can run against real signatures during emulation.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generates a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Restores a key pair from a 32-byte private key.
    pub fn from_private_key(bytes: &[u8]) -> CryptoResult<Self> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|err| CryptoError::invalid_private_key(err.to_string()))?;
        Ok(Self { signing_key })
    }

    /// Returns the 32-byte private key.
    pub fn private_key(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    /// Returns the 33-byte SEC1 compressed public key.
    pub fn public_key(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// Signs `message` (hashed with SHA-256) and returns the 64-byte
    /// `r || s` signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}

/// Verifies a secp256r1 ECDSA signature over `message`.
///
/// `public_key` must be SEC1 encoded (33-byte compressed or 65-byte
/// uncompressed); `signature` is the fixed 64-byte `r || s` form. The
/// message is hashed with SHA-256 before verification.
pub fn verify_signature(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    verifying_key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let keypair = KeyPair::generate();
        let message = b"transaction hash data";
        let signature = keypair.sign(message);

        assert!(verify_signature(message, &signature, &keypair.public_key()));
        assert!(!verify_signature(b"other message", &signature, &keypair.public_key()));
    }

    #[test]
    fn rejects_wrong_key() {
        let keypair = KeyPair::generate();
        let other = KeyPair::generate();
        let signature = keypair.sign(b"payload");

        assert!(!verify_signature(b"payload", &signature, &other.public_key()));
    }

    #[test]
    fn private_key_round_trip() {
        let keypair = KeyPair::generate();
        let restored = KeyPair::from_private_key(&keypair.private_key()).unwrap();
        assert_eq!(keypair.public_key(), restored.public_key());
    }

    #[test]
    fn rejects_garbage_inputs() {
        assert!(!verify_signature(b"msg", &[0u8; 64], &[0u8; 33]));
        assert!(!verify_signature(b"msg", &[], &[]));
    }
}
