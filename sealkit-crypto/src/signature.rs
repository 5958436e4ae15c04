//! Ed25519 signatures.

use crate::error::{CryptoError, CryptoResult};
use crate::hash::fingerprint;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use zeroize::Zeroizing;

pub const SIGNATURE_SIZE: usize = 64;
pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SECRET_KEY_SIZE: usize = 32;

/// Ed25519 signing key. Zeroized on drop by `ed25519-dalek`.
pub struct SigningKeyPair {
    signing_key: SigningKey,
}

impl SigningKeyPair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    pub fn from_secret_bytes(bytes: &[u8; SECRET_KEY_SIZE]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_SIZE]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    pub fn verifying_key(&self) -> SignatureVerifyingKey {
        SignatureVerifyingKey(self.signing_key.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("public", &hex::encode(self.signing_key.verifying_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignatureVerifyingKey(VerifyingKey);

impl SignatureVerifyingKey {
    /// Parses a 32-byte public key; points that do not decode are rejected.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; PUBLIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
        VerifyingKey::from_bytes(&arr)
            .map(Self)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("invalid Ed25519 public key: {e}")))
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn key_id(&self) -> String {
        fingerprint(self.0.as_bytes())
    }

    /// Strict verification (rejects small-order keys and malleable signatures).
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let signature =
            Signature::from_slice(signature).map_err(|_| CryptoError::SignatureInvalid)?;
        self.0
            .verify_strict(message, &signature)
            .map_err(|_| CryptoError::SignatureInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let pair = SigningKeyPair::generate();
        let sig = pair.sign(b"manifest");
        assert!(pair.verifying_key().verify(b"manifest", &sig).is_ok());
    }

    #[test]
    fn tampered_message_is_rejected() {
        let pair = SigningKeyPair::generate();
        let sig = pair.sign(b"original");
        let err = pair.verifying_key().verify(b"tampered", &sig).unwrap_err();
        assert!(matches!(err, CryptoError::SignatureInvalid));
    }

    #[test]
    fn truncated_signature_is_rejected() {
        let pair = SigningKeyPair::generate();
        let sig = pair.sign(b"msg");
        assert!(pair.verifying_key().verify(b"msg", &sig[..63]).is_err());
    }

    #[test]
    fn secret_bytes_restore_same_key() {
        let pair = SigningKeyPair::generate();
        let restored = SigningKeyPair::from_secret_bytes(&pair.secret_bytes());
        assert_eq!(pair.verifying_key(), restored.verifying_key());
        let public = SignatureVerifyingKey::from_bytes(&pair.verifying_key().to_bytes()).unwrap();
        assert_eq!(public.key_id(), pair.verifying_key().key_id());
    }
}
