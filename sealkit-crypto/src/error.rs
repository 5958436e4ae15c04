//! Error types for envelope cryptography.

use crate::key::KeyAlgorithm;
use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Message shown to the party that supplied a passphrase or ciphertext.
///
/// Deliberately identical for a wrong passphrase and for corrupted data.
pub const GENERIC_FAILURE_MESSAGE: &str = "incorrect passphrase or corrupted data";

/// Errors that can occur in crypto operations.
///
/// Errors raised by the underlying primitive crates are mapped into one of
/// these variants at the component boundary and never surface directly.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("authentication failed (wrong key or tampered data)")]
    AuthenticationFailed,

    #[error("invalid passphrase")]
    InvalidPassphrase,

    #[error("key unwrap failed")]
    UnwrapFailed,

    #[error("key type mismatch: expected {expected}, got {actual}")]
    KeyTypeMismatch {
        expected: KeyAlgorithm,
        actual: String,
    },

    #[error("hybrid decryption failed")]
    HybridDecryptionFailed,

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("key usage not permitted: {0}")]
    UsageNotPermitted(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("key agreement failed: {0}")]
    KeyAgreement(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CryptoError {
    /// True for failures caused by a wrong secret or damaged ciphertext.
    ///
    /// These are the kinds that must look the same to an untrusted caller.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            CryptoError::AuthenticationFailed
                | CryptoError::InvalidPassphrase
                | CryptoError::UnwrapFailed
                | CryptoError::HybridDecryptionFailed
                | CryptoError::MalformedEnvelope(_)
                | CryptoError::KeyTypeMismatch { .. }
        )
    }

    /// Message safe to show to an end user.
    pub fn user_message(&self) -> String {
        if self.is_integrity_failure() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}
