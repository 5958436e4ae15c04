//! Envelope cryptography for SealKit.
//!
//! Composes audited primitives into a small set of high-level operations:
//! - Argon2id for passphrase key derivation, with parameters persisted verbatim
//! - AEAD envelopes (`nonce ‖ tag ‖ ciphertext`), one-shot or streamed
//! - AES key wrap (RFC 3394) under a symmetric or passphrase-derived KEK
//! - RSA-OAEP / X25519 sealed-box wrapping to a recipient's public key
//! - Hybrid encryption: a fresh data key per message, wrapped separately
//!
//! # Architecture
//!
//! Every primitive sits behind a capability trait in [`provider`] or
//! [`asymmetric`]; the concrete algorithm is picked when an envelope or
//! wrapper is constructed. Keys are [`KeyMaterial`] values tagged with their
//! algorithm and permitted usages, zeroized on drop and never `Clone`.
//!
//! Failures caused by a wrong secret or damaged input share one outward
//! message ([`CryptoError::user_message`]) so a caller cannot distinguish
//! them; the precise kind is still available to the code handling it.

pub mod agreement;
pub mod asymmetric;
pub mod config;
pub mod envelope;
mod error;
pub mod hash;
pub mod hybrid;
pub mod kdf;
mod key;
pub mod provider;
pub mod signature;
pub mod stream;
pub mod wrap;

pub use agreement::AgreementKeyPair;
pub use asymmetric::{
    AsymmetricDecryptor, AsymmetricEncryptor, AsymmetricScheme, RsaOaepPrivateKey,
    RsaOaepPublicKey, X25519PublicKey, X25519SecretKey,
};
pub use config::SuiteConfig;
pub use envelope::{EnvelopeBlob, EnvelopeLayout, SymmetricEnvelope};
pub use error::{CryptoError, CryptoResult, GENERIC_FAILURE_MESSAGE};
pub use hybrid::HybridEnvelope;
pub use kdf::{DerivationParams, DerivedSecret, KdfAlgorithm, PassphraseVerifier};
pub use key::{
    AeadAlgorithm, KeyAlgorithm, KeyMaterial, KeyUsages, KeyWrapAlgorithm, Salt, SALT_SIZE,
    TAG_SIZE,
};
pub use provider::{AeadCipher, Kdf, KeyWrapCipher};
pub use signature::{SignatureVerifyingKey, SigningKeyPair};
pub use stream::{EnvelopeStream, OperationState, StreamOpener, StreamSealer};
pub use wrap::{PassphraseWrappedKey, WrapMethod, WrappedKey, WrappedKeyInfo};
