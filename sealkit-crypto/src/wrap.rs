//! Key wrapping: protect one key under another.
//!
//! A [`WrappedKey`] is just bytes. Whatever is needed to unwrap it again
//! (algorithm, method, which key wrapped it) lives in a [`WrappedKeyInfo`]
//! stored next to it.

use crate::asymmetric::{AsymmetricDecryptor, AsymmetricEncryptor, AsymmetricScheme};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{self, DerivationParams, PassphraseVerifier};
use crate::key::{KeyAlgorithm, KeyMaterial, KeyUsages, KeyWrapAlgorithm, Salt};
use crate::provider::KeyWrapCipher;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Wrapped key bytes with no embedded metadata.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WrappedKey({} bytes)", self.0.len())
    }
}

/// How a key was wrapped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum WrapMethod {
    /// AES-KW under a symmetric KEK.
    KeyWrap { algorithm: KeyWrapAlgorithm },
    /// AES-KW under a KEK derived from a passphrase.
    Passphrase {
        algorithm: KeyWrapAlgorithm,
        salt: Salt,
        kdf: DerivationParams,
    },
    /// Public-key encryption; `key_id` is the recipient key fingerprint.
    Asymmetric {
        scheme: AsymmetricScheme,
        key_id: String,
    },
}

/// Metadata record that travels alongside a [`WrappedKey`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKeyInfo {
    pub key_algorithm: KeyAlgorithm,
    pub method: WrapMethod,
}

impl WrappedKeyInfo {
    pub fn for_recipient(
        key_algorithm: impl Into<KeyAlgorithm>,
        recipient: &dyn AsymmetricEncryptor,
    ) -> CryptoResult<Self> {
        Ok(Self {
            key_algorithm: key_algorithm.into(),
            method: WrapMethod::Asymmetric {
                scheme: recipient.scheme(),
                key_id: recipient.key_id()?,
            },
        })
    }
}

fn key_wrap_algorithm(kek: &KeyMaterial) -> CryptoResult<KeyWrapAlgorithm> {
    match kek.algorithm() {
        KeyAlgorithm::KeyWrap(algorithm) => Ok(algorithm),
        other => Err(CryptoError::UsageNotPermitted(format!(
            "{other} keys cannot wrap other keys"
        ))),
    }
}

fn expect_len(raw: &[u8], expected: KeyAlgorithm) -> CryptoResult<()> {
    if raw.len() != expected.key_len() {
        return Err(CryptoError::KeyTypeMismatch {
            expected,
            actual: format!("{}-byte key", raw.len()),
        });
    }
    Ok(())
}

// ============================================================================
// Symmetric KEK
// ============================================================================

/// Wraps `key` under `kek` with AES-KW (RFC 3394).
pub fn wrap_key(kek: &KeyMaterial, key: &KeyMaterial) -> CryptoResult<WrappedKey> {
    kek.require(KeyUsages::WRAP)?;
    let algorithm = key_wrap_algorithm(kek)?;
    algorithm.wrap(kek.as_bytes(), key.as_bytes()).map(WrappedKey)
}

/// Unwraps a key that must turn out to be a key of `expected`.
pub fn unwrap_key(
    kek: &KeyMaterial,
    wrapped: &WrappedKey,
    expected: impl Into<KeyAlgorithm>,
) -> CryptoResult<KeyMaterial> {
    let expected = expected.into();
    kek.require(KeyUsages::UNWRAP)?;
    let algorithm = key_wrap_algorithm(kek)?;
    let raw = algorithm.unwrap(kek.as_bytes(), wrapped.as_bytes())?;
    expect_len(&raw, expected)?;
    KeyMaterial::from_bytes(expected, &raw)
}

// ============================================================================
// Passphrase KEK
// ============================================================================

/// A key wrapped under a passphrase KEK, plus the verifier from the same
/// derivation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PassphraseWrappedKey {
    pub wrapped: WrappedKey,
    pub verifier: PassphraseVerifier,
}

/// Derives a KEK and its verifier; `params.output_len` must leave room for both.
pub fn derive_kek(
    passphrase: &str,
    salt: &Salt,
    params: &DerivationParams,
    algorithm: KeyWrapAlgorithm,
) -> CryptoResult<(KeyMaterial, PassphraseVerifier)> {
    kdf::derive(passphrase, salt, params)?.split(algorithm)
}

pub fn wrap_with_passphrase(
    passphrase: &str,
    salt: &Salt,
    params: &DerivationParams,
    kek_algorithm: KeyWrapAlgorithm,
    key: &KeyMaterial,
) -> CryptoResult<PassphraseWrappedKey> {
    let (kek, verifier) = derive_kek(passphrase, salt, params, kek_algorithm)?;
    let wrapped = wrap_key(&kek, key)?;
    Ok(PassphraseWrappedKey { wrapped, verifier })
}

/// Re-derives the KEK, checks the verifier in constant time and only then
/// unwraps. A verifier mismatch is `InvalidPassphrase`; an unwrap failure
/// after a matching verifier means the stored data was damaged.
pub fn unwrap_with_passphrase(
    passphrase: &str,
    salt: &Salt,
    params: &DerivationParams,
    kek_algorithm: KeyWrapAlgorithm,
    stored: &PassphraseWrappedKey,
    expected: impl Into<KeyAlgorithm>,
) -> CryptoResult<KeyMaterial> {
    let (kek, verifier) = derive_kek(passphrase, salt, params, kek_algorithm)?;
    if !verifier.matches(&stored.verifier) {
        debug!("passphrase verifier mismatch");
        return Err(CryptoError::InvalidPassphrase);
    }
    unwrap_key(&kek, &stored.wrapped, expected).inspect_err(|e| {
        debug!("verifier matched but unwrap failed: {e}");
    })
}

// ============================================================================
// Asymmetric
// ============================================================================

/// Encrypts `key` to a recipient's public key.
pub fn wrap_for_recipient(
    recipient: &dyn AsymmetricEncryptor,
    key: &KeyMaterial,
) -> CryptoResult<WrappedKey> {
    recipient.encrypt(key.as_bytes()).map(WrappedKey)
}

/// Recovers a key wrapped with [`wrap_for_recipient`].
pub fn unwrap_with_private(
    private: &dyn AsymmetricDecryptor,
    wrapped: &WrappedKey,
    expected: impl Into<KeyAlgorithm>,
) -> CryptoResult<KeyMaterial> {
    let expected = expected.into();
    let raw = private.decrypt(wrapped.as_bytes())?;
    expect_len(&raw, expected)?;
    KeyMaterial::from_bytes(expected, &raw)
}
