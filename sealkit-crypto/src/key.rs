//! Key material, algorithm identifiers and salts.
//!
//! A [`KeyMaterial`] is an opaque secret of fixed length, tagged with the
//! algorithm it belongs to and the set of operations it may be used for.
//! The bytes are zeroized when the value is dropped and the type is not
//! `Clone`, so a key is never copied implicitly between components.

use crate::error::{CryptoError, CryptoResult};
use bitflags::bitflags;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a KDF salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Authentication tag length shared by every supported AEAD.
pub const TAG_SIZE: usize = 16;

/// AEAD cipher used for payload encryption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AeadAlgorithm {
    #[serde(rename = "aes-128-gcm")]
    Aes128Gcm,
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
    #[serde(rename = "xchacha20-poly1305")]
    XChaCha20Poly1305,
}

impl AeadAlgorithm {
    pub const ALL: [AeadAlgorithm; 4] = [
        AeadAlgorithm::Aes128Gcm,
        AeadAlgorithm::Aes256Gcm,
        AeadAlgorithm::ChaCha20Poly1305,
        AeadAlgorithm::XChaCha20Poly1305,
    ];

    pub fn key_len(self) -> usize {
        match self {
            AeadAlgorithm::Aes128Gcm => 16,
            AeadAlgorithm::Aes256Gcm
            | AeadAlgorithm::ChaCha20Poly1305
            | AeadAlgorithm::XChaCha20Poly1305 => 32,
        }
    }

    /// Nonce length, which is also the length of the envelope header prefix.
    pub fn nonce_len(self) -> usize {
        match self {
            AeadAlgorithm::XChaCha20Poly1305 => 24,
            _ => 12,
        }
    }

    pub fn tag_len(self) -> usize {
        TAG_SIZE
    }

    pub fn name(self) -> &'static str {
        match self {
            AeadAlgorithm::Aes128Gcm => "AES-128-GCM",
            AeadAlgorithm::Aes256Gcm => "AES-256-GCM",
            AeadAlgorithm::ChaCha20Poly1305 => "ChaCha20-Poly1305",
            AeadAlgorithm::XChaCha20Poly1305 => "XChaCha20-Poly1305",
        }
    }
}

/// Deterministic key-wrap cipher (RFC 3394).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyWrapAlgorithm {
    #[serde(rename = "aes-128-kw")]
    Aes128Kw,
    #[serde(rename = "aes-256-kw")]
    Aes256Kw,
}

impl KeyWrapAlgorithm {
    pub fn key_len(self) -> usize {
        match self {
            KeyWrapAlgorithm::Aes128Kw => 16,
            KeyWrapAlgorithm::Aes256Kw => 32,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyWrapAlgorithm::Aes128Kw => "AES-128-KW",
            KeyWrapAlgorithm::Aes256Kw => "AES-256-KW",
        }
    }
}

/// Algorithm a [`KeyMaterial`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    Aead(AeadAlgorithm),
    KeyWrap(KeyWrapAlgorithm),
}

impl KeyAlgorithm {
    pub fn key_len(self) -> usize {
        match self {
            KeyAlgorithm::Aead(a) => a.key_len(),
            KeyAlgorithm::KeyWrap(w) => w.key_len(),
        }
    }

    /// The usage family a key of this algorithm may draw from.
    pub fn permitted_usages(self) -> KeyUsages {
        match self {
            KeyAlgorithm::Aead(_) => KeyUsages::DATA,
            KeyAlgorithm::KeyWrap(_) => KeyUsages::WRAPPING,
        }
    }
}

impl From<AeadAlgorithm> for KeyAlgorithm {
    fn from(value: AeadAlgorithm) -> Self {
        KeyAlgorithm::Aead(value)
    }
}

impl From<KeyWrapAlgorithm> for KeyAlgorithm {
    fn from(value: KeyWrapAlgorithm) -> Self {
        KeyAlgorithm::KeyWrap(value)
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Aead(a) => f.write_str(a.name()),
            KeyAlgorithm::KeyWrap(w) => f.write_str(w.name()),
        }
    }
}

bitflags! {
    /// Operations a key may be used for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyUsages: u8 {
        const ENCRYPT = 0b0000_0001;
        const DECRYPT = 0b0000_0010;
        const WRAP    = 0b0000_0100;
        const UNWRAP  = 0b0000_1000;
        const SIGN    = 0b0001_0000;
        const VERIFY  = 0b0010_0000;
    }
}

impl KeyUsages {
    pub const DATA: KeyUsages = KeyUsages::ENCRYPT.union(KeyUsages::DECRYPT);
    pub const WRAPPING: KeyUsages = KeyUsages::WRAP.union(KeyUsages::UNWRAP);
    pub const SIGNING: KeyUsages = KeyUsages::SIGN.union(KeyUsages::VERIFY);

    /// True when every usage comes from a single family.
    pub fn is_single_family(self) -> bool {
        [KeyUsages::DATA, KeyUsages::WRAPPING, KeyUsages::SIGNING]
            .iter()
            .any(|family| family.contains(self))
    }
}

/// Symmetric key bytes tagged with algorithm and permitted usages.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: Vec<u8>,
    #[zeroize(skip)]
    algorithm: KeyAlgorithm,
    #[zeroize(skip)]
    usages: KeyUsages,
}

impl KeyMaterial {
    /// Generates a fresh random key from the OS CSPRNG.
    pub fn generate(algorithm: impl Into<KeyAlgorithm>) -> Self {
        let algorithm = algorithm.into();
        let mut bytes = vec![0u8; algorithm.key_len()];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self {
            bytes,
            algorithm,
            usages: algorithm.permitted_usages(),
        }
    }

    /// Builds a key from raw bytes; the length must match the algorithm.
    pub fn from_bytes(algorithm: impl Into<KeyAlgorithm>, bytes: &[u8]) -> CryptoResult<Self> {
        let algorithm = algorithm.into();
        if bytes.len() != algorithm.key_len() {
            return Err(CryptoError::InvalidKeyLength {
                expected: algorithm.key_len(),
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.to_vec(),
            algorithm,
            usages: algorithm.permitted_usages(),
        })
    }

    /// Narrows the usage set. Mixing families or widening beyond what the
    /// algorithm permits is rejected.
    pub fn with_usages(mut self, usages: KeyUsages) -> CryptoResult<Self> {
        if usages.is_empty() || !usages.is_single_family() {
            return Err(CryptoError::UsageNotPermitted(format!(
                "usage set {usages:?} mixes key families"
            )));
        }
        if !self.algorithm.permitted_usages().contains(usages) {
            return Err(CryptoError::UsageNotPermitted(format!(
                "{} keys cannot be used for {usages:?}",
                self.algorithm
            )));
        }
        self.usages = usages;
        Ok(self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn usages(&self) -> KeyUsages {
        self.usages
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Fails unless the key may be used for `usage`.
    pub fn require(&self, usage: KeyUsages) -> CryptoResult<()> {
        if self.usages.contains(usage) {
            Ok(())
        } else {
            Err(CryptoError::UsageNotPermitted(format!(
                "key allows {:?}, operation needs {usage:?}",
                self.usages
            )))
        }
    }

    /// Fails unless the key belongs to `expected`.
    pub fn expect_algorithm(&self, expected: impl Into<KeyAlgorithm>) -> CryptoResult<()> {
        let expected = expected.into();
        if self.algorithm == expected {
            Ok(())
        } else {
            Err(CryptoError::KeyTypeMismatch {
                expected,
                actual: self.algorithm.to_string(),
            })
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("usages", &self.usages)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

/// Random, non-secret KDF salt. One per derivation context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; SALT_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: SALT_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}
