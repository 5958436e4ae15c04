//! Passphrase key derivation with explicit, versioned parameters.
//!
//! [`DerivationParams`] must be persisted verbatim next to whatever consumes
//! the derived key. There is intentionally no `Default` implementation:
//! re-deriving with different parameters yields a different key, so the
//! parameters used at decrypt time always come from storage.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{KeyAlgorithm, KeyMaterial, Salt};
use crate::provider::{Argon2idKdf, Kdf};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Minimum Argon2id time cost (passes).
pub const MIN_TIME_COST: u32 = 3;
/// Minimum Argon2id memory cost in KiB.
pub const MIN_MEMORY_COST_KIB: u32 = 4096;
/// Minimum parallelism.
pub const MIN_PARALLELISM: u32 = 1;
/// Smallest output accepted (one 128-bit key).
pub const MIN_OUTPUT_LEN: u32 = 16;

/// Argon2 version 1.3.
pub const ARGON2_VERSION_13: u32 = 0x13;

/// Supported KDFs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfAlgorithm {
    Argon2id,
}

impl KdfAlgorithm {
    fn provider(self) -> &'static dyn Kdf {
        match self {
            KdfAlgorithm::Argon2id => &Argon2idKdf,
        }
    }
}

/// Complete KDF parameter record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivationParams {
    pub algorithm: KdfAlgorithm,
    /// Algorithm version tag (Argon2: `0x13`).
    pub version: u32,
    pub time_cost: u32,
    pub memory_cost_kib: u32,
    pub parallelism: u32,
    pub output_len: u32,
}

impl DerivationParams {
    /// Argon2id v1.3 with every cost spelled out by the caller.
    pub const fn argon2id(
        time_cost: u32,
        memory_cost_kib: u32,
        parallelism: u32,
        output_len: u32,
    ) -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            version: ARGON2_VERSION_13,
            time_cost,
            memory_cost_kib,
            parallelism,
            output_len,
        }
    }

    /// Rejects parameters below the supported floors.
    pub fn validate(&self) -> CryptoResult<()> {
        if self.time_cost < MIN_TIME_COST {
            return Err(CryptoError::DerivationFailed(format!(
                "time cost {} below minimum {MIN_TIME_COST}",
                self.time_cost
            )));
        }
        if self.memory_cost_kib < MIN_MEMORY_COST_KIB {
            return Err(CryptoError::DerivationFailed(format!(
                "memory cost {} KiB below minimum {MIN_MEMORY_COST_KIB} KiB",
                self.memory_cost_kib
            )));
        }
        if self.parallelism < MIN_PARALLELISM {
            return Err(CryptoError::DerivationFailed(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if self.output_len < MIN_OUTPUT_LEN {
            return Err(CryptoError::DerivationFailed(format!(
                "output length {} below minimum {MIN_OUTPUT_LEN}",
                self.output_len
            )));
        }
        Ok(())
    }
}

/// Raw KDF output. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedSecret(Vec<u8>);

impl std::fmt::Debug for DerivedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DerivedSecret({} bytes)", self.0.len())
    }
}

impl DerivedSecret {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Uses the whole output as a key of `algorithm`.
    pub fn into_key(self, algorithm: impl Into<KeyAlgorithm>) -> CryptoResult<KeyMaterial> {
        KeyMaterial::from_bytes(algorithm, &self.0)
    }

    /// Splits positionally: the first `key_len` bytes become the key, the
    /// remaining bytes become the passphrase verifier.
    pub fn split(
        self,
        algorithm: impl Into<KeyAlgorithm>,
    ) -> CryptoResult<(KeyMaterial, PassphraseVerifier)> {
        let algorithm = algorithm.into();
        let key_len = algorithm.key_len();
        if self.0.len() < key_len + MIN_OUTPUT_LEN as usize {
            return Err(CryptoError::DerivationFailed(format!(
                "{} bytes of output cannot hold a {key_len}-byte key and a verifier",
                self.0.len()
            )));
        }
        let (key_bytes, tag) = self.0.split_at(key_len);
        let key = KeyMaterial::from_bytes(algorithm, key_bytes)?;
        Ok((key, PassphraseVerifier(tag.to_vec())))
    }
}

/// Trailing KDF bytes persisted to check a passphrase before unwrapping.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct PassphraseVerifier(Vec<u8>);

impl PassphraseVerifier {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Constant-time comparison.
    pub fn matches(&self, other: &PassphraseVerifier) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl std::fmt::Debug for PassphraseVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PassphraseVerifier({} bytes)", self.0.len())
    }
}

/// Derives `params.output_len` bytes from a passphrase and salt.
pub fn derive(
    passphrase: &str,
    salt: &Salt,
    params: &DerivationParams,
) -> CryptoResult<DerivedSecret> {
    params.validate()?;
    let mut output = DerivedSecret(vec![0u8; params.output_len as usize]);
    params
        .algorithm
        .provider()
        .derive_into(passphrase.as_bytes(), salt.as_bytes(), params, &mut output.0)?;
    Ok(output)
}

/// Derives a key that uses the entire KDF output.
pub fn derive_key(
    passphrase: &str,
    salt: &Salt,
    params: &DerivationParams,
    algorithm: impl Into<KeyAlgorithm>,
) -> CryptoResult<KeyMaterial> {
    let algorithm = algorithm.into();
    if params.output_len as usize != algorithm.key_len() {
        return Err(CryptoError::DerivationFailed(format!(
            "output length {} does not match {algorithm} key length {}",
            params.output_len,
            algorithm.key_len()
        )));
    }
    derive(passphrase, salt, params)?.into_key(algorithm)
}
