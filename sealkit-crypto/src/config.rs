//! Suite configuration for *new* keys and derivations.
//!
//! Existing ciphertexts and profiles always carry their own parameters;
//! this only decides what gets used the next time something is created.

use crate::asymmetric::{AsymmetricScheme, MIN_RSA_BITS};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::DerivationParams;
use crate::key::{AeadAlgorithm, KeyAlgorithm, KeyWrapAlgorithm};
use crate::stream::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};

/// Argon2id parameters used for new passphrase derivations: 64 MiB, 3 passes,
/// 64 bytes of output (a 32-byte KEK plus a 32-byte verifier).
pub const RECOMMENDED_KDF: DerivationParams = DerivationParams::argon2id(3, 64 * 1024, 4, 64);

/// Longest lifetime accepted for ephemeral agreement keys (one day).
pub const MAX_EPHEMERAL_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    pub aead: AeadAlgorithm,
    pub key_wrap: KeyWrapAlgorithm,
    pub asymmetric: AsymmetricScheme,
    pub rsa_bits: usize,
    pub kdf: DerivationParams,
    pub stream_chunk_size: usize,
    pub min_passphrase_len: usize,
    /// Lifetime of ephemeral agreement keys, in seconds.
    pub ephemeral_ttl_secs: u64,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            aead: AeadAlgorithm::Aes256Gcm,
            key_wrap: KeyWrapAlgorithm::Aes256Kw,
            asymmetric: AsymmetricScheme::X25519SealedBox,
            rsa_bits: 3072,
            kdf: RECOMMENDED_KDF,
            stream_chunk_size: DEFAULT_CHUNK_SIZE,
            min_passphrase_len: 8,
            ephemeral_ttl_secs: 300,
        }
    }
}

impl SuiteConfig {
    pub fn validate(&self) -> CryptoResult<()> {
        self.kdf
            .validate()
            .map_err(|e| CryptoError::Config(e.to_string()))?;

        let kek: KeyAlgorithm = self.key_wrap.into();
        let needed = kek.key_len() + crate::kdf::MIN_OUTPUT_LEN as usize;
        if (self.kdf.output_len as usize) < needed {
            return Err(CryptoError::Config(format!(
                "kdf output of {} bytes cannot hold a {kek} key and a verifier ({needed} needed)",
                self.kdf.output_len
            )));
        }
        if self.rsa_bits < MIN_RSA_BITS {
            return Err(CryptoError::Config(format!(
                "rsa_bits {} below minimum {MIN_RSA_BITS}",
                self.rsa_bits
            )));
        }
        if self.stream_chunk_size == 0 || self.stream_chunk_size > u32::MAX as usize {
            return Err(CryptoError::Config(format!(
                "stream_chunk_size {} out of range",
                self.stream_chunk_size
            )));
        }
        if self.min_passphrase_len == 0 {
            return Err(CryptoError::Config(
                "min_passphrase_len must be at least 1".to_string(),
            ));
        }
        if self.ephemeral_ttl_secs == 0 || self.ephemeral_ttl_secs > MAX_EPHEMERAL_TTL_SECS {
            return Err(CryptoError::Config(format!(
                "ephemeral_ttl_secs {} out of range (1..={MAX_EPHEMERAL_TTL_SECS})",
                self.ephemeral_ttl_secs
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON config.
    pub fn from_json(json: &str) -> CryptoResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CryptoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CryptoError::Config(e.to_string()))
    }
}
