//! Hybrid encryption: a fresh data key per message, sealed with the
//! symmetric envelope and wrapped to the recipient's public key.
//!
//! The envelope and the wrapped key are returned as separate values and are
//! never concatenated. Opening collapses every failure into
//! `HybridDecryptionFailed` so a caller cannot tell which stage rejected the
//! input; the actual cause is only logged at debug level.

use crate::asymmetric::{AsymmetricDecryptor, AsymmetricEncryptor};
use crate::envelope::{EnvelopeBlob, SymmetricEnvelope};
use crate::error::{CryptoError, CryptoResult};
use crate::key::AeadAlgorithm;
use crate::wrap::{self, WrappedKey, WrappedKeyInfo};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct HybridEnvelope {
    envelope: SymmetricEnvelope,
}

impl HybridEnvelope {
    pub fn new(algorithm: AeadAlgorithm) -> Self {
        Self::with_envelope(SymmetricEnvelope::new(algorithm))
    }

    pub fn with_envelope(envelope: SymmetricEnvelope) -> Self {
        Self { envelope }
    }

    pub fn algorithm(&self) -> AeadAlgorithm {
        self.envelope.algorithm()
    }

    pub fn seal(
        &self,
        recipient: &dyn AsymmetricEncryptor,
        plaintext: &[u8],
    ) -> CryptoResult<(EnvelopeBlob, WrappedKey)> {
        self.seal_with_aad(recipient, plaintext, &[])
    }

    pub fn seal_with_aad(
        &self,
        recipient: &dyn AsymmetricEncryptor,
        plaintext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<(EnvelopeBlob, WrappedKey)> {
        let data_key = self.envelope.generate_key();
        let blob = self.envelope.seal_with_aad(&data_key, plaintext, aad)?;
        let wrapped = wrap::wrap_for_recipient(recipient, &data_key)?;
        Ok((blob, wrapped))
    }

    pub fn open(
        &self,
        private: &dyn AsymmetricDecryptor,
        blob: &EnvelopeBlob,
        wrapped: &WrappedKey,
    ) -> CryptoResult<Vec<u8>> {
        self.open_with_aad(private, blob, wrapped, &[])
    }

    /// Unwraps the data key, then opens the envelope.
    pub fn open_with_aad(
        &self,
        private: &dyn AsymmetricDecryptor,
        blob: &EnvelopeBlob,
        wrapped: &WrappedKey,
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let data_key = wrap::unwrap_with_private(private, wrapped, self.algorithm()).map_err(
            |e| {
                debug!(scheme = private.scheme().name(), "hybrid open: key unwrap failed: {e}");
                CryptoError::HybridDecryptionFailed
            },
        )?;
        self.envelope
            .open_with_aad(&data_key, blob, aad)
            .map_err(|e| {
                debug!(aead = self.algorithm().name(), "hybrid open: envelope rejected: {e}");
                CryptoError::HybridDecryptionFailed
            })
    }

    /// Metadata to store next to a wrapped key produced for `recipient`.
    pub fn wrapped_key_info(
        &self,
        recipient: &dyn AsymmetricEncryptor,
    ) -> CryptoResult<WrappedKeyInfo> {
        WrappedKeyInfo::for_recipient(self.algorithm(), recipient)
    }
}
