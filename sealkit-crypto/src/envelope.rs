//! Symmetric envelope: AEAD encryption with a self-describing framed output.
//!
//! Every blob is laid out as `nonce ‖ tag ‖ ciphertext`. The nonce length is
//! fixed by the AEAD algorithm (12 bytes for AES-GCM and ChaCha20-Poly1305,
//! 24 for XChaCha20-Poly1305) and the tag is always 16 bytes, so a blob can
//! be parsed positionally once the scheme is known. A fresh random nonce is
//! drawn from the OS CSPRNG for every seal.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{AeadAlgorithm, KeyMaterial, KeyUsages};
use crate::provider::AeadCipher;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Positional framing of an envelope for one AEAD scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeLayout {
    pub nonce_len: usize,
    pub tag_len: usize,
}

impl EnvelopeLayout {
    pub fn for_algorithm(algorithm: AeadAlgorithm) -> Self {
        Self {
            nonce_len: algorithm.nonce_len(),
            tag_len: algorithm.tag_len(),
        }
    }

    /// Smallest valid blob (an empty plaintext).
    pub fn header_len(&self) -> usize {
        self.nonce_len + self.tag_len
    }

    /// Splits a framed blob into `(nonce, tag, ciphertext)`.
    pub fn split<'a>(&self, blob: &'a [u8]) -> CryptoResult<(&'a [u8], &'a [u8], &'a [u8])> {
        if blob.len() < self.header_len() {
            return Err(CryptoError::MalformedEnvelope(format!(
                "blob is {} bytes, header needs {}",
                blob.len(),
                self.header_len()
            )));
        }
        let (nonce, rest) = blob.split_at(self.nonce_len);
        let (tag, ciphertext) = rest.split_at(self.tag_len);
        Ok((nonce, tag, ciphertext))
    }
}

/// Framed AEAD output: `nonce ‖ tag ‖ ciphertext`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvelopeBlob(Vec<u8>);

impl EnvelopeBlob {
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

    /// Nonce prefix under `layout`, if the blob is long enough.
    pub fn nonce(&self, layout: EnvelopeLayout) -> Option<&[u8]> {
        layout.split(&self.0).ok().map(|(nonce, _, _)| nonce)
    }
}

impl From<Vec<u8>> for EnvelopeBlob {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for EnvelopeBlob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Fills a fresh nonce of `len` bytes from the OS CSPRNG.
pub(crate) fn random_nonce(len: usize) -> Vec<u8> {
    let mut nonce = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Seals and opens envelopes under one AEAD scheme.
#[derive(Clone)]
pub struct SymmetricEnvelope {
    cipher: Arc<dyn AeadCipher>,
}

impl SymmetricEnvelope {
    pub fn new(algorithm: AeadAlgorithm) -> Self {
        Self {
            cipher: Arc::new(algorithm),
        }
    }

    /// Uses a caller-supplied cipher implementation.
    pub fn with_cipher(cipher: Arc<dyn AeadCipher>) -> Self {
        Self { cipher }
    }

    pub fn algorithm(&self) -> AeadAlgorithm {
        self.cipher.algorithm()
    }

    pub fn layout(&self) -> EnvelopeLayout {
        EnvelopeLayout::for_algorithm(self.algorithm())
    }

    pub(crate) fn cipher(&self) -> &dyn AeadCipher {
        self.cipher.as_ref()
    }

    /// Generates a fresh data key for this scheme.
    pub fn generate_key(&self) -> KeyMaterial {
        KeyMaterial::generate(self.algorithm())
    }

    pub fn seal(&self, key: &KeyMaterial, plaintext: &[u8]) -> CryptoResult<EnvelopeBlob> {
        self.seal_with_aad(key, plaintext, &[])
    }

    pub fn open(&self, key: &KeyMaterial, blob: &EnvelopeBlob) -> CryptoResult<Vec<u8>> {
        self.open_with_aad(key, blob, &[])
    }

    /// Seals `plaintext`, binding `aad` into the tag without encrypting it.
    pub fn seal_with_aad(
        &self,
        key: &KeyMaterial,
        plaintext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<EnvelopeBlob> {
        key.expect_algorithm(self.algorithm())?;
        key.require(KeyUsages::ENCRYPT)?;

        let layout = self.layout();
        let nonce = random_nonce(layout.nonce_len);

        let mut out = Vec::with_capacity(layout.header_len() + plaintext.len());
        out.extend_from_slice(&nonce);
        out.resize(layout.header_len(), 0);
        out.extend_from_slice(plaintext);

        let tag = self.cipher.seal_in_place(
            key.as_bytes(),
            &nonce,
            aad,
            &mut out[layout.header_len()..],
        )?;
        out[layout.nonce_len..layout.header_len()].copy_from_slice(&tag);

        Ok(EnvelopeBlob(out))
    }

    /// Opens a blob produced by [`seal_with_aad`](Self::seal_with_aad).
    ///
    /// Blobs shorter than the header fail with `MalformedEnvelope` before any
    /// cryptographic work. A failed tag check yields `AuthenticationFailed`
    /// and no plaintext.
    pub fn open_with_aad(
        &self,
        key: &KeyMaterial,
        blob: &EnvelopeBlob,
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let (nonce, tag, ciphertext) = self.layout().split(blob.as_bytes())?;
        key.expect_algorithm(self.algorithm())?;
        key.require(KeyUsages::DECRYPT)?;

        let mut buffer = ciphertext.to_vec();
        self.cipher
            .open_in_place(key.as_bytes(), nonce, aad, &mut buffer, tag)?;
        Ok(buffer)
    }
}

impl std::fmt::Debug for SymmetricEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricEnvelope")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

/// Seals with AES-256-GCM.
pub fn seal(key: &KeyMaterial, plaintext: &[u8]) -> CryptoResult<EnvelopeBlob> {
    SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).seal(key, plaintext)
}

/// Opens an AES-256-GCM envelope.
pub fn open(key: &KeyMaterial, blob: &EnvelopeBlob) -> CryptoResult<Vec<u8>> {
    SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).open(key, blob)
}
