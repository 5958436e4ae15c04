//! Primitive provider: capability traits over externally supplied ciphers.
//!
//! Nothing in this module implements a primitive. Each trait is a thin seam
//! over an audited RustCrypto crate so the envelope, wrap and hybrid layers
//! can be written once and the concrete algorithm chosen at construction.

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{DerivationParams, KdfAlgorithm};
use crate::key::{AeadAlgorithm, KeyWrapAlgorithm};
use aes_gcm::aead::{self, AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::{ChaCha20Poly1305, XChaCha20Poly1305};
use zeroize::Zeroizing;

/// Authenticated cipher operating on detached tags.
pub trait AeadCipher: Send + Sync {
    fn algorithm(&self) -> AeadAlgorithm;

    /// Encrypts `buffer` in place and returns the authentication tag.
    fn seal_in_place(
        &self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> CryptoResult<Vec<u8>>;

    /// Verifies `tag` and decrypts `buffer` in place.
    ///
    /// On failure the buffer contents are unspecified and must be discarded.
    fn open_in_place(
        &self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8],
    ) -> CryptoResult<()>;
}

/// Deterministic key-wrap cipher.
pub trait KeyWrapCipher: Send + Sync {
    fn algorithm(&self) -> KeyWrapAlgorithm;

    fn wrap(&self, kek: &[u8], key: &[u8]) -> CryptoResult<Vec<u8>>;

    fn unwrap(&self, kek: &[u8], wrapped: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>>;
}

/// Passphrase key derivation function.
pub trait Kdf: Send + Sync {
    fn algorithm(&self) -> KdfAlgorithm;

    /// Fills `output` (whose length must equal `params.output_len`).
    fn derive_into(
        &self,
        passphrase: &[u8],
        salt: &[u8],
        params: &DerivationParams,
        output: &mut [u8],
    ) -> CryptoResult<()>;
}

// ============================================================================
// AEAD
// ============================================================================

fn seal_detached<A: AeadInPlace + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    buffer: &mut [u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = A::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: A::key_size(),
        actual: key.len(),
    })?;
    let tag = cipher
        .encrypt_in_place_detached(aead::Nonce::<A>::from_slice(nonce), aad, buffer)
        .map_err(|e| CryptoError::Encryption(format!("AEAD seal failed: {e}")))?;
    Ok(tag.to_vec())
}

fn open_detached<A: AeadInPlace + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    buffer: &mut [u8],
    tag: &[u8],
) -> CryptoResult<()> {
    let cipher = A::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: A::key_size(),
        actual: key.len(),
    })?;
    cipher
        .decrypt_in_place_detached(
            aead::Nonce::<A>::from_slice(nonce),
            aad,
            buffer,
            aead::Tag::<A>::from_slice(tag),
        )
        .map_err(|_| CryptoError::AuthenticationFailed)
}

fn check_lengths(algorithm: AeadAlgorithm, nonce: &[u8], tag: Option<&[u8]>) -> CryptoResult<()> {
    if nonce.len() != algorithm.nonce_len() {
        return Err(CryptoError::MalformedEnvelope(format!(
            "{} nonce must be {} bytes, got {}",
            algorithm.name(),
            algorithm.nonce_len(),
            nonce.len()
        )));
    }
    if let Some(tag) = tag {
        if tag.len() != algorithm.tag_len() {
            return Err(CryptoError::MalformedEnvelope(format!(
                "tag must be {} bytes, got {}",
                algorithm.tag_len(),
                tag.len()
            )));
        }
    }
    Ok(())
}

impl AeadCipher for AeadAlgorithm {
    fn algorithm(&self) -> AeadAlgorithm {
        *self
    }

    fn seal_in_place(
        &self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> CryptoResult<Vec<u8>> {
        check_lengths(*self, nonce, None)?;
        match self {
            AeadAlgorithm::Aes128Gcm => seal_detached::<Aes128Gcm>(key, nonce, aad, buffer),
            AeadAlgorithm::Aes256Gcm => seal_detached::<Aes256Gcm>(key, nonce, aad, buffer),
            AeadAlgorithm::ChaCha20Poly1305 => {
                seal_detached::<ChaCha20Poly1305>(key, nonce, aad, buffer)
            }
            AeadAlgorithm::XChaCha20Poly1305 => {
                seal_detached::<XChaCha20Poly1305>(key, nonce, aad, buffer)
            }
        }
    }

    fn open_in_place(
        &self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8],
    ) -> CryptoResult<()> {
        check_lengths(*self, nonce, Some(tag))?;
        match self {
            AeadAlgorithm::Aes128Gcm => open_detached::<Aes128Gcm>(key, nonce, aad, buffer, tag),
            AeadAlgorithm::Aes256Gcm => open_detached::<Aes256Gcm>(key, nonce, aad, buffer, tag),
            AeadAlgorithm::ChaCha20Poly1305 => {
                open_detached::<ChaCha20Poly1305>(key, nonce, aad, buffer, tag)
            }
            AeadAlgorithm::XChaCha20Poly1305 => {
                open_detached::<XChaCha20Poly1305>(key, nonce, aad, buffer, tag)
            }
        }
    }
}

// ============================================================================
// AES key wrap (RFC 3394)
// ============================================================================

/// Length added to the wrapped output by the RFC 3394 integrity block.
pub const KEY_WRAP_OVERHEAD: usize = 8;

fn kw_error(e: aes_kw::Error) -> CryptoError {
    match e {
        aes_kw::Error::IntegrityCheckFailed => CryptoError::UnwrapFailed,
        other => CryptoError::Encryption(format!("key wrap failed: {other}")),
    }
}

impl KeyWrapCipher for KeyWrapAlgorithm {
    fn algorithm(&self) -> KeyWrapAlgorithm {
        *self
    }

    fn wrap(&self, kek: &[u8], key: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut out = vec![0u8; key.len() + KEY_WRAP_OVERHEAD];
        let result = match self {
            KeyWrapAlgorithm::Aes128Kw => {
                aes_kw::KekAes128::from(fixed_kek::<16>(kek)?).wrap(key, &mut out)
            }
            KeyWrapAlgorithm::Aes256Kw => {
                aes_kw::KekAes256::from(fixed_kek::<32>(kek)?).wrap(key, &mut out)
            }
        };
        result.map_err(kw_error)?;
        Ok(out)
    }

    fn unwrap(&self, kek: &[u8], wrapped: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
        // RFC 3394 needs at least two 64-bit blocks of key data plus the IV block.
        if wrapped.len() < 3 * KEY_WRAP_OVERHEAD || wrapped.len() % KEY_WRAP_OVERHEAD != 0 {
            return Err(CryptoError::UnwrapFailed);
        }
        let mut out = Zeroizing::new(vec![0u8; wrapped.len() - KEY_WRAP_OVERHEAD]);
        let result = match self {
            KeyWrapAlgorithm::Aes128Kw => {
                aes_kw::KekAes128::from(fixed_kek::<16>(kek)?).unwrap(wrapped, &mut out)
            }
            KeyWrapAlgorithm::Aes256Kw => {
                aes_kw::KekAes256::from(fixed_kek::<32>(kek)?).unwrap(wrapped, &mut out)
            }
        };
        result.map_err(kw_error)?;
        Ok(out)
    }
}

fn fixed_kek<const N: usize>(kek: &[u8]) -> CryptoResult<[u8; N]> {
    kek.try_into().map_err(|_| CryptoError::InvalidKeyLength {
        expected: N,
        actual: kek.len(),
    })
}

// ============================================================================
// Argon2id
// ============================================================================

/// Argon2id backed by the `argon2` crate. Every parameter is passed through
/// explicitly; no library default is ever consulted.
#[derive(Clone, Copy, Debug, Default)]
pub struct Argon2idKdf;

impl Kdf for Argon2idKdf {
    fn algorithm(&self) -> KdfAlgorithm {
        KdfAlgorithm::Argon2id
    }

    fn derive_into(
        &self,
        passphrase: &[u8],
        salt: &[u8],
        params: &DerivationParams,
        output: &mut [u8],
    ) -> CryptoResult<()> {
        if output.len() != params.output_len as usize {
            return Err(CryptoError::DerivationFailed(format!(
                "output buffer is {} bytes, parameters ask for {}",
                output.len(),
                params.output_len
            )));
        }
        let version = argon2::Version::try_from(params.version)
            .map_err(|e| CryptoError::DerivationFailed(format!("unsupported Argon2 version: {e}")))?;
        let argon_params = argon2::Params::new(
            params.memory_cost_kib,
            params.time_cost,
            params.parallelism,
            Some(params.output_len as usize),
        )
        .map_err(|e| CryptoError::DerivationFailed(format!("invalid Argon2 params: {e}")))?;

        argon2::Argon2::new(argon2::Algorithm::Argon2id, version, argon_params)
            .hash_password_into(passphrase, salt, output)
            .map_err(|e| CryptoError::DerivationFailed(format!("Argon2id failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aead_detached_roundtrip_for_every_algorithm() {
        for alg in AeadAlgorithm::ALL {
            let key = vec![7u8; alg.key_len()];
            let nonce = vec![1u8; alg.nonce_len()];
            let mut buf = b"detached".to_vec();

            let tag = alg.seal_in_place(&key, &nonce, b"aad", &mut buf).unwrap();
            assert_eq!(tag.len(), crate::key::TAG_SIZE);
            assert_ne!(buf, b"detached");

            alg.open_in_place(&key, &nonce, b"aad", &mut buf, &tag).unwrap();
            assert_eq!(buf, b"detached");
        }
    }

    #[test]
    fn aead_rejects_wrong_nonce_length() {
        let alg = AeadAlgorithm::Aes256Gcm;
        let mut buf = vec![0u8; 4];
        let err = alg
            .seal_in_place(&[0u8; 32], &[0u8; 24], b"", &mut buf)
            .unwrap_err();
        assert!(matches!(err, CryptoError::MalformedEnvelope(_)));
    }

    #[test]
    fn aead_rejects_wrong_key_length() {
        let alg = AeadAlgorithm::Aes256Gcm;
        let mut buf = vec![0u8; 4];
        let err = alg
            .seal_in_place(&[0u8; 16], &[0u8; 12], b"", &mut buf)
            .unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 16
            }
        ));
    }

    #[test]
    fn aes_kw_matches_rfc3394_vector() {
        // RFC 3394 section 4.1: 128-bit key data with a 128-bit KEK.
        let kek: Vec<u8> = (0u8..16).collect();
        let key = hex::decode("00112233445566778899aabbccddeeff").unwrap();
        let wrapped = KeyWrapAlgorithm::Aes128Kw.wrap(&kek, &key).unwrap();
        assert_eq!(
            hex::encode(&wrapped),
            "1fa68b0a8112b447aef34bd8fb5a7b829d3e862371d2cfe5"
        );
        let unwrapped = KeyWrapAlgorithm::Aes128Kw.unwrap(&kek, &wrapped).unwrap();
        assert_eq!(unwrapped.as_slice(), key.as_slice());
    }

    #[test]
    fn aes_kw_matches_rfc3394_256_bit_vector() {
        // RFC 3394 section 4.6: 256-bit key data with a 256-bit KEK.
        let kek: Vec<u8> = (0u8..32).collect();
        let key =
            hex::decode("00112233445566778899aabbccddeeff000102030405060708090a0b0c0d0e0f")
                .unwrap();
        let wrapped = KeyWrapAlgorithm::Aes256Kw.wrap(&kek, &key).unwrap();
        assert_eq!(
            hex::encode(&wrapped),
            "28c9f404c4b810f4cbccb35cfb87f8263f5786e2d80ed326cbc7f0e71a99f43bfb988b9b7a02dd21"
        );
    }

    #[test]
    fn aes_kw_integrity_failure_maps_to_unwrap_failed() {
        let kek = [3u8; 32];
        let mut wrapped = KeyWrapAlgorithm::Aes256Kw.wrap(&kek, &[9u8; 32]).unwrap();
        wrapped[0] ^= 0x01;
        let err = KeyWrapAlgorithm::Aes256Kw.unwrap(&kek, &wrapped).unwrap_err();
        assert!(matches!(err, CryptoError::UnwrapFailed));
    }

    #[test]
    fn aes_kw_rejects_short_input() {
        let err = KeyWrapAlgorithm::Aes256Kw
            .unwrap(&[0u8; 32], &[0u8; 8])
            .unwrap_err();
        assert!(matches!(err, CryptoError::UnwrapFailed));
    }
}
