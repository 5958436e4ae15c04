//! Public-key encryption used to wrap data keys for a recipient.
//!
//! Two schemes are offered, fixed per key type:
//!
//! - **RSA-OAEP-SHA256** via `rsa`, keys encoded as PKCS#8 / SPKI DER.
//! - **X25519 sealed box** via `crypto_box`: a fresh ephemeral keypair per
//!   message, XSalsa20-Poly1305, output `ephemeral_pk(32) ‖ nonce(24) ‖ ct`.

use crate::error::{CryptoError, CryptoResult};
use crate::hash::fingerprint;
use crypto_box::aead::Aead;
use crypto_box::SalsaBox;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Smallest RSA modulus accepted for new keys.
pub const MIN_RSA_BITS: usize = 2048;

/// X25519 key length.
pub const X25519_KEY_SIZE: usize = 32;

const SEALED_BOX_NONCE_SIZE: usize = 24;
const SEALED_BOX_HEADER: usize = X25519_KEY_SIZE + SEALED_BOX_NONCE_SIZE;

/// Asymmetric wrapping scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AsymmetricScheme {
    RsaOaepSha256,
    X25519SealedBox,
}

impl AsymmetricScheme {
    pub fn name(self) -> &'static str {
        match self {
            AsymmetricScheme::RsaOaepSha256 => "RSA-OAEP-SHA256",
            AsymmetricScheme::X25519SealedBox => "X25519-SealedBox",
        }
    }
}

/// Public half: encrypts short secrets for the key holder.
pub trait AsymmetricEncryptor: Send + Sync {
    fn scheme(&self) -> AsymmetricScheme;

    /// Canonical public key encoding (SPKI DER or raw X25519 bytes).
    fn public_key_bytes(&self) -> CryptoResult<Vec<u8>>;

    /// SHA-256 fingerprint of [`public_key_bytes`](Self::public_key_bytes).
    fn key_id(&self) -> CryptoResult<String> {
        Ok(fingerprint(&self.public_key_bytes()?))
    }

    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// Private half.
pub trait AsymmetricDecryptor: Send + Sync {
    fn scheme(&self) -> AsymmetricScheme;

    /// Decrypts; any cipher-level failure is `UnwrapFailed`.
    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>>;
}

// ============================================================================
// RSA-OAEP-SHA256
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsaOaepPublicKey(RsaPublicKey);

impl RsaOaepPublicKey {
    pub fn from_public_key_der(der: &[u8]) -> CryptoResult<Self> {
        RsaPublicKey::from_public_key_der(der)
            .map(Self)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("invalid RSA public key: {e}")))
    }

    pub fn to_public_key_der(&self) -> CryptoResult<Vec<u8>> {
        self.0
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::KeyGeneration(format!("RSA public key encoding failed: {e}")))
    }

    pub fn bits(&self) -> usize {
        self.0.size() * 8
    }
}

impl AsymmetricEncryptor for RsaOaepPublicKey {
    fn scheme(&self) -> AsymmetricScheme {
        AsymmetricScheme::RsaOaepSha256
    }

    fn public_key_bytes(&self) -> CryptoResult<Vec<u8>> {
        self.to_public_key_der()
    }

    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        self.0
            .encrypt(&mut rand::rngs::OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| CryptoError::Encryption(format!("RSA-OAEP encryption failed: {e}")))
    }
}

/// RSA private key. Zeroized on drop by `rsa`.
pub struct RsaOaepPrivateKey(RsaPrivateKey);

impl RsaOaepPrivateKey {
    pub fn generate(bits: usize) -> CryptoResult<Self> {
        if bits < MIN_RSA_BITS {
            return Err(CryptoError::KeyGeneration(format!(
                "RSA modulus of {bits} bits is below the {MIN_RSA_BITS}-bit minimum"
            )));
        }
        RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
            .map(Self)
            .map_err(|e| CryptoError::KeyGeneration(format!("RSA key generation failed: {e}")))
    }

    pub fn from_pkcs8_der(der: &[u8]) -> CryptoResult<Self> {
        RsaPrivateKey::from_pkcs8_der(der)
            .map(Self)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("invalid RSA private key: {e}")))
    }

    pub fn to_pkcs8_der(&self) -> CryptoResult<Zeroizing<Vec<u8>>> {
        self.0
            .to_pkcs8_der()
            .map(|doc| Zeroizing::new(doc.as_bytes().to_vec()))
            .map_err(|e| CryptoError::KeyGeneration(format!("RSA private key encoding failed: {e}")))
    }

    pub fn public_key(&self) -> RsaOaepPublicKey {
        RsaOaepPublicKey(self.0.to_public_key())
    }
}

impl AsymmetricDecryptor for RsaOaepPrivateKey {
    fn scheme(&self) -> AsymmetricScheme {
        AsymmetricScheme::RsaOaepSha256
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
        self.0
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::UnwrapFailed)
    }
}

impl std::fmt::Debug for RsaOaepPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaOaepPrivateKey")
            .field("bits", &(self.0.size() * 8))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// X25519 sealed box
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct X25519PublicKey(crypto_box::PublicKey);

impl X25519PublicKey {
    pub fn from_bytes(bytes: [u8; X25519_KEY_SIZE]) -> Self {
        Self(crypto_box::PublicKey::from(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; X25519_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: X25519_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self::from_bytes(arr))
    }

    pub fn to_bytes(&self) -> [u8; X25519_KEY_SIZE] {
        *self.0.as_bytes()
    }
}

impl AsymmetricEncryptor for X25519PublicKey {
    fn scheme(&self) -> AsymmetricScheme {
        AsymmetricScheme::X25519SealedBox
    }

    fn public_key_bytes(&self) -> CryptoResult<Vec<u8>> {
        Ok(self.to_bytes().to_vec())
    }

    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let ephemeral = crypto_box::SecretKey::generate(&mut rand::rngs::OsRng);
        let ephemeral_pk = ephemeral.public_key();
        let salsa_box = SalsaBox::new(&self.0, &ephemeral);

        let mut nonce = [0u8; SEALED_BOX_NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let ciphertext = salsa_box
            .encrypt(crypto_box::Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::Encryption(format!("sealed box failed: {e}")))?;

        let mut out = Vec::with_capacity(SEALED_BOX_HEADER + ciphertext.len());
        out.extend_from_slice(ephemeral_pk.as_bytes());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }
}

/// X25519 secret key. Zeroized on drop by `crypto_box`.
pub struct X25519SecretKey(crypto_box::SecretKey);

impl X25519SecretKey {
    pub fn generate() -> Self {
        Self(crypto_box::SecretKey::generate(&mut rand::rngs::OsRng))
    }

    pub fn from_bytes(bytes: [u8; X25519_KEY_SIZE]) -> Self {
        Self(crypto_box::SecretKey::from(bytes))
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; X25519_KEY_SIZE]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey(self.0.public_key())
    }
}

impl AsymmetricDecryptor for X25519SecretKey {
    fn scheme(&self) -> AsymmetricScheme {
        AsymmetricScheme::X25519SealedBox
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
        if ciphertext.len() < SEALED_BOX_HEADER {
            return Err(CryptoError::MalformedEnvelope(format!(
                "sealed box is {} bytes, header needs {SEALED_BOX_HEADER}",
                ciphertext.len()
            )));
        }
        let (epk, rest) = ciphertext.split_at(X25519_KEY_SIZE);
        let (nonce, sealed) = rest.split_at(SEALED_BOX_NONCE_SIZE);

        let mut epk_bytes = [0u8; X25519_KEY_SIZE];
        epk_bytes.copy_from_slice(epk);
        let ephemeral_pk = crypto_box::PublicKey::from(epk_bytes);
        let salsa_box = SalsaBox::new(&ephemeral_pk, &self.0);

        salsa_box
            .decrypt(crypto_box::Nonce::from_slice(nonce), sealed)
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::UnwrapFailed)
    }
}

impl std::fmt::Debug for X25519SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X25519SecretKey")
            .field("public", &hex::encode(self.public_key().to_bytes()))
            .finish_non_exhaustive()
    }
}
