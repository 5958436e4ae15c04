//! X25519 key agreement with HKDF-SHA256 key derivation.
//!
//! Both parties feed the same context string; the two public keys are
//! appended to the HKDF info in a fixed order, so either side derives the
//! same key regardless of who initiated.

use crate::asymmetric::X25519_KEY_SIZE;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{AeadAlgorithm, KeyMaterial};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// Long-lived or ephemeral X25519 keypair for agreement.
pub struct AgreementKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl AgreementKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn from_secret_bytes(bytes: [u8; X25519_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; X25519_KEY_SIZE]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    pub fn public_bytes(&self) -> [u8; X25519_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// ECDH with `peer_public`, then HKDF-SHA256 into a key for `algorithm`.
    ///
    /// A non-contributory exchange (low-order peer point) is rejected.
    pub fn derive_shared_key(
        &self,
        peer_public: &[u8; X25519_KEY_SIZE],
        context: &[u8],
        algorithm: AeadAlgorithm,
    ) -> CryptoResult<KeyMaterial> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*peer_public));
        if !shared.was_contributory() {
            return Err(CryptoError::KeyAgreement(
                "peer public key is a low-order point".to_string(),
            ));
        }

        let own = self.public.to_bytes();
        let (first, second) = if own <= *peer_public {
            (own, *peer_public)
        } else {
            (*peer_public, own)
        };
        let mut info = Vec::with_capacity(context.len() + 2 * X25519_KEY_SIZE);
        info.extend_from_slice(context);
        info.extend_from_slice(&first);
        info.extend_from_slice(&second);

        let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
        let mut okm = Zeroizing::new(vec![0u8; algorithm.key_len()]);
        hk.expand(&info, &mut okm)
            .map_err(|e| CryptoError::KeyAgreement(format!("HKDF expand failed: {e}")))?;
        KeyMaterial::from_bytes(algorithm, &okm)
    }
}

impl std::fmt::Debug for AgreementKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgreementKeyPair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .finish_non_exhaustive()
    }
}
