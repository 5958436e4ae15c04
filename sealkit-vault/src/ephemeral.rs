//! Short-lived X25519 keys for one-shot key agreement.
//!
//! [`EphemeralKeyRegistry::issue`] hands out a public key and an id; the
//! secret half waits in the store until the peer answers. `complete`
//! consumes the entry, so every issued key yields at most one shared key.
//! Unanswered keys expire after the configured TTL.

use crate::error::{VaultError, VaultResult};
use crate::store::KeyValueStore;
use chrono::Duration;
use sealkit_crypto::agreement::AgreementKeyPair;
use sealkit_crypto::asymmetric::X25519_KEY_SIZE;
use sealkit_crypto::{AeadAlgorithm, KeyMaterial, SuiteConfig};
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

const EPHEMERAL_PREFIX: &str = "ephemeral:";

/// Public half of an issued key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedKey {
    pub id: String,
    pub public_key: [u8; X25519_KEY_SIZE],
    pub expires_in: Duration,
}

pub struct EphemeralKeyRegistry<S: KeyValueStore> {
    store: S,
    ttl: Duration,
    algorithm: AeadAlgorithm,
}

impl<S: KeyValueStore> EphemeralKeyRegistry<S> {
    pub fn new(store: S, ttl: Duration, algorithm: AeadAlgorithm) -> Self {
        Self {
            store,
            ttl,
            algorithm,
        }
    }

    pub fn from_config(store: S, config: &SuiteConfig) -> VaultResult<Self> {
        config.validate()?;
        let secs = i64::try_from(config.ephemeral_ttl_secs)
            .map_err(|_| VaultError::Storage("ephemeral TTL out of range".to_string()))?;
        let ttl = Duration::try_seconds(secs)
            .ok_or_else(|| VaultError::Storage("ephemeral TTL out of range".to_string()))?;
        Ok(Self::new(store, ttl, config.aead))
    }

    fn storage_key(id: &str) -> String {
        format!("{EPHEMERAL_PREFIX}{id}")
    }

    /// Generates a keypair and parks the secret half until `complete`.
    pub fn issue(&self) -> VaultResult<IssuedKey> {
        let pair = AgreementKeyPair::generate();
        let id = Uuid::new_v4().to_string();
        self.store.put(
            &Self::storage_key(&id),
            pair.secret_bytes().to_vec(),
            Some(self.ttl),
        )?;
        debug!("issued ephemeral key {id}");
        Ok(IssuedKey {
            id,
            public_key: pair.public_bytes(),
            expires_in: self.ttl,
        })
    }

    /// Consumes the key `id` and derives the shared key with `peer_public`.
    ///
    /// A second call with the same id, or a call after expiry, fails with
    /// `EphemeralKeyNotFound`.
    pub fn complete(
        &self,
        id: &str,
        peer_public: &[u8; X25519_KEY_SIZE],
        context: &[u8],
    ) -> VaultResult<KeyMaterial> {
        let raw = Zeroizing::new(
            self.store
                .take(&Self::storage_key(id))?
                .ok_or_else(|| VaultError::EphemeralKeyNotFound(id.to_string()))?,
        );
        let mut secret = Zeroizing::new([0u8; X25519_KEY_SIZE]);
        if raw.len() != X25519_KEY_SIZE {
            return Err(VaultError::Storage(format!(
                "ephemeral key {id} has {} bytes",
                raw.len()
            )));
        }
        secret.copy_from_slice(&raw);

        let pair = AgreementKeyPair::from_secret_bytes(*secret);
        let key = pair.derive_shared_key(peer_public, context, self.algorithm)?;
        debug!("completed ephemeral key {id}");
        Ok(key)
    }

    /// Drops expired entries from the backing store.
    pub fn purge_expired(&self) -> VaultResult<usize> {
        self.store.purge_expired()
    }
}
