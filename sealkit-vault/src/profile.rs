//! Passphrase-protected user profiles.
//!
//! Each user gets a random working key at signup. The key never leaves the
//! profile in plaintext: it is wrapped under a KEK derived from the
//! passphrase, and the profile stores the salt, the wrapped key, the
//! passphrase verifier and every parameter needed to repeat the derivation.
//! Changing the passphrase re-wraps the same working key, so data sealed
//! under it stays readable.

use crate::error::{VaultError, VaultResult};
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use sealkit_crypto::kdf;
use sealkit_crypto::wrap::{self, PassphraseWrappedKey};
use sealkit_crypto::{
    DerivationParams, EnvelopeBlob, KeyAlgorithm, KeyMaterial, KeyWrapAlgorithm,
    PassphraseVerifier, Salt, SuiteConfig, SymmetricEnvelope, WrappedKey,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Current on-disk profile layout.
pub const PROFILE_FORMAT_VERSION: u32 = 1;

const PROFILE_PREFIX: &str = "profile:";

/// Persisted per-user record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub salt: Salt,
    pub wrapped_key: WrappedKey,
    pub passphrase_verifier: PassphraseVerifier,
    pub kdf: DerivationParams,
    pub key_algorithm: KeyAlgorithm,
    pub wrap_algorithm: KeyWrapAlgorithm,
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    fn stored_key(&self) -> PassphraseWrappedKey {
        PassphraseWrappedKey {
            wrapped: self.wrapped_key.clone(),
            verifier: self.passphrase_verifier.clone(),
        }
    }
}

/// Signup, login and passphrase rotation over an injected store.
pub struct ProfileManager<S: KeyValueStore> {
    store: S,
    config: SuiteConfig,
}

impl<S: KeyValueStore> ProfileManager<S> {
    pub fn new(store: S, config: SuiteConfig) -> VaultResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn storage_key(user: &str) -> String {
        format!("{PROFILE_PREFIX}{user}")
    }

    fn check_passphrase_len(&self, passphrase: &str) -> VaultResult<()> {
        if passphrase.chars().count() < self.config.min_passphrase_len {
            return Err(VaultError::PassphraseTooShort(self.config.min_passphrase_len));
        }
        Ok(())
    }

    fn wrap_for_profile(
        &self,
        passphrase: &str,
        key: &KeyMaterial,
    ) -> VaultResult<(Salt, PassphraseWrappedKey)> {
        let salt = Salt::random();
        let stored = wrap::wrap_with_passphrase(
            passphrase,
            &salt,
            &self.config.kdf,
            self.config.key_wrap,
            key,
        )?;
        Ok((salt, stored))
    }

    fn save(&self, user: &str, profile: &UserProfile) -> VaultResult<()> {
        let bytes = serde_json::to_vec(profile)?;
        self.store.put(&Self::storage_key(user), bytes, None)
    }

    /// Loads the stored profile.
    pub fn profile(&self, user: &str) -> VaultResult<UserProfile> {
        let bytes = self
            .store
            .get(&Self::storage_key(user))?
            .ok_or_else(|| VaultError::UserNotFound(user.to_string()))?;
        let profile: UserProfile = serde_json::from_slice(&bytes)?;
        if profile.format_version > PROFILE_FORMAT_VERSION {
            return Err(VaultError::UnsupportedFormat(profile.format_version));
        }
        Ok(profile)
    }

    pub fn exists(&self, user: &str) -> VaultResult<bool> {
        self.store.contains(&Self::storage_key(user))
    }

    /// Creates a profile with a fresh working key and returns that key.
    pub fn signup(&self, user: &str, passphrase: &str) -> VaultResult<KeyMaterial> {
        self.check_passphrase_len(passphrase)?;

        let key = KeyMaterial::generate(self.config.aead);
        let (salt, stored) = self.wrap_for_profile(passphrase, &key)?;
        let profile = UserProfile {
            salt,
            wrapped_key: stored.wrapped,
            passphrase_verifier: stored.verifier,
            kdf: self.config.kdf,
            key_algorithm: key.algorithm(),
            wrap_algorithm: self.config.key_wrap,
            format_version: PROFILE_FORMAT_VERSION,
            created_at: Utc::now(),
            rotated_at: None,
        };

        let bytes = serde_json::to_vec(&profile)?;
        if !self
            .store
            .put_if_absent(&Self::storage_key(user), bytes, None)?
        {
            return Err(VaultError::UserExists(user.to_string()));
        }
        info!("created profile for {user} ({})", profile.key_algorithm);
        Ok(key)
    }

    /// Re-derives the KEK from the persisted parameters and unwraps the
    /// working key. Unknown users and wrong passphrases fail identically.
    pub fn login(&self, user: &str, passphrase: &str) -> VaultResult<KeyMaterial> {
        let profile = self.credential_profile(user, passphrase)?;
        self.unlock(user, passphrase, &profile)
    }

    /// Loads the profile for a passphrase flow. A missing, unreadable or
    /// unsupported record fails as `InvalidCredentials` after the same
    /// derivation work a wrong passphrase costs.
    fn credential_profile(&self, user: &str, passphrase: &str) -> VaultResult<UserProfile> {
        match self.profile(user) {
            Ok(profile) => Ok(profile),
            Err(
                e @ (VaultError::UserNotFound(_)
                | VaultError::Serialization(_)
                | VaultError::UnsupportedFormat(_)),
            ) => {
                warn!("rejected credentials for {user}");
                debug!("no usable profile for {user}: {e}");
                if let Err(e) = kdf::derive(passphrase, &Salt::random(), &self.config.kdf) {
                    debug!("placeholder derivation failed: {e}");
                }
                Err(VaultError::InvalidCredentials)
            }
            Err(e) => Err(e),
        }
    }

    fn unlock(&self, user: &str, passphrase: &str, profile: &UserProfile) -> VaultResult<KeyMaterial> {
        wrap::unwrap_with_passphrase(
            passphrase,
            &profile.salt,
            &profile.kdf,
            profile.wrap_algorithm,
            &profile.stored_key(),
            profile.key_algorithm,
        )
        .map_err(|e| VaultError::from_credential_failure(user, e))
    }

    /// Re-wraps the same working key under `new_passphrase` with a new salt
    /// and the currently configured parameters.
    pub fn rotate_passphrase(
        &self,
        user: &str,
        old_passphrase: &str,
        new_passphrase: &str,
    ) -> VaultResult<()> {
        let profile = self.credential_profile(user, old_passphrase)?;
        let key = self.unlock(user, old_passphrase, &profile)?;
        self.check_passphrase_len(new_passphrase)?;

        let (salt, stored) = self.wrap_for_profile(new_passphrase, &key)?;
        let rotated = UserProfile {
            salt,
            wrapped_key: stored.wrapped,
            passphrase_verifier: stored.verifier,
            kdf: self.config.kdf,
            wrap_algorithm: self.config.key_wrap,
            format_version: PROFILE_FORMAT_VERSION,
            rotated_at: Some(Utc::now()),
            ..profile
        };
        self.save(user, &rotated)?;
        info!("rotated passphrase for {user}");
        Ok(())
    }

    /// True when the profile was written with parameters other than the
    /// ones currently configured. A rotation brings it up to date.
    pub fn needs_migration(&self, user: &str) -> VaultResult<bool> {
        let profile = self.profile(user)?;
        let stale = profile.kdf != self.config.kdf
            || profile.wrap_algorithm != self.config.key_wrap
            || profile.format_version < PROFILE_FORMAT_VERSION;
        if stale {
            debug!("profile for {user} uses outdated parameters");
        }
        Ok(stale)
    }

    /// Removes the profile after checking the passphrase.
    pub fn delete(&self, user: &str, passphrase: &str) -> VaultResult<()> {
        self.login(user, passphrase)?;
        if !self.store.delete(&Self::storage_key(user))? {
            return Err(VaultError::UserNotFound(user.to_string()));
        }
        info!("deleted profile for {user}");
        Ok(())
    }

    fn envelope_for(&self, key: &KeyMaterial) -> VaultResult<SymmetricEnvelope> {
        match key.algorithm() {
            KeyAlgorithm::Aead(algorithm) => Ok(SymmetricEnvelope::new(algorithm)),
            other => Err(VaultError::Storage(format!(
                "profile key algorithm {other} cannot seal data"
            ))),
        }
    }

    /// Seals `plaintext` under the user's working key.
    pub fn seal_for_user(
        &self,
        user: &str,
        passphrase: &str,
        plaintext: &[u8],
    ) -> VaultResult<EnvelopeBlob> {
        let key = self.login(user, passphrase)?;
        Ok(self.envelope_for(&key)?.seal(&key, plaintext)?)
    }

    /// Opens a blob sealed by [`seal_for_user`](Self::seal_for_user).
    pub fn open_for_user(
        &self,
        user: &str,
        passphrase: &str,
        blob: &EnvelopeBlob,
    ) -> VaultResult<Vec<u8>> {
        let key = self.login(user, passphrase)?;
        self.envelope_for(&key)?
            .open(&key, blob)
            .map_err(|e| VaultError::from_credential_failure(user, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn fast_config() -> SuiteConfig {
        SuiteConfig {
            kdf: DerivationParams::argon2id(3, 4096, 1, 48),
            ..SuiteConfig::default()
        }
    }

    #[test]
    fn profile_json_keeps_field_names() {
        let manager = ProfileManager::new(MemoryStore::new(), fast_config()).unwrap();
        manager.signup("alice", "long enough").unwrap();
        let raw = manager.store().get("profile:alice").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        for field in [
            "salt",
            "wrapped_key",
            "passphrase_verifier",
            "kdf",
            "key_algorithm",
            "wrap_algorithm",
            "format_version",
            "created_at",
            "rotated_at",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["salt"].as_array().unwrap().len(), 16);
        assert_eq!(json["passphrase_verifier"].as_array().unwrap().len(), 16);
    }

    #[test]
    fn future_format_is_rejected() {
        let manager = ProfileManager::new(MemoryStore::new(), fast_config()).unwrap();
        manager.signup("bob", "long enough").unwrap();
        let mut profile = manager.profile("bob").unwrap();
        profile.format_version = PROFILE_FORMAT_VERSION + 1;
        manager.save("bob", &profile).unwrap();
        assert!(matches!(
            manager.profile("bob"),
            Err(VaultError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SuiteConfig {
            min_passphrase_len: 0,
            ..fast_config()
        };
        assert!(ProfileManager::new(MemoryStore::new(), config).is_err());
    }
}
