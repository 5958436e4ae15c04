use sealkit_crypto::CryptoError;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Wrong passphrase, unknown user or damaged profile; deliberately
    /// indistinguishable to the caller.
    #[error("incorrect passphrase or corrupted data")]
    InvalidCredentials,
    #[error("user already exists: {0}")]
    UserExists(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("passphrase too short (min {0} characters)")]
    PassphraseTooShort(usize),
    #[error("unsupported profile format version {0}")]
    UnsupportedFormat(u32),
    #[error("ephemeral key not found or expired: {0}")]
    EphemeralKeyNotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("crypto error: {0}")]
    Crypto(#[source] CryptoError),
}

pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Maps a crypto failure on a credential path. Integrity failures become
    /// [`VaultError::InvalidCredentials`]; the precise cause is only logged.
    pub(crate) fn from_credential_failure(user: &str, err: CryptoError) -> Self {
        if err.is_integrity_failure() {
            match err {
                CryptoError::InvalidPassphrase => warn!("rejected passphrase for {user}"),
                ref other => {
                    warn!("rejected credentials for {user}");
                    debug!("profile for {user} failed integrity check: {other}");
                }
            }
            VaultError::InvalidCredentials
        } else {
            VaultError::Crypto(err)
        }
    }
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        VaultError::Crypto(err)
    }
}
