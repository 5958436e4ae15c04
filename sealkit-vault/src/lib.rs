//! Passphrase-protected profiles and short-lived agreement keys for SealKit.
//!
//! Everything here is stored through an injected [`KeyValueStore`]; the
//! in-process [`MemoryStore`] is enough for tests and single-process use.
//! Credential failures of every kind surface as
//! [`VaultError::InvalidCredentials`], with the real cause only in logs.

pub mod ephemeral;
mod error;
pub mod profile;
pub mod store;

pub use ephemeral::{EphemeralKeyRegistry, IssuedKey};
pub use error::{VaultError, VaultResult};
pub use profile::{PROFILE_FORMAT_VERSION, ProfileManager, UserProfile};
pub use store::{Clock, KeyValueStore, ManualClock, MemoryStore, SystemClock};
