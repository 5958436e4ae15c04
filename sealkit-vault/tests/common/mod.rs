//! Shared helpers for integration tests.

use sealkit_crypto::{DerivationParams, SuiteConfig};
use tracing_subscriber::EnvFilter;

/// Minimum Argon2id cost; keeps signup and login fast in tests.
#[allow(dead_code)]
pub const FAST_KDF: DerivationParams = DerivationParams::argon2id(3, 4096, 1, 48);

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn fast_config() -> SuiteConfig {
    SuiteConfig {
        kdf: FAST_KDF,
        ..SuiteConfig::default()
    }
}
