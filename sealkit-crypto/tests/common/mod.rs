//! Shared helpers for integration tests.

use std::sync::OnceLock;

use sealkit_crypto::RsaOaepPrivateKey;
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly subscriber once; honours `RUST_LOG`.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A 2048-bit RSA key generated once per test binary.
#[allow(dead_code)]
pub fn rsa_key() -> &'static RsaOaepPrivateKey {
    static KEY: OnceLock<RsaOaepPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaOaepPrivateKey::generate(2048).expect("rsa keygen"))
}
