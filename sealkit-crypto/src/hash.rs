//! SHA-2 digests, one-shot and incremental.

use crate::error::CryptoResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::io::{ErrorKind, Read};

/// Supported digest algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha512::digest(data));
    out
}

/// One-shot digest as lowercase hex.
pub fn digest_hex(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => hex::encode(sha256(data)),
        HashAlgorithm::Sha512 => hex::encode(sha512(data)),
    }
}

/// SHA-256 fingerprint of a public key encoding, as hex.
pub fn fingerprint(public_key: &[u8]) -> String {
    digest_hex(HashAlgorithm::Sha256, public_key)
}

enum HasherState {
    Sha256(Sha256),
    Sha512(Sha512),
}

/// Incremental hasher: feed data with [`update`](Self::update), then
/// [`finish`](Self::finish) once.
pub struct StreamHasher {
    state: HasherState,
}

impl StreamHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => HasherState::Sha512(Sha512::new()),
        };
        Self { state }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self.state {
            HasherState::Sha256(_) => HashAlgorithm::Sha256,
            HasherState::Sha512(_) => HashAlgorithm::Sha512,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Sha256(h) => h.update(data),
            HasherState::Sha512(h) => h.update(data),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        match self.state {
            HasherState::Sha256(h) => h.finalize().to_vec(),
            HasherState::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// Hashes everything `reader` yields.
pub fn digest_reader<R: Read>(algorithm: HashAlgorithm, mut reader: R) -> CryptoResult<Vec<u8>> {
    let mut hasher = StreamHasher::new(algorithm);
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(hasher.finish())
}
