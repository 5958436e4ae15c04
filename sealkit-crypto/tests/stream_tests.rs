//! Streaming envelope: record framing, truncation and reordering, source
//! failures and file-backed round trips.

mod common;

use std::io::{self, Cursor, Read, Write};

use sealkit_crypto::stream::{open_stream, seal_stream};
use sealkit_crypto::{
    AeadAlgorithm, CryptoError, EnvelopeStream, OperationState, SymmetricEnvelope,
};

const CHUNK: usize = 4;
const RECORD: usize = 1 + 4 + 16 + CHUNK;
const NONCE: usize = 12;

fn small_stream() -> EnvelopeStream {
    EnvelopeStream::new(SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm))
        .with_chunk_size(CHUNK)
        .unwrap()
}

fn seal_bytes(stream: &EnvelopeStream, key: &sealkit_crypto::KeyMaterial, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    stream.seal(key, data, &mut out).unwrap();
    out
}

/// Reader that yields `data` up to `fail_after` bytes, then errors.
struct FailingReader {
    data: Vec<u8>,
    pos: usize,
    fail_after: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.fail_after {
            return Err(io::Error::other("source went away"));
        }
        let end = (self.pos + buf.len()).min(self.fail_after).min(self.data.len());
        let n = end - self.pos;
        buf[..n].copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(n)
    }
}

/// Reader that reports `Interrupted` before every successful read.
struct InterruptingReader {
    inner: Cursor<Vec<u8>>,
    interrupt_next: bool,
}

impl Read for InterruptingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.interrupt_next {
            self.interrupt_next = false;
            return Err(io::ErrorKind::Interrupted.into());
        }
        self.interrupt_next = true;
        self.inner.read(buf)
    }
}

// ── Round Trips ──

#[test]
fn roundtrip_across_chunk_boundaries() {
    common::init_tracing();
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();

    for len in [0usize, 1, CHUNK - 1, CHUNK, CHUNK + 1, 3 * CHUNK, 3 * CHUNK + 2] {
        let data: Vec<u8> = (0..len as u8).collect();
        let sealed = seal_bytes(&stream, &key, &data);
        let mut opened = Vec::new();
        let written = stream.open(&key, sealed.as_slice(), &mut opened).unwrap();
        assert_eq!(opened, data, "len {len}");
        assert_eq!(written, len as u64);
    }
}

#[test]
fn empty_source_still_gets_final_record() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let sealed = seal_bytes(&stream, &key, b"");
    assert_eq!(sealed.len(), NONCE + 1 + 4 + 16);
    assert_eq!(sealed[NONCE], 1, "only record is the final one");
}

#[test]
fn default_drivers_roundtrip_every_algorithm() {
    for alg in AeadAlgorithm::ALL {
        let env = SymmetricEnvelope::new(alg);
        let key = env.generate_key();
        let data = vec![7u8; 200_000];
        let mut sealed = Vec::new();
        seal_stream(&env, &key, data.as_slice(), &mut sealed).unwrap();
        let mut opened = Vec::new();
        open_stream(&env, &key, sealed.as_slice(), &mut opened).unwrap();
        assert_eq!(opened, data, "{alg:?}");
    }
}

#[test]
fn file_backed_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let plain_path = dir.path().join("plain.bin");
    let sealed_path = dir.path().join("sealed.bin");
    let opened_path = dir.path().join("opened.bin");

    let data: Vec<u8> = (0..150_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&plain_path, &data).unwrap();

    let env = SymmetricEnvelope::new(AeadAlgorithm::XChaCha20Poly1305);
    let key = env.generate_key();
    let stream = EnvelopeStream::new(env);

    let written = stream
        .seal(
            &key,
            std::fs::File::open(&plain_path).unwrap(),
            std::fs::File::create(&sealed_path).unwrap(),
        )
        .unwrap();
    assert_eq!(written, std::fs::metadata(&sealed_path).unwrap().len());

    stream
        .open(
            &key,
            std::fs::File::open(&sealed_path).unwrap(),
            std::fs::File::create(&opened_path).unwrap(),
        )
        .unwrap();
    assert_eq!(std::fs::read(&opened_path).unwrap(), data);
}

#[test]
fn interrupted_reads_are_retried() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let reader = InterruptingReader {
        inner: Cursor::new(b"interrupted but complete".to_vec()),
        interrupt_next: true,
    };
    let mut sealed = Vec::new();
    stream.seal(&key, reader, &mut sealed).unwrap();
    let mut opened = Vec::new();
    stream.open(&key, sealed.as_slice(), &mut opened).unwrap();
    assert_eq!(opened, b"interrupted but complete");
}

// ── Source Failures ──

#[test]
fn read_error_aborts_without_final_record() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let reader = FailingReader {
        data: vec![9u8; 64],
        pos: 0,
        fail_after: 10,
    };
    let mut partial = Vec::new();
    let err = stream.seal(&key, reader, &mut partial).unwrap_err();
    assert!(matches!(err, CryptoError::Io(_)));
    assert!(!partial.is_empty());

    let mut opened = Vec::new();
    let err = stream.open(&key, partial.as_slice(), &mut opened).unwrap_err();
    assert!(matches!(err, CryptoError::MalformedEnvelope(_)), "got {err:?}");
}

#[test]
fn failing_writer_surfaces_io_error() {
    struct BrokenWriter;
    impl Write for BrokenWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let err = stream.seal(&key, &b"data"[..], BrokenWriter).unwrap_err();
    assert!(matches!(err, CryptoError::Io(_)));
}

// ── Tampering ──

#[test]
fn dropping_final_record_is_malformed() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let mut sealed = seal_bytes(&stream, &key, b"abcdefghijkl");
    assert_eq!(sealed.len(), NONCE + 3 * RECORD);
    sealed.truncate(NONCE + 2 * RECORD);

    let err = stream.open(&key, sealed.as_slice(), io::sink()).unwrap_err();
    assert!(matches!(err, CryptoError::MalformedEnvelope(_)));
}

#[test]
fn truncation_inside_record_is_malformed() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let mut sealed = seal_bytes(&stream, &key, b"abcdefgh");
    sealed.pop();
    let err = stream.open(&key, sealed.as_slice(), io::sink()).unwrap_err();
    assert!(matches!(err, CryptoError::MalformedEnvelope(_)));
}

#[test]
fn trailing_bytes_after_final_record_are_malformed() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let mut sealed = seal_bytes(&stream, &key, b"abcdefgh");
    sealed.push(0);
    let err = stream.open(&key, sealed.as_slice(), io::sink()).unwrap_err();
    assert!(matches!(err, CryptoError::MalformedEnvelope(_)));
}

#[test]
fn reordered_records_fail_authentication() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let sealed = seal_bytes(&stream, &key, b"abcdefghijkl");

    let mut swapped = sealed[..NONCE].to_vec();
    swapped.extend_from_slice(&sealed[NONCE + RECORD..NONCE + 2 * RECORD]);
    swapped.extend_from_slice(&sealed[NONCE..NONCE + RECORD]);
    swapped.extend_from_slice(&sealed[NONCE + 2 * RECORD..]);

    let err = stream.open(&key, swapped.as_slice(), io::sink()).unwrap_err();
    assert!(matches!(err, CryptoError::AuthenticationFailed));
}

#[test]
fn promoting_early_record_to_final_fails_authentication() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let mut sealed = seal_bytes(&stream, &key, b"abcdefghijkl");
    sealed[NONCE] = 1;
    let err = stream.open(&key, sealed.as_slice(), io::sink()).unwrap_err();
    assert!(matches!(err, CryptoError::AuthenticationFailed));
}

#[test]
fn oversized_record_length_is_rejected_before_buffering() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let mut sealed = seal_bytes(&stream, &key, b"abcd");
    sealed[NONCE + 1..NONCE + 5].copy_from_slice(&u32::MAX.to_be_bytes());
    let err = stream.open(&key, sealed.as_slice(), io::sink()).unwrap_err();
    assert!(matches!(err, CryptoError::MalformedEnvelope(_)));
}

// ── Operation State ──

#[test]
fn opener_state_tracks_lifecycle() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let sealed = seal_bytes(&stream, &key, b"abcdef");

    let mut opener = stream.opener(&key).unwrap();
    assert_eq!(opener.state(), OperationState::Idle);
    let mut plaintext = Vec::new();
    for byte in &sealed {
        plaintext.extend(opener.update(std::slice::from_ref(byte)).unwrap());
    }
    assert_eq!(opener.state(), OperationState::Opening);
    opener.finish().unwrap();
    assert_eq!(opener.state(), OperationState::Opened);
    assert_eq!(plaintext, b"abcdef");
}

#[test]
fn failed_opener_refuses_more_input() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let mut sealed = seal_bytes(&stream, &key, b"abcdef");
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;

    let mut opener = stream.opener(&key).unwrap();
    assert!(opener.update(&sealed).is_err());
    assert_eq!(opener.state(), OperationState::Failed);
    assert!(matches!(
        opener.update(b""),
        Err(CryptoError::InvalidState(_))
    ));
}

#[test]
fn sealer_state_tracks_lifecycle() {
    let stream = small_stream();
    let key = SymmetricEnvelope::new(AeadAlgorithm::Aes256Gcm).generate_key();
    let mut sealer = stream.sealer(&key).unwrap();
    assert_eq!(sealer.state(), OperationState::Idle);
    sealer.update(b"chunk").unwrap();
    assert_eq!(sealer.state(), OperationState::Sealing);
    sealer.finish().unwrap();
    assert_eq!(sealer.state(), OperationState::Sealed);
    assert!(sealer.finish().is_err());
}
