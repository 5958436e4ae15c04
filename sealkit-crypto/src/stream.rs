//! Incremental (streaming) envelope encryption.
//!
//! The stream starts with the base nonce, written once, followed by records:
//!
//! ```text
//! nonce(n) ‖ record* ‖ final_record
//! record = flag(1) ‖ len(u32 BE) ‖ tag(16) ‖ ciphertext(len)
//! ```
//!
//! Record `i` is sealed with nonce `base XOR i` (counter in the trailing
//! eight bytes) and AAD `i ‖ flag`, so records cannot be reordered, dropped
//! or replayed from another stream. Only [`StreamSealer::finish`] emits the
//! record flagged final, which means a source that fails part-way never
//! produces a complete stream. On the opening side, plaintext of earlier
//! records is released as soon as each record verifies; if the stream later
//! turns out to be truncated or tampered the caller must discard whatever it
//! already wrote.

use crate::envelope::{SymmetricEnvelope, random_nonce};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{KeyMaterial, KeyUsages, TAG_SIZE};
use std::io::{ErrorKind, Read, Write};
use tracing::debug;

/// Plaintext bytes per record unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

const FLAG_MORE: u8 = 0;
const FLAG_FINAL: u8 = 1;
const RECORD_PREFIX_LEN: usize = 1 + 4;

/// Lifecycle of a sealing or opening operation.
///
/// A sealer or opener starts `Idle` and enters `Sealing` / `Opening` on its
/// first `update` or `finish`. `Sealed`, `Opened` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    Sealing,
    Sealed,
    Opening,
    Opened,
    Failed,
}

fn record_nonce(base: &[u8], counter: u64) -> Vec<u8> {
    let mut nonce = base.to_vec();
    let offset = nonce.len() - 8;
    for (n, c) in nonce[offset..].iter_mut().zip(counter.to_be_bytes()) {
        *n ^= c;
    }
    nonce
}

fn record_aad(counter: u64, flag: u8) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&counter.to_be_bytes());
    aad[8] = flag;
    aad
}

fn check_chunk_size(chunk_size: usize) -> CryptoResult<()> {
    if chunk_size == 0 || chunk_size > u32::MAX as usize {
        return Err(CryptoError::Config(format!(
            "stream chunk size {chunk_size} out of range"
        )));
    }
    Ok(())
}

/// Streaming front-end for a [`SymmetricEnvelope`].
#[derive(Clone, Debug)]
pub struct EnvelopeStream {
    envelope: SymmetricEnvelope,
    chunk_size: usize,
}

impl EnvelopeStream {
    pub fn new(envelope: SymmetricEnvelope) -> Self {
        Self {
            envelope,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> CryptoResult<Self> {
        check_chunk_size(chunk_size)?;
        self.chunk_size = chunk_size;
        Ok(self)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn sealer<'k>(&self, key: &'k KeyMaterial) -> CryptoResult<StreamSealer<'k>> {
        StreamSealer::new(self.envelope.clone(), key, self.chunk_size)
    }

    pub fn opener<'k>(&self, key: &'k KeyMaterial) -> CryptoResult<StreamOpener<'k>> {
        StreamOpener::new(self.envelope.clone(), key, self.chunk_size)
    }

    /// Seals everything `reader` yields into `writer`. Returns bytes written.
    ///
    /// A read error aborts with `Io` before the final record is written.
    pub fn seal<R: Read, W: Write>(
        &self,
        key: &KeyMaterial,
        mut reader: R,
        mut writer: W,
    ) -> CryptoResult<u64> {
        let mut sealer = self.sealer(key)?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut written = 0u64;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("stream source failed after {written} bytes, aborting seal: {e}");
                    return Err(CryptoError::Io(e));
                }
            };
            let out = sealer.update(&buf[..n])?;
            writer.write_all(&out)?;
            written += out.len() as u64;
        }

        let out = sealer.finish()?;
        writer.write_all(&out)?;
        writer.flush()?;
        Ok(written + out.len() as u64)
    }

    /// Opens a sealed stream from `reader` into `writer`. Returns plaintext
    /// bytes written. On error, anything already written is invalid.
    pub fn open<R: Read, W: Write>(
        &self,
        key: &KeyMaterial,
        mut reader: R,
        mut writer: W,
    ) -> CryptoResult<u64> {
        let mut opener = self.opener(key)?;
        let mut buf = vec![0u8; self.chunk_size + RECORD_PREFIX_LEN + TAG_SIZE];
        let mut written = 0u64;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CryptoError::Io(e)),
            };
            let plaintext = opener.update(&buf[..n])?;
            writer.write_all(&plaintext)?;
            written += plaintext.len() as u64;
        }

        opener.finish()?;
        writer.flush()?;
        Ok(written)
    }
}

/// Push-based sealer: `update` as often as needed, then `finish` once.
pub struct StreamSealer<'k> {
    envelope: SymmetricEnvelope,
    key: &'k KeyMaterial,
    base_nonce: Vec<u8>,
    pending: Vec<u8>,
    counter: u64,
    chunk_size: usize,
    header_written: bool,
    state: OperationState,
}

impl<'k> StreamSealer<'k> {
    pub fn new(
        envelope: SymmetricEnvelope,
        key: &'k KeyMaterial,
        chunk_size: usize,
    ) -> CryptoResult<Self> {
        check_chunk_size(chunk_size)?;
        key.expect_algorithm(envelope.algorithm())?;
        key.require(KeyUsages::ENCRYPT)?;
        let base_nonce = random_nonce(envelope.layout().nonce_len);
        Ok(Self {
            envelope,
            key,
            base_nonce,
            pending: Vec::with_capacity(chunk_size),
            counter: 0,
            chunk_size,
            header_written: false,
            state: OperationState::Idle,
        })
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Absorbs `chunk` and returns any output that is ready.
    pub fn update(&mut self, chunk: &[u8]) -> CryptoResult<Vec<u8>> {
        self.expect_sealing()?;
        let result = self.absorb(chunk);
        if result.is_err() {
            self.state = OperationState::Failed;
        }
        result
    }

    /// Emits the final record and its tag. No further input is accepted.
    pub fn finish(&mut self) -> CryptoResult<Vec<u8>> {
        self.expect_sealing()?;
        let mut out = Vec::new();
        self.write_header(&mut out);
        let last = std::mem::take(&mut self.pending);
        match self.emit_record(&last, FLAG_FINAL, &mut out) {
            Ok(()) => {
                self.state = OperationState::Sealed;
                Ok(out)
            }
            Err(e) => {
                self.state = OperationState::Failed;
                Err(e)
            }
        }
    }

    fn expect_sealing(&mut self) -> CryptoResult<()> {
        match self.state {
            OperationState::Idle | OperationState::Sealing => {
                self.state = OperationState::Sealing;
                Ok(())
            }
            other => Err(CryptoError::InvalidState(format!("sealer is {other:?}"))),
        }
    }

    fn absorb(&mut self, chunk: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_header(&mut out);
        self.pending.extend_from_slice(chunk);
        // A full chunk is held back until more input arrives, so the final
        // record carries data whenever any was supplied.
        while self.pending.len() > self.chunk_size {
            let rest = self.pending.split_off(self.chunk_size);
            let full = std::mem::replace(&mut self.pending, rest);
            self.emit_record(&full, FLAG_MORE, &mut out)?;
        }
        Ok(out)
    }

    fn write_header(&mut self, out: &mut Vec<u8>) {
        if !self.header_written {
            out.extend_from_slice(&self.base_nonce);
            self.header_written = true;
        }
    }

    fn emit_record(&mut self, plaintext: &[u8], flag: u8, out: &mut Vec<u8>) -> CryptoResult<()> {
        let nonce = record_nonce(&self.base_nonce, self.counter);
        let aad = record_aad(self.counter, flag);
        let mut buffer = plaintext.to_vec();
        let tag = self
            .envelope
            .cipher()
            .seal_in_place(self.key.as_bytes(), &nonce, &aad, &mut buffer)?;

        out.push(flag);
        out.extend_from_slice(&(buffer.len() as u32).to_be_bytes());
        out.extend_from_slice(&tag);
        out.extend_from_slice(&buffer);

        self.counter = self
            .counter
            .checked_add(1)
            .ok_or_else(|| CryptoError::Encryption("stream record counter exhausted".into()))?;
        Ok(())
    }
}

/// Push-based opener mirroring [`StreamSealer`].
pub struct StreamOpener<'k> {
    envelope: SymmetricEnvelope,
    key: &'k KeyMaterial,
    base_nonce: Option<Vec<u8>>,
    buffered: Vec<u8>,
    counter: u64,
    max_record: usize,
    final_seen: bool,
    state: OperationState,
}

impl<'k> StreamOpener<'k> {
    pub fn new(
        envelope: SymmetricEnvelope,
        key: &'k KeyMaterial,
        chunk_size: usize,
    ) -> CryptoResult<Self> {
        check_chunk_size(chunk_size)?;
        key.expect_algorithm(envelope.algorithm())?;
        key.require(KeyUsages::DECRYPT)?;
        Ok(Self {
            envelope,
            key,
            base_nonce: None,
            buffered: Vec::new(),
            counter: 0,
            max_record: chunk_size,
            final_seen: false,
            state: OperationState::Idle,
        })
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Feeds ciphertext and returns plaintext of every record completed by it.
    pub fn update(&mut self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        self.expect_opening()?;
        let result = self.absorb(input);
        if let Err(e) = &result {
            debug!("stream open failed at record {}: {e}", self.counter);
            self.state = OperationState::Failed;
        }
        result
    }

    /// Confirms the final record was seen and nothing trails it.
    pub fn finish(&mut self) -> CryptoResult<()> {
        self.expect_opening()?;
        if !self.final_seen {
            self.state = OperationState::Failed;
            let reason = if self.base_nonce.is_none() {
                "stream shorter than its nonce header"
            } else {
                "stream ended before its final record"
            };
            return Err(CryptoError::MalformedEnvelope(reason.to_string()));
        }
        self.state = OperationState::Opened;
        Ok(())
    }

    fn expect_opening(&mut self) -> CryptoResult<()> {
        match self.state {
            OperationState::Idle | OperationState::Opening => {
                self.state = OperationState::Opening;
                Ok(())
            }
            other => Err(CryptoError::InvalidState(format!("opener is {other:?}"))),
        }
    }

    fn absorb(&mut self, input: &[u8]) -> CryptoResult<Vec<u8>> {
        if self.final_seen && !input.is_empty() {
            return Err(CryptoError::MalformedEnvelope(
                "data after final record".to_string(),
            ));
        }
        self.buffered.extend_from_slice(input);

        if self.base_nonce.is_none() {
            let nonce_len = self.envelope.layout().nonce_len;
            if self.buffered.len() < nonce_len {
                return Ok(Vec::new());
            }
            self.base_nonce = Some(self.buffered.drain(..nonce_len).collect());
        }

        let mut plaintext = Vec::new();
        while let Some(record_len) = self.next_record_len()? {
            let record: Vec<u8> = self.buffered.drain(..record_len).collect();
            let flag = record[0];
            let (tag, ciphertext) = record[RECORD_PREFIX_LEN..].split_at(TAG_SIZE);
            plaintext.extend_from_slice(&self.open_record(flag, tag, ciphertext)?);

            if flag == FLAG_FINAL {
                self.final_seen = true;
                if !self.buffered.is_empty() {
                    return Err(CryptoError::MalformedEnvelope(
                        "data after final record".to_string(),
                    ));
                }
                break;
            }
        }
        Ok(plaintext)
    }

    /// Total length of the next record if it is fully buffered.
    fn next_record_len(&self) -> CryptoResult<Option<usize>> {
        if self.buffered.len() < RECORD_PREFIX_LEN {
            return Ok(None);
        }
        let flag = self.buffered[0];
        if flag != FLAG_MORE && flag != FLAG_FINAL {
            return Err(CryptoError::MalformedEnvelope(format!(
                "unknown record flag {flag}"
            )));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&self.buffered[1..RECORD_PREFIX_LEN]);
        let ct_len = u32::from_be_bytes(len_bytes) as usize;
        if ct_len > self.max_record {
            return Err(CryptoError::MalformedEnvelope(format!(
                "record of {ct_len} bytes exceeds chunk size {}",
                self.max_record
            )));
        }
        let total = RECORD_PREFIX_LEN + TAG_SIZE + ct_len;
        Ok((self.buffered.len() >= total).then_some(total))
    }

    fn open_record(&mut self, flag: u8, tag: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let base = self
            .base_nonce
            .as_deref()
            .ok_or_else(|| CryptoError::InvalidState("nonce header not read".into()))?;
        let nonce = record_nonce(base, self.counter);
        let aad = record_aad(self.counter, flag);
        let mut buffer = ciphertext.to_vec();
        self.envelope
            .cipher()
            .open_in_place(self.key.as_bytes(), &nonce, &aad, &mut buffer, tag)?;
        self.counter += 1;
        Ok(buffer)
    }
}

/// Seals a stream with the default chunk size.
pub fn seal_stream<R: Read, W: Write>(
    envelope: &SymmetricEnvelope,
    key: &KeyMaterial,
    reader: R,
    writer: W,
) -> CryptoResult<u64> {
    EnvelopeStream::new(envelope.clone()).seal(key, reader, writer)
}

/// Opens a stream sealed with the default chunk size.
pub fn open_stream<R: Read, W: Write>(
    envelope: &SymmetricEnvelope,
    key: &KeyMaterial,
    reader: R,
    writer: W,
) -> CryptoResult<u64> {
    EnvelopeStream::new(envelope.clone()).open(key, reader, writer)
}
