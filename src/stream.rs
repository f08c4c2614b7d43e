//! Chunked streaming encryption/decryption
//!
//! [`StreamCipher`] turns a byte source into a byte sink one chunk at a
//! time, so memory use is bounded by the chunk size regardless of input
//! size. See [`crate::secretcrypt`] for the unit format.

use crate::error::{ErrorCategory, ErrorKind, HarshCryptoError, Result};
use crate::interrupt::CancelFlag;
use crate::key::Key;
use crate::secretcrypt::{self, LENGTH_LEN, MAX_CHUNK_SIZE, NONCE_LEN, UnitHeader};
use crypto_secretbox::XSalsa20Poly1305;
use std::fmt;
use std::io::{self, BufReader, Read, Write};

/// Default chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Direction of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

impl Mode {
    /// "Encryption" / "Decryption"
    pub fn noun(self) -> &'static str {
        match self {
            Mode::Encrypt => "Encryption",
            Mode::Decrypt => "Decryption",
        }
    }

    /// "Encrypting" / "Decrypting"
    pub fn progressive(self) -> &'static str {
        match self {
            Mode::Encrypt => "Encrypting",
            Mode::Decrypt => "Decrypting",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Encrypt => f.write_str("encrypt"),
            Mode::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// What a single transform processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Units written (encrypt) or opened (decrypt)
    pub units: u64,
    /// Plaintext bytes read (encrypt) or written (decrypt)
    pub plaintext_bytes: u64,
}

/// Check a chunk size against the supported range
pub fn validate_chunk_size(chunk_size: usize) -> Result<usize> {
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(HarshCryptoError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidChunkSize,
            format!(
                "chunk size {} is out of range [1, {}]",
                chunk_size, MAX_CHUNK_SIZE
            ),
        ));
    }
    Ok(chunk_size)
}

/// The chunk-by-chunk authenticated transform under one key.
pub struct StreamCipher {
    cipher: XSalsa20Poly1305,
    chunk_size: usize,
    cancel: CancelFlag,
}

impl StreamCipher {
    pub fn new(key: &Key) -> Self {
        Self {
            cipher: secretcrypt::cipher_for(key),
            chunk_size: DEFAULT_CHUNK_SIZE,
            cancel: CancelFlag::new(),
        }
    }

    /// Use `chunk_size` bytes per unit when encrypting, and as the read
    /// buffer size when decrypting.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self> {
        self.chunk_size = validate_chunk_size(chunk_size)?;
        Ok(self)
    }

    /// Abort between units once `cancel` is raised.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn transform<R: Read, W: Write>(
        &self,
        mode: Mode,
        reader: R,
        writer: W,
    ) -> Result<StreamStats> {
        match mode {
            Mode::Encrypt => self.encrypt(reader, writer),
            Mode::Decrypt => self.decrypt(reader, writer),
        }
    }

    /// Encrypt everything `reader` yields into `writer`.
    ///
    /// Each chunk is sealed as an independent unit. One chunk is read ahead
    /// so the last unit can be flagged final; empty input still produces a
    /// single (empty) final unit.
    pub fn encrypt<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> Result<StreamStats> {
        let mut stats = StreamStats::default();
        let mut current = vec![0u8; self.chunk_size];
        let mut next = vec![0u8; self.chunk_size];

        let mut current_len = read_full(&mut reader, &mut current).map_err(read_failed)?;
        let mut index: u64 = 0;
        loop {
            self.cancel.check()?;

            let next_len = if current_len == 0 {
                0
            } else {
                read_full(&mut reader, &mut next).map_err(read_failed)?
            };
            let header = UnitHeader {
                index,
                is_final: next_len == 0,
            };

            let unit = secretcrypt::seal_unit(&self.cipher, header, &current[..current_len])?;
            writer.write_all(&unit).map_err(write_failed)?;
            stats.units += 1;
            stats.plaintext_bytes += current_len as u64;
            tracing::trace!(index, len = current_len, "sealed unit");

            if header.is_final {
                break;
            }
            std::mem::swap(&mut current, &mut next);
            current_len = next_len;
            index = next_index(index)?;
        }

        writer.flush().map_err(write_failed)?;
        Ok(stats)
    }

    /// Decrypt a unit stream from `reader` into `writer`.
    ///
    /// Units are read by their length prefix, so the configured chunk size
    /// only affects buffering. A unit's plaintext is written only after it
    /// authenticates and sits at the expected position. Input must end
    /// exactly after the unit flagged final.
    pub fn decrypt<R: Read, W: Write>(&self, reader: R, mut writer: W) -> Result<StreamStats> {
        let mut reader = BufReader::with_capacity(self.chunk_size, reader);
        let mut stats = StreamStats::default();
        let mut prefix = [0u8; NONCE_LEN + LENGTH_LEN];
        let mut sealed_box = Vec::new();
        let mut expected: u64 = 0;

        loop {
            self.cancel.check()?;

            let n = read_full(&mut reader, &mut prefix).map_err(read_failed)?;
            if n == 0 {
                let msg = if expected == 0 {
                    "input contains no encrypted units".to_string()
                } else {
                    format!("input ended after unit {} without a final unit", expected - 1)
                };
                return Err(truncated(msg));
            }
            if n < prefix.len() {
                return Err(truncated(format!(
                    "input truncated while reading the header of unit {}",
                    expected
                )));
            }

            let mut nonce = [0u8; NONCE_LEN];
            nonce.copy_from_slice(&prefix[..NONCE_LEN]);
            let mut length_bytes = [0u8; LENGTH_LEN];
            length_bytes.copy_from_slice(&prefix[NONCE_LEN..]);
            let sealed_box_len = secretcrypt::parse_sealed_len(length_bytes)
                .map_err(|e| e.with_context(format!("invalid unit {}", expected)))?;

            sealed_box.resize(sealed_box_len, 0);
            let n = read_full(&mut reader, &mut sealed_box).map_err(read_failed)?;
            if n < sealed_box_len {
                return Err(truncated(format!(
                    "input truncated while reading the sealed box of unit {}",
                    expected
                )));
            }

            let (header, chunk) = secretcrypt::open_unit(&self.cipher, &nonce, &sealed_box)
                .map_err(|e| e.with_context(format!("failed to open unit {}", expected)))?;
            if header.index != expected {
                return Err(HarshCryptoError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::UnitOutOfOrder,
                    format!(
                        "expected unit {} but found unit {}; units were reordered, dropped, or duplicated",
                        expected, header.index
                    ),
                ));
            }

            writer.write_all(&chunk).map_err(write_failed)?;
            stats.units += 1;
            stats.plaintext_bytes += chunk.len() as u64;
            tracing::trace!(index = header.index, len = chunk.len(), "opened unit");

            if header.is_final {
                let mut probe = [0u8; 1];
                if read_full(&mut reader, &mut probe).map_err(read_failed)? != 0 {
                    return Err(HarshCryptoError::with_kind(
                        ErrorCategory::User,
                        ErrorKind::TrailingData,
                        "invalid input: unexpected data after the final unit",
                    ));
                }
                break;
            }
            expected = next_index(expected)?;
        }

        writer.flush().map_err(write_failed)?;
        Ok(stats)
    }
}

/// Read until `buf` is full or the reader is exhausted, returning the
/// number of bytes read. A short count means end of stream.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn next_index(index: u64) -> Result<u64> {
    index.checked_add(1).ok_or_else(|| {
        HarshCryptoError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "unit index overflow",
        )
    })
}

fn truncated(msg: impl Into<String>) -> HarshCryptoError {
    HarshCryptoError::with_kind(ErrorCategory::User, ErrorKind::TruncatedInput, msg)
}

fn read_failed(err: io::Error) -> HarshCryptoError {
    HarshCryptoError::io(ErrorCategory::Internal, "failed to read input", err)
}

fn write_failed(err: io::Error) -> HarshCryptoError {
    HarshCryptoError::io(ErrorCategory::Internal, "failed to write output", err)
}
