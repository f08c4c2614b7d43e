//! Per-unit sealing and opening using XSalsa20Poly1305
//!
//! Every chunk of a file becomes one self-contained unit:
//! - nonce: 24 bytes, random per unit
//! - length: 4 bytes (big-endian u32), length of the sealed box
//! - sealed box: variable length (includes 16-byte Poly1305 MAC)
//!
//! Inside the sealed box the chunk is prefixed by a 9-byte header:
//! the unit index (big-endian u64) and a final flag (one byte, 0 or 1).
//! Secretbox has no associated data, so position and end-of-stream are
//! authenticated by sealing them together with the data.

use crate::error::{ErrorCategory, ErrorKind, HarshCryptoError, Result};
use crate::key::Key;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use rand::RngCore;
use rand::rngs::OsRng;
use std::mem::size_of;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 24;

/// Length of the sealed box length field in bytes
pub const LENGTH_LEN: usize = size_of::<u32>();

/// Length of the Poly1305 tag in bytes
pub const TAG_LEN: usize = 16;

/// Length of the sealed unit header (index + final flag) in bytes
pub const HEADER_LEN: usize = size_of::<u64>() + 1;

/// Largest chunk a unit may carry
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Smallest and largest sealed box length accepted when opening
pub const MIN_SEALED_LEN: usize = HEADER_LEN + TAG_LEN;
pub const MAX_SEALED_LEN: usize = HEADER_LEN + MAX_CHUNK_SIZE + TAG_LEN;

/// Bytes a unit adds on top of the chunk it carries
pub const UNIT_OVERHEAD: usize = NONCE_LEN + LENGTH_LEN + HEADER_LEN + TAG_LEN;

const FINAL_FLAG: u8 = 1;
const NOT_FINAL_FLAG: u8 = 0;

/// Position of a unit within its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitHeader {
    pub index: u64,
    pub is_final: bool,
}

impl UnitHeader {
    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..size_of::<u64>()].copy_from_slice(&self.index.to_be_bytes());
        out[size_of::<u64>()] = if self.is_final {
            FINAL_FLAG
        } else {
            NOT_FINAL_FLAG
        };
        out
    }

    fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        let mut index_bytes = [0u8; size_of::<u64>()];
        index_bytes.copy_from_slice(&bytes[..size_of::<u64>()]);
        let is_final = match bytes[size_of::<u64>()] {
            FINAL_FLAG => true,
            NOT_FINAL_FLAG => false,
            other => {
                return Err(HarshCryptoError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::BinaryFormat,
                    format!("invalid final flag {:#04x} in unit header", other),
                ));
            }
        };
        Ok(Self {
            index: u64::from_be_bytes(index_bytes),
            is_final,
        })
    }
}

/// Build the cipher for `key`
pub fn cipher_for(key: &Key) -> XSalsa20Poly1305 {
    XSalsa20Poly1305::new(key.as_bytes().into())
}

/// Seal one chunk with a random nonce
///
/// Returns the framed unit: nonce(24) + length(4) + sealedbox(variable)
pub fn seal_unit(cipher: &XSalsa20Poly1305, header: UnitHeader, chunk: &[u8]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    seal_unit_with_nonce(cipher, header, chunk, &nonce)
}

/// Seal one chunk with the provided nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `seal_unit()` which generates a random nonce.
pub fn seal_unit_with_nonce(
    cipher: &XSalsa20Poly1305,
    header: UnitHeader,
    chunk: &[u8],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    if chunk.len() > MAX_CHUNK_SIZE {
        return Err(HarshCryptoError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            format!(
                "chunk of {} bytes exceeds the maximum of {}",
                chunk.len(),
                MAX_CHUNK_SIZE
            ),
        ));
    }

    let mut payload = Vec::with_capacity(HEADER_LEN + chunk.len());
    payload.extend_from_slice(&header.to_bytes());
    payload.extend_from_slice(chunk);

    let nonce_obj = Nonce::from(*nonce);
    let sealed_box = cipher.encrypt(&nonce_obj, payload.as_slice()).map_err(|_| {
        HarshCryptoError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::SecretboxFailure,
            "secretbox failed to seal unit",
        )
    })?;

    // Bounded by MAX_SEALED_LEN, which fits in a u32.
    let sealed_box_len = sealed_box.len() as u32;
    let mut output = Vec::with_capacity(NONCE_LEN + LENGTH_LEN + sealed_box.len());
    output.extend_from_slice(nonce);
    output.extend_from_slice(&sealed_box_len.to_be_bytes());
    output.extend_from_slice(&sealed_box);

    Ok(output)
}

/// Decode and bounds-check the length field of a unit
pub fn parse_sealed_len(length_bytes: [u8; LENGTH_LEN]) -> Result<usize> {
    let sealed_box_len = u32::from_be_bytes(length_bytes) as usize;

    if sealed_box_len < MIN_SEALED_LEN {
        return Err(HarshCryptoError::with_kind(
            ErrorCategory::User,
            ErrorKind::BinaryFormat,
            format!(
                "sealed box length {} is shorter than the minimum of {}",
                sealed_box_len, MIN_SEALED_LEN
            ),
        ));
    }
    if sealed_box_len > MAX_SEALED_LEN {
        return Err(HarshCryptoError::with_kind(
            ErrorCategory::User,
            ErrorKind::BinaryFormat,
            format!(
                "sealed box length {} exceeds the maximum of {}",
                sealed_box_len, MAX_SEALED_LEN
            ),
        ));
    }

    Ok(sealed_box_len)
}

/// Authenticate and open a sealed box, returning its header and chunk.
///
/// No plaintext is returned unless the Poly1305 tag verifies.
pub fn open_unit(
    cipher: &XSalsa20Poly1305,
    nonce: &[u8; NONCE_LEN],
    sealed_box: &[u8],
) -> Result<(UnitHeader, Vec<u8>)> {
    let nonce_obj = Nonce::from(*nonce);
    let mut payload = cipher.decrypt(&nonce_obj, sealed_box).map_err(|_| {
        HarshCryptoError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "corrupt input, tampered-with data, or wrong key",
        )
    })?;

    if payload.len() < HEADER_LEN {
        return Err(HarshCryptoError::with_kind(
            ErrorCategory::User,
            ErrorKind::BinaryFormat,
            "authenticated unit is too short to hold a header",
        ));
    }

    let mut header_bytes = [0u8; HEADER_LEN];
    header_bytes.copy_from_slice(&payload[..HEADER_LEN]);
    let header = UnitHeader::from_bytes(&header_bytes)?;
    let chunk = payload.split_off(HEADER_LEN);

    Ok((header, chunk))
}
