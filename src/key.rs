//! Symmetric key and the on-disk key store
//!
//! The key store is a plain binary file holding exactly [`KEY_LEN`] raw key
//! bytes. It is created once by `generate-key` and read for every
//! encrypt/decrypt run.

use crate::error::{ErrorCategory, ErrorKind, HarshCryptoError, Result};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Length of the XSalsa20Poly1305 key in bytes
pub const KEY_LEN: usize = 32;

/// Key store location used when nothing else is configured
pub const DEFAULT_KEY_FILE: &str = "key.key";

/// A 256-bit secret key. The bytes are wiped from memory on drop and never
/// show up in `Debug` output.
#[derive(Clone)]
pub struct Key(Zeroizing<[u8; KEY_LEN]>);

impl Key {
    /// Generate a fresh key from the OS random number generator
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    /// Build a key from raw bytes, which must be exactly [`KEY_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            HarshCryptoError::with_kind(
                ErrorCategory::User,
                ErrorKind::KeyStoreInvalid,
                format!(
                    "key must be exactly {} bytes, got {}",
                    KEY_LEN,
                    bytes.len()
                ),
            )
        })?;
        Ok(Self(Zeroizing::new(arr)))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key([redacted])")
    }
}

/// Handle on the key store file at a fixed path.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the key. A missing store is reported as
    /// [`ErrorKind::KeyStoreMissing`] so callers can fail before touching
    /// any data.
    pub fn load(&self) -> Result<Key> {
        let mut file = File::open(&self.path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                HarshCryptoError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::KeyStoreMissing,
                    format!(
                        "key file {} not found; generate one with the generate-key command",
                        self.path.display()
                    ),
                    e,
                )
            } else {
                self.read_error(e)
            }
        })?;

        // Size is checked up front so a wrong --key-file is never read whole.
        let len = file.metadata().map_err(|e| self.read_error(e))?.len();
        if len != KEY_LEN as u64 {
            return Err(HarshCryptoError::with_kind(
                ErrorCategory::User,
                ErrorKind::KeyStoreInvalid,
                format!(
                    "invalid key file {}: expected {} bytes, found {}",
                    self.path.display(),
                    KEY_LEN,
                    len
                ),
            ));
        }

        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        file.read_exact(&mut bytes[..]).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                HarshCryptoError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::KeyStoreInvalid,
                    format!("invalid key file {}: file shrank while reading", self.path.display()),
                    e,
                )
            } else {
                self.read_error(e)
            }
        })?;
        Ok(Key(bytes))
    }

    fn read_error(&self, err: io::Error) -> HarshCryptoError {
        HarshCryptoError::io(
            ErrorCategory::Internal,
            format!("failed to read key file {}", self.path.display()),
            err,
        )
    }

    /// Generate a new key and write it to the store.
    ///
    /// An existing store is only replaced when `overwrite` is set; otherwise
    /// the call fails with [`ErrorKind::KeyStoreExists`] and the old key is
    /// left alone.
    pub fn generate(&self, overwrite: bool) -> Result<Key> {
        let key = Key::generate();
        self.save(&key, overwrite)?;
        tracing::info!(path = %self.path.display(), "generated new key");
        Ok(key)
    }

    /// Write `key` to the store with owner-only permissions on Unix.
    pub fn save(&self, key: &Key, overwrite: bool) -> Result<()> {
        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                HarshCryptoError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::KeyStoreExists,
                    format!(
                        "key file {} already exists; pass --force to replace it",
                        self.path.display()
                    ),
                    e,
                )
            } else {
                HarshCryptoError::io(
                    ErrorCategory::User,
                    format!("failed to open key file {}", self.path.display()),
                    e,
                )
            }
        })?;

        file.write_all(key.as_bytes()).map_err(|e| {
            HarshCryptoError::io(
                ErrorCategory::Internal,
                format!("failed to write key file {}", self.path.display()),
                e,
            )
        })?;
        file.sync_all().map_err(|e| {
            HarshCryptoError::io(
                ErrorCategory::Internal,
                format!("failed to sync key file {}", self.path.display()),
                e,
            )
        })?;
        Ok(())
    }
}
