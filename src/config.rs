//! Runtime configuration for encrypt/decrypt runs

use crate::error::Result;
use crate::key::{DEFAULT_KEY_FILE, KeyStore};
use crate::stream::{DEFAULT_CHUNK_SIZE, validate_chunk_size};
use crate::walk::{DEFAULT_EXTENSIONS, ExtensionFilter};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Location of the key store file
    pub key_file: PathBuf,
    /// Bytes per unit when encrypting; read buffer size when decrypting
    pub chunk_size: usize,
    /// Extensions processed in directory mode
    pub extensions: Vec<String>,
    /// Draw a spinner on stderr when it is a terminal
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            chunk_size: DEFAULT_CHUNK_SIZE,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            show_progress: true,
        }
    }
}

impl Config {
    /// Check the chunk size and normalize the extension list. An empty
    /// extension list falls back to the defaults.
    pub fn validate(mut self) -> Result<Self> {
        validate_chunk_size(self.chunk_size)?;
        let filter = if self.extensions.is_empty() {
            ExtensionFilter::default()
        } else {
            ExtensionFilter::new(&self.extensions)
        };
        self.extensions = filter.extensions().to_vec();
        Ok(self)
    }

    pub fn key_store(&self) -> KeyStore {
        KeyStore::new(&self.key_file)
    }

    pub fn extension_filter(&self) -> ExtensionFilter {
        ExtensionFilter::new(&self.extensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::path::Path;

    #[test]
    fn test_defaults() {
        let config = Config::default().validate().unwrap();
        assert_eq!(config.key_file, PathBuf::from("key.key"));
        assert_eq!(config.chunk_size, 65536);
        assert_eq!(config.extensions, ["jpg", "pdf", "png", "txt"]);
        assert!(config.show_progress);
    }

    #[test]
    fn test_custom_extensions_are_normalized() {
        let config = Config {
            extensions: vec![".MD".to_string(), "rs".to_string()],
            ..Config::default()
        }
        .validate()
        .unwrap();

        assert_eq!(config.extensions, ["md", "rs"]);
        let filter = config.extension_filter();
        assert!(filter.matches(Path::new("README.md")));
        assert!(!filter.matches(Path::new("a.txt")));
    }

    #[test]
    fn test_empty_extensions_fall_back_to_defaults() {
        let config = Config {
            extensions: Vec::new(),
            ..Config::default()
        }
        .validate()
        .unwrap();
        assert_eq!(config.extension_filter(), ExtensionFilter::default());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = Config {
            chunk_size: 0,
            ..Config::default()
        }
        .validate()
        .expect_err("expected invalid chunk size");
        assert_eq!(err.kind, Some(ErrorKind::InvalidChunkSize));
    }

    #[test]
    fn test_key_store_path() {
        let config = Config {
            key_file: PathBuf::from("/tmp/other.key"),
            ..Config::default()
        };
        assert_eq!(config.key_store().path(), Path::new("/tmp/other.key"));
    }
}
