//! harshcrypto - in-place chunked file encryption using NaCl secretbox

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod file_ops;
pub mod interrupt;
pub mod key;
pub mod secretcrypt;
pub mod spinner;
pub mod stream;
pub mod walk;
