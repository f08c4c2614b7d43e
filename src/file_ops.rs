//! In-place file encryption/decryption
//!
//! The transformed bytes go to a sibling temp file which replaces the
//! original by rename only after everything was written and synced. Any
//! failure before that point drops the temp file, so the original path
//! always holds either the old or the new content in full.

use crate::error::{ErrorCategory, ErrorKind, HarshCryptoError, Result};
use crate::stream::{Mode, StreamCipher, StreamStats};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

/// Suffix reserved for in-flight temp files
pub const TEMP_SUFFIX: &str = ".temp";

/// Encrypt or decrypt the file at `path` in place.
pub fn transform_file(cipher: &StreamCipher, path: &Path, mode: Mode) -> Result<StreamStats> {
    tracing::debug!(path = %path.display(), %mode, chunk_size = cipher.chunk_size(), "transforming file");
    let stats = replace_atomically(path, |reader, writer| {
        cipher.transform(mode, reader, writer)
    })
    .map_err(|e| e.with_context(format!("failed to {} {}", mode, path.display())))?;
    tracing::info!(
        path = %path.display(),
        %mode,
        units = stats.units,
        bytes = stats.plaintext_bytes,
        "file done"
    );
    Ok(stats)
}

/// Run `op` from the file at `path` into a temp file next to it, then
/// atomically rename the temp file over `path`.
///
/// This function:
/// 1. Creates `<name>.<random>.temp` in the same directory
/// 2. Streams the original through `op` into it
/// 3. Flushes, fsyncs, and copies the original's permissions
/// 4. Renames it over the original
///
/// If any step fails the temp file is removed and `path` is untouched.
/// Symbolic links are refused.
pub(crate) fn replace_atomically<T, F>(path: &Path, op: F) -> Result<T>
where
    F: FnOnce(&mut dyn Read, &mut dyn Write) -> Result<T>,
{
    // Renaming over a symlink would replace the link, not its target.
    let metadata = fs::symlink_metadata(path).map_err(|e| read_error(path, e))?;
    if metadata.file_type().is_symlink() {
        return Err(HarshCryptoError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} is a symbolic link; pass its target instead", path.display()),
        ));
    }
    if !metadata.is_file() {
        return Err(HarshCryptoError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} is not a regular file", path.display()),
        ));
    }
    let mut input = File::open(path).map_err(|e| read_error(path, e))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = format!(
        "{}.",
        path.file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default()
    );
    let mut temp_file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| {
            HarshCryptoError::io(
                ErrorCategory::Internal,
                format!("failed to create tempfile in {}", dir.display()),
                e,
            )
        })?;

    let output = {
        let mut writer = BufWriter::new(temp_file.as_file_mut());
        let output = op(&mut input, &mut writer)?;
        writer.flush().map_err(|e| {
            HarshCryptoError::io(ErrorCategory::Internal, "failed to flush tempfile", e)
        })?;
        output
    };

    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.as_file().sync_all().map_err(|e| {
        HarshCryptoError::io(
            ErrorCategory::Internal,
            "failed to sync file prior to rename",
            e,
        )
    })?;
    temp_file
        .as_file()
        .set_permissions(metadata.permissions())
        .map_err(|e| {
            HarshCryptoError::io(
                ErrorCategory::Internal,
                "failed to set tempfile permissions",
                e,
            )
        })?;

    temp_file.persist(path).map_err(|e| {
        HarshCryptoError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(output)
}

fn read_error(path: &Path, err: io::Error) -> HarshCryptoError {
    if err.kind() == io::ErrorKind::NotFound {
        return HarshCryptoError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::PathNotFound,
            format!("path not found: {}", path.display()),
            err,
        );
    }
    HarshCryptoError::io(
        ErrorCategory::Internal,
        format!("failed to read from {}", path.display()),
        err,
    )
}
