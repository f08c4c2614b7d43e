//! Batch processing of files and directory trees

use crate::error::{ErrorCategory, ErrorKind, HarshCryptoError, Result};
use crate::file_ops::{self, TEMP_SUFFIX};
use crate::stream::{Mode, StreamCipher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions processed when none are configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["txt", "pdf", "jpg", "png"];

/// Case-insensitive allow-list of file extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    allowed: Vec<String>,
}

impl ExtensionFilter {
    /// Build a filter; entries may be given with or without a leading dot.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed: Vec<String> = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        allowed.sort();
        allowed.dedup();
        Self { allowed }
    }

    pub fn extensions(&self) -> &[String] {
        &self.allowed
    }

    pub fn matches(&self, path: &Path) -> bool {
        if is_temp_file(path) {
            return false;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.allowed.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(TEMP_SUFFIX))
}

/// A file that could not be processed.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: HarshCryptoError,
}

/// Outcome of processing a file or a directory tree.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files transformed successfully, in processing order
    pub processed: Vec<PathBuf>,
    /// Files left alone because their extension is not allowed
    pub skipped: usize,
    /// Files (or directory entries) that failed
    pub failures: Vec<FileFailure>,
    /// The user interrupted the batch; remaining files were not visited
    pub cancelled: bool,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Transform `path`, which may be a single file or a directory.
///
/// A single file is transformed regardless of its extension, and failure
/// is returned as an error. A symbolic link to a file is refused, the same
/// way directory walks skip links. Directories go through
/// [`process_directory`].
pub fn process_path(
    cipher: &StreamCipher,
    path: &Path,
    mode: Mode,
    filter: &ExtensionFilter,
) -> Result<BatchReport> {
    if path.is_dir() {
        return process_directory(cipher, path, mode, filter);
    }
    if !path.exists() {
        return Err(path_not_found(path));
    }

    let mut report = BatchReport::default();
    match file_ops::transform_file(cipher, path, mode) {
        Ok(_) => report.processed.push(path.to_path_buf()),
        Err(e) if e.is_cancelled() => report.cancelled = true,
        Err(e) => return Err(e),
    }
    Ok(report)
}

/// Transform every allowed file under `root`, one at a time.
///
/// Per-file failures are recorded in the report and the walk moves on.
/// Symlinks are not followed. Cancellation stops the walk after the
/// in-flight file was abandoned.
pub fn process_directory(
    cipher: &StreamCipher,
    root: &Path,
    mode: Mode,
    filter: &ExtensionFilter,
) -> Result<BatchReport> {
    if !root.is_dir() {
        return Err(path_not_found(root));
    }

    let mut report = BatchReport::default();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        if cipher.cancel_flag().is_cancelled() {
            report.cancelled = true;
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                tracing::debug!(path = %path.display(), error = %e, "unreadable directory entry");
                report.failures.push(FileFailure {
                    path,
                    error: HarshCryptoError::with_kind_and_source(
                        ErrorCategory::Internal,
                        ErrorKind::Io,
                        "failed to read directory entry",
                        e,
                    ),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !filter.matches(path) {
            tracing::trace!(path = %path.display(), "skipping file");
            report.skipped += 1;
            continue;
        }

        match file_ops::transform_file(cipher, path, mode) {
            Ok(_) => report.processed.push(path.to_path_buf()),
            Err(e) if e.is_cancelled() => {
                report.cancelled = true;
                break;
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e.chain_message(), "file failed");
                report.failures.push(FileFailure {
                    path: path.to_path_buf(),
                    error: e,
                });
            }
        }
    }

    tracing::info!(
        root = %root.display(),
        %mode,
        processed = report.processed.len(),
        skipped = report.skipped,
        failed = report.failures.len(),
        cancelled = report.cancelled,
        "directory done"
    );
    Ok(report)
}

fn path_not_found(path: &Path) -> HarshCryptoError {
    HarshCryptoError::with_kind(
        ErrorCategory::User,
        ErrorKind::PathNotFound,
        format!("path not found: {}", path.display()),
    )
}
