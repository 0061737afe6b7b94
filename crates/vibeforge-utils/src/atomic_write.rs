//! Atomic file writes
//!
//! Writes go to a temporary file in the target directory, are fsynced, and
//! then renamed over the target. A reader never observes a half-written file,
//! and re-writing the same content is idempotent.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Result of an atomic write operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicWriteResult {
    /// Bytes written to the target
    pub bytes_written: u64,
    /// Whether cross-filesystem fallback was used
    pub used_cross_filesystem_fallback: bool,
    /// Any warnings generated during the operation
    pub warnings: Vec<String>,
}

/// Atomically write `content` to `path` using temp file + fsync + rename.
///
/// Parent directories are created as needed. Content is written byte for
/// byte; line endings are not normalized.
pub fn write_file_atomic(path: &Path, content: &[u8]) -> Result<AtomicWriteResult> {
    let mut result = AtomicWriteResult {
        bytes_written: content.len() as u64,
        ..AtomicWriteResult::default()
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent directory: {}", parent.display()))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in: {}", parent.display()))?;

    temp_file
        .write_all(content)
        .context("Failed to write content to temporary file")?;
    temp_file
        .as_file()
        .sync_all()
        .context("Failed to fsync temporary file")?;

    let temp_path = temp_file.path().to_path_buf();

    match temp_file.persist(path) {
        Ok(_) => {}
        Err(persist_error) if is_cross_filesystem_error(&persist_error.error) => {
            result.used_cross_filesystem_fallback = true;
            result
                .warnings
                .push("Used cross-filesystem fallback (copy→fsync→replace)".to_string());
            cross_filesystem_copy(&temp_path, path)?;
        }
        Err(persist_error) => {
            return Err(persist_error.error)
                .with_context(|| format!("Failed to atomically write file: {}", path.display()));
        }
    }

    Ok(result)
}

/// Convenience wrapper for UTF-8 text.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<AtomicWriteResult> {
    write_file_atomic(path, content.as_bytes())
}

#[cfg(unix)]
fn is_cross_filesystem_error(err: &std::io::Error) -> bool {
    // EXDEV on Linux and macOS
    err.raw_os_error() == Some(18)
}

#[cfg(not(unix))]
fn is_cross_filesystem_error(_err: &std::io::Error) -> bool {
    false
}

fn cross_filesystem_copy(temp_path: &Path, target: &Path) -> Result<()> {
    let content = fs::read(temp_path)
        .context("Failed to read temporary file for cross-filesystem copy")?;

    let target_dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut target_temp = NamedTempFile::new_in(target_dir).with_context(|| {
        format!(
            "Failed to create temp file in target directory: {}",
            target_dir.display()
        )
    })?;

    target_temp
        .write_all(&content)
        .context("Failed to write content during cross-filesystem copy")?;
    target_temp
        .as_file()
        .sync_all()
        .context("Failed to fsync during cross-filesystem copy")?;
    target_temp
        .persist(target)
        .map_err(|e| e.error)
        .context("Failed to persist during cross-filesystem copy")?;

    let _ = fs::remove_file(temp_path);

    Ok(())
}
