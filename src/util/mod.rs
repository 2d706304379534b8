//! Shared utilities for `beads_sync`.
//!
//! - Content hashing (SHA256)
//! - Atomic file replacement
//! - Progress indicators (for long-running git operations)

mod hash;
pub mod progress;

pub use hash::{bytes_hash, content_hash};

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{BeadsError, Result};

/// Replace `path` with `bytes` via a sibling temp file and rename.
///
/// Readers see either the old or the new content, never a partial write.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the write
/// or rename fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| BeadsError::Config(format!("Invalid output path: {}", path.display())))?;
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .map_or_else(|| "out".into(), |n| n.to_string_lossy().into_owned());
    let temp_path = parent.join(format!(".{file_name}.{}.tmp", std::process::id()));

    let write = || -> std::io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    };

    if let Err(err) = write() {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote file atomically");
    Ok(())
}

/// Truncate to at most `max` characters, marking the cut with `...`.
#[must_use]
pub fn truncate_title(title: &str, max: usize) -> String {
    if title.chars().count() <= max {
        return title.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = title.chars().take(keep).collect();
    out.push_str("...");
    out
}
