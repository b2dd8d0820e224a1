//! Atomic file writes: temp file in the target directory, fsync, rename.
//!
//! Readers of a path written here see either the previous content or the
//! complete new content, never a partial file.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Atomically write `content` to `path`, creating parent directories.
///
/// Line endings are normalized to LF.
pub fn write_file_atomic(path: &Path, content: &str) -> io::Result<()> {
    let normalized = normalize_line_endings(content);

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(normalized.as_bytes())?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// Normalize CRLF and lone CR line endings to LF
#[must_use]
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}
