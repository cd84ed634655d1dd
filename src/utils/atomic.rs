//! Atomic file writes for persisted store files
//!
//! 1. Write to a sibling temporary file (`<name>.tmp`)
//! 2. Call sync_all() to flush to disk
//! 3. Rename temp file to final path (atomic on most filesystems)
//!
//! After a crash the store file is either the old version or the new
//! one, never a partial write.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Sibling temp file for `path`: the full file name with `.tmp` appended
pub fn temp_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically replace `path` with `content`, creating parent directories
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> io::Result<()> {
    let path = path.as_ref();
    let temp_path = temp_path(path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(&temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Remove a temp file left behind by an interrupted [`atomic_write`]
///
/// Returns `true` if a stale file was removed.
pub fn cleanup_temp_file<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    let temp_path = temp_path(path);
    if !temp_path.exists() {
        return Ok(false);
    }
    fs::remove_file(&temp_path)?;
    Ok(true)
}
