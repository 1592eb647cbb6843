//! Atomic file writes.
//!
//! Pages, the index and the manifest are all written through
//! [`write_atomic`]: the bytes go to a hidden sibling file first and are
//! then renamed over the destination. A rename within one directory is
//! atomic, so a page directory that contains `index.html` always holds a
//! complete page, and an interrupted manifest save leaves the previous
//! manifest intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Write `contents` to `path`, creating parent directories as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, contents) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Hidden sibling used as the staging file for `path`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}
