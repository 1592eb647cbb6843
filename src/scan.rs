//! Source and output directory scanning.
//!
//! Both scans are pure reads. They produce the id sets the reconciler
//! diffs against the manifest.
//!
//! ## Source layouts
//!
//! ```text
//! flat                         nested
//! content/                     content/
//! ├── site.md   (site file)    ├── site.md   (site file)
//! ├── hello.md  → "hello"      ├── hello/
//! └── about.md  → "about"      │   └── index.md  → "hello"
//!                              └── about/
//!                                  └── index.md  → "about"
//! ```
//!
//! ## Output layout
//!
//! ```text
//! docs/
//! ├── index.html               # Table of contents (not an id)
//! ├── hello/index.html         → "hello"
//! └── about/index.html         → "about"
//! ```
//!
//! Hidden entries (leading `.`) are ignored on both sides. A missing output
//! directory is an empty set, not an error. Symlinks are followed, and a
//! dangling link is skipped.

use crate::config::{SourceConfig, SourceLayout};
use crate::manifest::DocumentId;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Name of the page file inside every output directory.
pub const PAGE_FILENAME: &str = "index.html";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("File name is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),
    #[error("Document id '{id}' comes from both {} and {}", first.display(), second.display())]
    DuplicateId {
        id: DocumentId,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Source documents by id.
pub type SourceDocs = BTreeMap<DocumentId, PathBuf>;

/// Enumerate the source documents under `content_root`.
///
/// `site_file`, when given, is excluded even if it matches the extension.
/// A missing content root yields an empty map.
pub fn list_source_ids(
    content_root: &Path,
    source: &SourceConfig,
    site_file: Option<&Path>,
) -> Result<SourceDocs, ScanError> {
    let mut docs = SourceDocs::new();
    if !content_root.is_dir() {
        return Ok(docs);
    }

    let depth = match source.layout {
        SourceLayout::Flat => 1,
        SourceLayout::Nested => 2,
    };
    let walker = WalkDir::new(content_root)
        .min_depth(depth)
        .max_depth(depth)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let Some(entry) = live_entry(entry)? else {
            continue;
        };
        if !entry.file_type().is_file() || !has_extension(entry.path(), &source.extension) {
            continue;
        }
        if site_file.is_some_and(|s| s == entry.path()) {
            continue;
        }

        let id = match source.layout {
            SourceLayout::Flat => entry.path().file_stem(),
            SourceLayout::Nested => {
                if entry.path().file_stem() != Some(OsStr::new("index")) {
                    continue;
                }
                entry.path().parent().and_then(Path::file_name)
            }
        };
        let id = id
            .and_then(OsStr::to_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ScanError::NonUtf8(entry.path().to_path_buf()))?;

        match docs.entry(id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(entry.into_path());
            }
            Entry::Occupied(slot) => {
                return Err(ScanError::DuplicateId {
                    id: id.to_string(),
                    first: slot.get().clone(),
                    second: entry.into_path(),
                });
            }
        }
    }

    Ok(docs)
}

/// Enumerate the ids that already have a rendered page under `output_root`.
pub fn list_output_ids(output_root: &Path) -> Result<BTreeSet<DocumentId>, ScanError> {
    let mut ids = BTreeSet::new();
    if !output_root.is_dir() {
        return Ok(ids);
    }

    let walker = WalkDir::new(output_root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let Some(entry) = live_entry(entry)? else {
            continue;
        };
        if !entry.file_type().is_dir() || !entry.path().join(PAGE_FILENAME).is_file() {
            continue;
        }
        let id = entry
            .file_name()
            .to_str()
            .ok_or_else(|| ScanError::NonUtf8(entry.path().to_path_buf()))?;
        ids.insert(id.to_string());
    }

    Ok(ids)
}

/// Output directory for a document id.
pub fn page_dir(output_root: &Path, id: &str) -> PathBuf {
    output_root.join(id)
}

/// Output page path for a document id.
pub fn page_path(output_root: &Path, id: &str) -> PathBuf {
    page_dir(output_root, id).join(PAGE_FILENAME)
}

/// Path of the table of contents.
pub fn index_path(output_root: &Path) -> PathBuf {
    output_root.join(PAGE_FILENAME)
}

/// Drop entries whose symlink target no longer exists.
fn live_entry(entry: walkdir::Result<DirEntry>) -> Result<Option<DirEntry>, ScanError> {
    match entry {
        Ok(entry) => Ok(Some(entry)),
        Err(err) if err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => {
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
