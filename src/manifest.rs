//! The build manifest: what has been built, and from which bytes.
//!
//! The manifest is the only state persisted between runs besides the
//! rendered output tree. It holds one [`PageRecord`] per document id and,
//! optionally, the [`SiteInfo`] computed from the site file.
//!
//! ## Storage
//!
//! JSON, pretty printed, records sorted by id:
//!
//! ```text
//! {
//!   "version": 1,
//!   "site": { "content_hash": "…", "title": "kfold" },
//!   "pages": [
//!     { "id": "hello", "content_hash": "…", "generated_at": "2024-03-01T10:00:00",
//!       "title": "Hello", "publish_date": "2024-03-01" }
//!   ]
//! }
//! ```
//!
//! Sorting makes saving an unchanged manifest byte-identical. Optional
//! fields are omitted when absent and come back absent on load.
//!
//! ## Failure modes
//!
//! [`Manifest::load`] distinguishes a missing file ([`ManifestError::NotFound`],
//! which callers treat as an empty manifest) from one that cannot be parsed
//! ([`ManifestError::Corrupt`] or [`ManifestError::UnsupportedVersion`]). What
//! to do with a corrupt manifest is the caller's policy decision.
//!
//! [`Manifest::save`] overwrites the whole file atomically. There is no
//! locking: concurrent runs against the same manifest are not supported.

use crate::write::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Version of the manifest format. Bump when the schema changes.
pub const MANIFEST_VERSION: u32 = 1;

/// Stable key of one source document: its file stem, or its directory name
/// for documents stored as `<id>/index.<ext>`.
pub type DocumentId = String;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest not found: {0}")]
    NotFound(PathBuf),
    #[error("Manifest {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("Manifest {path} has version {found}, expected {expected}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ManifestError {
    /// True for errors meaning "a file is there but it is not a manifest we
    /// can trust", as opposed to a missing file or an I/O failure.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            ManifestError::Corrupt { .. } | ManifestError::UnsupportedVersion { .. }
        )
    }
}

/// One built document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: DocumentId,
    /// SHA-256 of the source bytes that produced the current output.
    pub content_hash: String,
    /// Local time of the last successful build, `YYYY-MM-DDTHH:MM:SS`.
    pub generated_at: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Present on posts (listed in the index), absent on standalone pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    /// Remaining author metadata, passed through to the page template.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

/// Site-wide metadata computed from the site file.
///
/// Every page template sees it, so a change to `content_hash` invalidates
/// every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub content_hash: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

/// All page records keyed by id, plus the optional site info.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub site: Option<SiteInfo>,
    records: BTreeMap<DocumentId, PageRecord>,
}

/// On-disk shape of the manifest.
#[derive(Deserialize)]
struct ManifestFile {
    version: u32,
    #[serde(default)]
    site: Option<SiteInfo>,
    #[serde(default)]
    pages: Vec<PageRecord>,
}

#[derive(Serialize)]
struct ManifestFileRef<'a> {
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    site: Option<&'a SiteInfo>,
    pages: Vec<&'a PageRecord>,
}

impl Manifest {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a manifest from records; a later record replaces an earlier
    /// one with the same id.
    pub fn from_records(site: Option<SiteInfo>, records: impl IntoIterator<Item = PageRecord>) -> Self {
        Self {
            site,
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&PageRecord> {
        self.records.get(id)
    }

    /// Insert or replace the record for `record.id`.
    pub fn insert(&mut self, record: PageRecord) -> Option<PageRecord> {
        self.records.insert(record.id.clone(), record)
    }

    pub fn ids(&self) -> BTreeSet<DocumentId> {
        self.records.keys().cloned().collect()
    }

    /// Records in id order.
    pub fn records(&self) -> impl Iterator<Item = &PageRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load a manifest file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound(path.to_path_buf()));
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(ManifestError::Corrupt {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let file: ManifestFile =
            serde_json::from_str(content).map_err(|e| ManifestError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if file.version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: file.version,
                expected: MANIFEST_VERSION,
            });
        }

        let mut records = BTreeMap::new();
        for record in file.pages {
            if records.contains_key(&record.id) {
                return Err(ManifestError::Corrupt {
                    path: path.to_path_buf(),
                    reason: format!("duplicate id \"{}\"", record.id),
                });
            }
            records.insert(record.id.clone(), record);
        }

        Ok(Self {
            site: file.site,
            records,
        })
    }

    /// Serialize to the on-disk JSON form (with trailing newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let file = ManifestFileRef {
            version: MANIFEST_VERSION,
            site: self.site.as_ref(),
            pages: self.records.values().collect(),
        };
        let mut json = serde_json::to_string_pretty(&file)?;
        json.push('\n');
        Ok(json)
    }

    /// Overwrite the manifest file with the full current record set.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes())?;
        Ok(())
    }
}
