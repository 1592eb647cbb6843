//! Single-page builds.
//!
//! [`PageBuilder::build`] is the only place a document is read, rendered
//! and written. The hash check comes first: when the source bytes hash to
//! the previously recorded digest (and the build is not forced), nothing
//! else happens, so unchanged documents never reach the renderer, the
//! templater or the output directory.

use crate::hash::hash_reader;
use crate::manifest::{PageRecord, SiteInfo};
use crate::render::{DocumentFields, DocumentRenderer, MetaValue, RenderError};
use crate::scan::page_path;
use crate::template::{PageContext, PageTemplater};
use crate::write::write_atomic;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Format of `generated_at` timestamps.
pub const TIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// Site title used when the site file does not set one.
const UNTITLED_SITE: &str = "Untitled";

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to render {id}: {source}")]
    Render {
        id: String,
        #[source]
        source: RenderError,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of a page build that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Source hash matched the previous build; nothing was touched.
    Unchanged,
    /// The page was rendered and written.
    Built(PageRecord),
}

/// Current local time as a `generated_at` timestamp.
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIME_FMT).to_string()
}

/// Title used when a document does not declare one.
///
/// `my-first_post` → "my first post"; falls back to the id itself.
pub fn default_title(id: &str) -> String {
    let title = id.replace(['-', '_'], " ").trim().to_string();
    if title.is_empty() {
        id.to_string()
    } else {
        title
    }
}

/// Assemble a record from renderer metadata.
pub fn make_record(
    id: &str,
    content_hash: String,
    generated_at: String,
    meta: &BTreeMap<String, MetaValue>,
) -> PageRecord {
    let fields = DocumentFields::from_meta(meta);
    PageRecord {
        id: id.to_string(),
        content_hash,
        generated_at,
        title: fields.title.unwrap_or_else(|| default_title(id)),
        description: fields.description,
        publish_date: fields.publish_date,
        meta: fields.extra,
    }
}

/// Renders documents into `<output_root>/<id>/index.html`.
#[derive(Clone, Copy)]
pub struct PageBuilder<'a> {
    renderer: &'a dyn DocumentRenderer,
    templater: &'a dyn PageTemplater,
    output_root: &'a Path,
    site: Option<&'a SiteInfo>,
}

impl<'a> PageBuilder<'a> {
    pub fn new(
        renderer: &'a dyn DocumentRenderer,
        templater: &'a dyn PageTemplater,
        output_root: &'a Path,
    ) -> Self {
        Self {
            renderer,
            templater,
            output_root,
            site: None,
        }
    }

    /// Site info made available to every page template.
    pub fn with_site(mut self, site: Option<&'a SiteInfo>) -> Self {
        self.site = site;
        self
    }

    /// Build one document.
    ///
    /// Returns [`BuildOutcome::Unchanged`] without rendering when `force` is
    /// off and the source hash equals `previous_hash`.
    pub fn build(
        &self,
        id: &str,
        source_path: &Path,
        previous_hash: Option<&str>,
        force: bool,
    ) -> Result<BuildOutcome, PageError> {
        let read_err = |source: io::Error| PageError::Read {
            path: source_path.to_path_buf(),
            source,
        };

        let mut file = File::open(source_path).map_err(read_err)?;
        let hash = hash_reader(&mut file).map_err(read_err)?;
        if !force && previous_hash == Some(hash.as_str()) {
            return Ok(BuildOutcome::Unchanged);
        }

        let mut text = String::new();
        file.read_to_string(&mut text).map_err(read_err)?;

        let render_err = |source: RenderError| PageError::Render {
            id: id.to_string(),
            source,
        };
        let doc = self.renderer.render(&text).map_err(render_err)?;
        let record = make_record(id, hash, timestamp_now(), &doc.meta);

        let ctx = PageContext {
            site: self.site,
            id,
            title: &record.title,
            description: record.description.as_deref(),
            publish_date: record.publish_date.as_deref(),
            generated_at: &record.generated_at,
            meta: &record.meta,
            body: &doc.body,
        };
        let html = self.templater.render_page(&ctx).map_err(render_err)?;

        let path = page_path(self.output_root, id);
        write_atomic(&path, html.as_bytes())
            .map_err(|source| PageError::Write { path, source })?;

        Ok(BuildOutcome::Built(record))
    }
}

/// Read the site file and compute the site-wide metadata.
///
/// When the file's hash matches `previous`, that info is returned as is
/// and the renderer is not called.
pub fn read_site_info(
    path: &Path,
    renderer: &dyn DocumentRenderer,
    previous: Option<&SiteInfo>,
) -> Result<SiteInfo, PageError> {
    let read_err = |source: io::Error| PageError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(read_err)?;
    let content_hash = hash_reader(&mut file).map_err(read_err)?;
    if let Some(previous) = previous.filter(|p| p.content_hash == content_hash) {
        return Ok(previous.clone());
    }
    let mut text = String::new();
    file.read_to_string(&mut text).map_err(read_err)?;

    let doc = renderer.render(&text).map_err(|source| PageError::Render {
        id: path.display().to_string(),
        source,
    })?;
    let fields = DocumentFields::from_meta(&doc.meta);

    Ok(SiteInfo {
        content_hash,
        title: fields.title.unwrap_or_else(|| UNTITLED_SITE.to_string()),
        description: fields.description,
        meta: fields.extra,
    })
}
