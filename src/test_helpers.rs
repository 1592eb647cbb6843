//! Shared test utilities for the quire test suite.
//!
//! Provides a throwaway site layout on disk and recording test doubles for
//! the renderer and templater seams.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = TestSite::new();
//! site.write_doc("hello", &post("Hello", "2024-03-01"));
//!
//! let (renderer, templater) = (MockRenderer::new(), MockTemplater::new());
//! Engine::new(&site.config(), &renderer, &templater).run(false).unwrap();
//!
//! assert_eq!(renderer.call_count(), 1);
//! assert_eq!(templater.pages(), vec!["hello"]);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

use crate::config::BuildConfig;
use crate::manifest::Manifest;
use crate::render::{DocumentRenderer, MarkdownRenderer, RenderError, RenderedDocument};
use crate::scan::{index_path, list_output_ids, page_path};
use crate::template::{IndexContext, PageContext, PageTemplater};

// =========================================================================
// Fixture setup
// =========================================================================

/// A temp directory laid out as `content/`, `docs/` and `manifest.json`.
pub struct TestSite {
    tmp: TempDir,
}

impl TestSite {
    /// Create the site with an empty content directory.
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("content")).unwrap();
        Self { tmp }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn content_root(&self) -> PathBuf {
        self.root().join("content")
    }

    pub fn output_root(&self) -> PathBuf {
        self.root().join("docs")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join("manifest.json")
    }

    /// Default config pointed at this site's directories.
    pub fn config(&self) -> BuildConfig {
        BuildConfig {
            content_root: self.content_root(),
            output_root: self.output_root(),
            manifest_path: self.manifest_path(),
            ..BuildConfig::default()
        }
    }

    pub fn doc_path(&self, id: &str) -> PathBuf {
        self.content_root().join(format!("{id}.md"))
    }

    pub fn write_doc(&self, id: &str, text: &str) {
        fs::write(self.doc_path(id), text).unwrap();
    }

    pub fn remove_doc(&self, id: &str) {
        fs::remove_file(self.doc_path(id)).unwrap();
    }

    pub fn site_path(&self) -> PathBuf {
        self.content_root().join("site.md")
    }

    pub fn write_site(&self, text: &str) {
        fs::write(self.site_path(), text).unwrap();
    }

    pub fn page_path(&self, id: &str) -> PathBuf {
        page_path(&self.output_root(), id)
    }

    pub fn index_path(&self) -> PathBuf {
        index_path(&self.output_root())
    }

    /// Load the manifest. Panics if it is missing or unreadable.
    pub fn manifest(&self) -> Manifest {
        Manifest::load(&self.manifest_path()).unwrap()
    }

    pub fn manifest_bytes(&self) -> Vec<u8> {
        fs::read(self.manifest_path()).unwrap()
    }

    pub fn output_ids(&self) -> Vec<String> {
        list_output_ids(&self.output_root())
            .unwrap()
            .into_iter()
            .collect()
    }
}

/// Document text with a title and publish date.
pub fn post(title: &str, date: &str) -> String {
    format!("Title: {title}\nDate: {date}\n\nBody of {title}.\n")
}

// =========================================================================
// Test doubles
// =========================================================================

/// Markdown renderer that records every call and can be told to fail.
///
/// Uses Mutex (not RefCell) so it is Sync and works on the build pool.
pub struct MockRenderer {
    calls: Mutex<Vec<String>>,
    fail_marker: Option<String>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_marker: None,
        }
    }

    /// Fail on any text containing `marker`.
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::new()
        }
    }

    /// Texts passed to `render`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl DocumentRenderer for MockRenderer {
    fn render(&self, text: &str) -> Result<RenderedDocument, RenderError> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(marker) = self.fail_marker.as_deref().filter(|m| text.contains(m)) {
            return Err(RenderError::Markup(format!("mock failure on {marker}")));
        }
        MarkdownRenderer::new().render(text)
    }
}

/// Templater producing one-line markers and recording what it rendered.
///
/// Pages render as `page:<id>|title:<title>|site:<site title>`, the index
/// as `index:<id>,<id>,...`.
pub struct MockTemplater {
    pages: Mutex<Vec<String>>,
    indexes: Mutex<Vec<Vec<String>>>,
}

impl MockTemplater {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            indexes: Mutex::new(Vec::new()),
        }
    }

    /// Ids of rendered pages, sorted (builds run in parallel).
    pub fn pages(&self) -> Vec<String> {
        let mut pages = self.pages.lock().unwrap().clone();
        pages.sort();
        pages
    }

    /// Entry ids of every rendered index, in render order.
    pub fn indexes(&self) -> Vec<Vec<String>> {
        self.indexes.lock().unwrap().clone()
    }
}

impl PageTemplater for MockTemplater {
    fn render_page(&self, ctx: &PageContext<'_>) -> Result<String, RenderError> {
        self.pages.lock().unwrap().push(ctx.id.to_string());
        let site = ctx.site.map(|s| s.title.as_str()).unwrap_or("");
        Ok(format!("page:{}|title:{}|site:{}", ctx.id, ctx.title, site))
    }

    fn render_index(&self, ctx: &IndexContext<'_>) -> Result<String, RenderError> {
        let ids: Vec<String> = ctx.entries.iter().map(|e| e.id.clone()).collect();
        let html = format!("index:{}", ids.join(","));
        self.indexes.lock().unwrap().push(ids);
        Ok(html)
    }
}
