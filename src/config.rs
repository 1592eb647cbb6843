//! Build configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Every key is
//! optional: user values are merged on top of the stock defaults, unknown
//! keys are rejected to catch typos early, and the merged result is
//! validated before a build starts. Command-line flags override the file.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! content_root = "content"        # Source documents
//! output_root = "docs"            # Rendered site
//! manifest_path = "manifest.json" # What has been built
//!
//! [source]
//! extension = "md"                # Document file extension
//! layout = "flat"                 # "flat" (<id>.md) or "nested" (<id>/index.md)
//! site_file = "site.md"           # Site-wide metadata ("" to disable)
//!
//! [build]
//! on_corrupt_manifest = "abort"   # "abort" or "reset"
//! on_page_error = "abort"         # "abort" or "skip"
//!
//! [processing]
//! max_processes = 4               # Max parallel page builds (omit for auto = CPU cores)
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Everything a run needs to know, passed explicitly into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory holding the source documents.
    pub content_root: PathBuf,
    /// Directory the rendered site is written to.
    pub output_root: PathBuf,
    /// Location of the build manifest.
    pub manifest_path: PathBuf,
    /// How source documents are discovered.
    pub source: SourceConfig,
    /// Failure policies.
    pub build: PolicyConfig,
    /// Parallel build settings.
    pub processing: ProcessingConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("content"),
            output_root: PathBuf::from("docs"),
            manifest_path: PathBuf::from("manifest.json"),
            source: SourceConfig::default(),
            build: PolicyConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = &self.source.extension;
        if ext.is_empty() {
            return Err(ConfigError::Validation(
                "source.extension must not be empty".into(),
            ));
        }
        if ext.starts_with('.') || ext.contains('/') || ext.contains('\\') {
            return Err(ConfigError::Validation(format!(
                "source.extension must be a bare extension like \"md\", got \"{}\"",
                ext
            )));
        }
        let site_file = &self.source.site_file;
        if site_file.contains('/') || site_file.contains('\\') {
            return Err(ConfigError::Validation(
                "source.site_file must be a file name inside content_root".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if self.manifest_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "manifest_path must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Path of the site file, if one is configured.
    pub fn site_file_path(&self) -> Option<PathBuf> {
        if self.source.site_file.is_empty() {
            None
        } else {
            Some(self.content_root.join(&self.source.site_file))
        }
    }
}

/// Where documents live and what they look like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Document extension without the dot, matched case-insensitively.
    pub extension: String,
    pub layout: SourceLayout,
    /// File in `content_root` holding site-wide metadata. Empty disables it.
    pub site_file: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            extension: "md".to_string(),
            layout: SourceLayout::Flat,
            site_file: "site.md".to_string(),
        }
    }
}

/// How a document id maps onto the content directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLayout {
    /// `<root>/<id>.<ext>`
    #[default]
    Flat,
    /// `<root>/<id>/index.<ext>`
    Nested,
}

/// What to do when things go wrong.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub on_corrupt_manifest: CorruptManifestPolicy,
    pub on_page_error: PageErrorPolicy,
}

/// Handling of a manifest file that exists but cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptManifestPolicy {
    /// Fail the run and leave everything on disk untouched.
    #[default]
    Abort,
    /// Warn, start from an empty manifest and rebuild every document.
    Reset,
}

/// Handling of a document that fails to read, render or write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageErrorPolicy {
    /// Fail the run before the manifest is written.
    #[default]
    Abort,
    /// Warn and keep going; the failed document keeps its previous record.
    Skip,
}

/// Parallel build settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel page builds.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BuildConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BuildConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a `config.toml` path, falling back to stock defaults
/// when the file doesn't exist.
pub fn load_config(path: &Path) -> Result<BuildConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Quire Configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.
# Command-line flags (--source, --output, --manifest-path) override these.

# Directory holding the source documents.
content_root = "content"

# Directory the rendered site is written to. Each document becomes
# <output_root>/<id>/index.html; the table of contents is <output_root>/index.html.
output_root = "docs"

# Record of what has been built. Delete it (or pass --rebuild) to rebuild everything.
manifest_path = "manifest.json"

# ---------------------------------------------------------------------------
# Source documents
# ---------------------------------------------------------------------------
[source]
# Document file extension, without the dot.
extension = "md"

# "flat":   content/<id>.md
# "nested": content/<id>/index.md
layout = "flat"

# Site-wide metadata (e.g. "Title: My Blog") read from this file in content_root.
# Changing it rebuilds every page. Set to "" to disable.
site_file = "site.md"

# ---------------------------------------------------------------------------
# Failure policies
# ---------------------------------------------------------------------------
[build]
# When the manifest file exists but cannot be parsed:
#   "abort" - stop without touching anything
#   "reset" - warn, start from an empty manifest and rebuild everything
on_corrupt_manifest = "abort"

# When a document fails to read or render:
#   "abort" - stop before the manifest is written
#   "skip"  - warn and keep the document's previous record
on_page_error = "abort"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel page builds.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
