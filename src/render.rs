//! Document rendering: source text → body markup + metadata.
//!
//! The engine only depends on the [`DocumentRenderer`] trait. The default
//! implementation, [`MarkdownRenderer`], converts markdown with
//! pulldown-cmark after stripping a leading metadata block:
//!
//! ```text
//! Title: Hello, world
//! Date: 2024-03-01
//! Tags: rust
//!       static-sites
//!
//! The body starts after the first blank line.
//! ```
//!
//! ## Metadata block rules
//!
//! - The block may be fenced by `---` lines; the fence is optional.
//! - `Key: value` starts a field. Keys are lower-cased.
//! - A line indented by four or more spaces appends another value to the
//!   previous field, making it multi-valued.
//! - The block ends at the first blank line or closing `---`/`...`. Any
//!   other line ends it too and is kept as the first line of the body.
//!
//! ## Field mapping
//!
//! [`DocumentFields::from_meta`] turns the raw mapping into the fields the
//! manifest records: `title`, `description` (or `desc`), `date` → publish
//! date. Everything else is passed through as extra metadata. Multi-valued
//! fields are joined with `"; "`.

use pulldown_cmark::{Options, Parser, html as md_html};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Markup rendering failed: {0}")]
    Markup(String),
    #[error("Template rendering failed: {0}")]
    Template(String),
}

/// A metadata value as written by the author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    Single(String),
    List(Vec<String>),
}

impl MetaValue {
    /// Display form: list values joined with `"; "`, trimmed.
    pub fn joined(&self) -> String {
        match self {
            MetaValue::Single(v) => v.trim().to_string(),
            MetaValue::List(values) => values.join("; ").trim().to_string(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            MetaValue::Single(first) => {
                let first = std::mem::take(first);
                *self = MetaValue::List(vec![first, value]);
            }
            MetaValue::List(values) => values.push(value),
        }
    }
}

/// Output of a [`DocumentRenderer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Rendered body markup, embedded verbatim by the templater.
    pub body: String,
    pub meta: BTreeMap<String, MetaValue>,
}

/// Converts raw document text into body markup plus metadata.
pub trait DocumentRenderer: Sync {
    fn render(&self, text: &str) -> Result<RenderedDocument, RenderError>;
}

/// Metadata fields after normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub publish_date: Option<String>,
    /// All remaining keys, joined to display strings.
    pub extra: BTreeMap<String, String>,
}

impl DocumentFields {
    /// Split renderer metadata into the recorded fields and the rest.
    /// Empty values count as absent.
    pub fn from_meta(meta: &BTreeMap<String, MetaValue>) -> Self {
        let mut extra: BTreeMap<String, String> = meta
            .iter()
            .map(|(k, v)| (k.clone(), v.joined()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let title = extra.remove("title");
        let description = extra.remove("description");
        let desc = extra.remove("desc");
        let publish_date = extra.remove("date");

        Self {
            title,
            description: description.or(desc),
            publish_date,
            extra,
        }
    }
}

/// Markdown with tables, footnotes, strikethrough and smart punctuation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }

    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_SMART_PUNCTUATION
    }
}

impl DocumentRenderer for MarkdownRenderer {
    fn render(&self, text: &str) -> Result<RenderedDocument, RenderError> {
        let (meta, body_text) = split_meta(text);

        let parser = Parser::new_ext(body_text, Self::options());
        let mut body = String::new();
        md_html::push_html(&mut body, parser);

        Ok(RenderedDocument { body, meta })
    }
}

/// Split a leading metadata block off `text`.
///
/// Returns the parsed fields and the remaining body text.
pub fn split_meta(text: &str) -> (BTreeMap<String, MetaValue>, &str) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut meta: BTreeMap<String, MetaValue> = BTreeMap::new();
    let mut last_key: Option<String> = None;
    let mut offset = 0;
    let mut fenced = false;

    for (i, raw) in text.split_inclusive('\n').enumerate() {
        let line = raw.trim_end_matches(['\n', '\r']);

        if i == 0 && line.trim_end() == "---" {
            fenced = true;
            offset += raw.len();
            continue;
        }
        if line.trim().is_empty() {
            offset += raw.len();
            break;
        }
        if matches!(line.trim_end(), "---" | "...") && (fenced || i > 0) {
            offset += raw.len();
            break;
        }

        if let Some((key, value)) = parse_key_line(line) {
            let value = value.trim().to_string();
            meta.entry(key.clone())
                .and_modify(|existing| existing.push(value.clone()))
                .or_insert(MetaValue::Single(value));
            last_key = Some(key);
        } else if let (Some(value), Some(key)) = (continuation(line), last_key.as_ref()) {
            if let Some(existing) = meta.get_mut(key) {
                existing.push(value.trim().to_string());
            }
        } else {
            break;
        }
        offset += raw.len();
    }

    if meta.is_empty() && !fenced {
        return (meta, text);
    }
    (meta, &text[offset..])
}

/// `Key: value` with at most three leading spaces.
fn parse_key_line(line: &str) -> Option<(String, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let (key, value) = line[indent..].split_once(':')?;
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then(|| (key.to_ascii_lowercase(), value))
}

/// Continuation value: four or more leading spaces (or a tab).
fn continuation(line: &str) -> Option<&str> {
    if line.starts_with("    ") || line.starts_with('\t') {
        Some(line.trim())
    } else {
        None
    }
}
