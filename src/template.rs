//! Page and index templates.
//!
//! The engine only depends on the [`PageTemplater`] trait; contexts are
//! typed structs rather than string maps so a template cannot ask for a
//! field that does not exist.
//!
//! [`HtmlTemplater`] is the default implementation, written with
//! [maud](https://maud.lambda.xyz/): every interpolated metadata value is
//! escaped, and only the renderer's body markup is embedded verbatim.
//!
//! ## Output Structure
//!
//! ```text
//! docs/
//! ├── index.html        # render_index: posts, newest first
//! └── <id>/index.html   # render_page: one document
//! ```

use crate::index::IndexEntry;
use crate::manifest::SiteInfo;
use crate::render::RenderError;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::collections::BTreeMap;

/// Everything a single page template may use.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub site: Option<&'a SiteInfo>,
    pub id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub publish_date: Option<&'a str>,
    pub generated_at: &'a str,
    pub meta: &'a BTreeMap<String, String>,
    /// Rendered body markup.
    pub body: &'a str,
}

/// Everything the index template may use. Empty `entries` is the
/// empty-site state and must render normally.
#[derive(Debug, Clone, Copy)]
pub struct IndexContext<'a> {
    pub site: Option<&'a SiteInfo>,
    pub entries: &'a [IndexEntry],
}

/// Produces final page markup from a context.
pub trait PageTemplater: Sync {
    fn render_page(&self, ctx: &PageContext<'_>) -> Result<String, RenderError>;
    fn render_index(&self, ctx: &IndexContext<'_>) -> Result<String, RenderError>;
}

const CSS: &str = "\
body{max-width:42rem;margin:0 auto;padding:2rem 1rem;font:1.05rem/1.6 Georgia,serif;color:#111;background:#fff}\
a{color:#333}a:hover{color:#000}\
.site-header{margin-bottom:2rem}.site-header a{text-decoration:none;font-weight:bold}\
.meta,.toc time,.generated{color:#666;font-size:.9rem}\
.toc{list-style:none;padding:0}.toc li{margin-bottom:1rem}\
.toc time{display:inline-block;min-width:7rem}\
@media (prefers-color-scheme:dark){body{color:#eee;background:#0a0a0a}a{color:#ccc}a:hover{color:#fff}.meta,.toc time,.generated{color:#999}}";

/// Fallback site title when there is no site file.
const DEFAULT_SITE_TITLE: &str = "Home";

/// maud templates for the page and the index.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTemplater;

impl HtmlTemplater {
    pub fn new() -> Self {
        Self
    }
}

impl PageTemplater for HtmlTemplater {
    fn render_page(&self, ctx: &PageContext<'_>) -> Result<String, RenderError> {
        Ok(render_page(ctx).into_string())
    }

    fn render_index(&self, ctx: &IndexContext<'_>) -> Result<String, RenderError> {
        Ok(render_index(ctx).into_string())
    }
}

fn site_title(site: Option<&SiteInfo>) -> &str {
    site.map(|s| s.title.as_str()).unwrap_or(DEFAULT_SITE_TITLE)
}

/// Renders the base HTML document structure
fn base_document(title: &str, description: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                @if let Some(desc) = description {
                    meta name="description" content=(desc);
                }
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                (content)
            }
        }
    }
}

fn render_page(ctx: &PageContext<'_>) -> Markup {
    let site = site_title(ctx.site);
    let page_title = if ctx.title == site {
        ctx.title.to_string()
    } else {
        format!("{} - {}", ctx.title, site)
    };

    let content = html! {
        header.site-header {
            a href="../" { (site) }
        }
        main {
            article {
                h1 { (ctx.title) }
                @if let Some(date) = ctx.publish_date {
                    p.meta { time datetime=(date) { (date) } }
                }
                @if let Some(desc) = ctx.description {
                    p.description { em { (desc) } }
                }
                (PreEscaped(ctx.body))
            }
            @if !ctx.meta.is_empty() {
                dl.meta {
                    @for (key, value) in ctx.meta {
                        dt { (key) }
                        dd { (value) }
                    }
                }
            }
        }
        footer {
            p.generated { "Generated " (ctx.generated_at) }
        }
    };

    base_document(&page_title, ctx.description, content)
}

fn render_index(ctx: &IndexContext<'_>) -> Markup {
    let site = site_title(ctx.site);
    let description = ctx.site.and_then(|s| s.description.as_deref());

    let content = html! {
        header.site-header {
            h1 { (site) }
            @if let Some(desc) = description {
                p.description { (desc) }
            }
        }
        main {
            @if ctx.entries.is_empty() {
                p.empty { "Nothing published yet." }
            } @else {
                ul.toc {
                    @for entry in ctx.entries {
                        li {
                            time datetime=(entry.publish_date) { (entry.publish_date) }
                            a href={ (entry.id) "/" } { (entry.title) }
                            @if let Some(desc) = &entry.description {
                                br;
                                span.description { (desc) }
                            }
                        }
                    }
                }
            }
        }
    };

    base_document(site, description, content)
}
