//! Table of contents.
//!
//! Only records with a publish date are listed. Entries are sorted newest
//! first by plain string comparison, which is correct for fixed-width
//! `YYYY-MM-DD` dates. Posts sharing a date are ordered by id so the
//! output never depends on scan order.

use crate::manifest::{PageRecord, SiteInfo};
use crate::render::RenderError;
use crate::template::{IndexContext, PageTemplater};

/// One line of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub publish_date: String,
}

/// Index-eligible records as entries, newest first, ties by id.
pub fn index_entries<'a>(records: impl IntoIterator<Item = &'a PageRecord>) -> Vec<IndexEntry> {
    let mut entries: Vec<IndexEntry> = records
        .into_iter()
        .filter_map(|r| {
            r.publish_date.as_ref().map(|date| IndexEntry {
                id: r.id.clone(),
                title: r.title.clone(),
                description: r.description.clone(),
                publish_date: date.clone(),
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        b.publish_date
            .cmp(&a.publish_date)
            .then_with(|| a.id.cmp(&b.id))
    });
    entries
}

/// Render the index page from already-selected entries.
pub fn render_index(
    templater: &dyn PageTemplater,
    site: Option<&SiteInfo>,
    entries: &[IndexEntry],
) -> Result<String, RenderError> {
    templater.render_index(&IndexContext { site, entries })
}

/// Select, sort and render the index for a set of records.
pub fn build_index<'a>(
    templater: &dyn PageTemplater,
    site: Option<&SiteInfo>,
    records: impl IntoIterator<Item = &'a PageRecord>,
) -> Result<String, RenderError> {
    let entries = index_entries(records);
    render_index(templater, site, &entries)
}
