//! CLI output formatting for build runs.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! deleted   old-post
//! added     hello "Hello, world"
//! updated   about "About"
//! index     2 entries
//! manifest  3 pages → manifest.json
//! 2 built, 1 unchanged, 1 deleted
//! ```
//!
//! Warnings are prefixed with `warning:` and go to stderr. With `-v`, scan
//! counts and unchanged documents are listed too.
//!
//! ## Check
//!
//! ```text
//! Plan
//!     add: hello
//!     update: about, contact
//!     delete: old-post
//! 1 to add, 2 to check, 1 to delete
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to the terminal. Format functions are
//! pure: no I/O, no side effects.

use crate::engine::{BuildEvent, BuildKind, Reconciliation};
use std::collections::BTreeSet;

/// Width of the action column.
const LABEL_WIDTH: usize = 9;

fn action(label: &str, rest: &str) -> String {
    format!("{:<width$} {}", label, rest, width = LABEL_WIDTH)
}

fn warning(text: String) -> String {
    format!("warning: {}", text)
}

fn id_list(ids: &BTreeSet<String>) -> String {
    ids.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// Build events
// ============================================================================

/// Format a single build event as display lines.
pub fn format_event(event: &BuildEvent) -> Vec<String> {
    let line = match event {
        BuildEvent::Scanned {
            sources,
            outputs,
            recorded,
        } => format!(
            "Scanned {} sources, {} outputs, {} recorded",
            sources, outputs, recorded
        ),
        BuildEvent::ContentRootMissing { path } => warning(format!(
            "content directory {} does not exist",
            path.display()
        )),
        BuildEvent::ManifestReset { path, reason } => warning(format!(
            "discarding unusable manifest {}: {}",
            path.display(),
            reason
        )),
        BuildEvent::SiteChanged => "Site file changed, rebuilding every page".to_string(),
        BuildEvent::MissingOutput { id } => {
            warning(format!("{}: output directory missing, rebuilding", id))
        }
        BuildEvent::OrphanedOutput { id } => {
            warning(format!("{}: output directory has no source, leaving it", id))
        }
        BuildEvent::Deleted {
            id,
            removed_output: true,
        } => action("deleted", id),
        BuildEvent::Deleted {
            id,
            removed_output: false,
        } => action("dropped", &format!("{} (output already gone)", id)),
        BuildEvent::Built { id, title, kind } => {
            let label = match kind {
                BuildKind::Added => "added",
                BuildKind::Updated => "updated",
                BuildKind::Forced => "rebuilt",
            };
            action(label, &format!("{} \"{}\"", id, title))
        }
        BuildEvent::Unchanged { id } => action("unchanged", id),
        BuildEvent::PageSkipped { id, error } => warning(format!("{}: skipped: {}", id, error)),
        BuildEvent::IndexWritten { entries } => {
            let noun = if *entries == 1 { "entry" } else { "entries" };
            action("index", &format!("{} {}", entries, noun))
        }
        BuildEvent::ManifestWritten { path, pages } => {
            action("manifest", &format!("{} pages → {}", pages, path.display()))
        }
    };
    vec![line]
}

/// Print an event: warnings to stderr, verbose-only events when `verbose`.
pub fn print_event(event: &BuildEvent, verbose: bool) {
    if event.is_verbose() && !verbose {
        return;
    }
    for line in format_event(event) {
        if event.is_warning() {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

// ============================================================================
// Check: the plan without executing it
// ============================================================================

/// Format a reconciliation as a plan listing.
pub fn format_plan(rec: &Reconciliation) -> Vec<String> {
    let plan = &rec.plan;
    let mut lines = vec!["Plan".to_string()];

    if plan.force {
        let why = if rec.site_changed {
            "site file changed"
        } else {
            "forced"
        };
        lines.push(format!("    rebuild all ({})", why));
    }
    if rec.manifest_reset {
        lines.push("    manifest discarded".to_string());
    }

    let sections: [(&str, &BTreeSet<String>); 6] = [
        ("add", &plan.to_add),
        ("update", &plan.to_update),
        ("delete", &plan.remove_output),
        ("drop record", &plan.dropped),
        ("missing output", &plan.missing),
        ("orphaned output", &plan.orphaned),
    ];
    for (label, ids) in sections {
        if !ids.is_empty() {
            lines.push(format!("    {}: {}", label, id_list(ids)));
        }
    }

    lines.push(format!(
        "{} to add, {} to check, {} to delete",
        plan.to_add.len(),
        plan.to_update.len(),
        plan.to_delete.len()
    ));
    lines
}

pub fn print_plan(rec: &Reconciliation) {
    for line in format_plan(rec) {
        println!("{}", line);
    }
}
