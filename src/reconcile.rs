//! Reconciliation: diff the manifest against the source tree and the
//! output tree, and decide what a run has to do.
//!
//! Three id sets go in:
//!
//! | set      | meaning                                   |
//! |----------|-------------------------------------------|
//! | manifest | ids recorded as built by the previous run |
//! | source   | ids that currently have a source document |
//! | output   | ids that currently have a rendered page   |
//!
//! and a [`Plan`] comes out:
//!
//! ```text
//! matched       = manifest ∩ output
//! to_delete     = manifest − source
//! to_add        = source − matched         (all of source when forced)
//! to_update     = source ∩ matched         (empty when forced)
//! missing       = manifest − output        (recorded but not on disk)
//! orphaned      = output − manifest − source
//! remove_output = to_delete ∩ output
//! dropped       = to_delete − output       (record only, nothing to delete)
//! ```
//!
//! `to_add` and `to_update` are disjoint and together cover every source
//! id, so a single run builds each document at most once. Computing a plan
//! touches neither disk nor manifest.

use crate::manifest::{DocumentId, Manifest, PageRecord, SiteInfo};
use crate::scan::SourceDocs;
use std::collections::BTreeSet;
use std::path::PathBuf;

type IdSet = BTreeSet<DocumentId>;

/// What a run has to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub matched: IdSet,
    pub to_delete: IdSet,
    pub to_add: IdSet,
    pub to_update: IdSet,
    pub missing: IdSet,
    pub orphaned: IdSet,
    pub remove_output: IdSet,
    pub dropped: IdSet,
    pub force: bool,
}

/// One page build the engine has to attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub id: DocumentId,
    pub source: PathBuf,
    /// Hash from the previous build. `None` for additions, which always
    /// render.
    pub previous_hash: Option<String>,
}

impl Plan {
    pub fn compute(manifest: &IdSet, source: &IdSet, output: &IdSet, force: bool) -> Self {
        let matched: IdSet = manifest.intersection(output).cloned().collect();
        let to_delete: IdSet = manifest.difference(source).cloned().collect();

        let (to_add, to_update) = if force {
            (source.clone(), IdSet::new())
        } else {
            (
                source.difference(&matched).cloned().collect(),
                source.intersection(&matched).cloned().collect(),
            )
        };

        let missing = manifest.difference(output).cloned().collect();
        let orphaned = output
            .iter()
            .filter(|id| !manifest.contains(*id) && !source.contains(*id))
            .cloned()
            .collect();
        let remove_output = to_delete.intersection(output).cloned().collect();
        let dropped = to_delete.difference(output).cloned().collect();

        Self {
            matched,
            to_delete,
            to_add,
            to_update,
            missing,
            orphaned,
            remove_output,
            dropped,
            force,
        }
    }

    /// Page builds for this plan: additions first, then updates.
    ///
    /// Ids without a source path are skipped; they cannot occur when the
    /// plan was computed from the same `sources`.
    pub fn build_jobs(&self, manifest: &Manifest, sources: &SourceDocs) -> Vec<BuildJob> {
        let additions = self.to_add.iter().filter_map(|id| {
            sources.get(id).map(|path| BuildJob {
                id: id.clone(),
                source: path.clone(),
                previous_hash: None,
            })
        });
        let updates = self.to_update.iter().filter_map(|id| {
            sources.get(id).map(|path| BuildJob {
                id: id.clone(),
                source: path.clone(),
                previous_hash: manifest.get(id).map(|r| r.content_hash.clone()),
            })
        });
        additions.chain(updates).collect()
    }

    /// The manifest after this run: old records minus deletions, with every
    /// rebuilt record replacing or adding its entry.
    pub fn apply(
        &self,
        old: &Manifest,
        site: Option<SiteInfo>,
        updated: impl IntoIterator<Item = PageRecord>,
    ) -> Manifest {
        let kept = old
            .records()
            .filter(|r| !self.to_delete.contains(&r.id))
            .cloned();
        let mut next = Manifest::from_records(site, kept);
        for record in updated {
            next.insert(record);
        }
        next
    }

    /// Whether the manifest has to be written back.
    ///
    /// `changed` is true when at least one page was rebuilt or the stored
    /// manifest was discarded.
    pub fn requires_write_back(&self, changed: bool) -> bool {
        self.force || changed || !self.to_delete.is_empty()
    }
}
