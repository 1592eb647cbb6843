//! The build engine: one run of load → reconcile → delete → build →
//! index → save.
//!
//! ## Run order
//!
//! ```text
//! 1. Load     manifest.json (missing = empty; corrupt = policy)
//! 2. Scan     content root, output root, site file
//! 3. Plan     Plan::compute (no writes)
//! 4. Delete   remove output dirs of documents whose source is gone
//! 5. Build    additions, then updates, on a rayon pool
//! 6. Index    rewrite output/index.html when its entries changed
//! 7. Save     rewrite manifest.json when anything changed
//! ```
//!
//! The manifest is always written last, so a crash leaves it describing
//! the previous run. Pages that were rebuilt before the crash are simply
//! rebuilt again next time.
//!
//! ## Progress
//!
//! The engine never prints. Callers that want progress pass an
//! `mpsc::Sender<BuildEvent>` via [`Engine::with_events`] and format the
//! events themselves (see `output::format_event`). Events are only sent
//! from the calling thread, after parallel work has been collected.

use crate::config::{
    BuildConfig, CorruptManifestPolicy, PageErrorPolicy, effective_threads,
};
use crate::index::{build_index, index_entries};
use crate::manifest::{DocumentId, Manifest, ManifestError, SiteInfo};
use crate::page::{BuildOutcome, PageBuilder, PageError, read_site_info};
use crate::reconcile::{BuildJob, Plan};
use crate::render::{DocumentRenderer, MarkdownRenderer, RenderError};
use crate::scan::{ScanError, SourceDocs, index_path, list_output_ids, list_source_ids, page_dir};
use crate::template::{HtmlTemplater, PageTemplater};
use crate::write::write_atomic;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("Failed to read site file: {0}")]
    Site(#[source] PageError),
    #[error("Failed to render index: {0}")]
    Index(#[source] RenderError),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to remove {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to start build threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Why a page was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    /// No usable previous output.
    Added,
    /// Source bytes changed since the previous build.
    Updated,
    /// Rebuilt unconditionally (`--rebuild` or site file change).
    Forced,
}

/// Progress reported while a run executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// Sources and outputs found, before any work.
    Scanned {
        sources: usize,
        outputs: usize,
        recorded: usize,
    },
    ContentRootMissing {
        path: PathBuf,
    },
    /// The stored manifest could not be used and was replaced by an empty one.
    ManifestReset {
        path: PathBuf,
        reason: String,
    },
    SiteChanged,
    /// Recorded as built, but its output directory is gone.
    MissingOutput {
        id: DocumentId,
    },
    /// Output directory unknown to both the manifest and the sources.
    OrphanedOutput {
        id: DocumentId,
    },
    Deleted {
        id: DocumentId,
        removed_output: bool,
    },
    Built {
        id: DocumentId,
        title: String,
        kind: BuildKind,
    },
    Unchanged {
        id: DocumentId,
    },
    /// A page failed and was skipped under `on_page_error = "skip"`.
    PageSkipped {
        id: DocumentId,
        error: String,
    },
    IndexWritten {
        entries: usize,
    },
    ManifestWritten {
        path: PathBuf,
        pages: usize,
    },
}

impl BuildEvent {
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            BuildEvent::ContentRootMissing { .. }
                | BuildEvent::ManifestReset { .. }
                | BuildEvent::MissingOutput { .. }
                | BuildEvent::OrphanedOutput { .. }
                | BuildEvent::PageSkipped { .. }
        )
    }

    /// Events only shown with `-v`.
    pub fn is_verbose(&self) -> bool {
        matches!(
            self,
            BuildEvent::Scanned { .. } | BuildEvent::Unchanged { .. }
        )
    }
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub added: Vec<DocumentId>,
    pub updated: Vec<DocumentId>,
    pub unchanged: usize,
    pub deleted: Vec<DocumentId>,
    /// Records removed whose output was already gone.
    pub dropped: Vec<DocumentId>,
    pub skipped: Vec<DocumentId>,
    pub warnings: usize,
    pub forced: bool,
    pub index_written: bool,
    pub manifest_written: bool,
}

impl BuildReport {
    pub fn built(&self) -> usize {
        self.added.len() + self.updated.len()
    }

    /// True when the run wrote nothing at all.
    pub fn is_noop(&self) -> bool {
        self.built() == 0
            && self.deleted.is_empty()
            && self.dropped.is_empty()
            && !self.index_written
            && !self.manifest_written
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            return write!(f, "Up to date ({} unchanged)", self.unchanged);
        }
        write!(
            f,
            "{} built, {} unchanged, {} deleted",
            self.built(),
            self.unchanged,
            self.deleted.len() + self.dropped.len()
        )?;
        if !self.skipped.is_empty() {
            write!(f, ", {} skipped", self.skipped.len())?;
        }
        if self.warnings > 0 {
            write!(f, " ({} warnings)", self.warnings)?;
        }
        Ok(())
    }
}

/// Everything known before any write.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub manifest: Manifest,
    /// The stored manifest was corrupt and replaced by an empty one.
    pub manifest_reset: bool,
    pub site: Option<SiteInfo>,
    pub site_changed: bool,
    pub sources: SourceDocs,
    pub outputs: BTreeSet<DocumentId>,
    pub plan: Plan,
}

impl Reconciliation {
    /// Recorded ids whose output is gone but whose source still exists.
    /// These are rebuilt as additions.
    pub fn missing_outputs(&self) -> impl Iterator<Item = &DocumentId> {
        self.plan
            .missing
            .iter()
            .filter(|id| !self.plan.to_delete.contains(*id))
    }
}

pub struct Engine<'a> {
    config: &'a BuildConfig,
    renderer: &'a dyn DocumentRenderer,
    templater: &'a dyn PageTemplater,
    events: Option<Sender<BuildEvent>>,
}

impl<'a> Engine<'a> {
    pub fn new(
        config: &'a BuildConfig,
        renderer: &'a dyn DocumentRenderer,
        templater: &'a dyn PageTemplater,
    ) -> Self {
        Self {
            config,
            renderer,
            templater,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Sender<BuildEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone means nobody is listening; the run continues.
            let _ = tx.send(event);
        }
    }

    /// Load, scan and plan without writing anything.
    pub fn reconcile(&self, force: bool) -> Result<Reconciliation, EngineError> {
        let (manifest, manifest_reset) = self.load_manifest()?;

        let content_root = &self.config.content_root;
        if !content_root.is_dir() {
            self.emit(BuildEvent::ContentRootMissing {
                path: content_root.clone(),
            });
        }

        let site_path = self.config.site_file_path();
        let site = match site_path.as_deref().filter(|p| p.is_file()) {
            Some(path) => Some(
                read_site_info(path, self.renderer, manifest.site.as_ref())
                    .map_err(EngineError::Site)?,
            ),
            None => None,
        };
        let stored_hash = manifest.site.as_ref().map(|s| s.content_hash.as_str());
        let site_changed = stored_hash != site.as_ref().map(|s| s.content_hash.as_str());

        let sources = list_source_ids(content_root, &self.config.source, site_path.as_deref())?;
        let outputs = list_output_ids(&self.config.output_root)?;
        let source_ids: BTreeSet<DocumentId> = sources.keys().cloned().collect();

        let plan = Plan::compute(&manifest.ids(), &source_ids, &outputs, force || site_changed);

        self.emit(BuildEvent::Scanned {
            sources: sources.len(),
            outputs: outputs.len(),
            recorded: manifest.len(),
        });

        Ok(Reconciliation {
            manifest,
            manifest_reset,
            site,
            site_changed,
            sources,
            outputs,
            plan,
        })
    }

    fn load_manifest(&self) -> Result<(Manifest, bool), EngineError> {
        let path = &self.config.manifest_path;
        match Manifest::load(path) {
            Ok(manifest) => Ok((manifest, false)),
            Err(ManifestError::NotFound(_)) => Ok((Manifest::empty(), false)),
            Err(e) if e.is_corrupt() => match self.config.build.on_corrupt_manifest {
                CorruptManifestPolicy::Abort => Err(e.into()),
                CorruptManifestPolicy::Reset => {
                    self.emit(BuildEvent::ManifestReset {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                    Ok((Manifest::empty(), true))
                }
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Execute one full run.
    pub fn run(&self, force: bool) -> Result<BuildReport, EngineError> {
        let rec = self.reconcile(force)?;
        let plan = &rec.plan;
        let mut report = BuildReport {
            forced: plan.force,
            warnings: usize::from(rec.manifest_reset)
                + usize::from(!self.config.content_root.is_dir()),
            ..BuildReport::default()
        };

        if rec.site_changed && !(rec.manifest.is_empty() && rec.manifest.site.is_none()) {
            self.emit(BuildEvent::SiteChanged);
        }
        for id in rec.missing_outputs() {
            report.warnings += 1;
            self.emit(BuildEvent::MissingOutput { id: id.clone() });
        }
        for id in &plan.orphaned {
            report.warnings += 1;
            self.emit(BuildEvent::OrphanedOutput { id: id.clone() });
        }

        self.delete_outputs(plan, &mut report)?;

        let jobs = plan.build_jobs(&rec.manifest, &rec.sources);
        let builder = PageBuilder::new(self.renderer, self.templater, &self.config.output_root)
            .with_site(rec.site.as_ref());
        let results = self.build_all(&builder, jobs, plan.force)?;

        let mut changed = rec.manifest_reset;
        let mut updated = Vec::new();
        for (job, result) in results {
            match result {
                Ok(BuildOutcome::Unchanged) => {
                    report.unchanged += 1;
                    self.emit(BuildEvent::Unchanged { id: job.id });
                }
                Ok(BuildOutcome::Built(record)) => {
                    let kind = if plan.force {
                        BuildKind::Forced
                    } else if job.previous_hash.is_some() {
                        BuildKind::Updated
                    } else {
                        BuildKind::Added
                    };
                    if kind == BuildKind::Updated {
                        report.updated.push(job.id.clone());
                    } else {
                        report.added.push(job.id.clone());
                    }
                    self.emit(BuildEvent::Built {
                        id: job.id,
                        title: record.title.clone(),
                        kind,
                    });
                    changed = true;
                    updated.push(record);
                }
                Err(e) => match self.config.build.on_page_error {
                    PageErrorPolicy::Abort => return Err(e.into()),
                    PageErrorPolicy::Skip => {
                        report.warnings += 1;
                        report.skipped.push(job.id.clone());
                        self.emit(BuildEvent::PageSkipped {
                            id: job.id,
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        // A skipped page still shows the old site info, so the old site hash
        // is kept and the next run is forced again.
        let recorded_site = if rec.site_changed && !report.skipped.is_empty() {
            rec.manifest.site.clone()
        } else {
            rec.site.clone()
        };
        let next = plan.apply(&rec.manifest, recorded_site, updated);
        let write_back = plan.requires_write_back(changed);

        let index_file = index_path(&self.config.output_root);
        let entries_changed =
            index_entries(rec.manifest.records()) != index_entries(next.records());
        if plan.force || entries_changed || (write_back && !index_file.is_file()) {
            let html = build_index(self.templater, rec.site.as_ref(), next.records())
                .map_err(EngineError::Index)?;
            write_atomic(&index_file, html.as_bytes()).map_err(|source| EngineError::Write {
                path: index_file.clone(),
                source,
            })?;
            report.index_written = true;
            self.emit(BuildEvent::IndexWritten {
                entries: index_entries(next.records()).len(),
            });
        }

        if write_back {
            next.save(&self.config.manifest_path)?;
            report.manifest_written = true;
            self.emit(BuildEvent::ManifestWritten {
                path: self.config.manifest_path.clone(),
                pages: next.len(),
            });
        }

        Ok(report)
    }

    fn delete_outputs(&self, plan: &Plan, report: &mut BuildReport) -> Result<(), EngineError> {
        for id in &plan.to_delete {
            let removed_output = plan.remove_output.contains(id);
            if removed_output {
                let dir = page_dir(&self.config.output_root, id);
                match std::fs::remove_dir_all(&dir) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => return Err(EngineError::Delete { path: dir, source }),
                }
                report.deleted.push(id.clone());
            } else {
                report.dropped.push(id.clone());
            }
            self.emit(BuildEvent::Deleted {
                id: id.clone(),
                removed_output,
            });
        }
        Ok(())
    }

    /// Run every job on a dedicated pool and collect the outcomes in job
    /// order.
    fn build_all(
        &self,
        builder: &PageBuilder<'_>,
        jobs: Vec<BuildJob>,
        force: bool,
    ) -> Result<Vec<(BuildJob, Result<BuildOutcome, PageError>)>, EngineError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        let threads = effective_threads(&self.config.processing).min(jobs.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?;

        Ok(pool.install(|| {
            jobs.into_par_iter()
                .map(|job| {
                    let result =
                        builder.build(&job.id, &job.source, job.previous_hash.as_deref(), force);
                    (job, result)
                })
                .collect()
        }))
    }
}

/// Run a build with the bundled markdown renderer and HTML templates.
pub fn build(
    config: &BuildConfig,
    force: bool,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildReport, EngineError> {
    let renderer = MarkdownRenderer::new();
    let templater = HtmlTemplater::new();
    let mut engine = Engine::new(config, &renderer, &templater);
    if let Some(tx) = events {
        engine = engine.with_events(tx);
    }
    engine.run(force)
}

/// Reconcile with the bundled renderer, without writing anything.
pub fn check(
    config: &BuildConfig,
    events: Option<Sender<BuildEvent>>,
) -> Result<Reconciliation, EngineError> {
    let renderer = MarkdownRenderer::new();
    let templater = HtmlTemplater::new();
    let mut engine = Engine::new(config, &renderer, &templater);
    if let Some(tx) = events {
        engine = engine.with_events(tx);
    }
    engine.reconcile(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::test_helpers::{MockRenderer, MockTemplater, TestSite, post};
    use std::fs;
    use std::sync::mpsc;

    fn run(site: &TestSite, r: &MockRenderer, t: &MockTemplater, force: bool) -> BuildReport {
        let config = site.config();
        Engine::new(&config, r, t).run(force).unwrap()
    }

    fn run_with_events(
        config: &BuildConfig,
        r: &MockRenderer,
        t: &MockTemplater,
    ) -> (Result<BuildReport, EngineError>, Vec<BuildEvent>) {
        let (tx, rx) = mpsc::channel();
        let result = Engine::new(config, r, t).with_events(tx).run(false);
        (result, rx.try_iter().collect())
    }

    // =========================================================================
    // Basic runs
    // =========================================================================

    #[test]
    fn first_run_builds_everything() {
        let site = TestSite::new();
        site.write_doc("hello", &post("Hello", "2024-03-01"));
        site.write_doc("about", "Title: About\n\nMe.");
        let (r, t) = (MockRenderer::new(), MockTemplater::new());

        let report = run(&site, &r, &t, false);
        assert_eq!(report.added, vec!["about", "hello"]);
        assert!(report.index_written);
        assert!(report.manifest_written);
        assert_eq!(site.output_ids(), vec!["about", "hello"]);
        assert_eq!(site.manifest().len(), 2);
        assert_eq!(t.indexes(), vec![vec!["hello".to_string()]]);
    }

    #[test]
    fn second_run_renders_nothing() {
        let site = TestSite::new();
        site.write_doc("hello", &post("Hello", "2024-03-01"));
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);
        let before = site.manifest_bytes();

        let (r2, t2) = (MockRenderer::new(), MockTemplater::new());
        let report = run(&site, &r2, &t2, false);

        assert!(report.is_noop());
        assert_eq!(report.unchanged, 1);
        assert_eq!(r2.call_count(), 0);
        assert!(t2.pages().is_empty());
        assert!(t2.indexes().is_empty());
        assert_eq!(site.manifest_bytes(), before);
    }

    #[test]
    fn each_changed_document_rendered_once() {
        let site = TestSite::new();
        for id in ["a", "b", "c"] {
            site.write_doc(id, &post(id, "2024-01-01"));
        }
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);

        site.write_doc("b", &post("b changed", "2024-01-01"));
        let (r2, t2) = (MockRenderer::new(), MockTemplater::new());
        let report = run(&site, &r2, &t2, false);

        assert_eq!(report.updated, vec!["b"]);
        assert_eq!(report.unchanged, 2);
        assert_eq!(r2.call_count(), 1);
        assert_eq!(t2.pages(), vec!["b"]);
    }

    #[test]
    fn deletion_removes_output_and_record() {
        let site = TestSite::new();
        site.write_doc("keep", &post("Keep", "2024-01-01"));
        site.write_doc("gone", &post("Gone", "2024-01-02"));
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);

        site.remove_doc("gone");
        let report = run(&site, &r, &t, false);

        assert_eq!(report.deleted, vec!["gone"]);
        assert!(!site.page_path("gone").exists());
        assert!(site.manifest().get("gone").is_none());
        assert!(report.index_written);
    }

    #[test]
    fn record_without_output_or_source_is_dropped() {
        let site = TestSite::new();
        site.write_doc("gone", "Title: Gone\n\nx");
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);

        site.remove_doc("gone");
        fs::remove_dir_all(site.page_path("gone").parent().unwrap()).unwrap();
        let report = run(&site, &r, &t, false);

        assert_eq!(report.dropped, vec!["gone"]);
        assert!(report.deleted.is_empty());
        assert!(report.manifest_written);
        assert!(site.manifest().is_empty());
    }

    #[test]
    fn forced_run_rebuilds_all() {
        let site = TestSite::new();
        site.write_doc("a", &post("A", "2024-01-01"));
        site.write_doc("b", "Title: B\n\nx");
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);

        let (r2, t2) = (MockRenderer::new(), MockTemplater::new());
        let report = run(&site, &r2, &t2, true);

        assert!(report.forced);
        assert_eq!(report.added, vec!["a", "b"]);
        assert_eq!(r2.call_count(), 2);
        assert!(report.index_written);
        assert!(report.manifest_written);
    }

    #[test]
    fn undated_document_does_not_rewrite_index() {
        let site = TestSite::new();
        site.write_doc("post", &post("Post", "2024-01-01"));
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);

        site.write_doc("about", "Title: About\n\nx");
        let t2 = MockTemplater::new();
        let report = run(&site, &r, &t2, false);

        assert_eq!(report.added, vec!["about"]);
        assert!(!report.index_written);
        assert!(t2.indexes().is_empty());
    }

    #[test]
    fn missing_index_is_restored_on_write_back() {
        let site = TestSite::new();
        site.write_doc("about", "Title: About\n\nx");
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        let report = run(&site, &r, &t, false);
        assert!(report.index_written);
        assert!(site.index_path().is_file());
    }

    // =========================================================================
    // Warnings and inconsistencies
    // =========================================================================

    #[test]
    fn missing_output_is_warned_and_rebuilt() {
        let site = TestSite::new();
        site.write_doc("a", &post("A", "2024-01-01"));
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);
        fs::remove_dir_all(site.page_path("a").parent().unwrap()).unwrap();

        let (result, events) = run_with_events(&site.config(), &r, &t);
        let report = result.unwrap();

        assert!(events.contains(&BuildEvent::MissingOutput { id: "a".into() }));
        assert_eq!(report.added, vec!["a"]);
        assert_eq!(report.warnings, 1);
        assert!(site.page_path("a").is_file());
    }

    #[test]
    fn orphaned_output_is_warned_not_deleted() {
        let site = TestSite::new();
        let stray = site.page_path("stray");
        fs::create_dir_all(stray.parent().unwrap()).unwrap();
        fs::write(&stray, "old").unwrap();

        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        let (result, events) = run_with_events(&site.config(), &r, &t);
        result.unwrap();

        assert!(events.contains(&BuildEvent::OrphanedOutput { id: "stray".into() }));
        assert!(stray.exists());
    }

    #[test]
    fn missing_content_root_is_empty_with_warning() {
        let site = TestSite::new();
        fs::remove_dir_all(site.content_root()).unwrap();

        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        let (result, events) = run_with_events(&site.config(), &r, &t);
        let report = result.unwrap();

        assert!(events.iter().any(|e| matches!(e, BuildEvent::ContentRootMissing { .. })));
        assert_eq!(report.built(), 0);
        assert!(!site.manifest_path().exists());
    }

    // =========================================================================
    // Policies
    // =========================================================================

    #[test]
    fn corrupt_manifest_aborts_by_default() {
        let site = TestSite::new();
        site.write_doc("a", "x");
        fs::write(site.manifest_path(), "{ not json").unwrap();

        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        let err = Engine::new(&site.config(), &r, &t).run(false).unwrap_err();
        assert!(matches!(err, EngineError::Manifest(ref e) if e.is_corrupt()));
        assert_eq!(r.call_count(), 0);
    }

    #[test]
    fn corrupt_manifest_reset_rebuilds() {
        let site = TestSite::new();
        site.write_doc("a", &post("A", "2024-01-01"));
        fs::write(site.manifest_path(), "{ not json").unwrap();
        let config = BuildConfig {
            build: PolicyConfig {
                on_corrupt_manifest: CorruptManifestPolicy::Reset,
                ..PolicyConfig::default()
            },
            ..site.config()
        };

        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        let (result, events) = run_with_events(&config, &r, &t);
        let report = result.unwrap();

        assert!(events.iter().any(|e| matches!(e, BuildEvent::ManifestReset { .. })));
        assert_eq!(report.added, vec!["a"]);
        assert!(site.manifest().get("a").is_some());
    }

    #[test]
    fn page_error_aborts_by_default() {
        let site = TestSite::new();
        site.write_doc("bad", "Title: BROKEN\n\nx");
        let (r, t) = (MockRenderer::failing_on("BROKEN"), MockTemplater::new());

        let err = Engine::new(&site.config(), &r, &t).run(false).unwrap_err();
        assert!(matches!(err, EngineError::Page(PageError::Render { .. })));
        assert!(!site.manifest_path().exists());
    }

    #[test]
    fn page_error_skip_keeps_previous_record() {
        let site = TestSite::new();
        site.write_doc("a", &post("A", "2024-01-01"));
        site.write_doc("b", &post("B", "2024-01-02"));
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);
        let old_b = site.manifest().get("b").cloned().unwrap();

        site.write_doc("b", "Title: BROKEN\n\nx");
        site.write_doc("c", "Title: BROKEN too\n\nx");
        let config = BuildConfig {
            build: PolicyConfig {
                on_page_error: PageErrorPolicy::Skip,
                ..PolicyConfig::default()
            },
            ..site.config()
        };
        let r2 = MockRenderer::failing_on("BROKEN");
        let (result, events) = run_with_events(&config, &r2, &t);
        let report = result.unwrap();

        assert_eq!(report.skipped, vec!["c", "b"]);
        assert_eq!(report.warnings, 2);
        assert!(events.iter().any(|e| matches!(e, BuildEvent::PageSkipped { .. })));

        let manifest = site.manifest();
        assert_eq!(manifest.get("b"), Some(&old_b));
        assert!(manifest.get("c").is_none());
    }

    // =========================================================================
    // Site file
    // =========================================================================

    #[test]
    fn site_file_is_not_a_document() {
        let site = TestSite::new();
        site.write_site("Title: kfold\n");
        site.write_doc("a", "Title: A\n\nx");
        let (r, t) = (MockRenderer::new(), MockTemplater::new());

        run(&site, &r, &t, false);
        let manifest = site.manifest();
        assert_eq!(manifest.ids().into_iter().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(manifest.site.map(|s| s.title).as_deref(), Some("kfold"));
    }

    #[test]
    fn site_change_forces_rebuild() {
        let site = TestSite::new();
        site.write_site("Title: kfold\n");
        site.write_doc("a", "Title: A\n\nx");
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);

        site.write_site("Title: kfold2\n");
        let t2 = MockTemplater::new();
        let (result, events) = run_with_events(&site.config(), &r, &t2);
        let report = result.unwrap();

        assert!(events.contains(&BuildEvent::SiteChanged));
        assert!(report.forced);
        assert_eq!(report.added, vec!["a"]);
        assert!(report.index_written);
        assert_eq!(t2.pages(), vec!["a"]);
        assert_eq!(
            site.manifest().site.map(|s| s.title).as_deref(),
            Some("kfold2")
        );
    }

    #[test]
    fn unchanged_site_file_is_not_rendered_again() {
        let site = TestSite::new();
        site.write_site("Title: kfold\n");
        site.write_doc("a", "Title: A\n\nx");
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);

        let r2 = MockRenderer::new();
        let report = run(&site, &r2, &t, false);
        assert!(report.is_noop());
        assert_eq!(r2.call_count(), 0);
    }

    #[test]
    fn site_change_with_skipped_page_is_retried() {
        let site = TestSite::new();
        site.write_site("Title: old-site\n");
        site.write_doc("a", "Title: A BROKEN-LATER\n\nx");
        site.write_doc("b", "Title: B\n\nx");
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);

        site.write_site("Title: new-site\n");
        let config = BuildConfig {
            build: PolicyConfig {
                on_page_error: PageErrorPolicy::Skip,
                ..PolicyConfig::default()
            },
            ..site.config()
        };
        let failing = MockRenderer::failing_on("BROKEN");
        let (result, _) = run_with_events(&config, &failing, &t);
        let report = result.unwrap();

        assert_eq!(report.skipped, vec!["a"]);
        let read = |id: &str| fs::read_to_string(site.page_path(id)).unwrap();
        assert!(read("a").contains("site:old-site"));
        assert!(read("b").contains("site:new-site"));
        assert_eq!(
            site.manifest().site.map(|s| s.title).as_deref(),
            Some("old-site")
        );

        let report = run(&site, &r, &t, false);
        assert!(report.forced);
        assert!(report.added.contains(&"a".to_string()));
        assert!(read("a").contains("site:new-site"));
        assert_eq!(
            site.manifest().site.map(|s| s.title).as_deref(),
            Some("new-site")
        );

        assert!(run(&site, &r, &t, false).is_noop());
    }

    #[test]
    fn removing_site_file_forces_rebuild() {
        let site = TestSite::new();
        site.write_site("Title: kfold\n");
        site.write_doc("a", "Title: A\n\nx");
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        run(&site, &r, &t, false);

        fs::remove_file(site.site_path()).unwrap();
        let report = run(&site, &r, &t, false);
        assert!(report.forced);
        assert!(site.manifest().site.is_none());
    }

    // =========================================================================
    // Reconcile only
    // =========================================================================

    #[test]
    fn reconcile_writes_nothing() {
        let site = TestSite::new();
        site.write_doc("a", "x");
        let (r, t) = (MockRenderer::new(), MockTemplater::new());
        let config = site.config();

        let rec = Engine::new(&config, &r, &t).reconcile(false).unwrap();
        assert_eq!(rec.plan.to_add.len(), 1);
        assert!(!site.manifest_path().exists());
        assert!(!site.index_path().exists());
        assert_eq!(r.call_count(), 0);
    }

    #[test]
    fn report_display() {
        let report = BuildReport {
            added: vec!["a".into()],
            updated: vec!["b".into()],
            unchanged: 3,
            deleted: vec!["c".into()],
            manifest_written: true,
            ..BuildReport::default()
        };
        assert_eq!(report.to_string(), "2 built, 3 unchanged, 1 deleted");

        let quiet = BuildReport {
            unchanged: 4,
            ..BuildReport::default()
        };
        assert_eq!(quiet.to_string(), "Up to date (4 unchanged)");
    }
}
