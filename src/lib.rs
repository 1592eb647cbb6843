//! # Quire
//!
//! An incremental static site builder. A directory of markdown documents
//! becomes a directory of HTML pages plus a table of contents, and every
//! run after the first only touches what changed.
//!
//! # Architecture: Reconcile, Then Act
//!
//! Each run compares three views of the site:
//!
//! ```text
//! manifest.json   what the previous run built, and from which bytes
//! content/        what should exist now
//! docs/           what actually exists now
//! ```
//!
//! The [`reconcile::Plan`] derived from those three id sets decides which
//! pages to delete, which to add and which to re-check. Re-checked pages
//! are hashed first and only rendered when their bytes changed. The
//! manifest is written last, and only when something changed, so a run
//! over an unchanged site performs no writes at all.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | One build run: load, reconcile, delete, build, index, save |
//! | [`reconcile`] | Pure set arithmetic over manifest, source and output ids |
//! | [`manifest`] | Persisted page records and site info (JSON) |
//! | [`scan`] | Source and output directory listing |
//! | [`page`] | Hash-gated single page build |
//! | [`index`] | Table of contents selection, ordering and rendering |
//! | [`render`] | `DocumentRenderer` trait and the markdown implementation |
//! | [`template`] | `PageTemplater` trait and the maud HTML templates |
//! | [`hash`] | SHA-256 content hashing |
//! | [`write`] | Atomic file replacement |
//! | [`config`] | `config.toml` loading, defaults, validation |
//! | [`output`] | CLI formatting of build events and plans |
//!
//! # Design Decisions
//!
//! ## Atomic Writes
//!
//! Pages, the index and the manifest are written to a hidden sibling file
//! and renamed into place. An output directory that contains `index.html`
//! therefore always holds a complete page, and the scanner can treat its
//! presence as "built".
//!
//! ## Posts and Pages
//!
//! A document with a `Date:` field is a post and is listed in the index,
//! newest first. A document without one is a standalone page: it is built
//! but never listed, and adding or changing it does not rewrite the index.
//!
//! ## Site File
//!
//! `content/site.md` holds site-wide metadata (title, description). Every
//! page shows it, so any change to it rebuilds the whole site.

pub mod config;
pub mod engine;
pub mod hash;
pub mod index;
pub mod manifest;
pub mod output;
pub mod page;
pub mod reconcile;
pub mod render;
pub mod scan;
pub mod template;
pub mod write;

#[cfg(test)]
pub(crate) mod test_helpers;
