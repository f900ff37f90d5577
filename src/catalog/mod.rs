//! Resumable dedup catalog.
//!
//! This module provides the persistent state that lets a dedup run be
//! interrupted and resumed days later without re-hashing finished work.
//!
//! # Architecture
//!
//! The catalog is split into three components:
//!
//! * [`database`]: SQLite persistence, schema setup, nested transactions and
//!   the upsert / bucket / retire operations.
//! * [`entry`]: the record types stored in the catalog.
//! * [`order`]: the deterministic tie-break order applied to every bucket.
//!
//! # Record Families
//!
//! * **Path attributes** (`info`): one row per path ever observed, never
//!   deleted. Device, link count and mtime are refreshed on every scan.
//! * **Pending work** (`file`, `symlink`): at most one row per path. A path
//!   that changes from file to symlink (or back) drops its stale record.
//! * **Counters** (`master`): arrivals and completions per kind, so progress
//!   and remaining work are O(1) reads.
//!
//! # Example
//!
//! ```no_run
//! use rustdedup::catalog::{Catalog, EntryKind, SortOrder};
//! use std::path::Path;
//!
//! let mut catalog = Catalog::open(Path::new("rustdedup.db")).unwrap();
//! let (done, total) = catalog.counts(EntryKind::File).unwrap();
//! println!("{} of {} files processed", done, total);
//!
//! let bucket = catalog.next_bucket(EntryKind::File, true, SortOrder::Ascending).unwrap();
//! for entry in &bucket {
//!     catalog.retire(&entry.path).unwrap();
//! }
//! ```

pub mod database;
pub mod entry;
pub mod order;

pub use database::{Catalog, CatalogError, CatalogResult, ScratchCatalog, MEMORY, SCHEMA_VERSION};
pub use entry::{EntryKind, Payload, PendingEntry, SortOrder};
