//! Dedup engine: drains the catalog and replaces duplicates with hard links.
//!
//! This module provides functionality for:
//! - Draining pending work bucket by bucket (files first, then symlinks)
//! - Re-validating each candidate against the live filesystem
//! - Grouping by content and choosing a canonical source per group
//! - Replacing duplicates with hard links through the [`link`] protocol
//!
//! # Architecture
//!
//! - [`engine`]: the [`Deduper`] driver and per-bucket processing
//! - [`groups`]: content grouping and name-based source selection
//! - [`link`]: the rename / link / remove replacement protocol
//!
//! Each bucket is processed inside one catalog transaction. Cancellation or
//! an error rolls the bucket back, so it is picked up again on resume while
//! buckets committed earlier stay retired.
//!
//! # Example
//!
//! ```no_run
//! use rustdedup::catalog::Catalog;
//! use rustdedup::dedup::{DedupConfig, Deduper, MtimePolicy};
//! use std::path::Path;
//!
//! let mut catalog = Catalog::open(Path::new("rustdedup.db")).unwrap();
//! let config = DedupConfig::default().with_mtime(MtimePolicy::Oldest);
//! let summary = Deduper::new(&mut catalog, config).run().unwrap();
//! println!("{} linked, {} reclaimed", summary.linked, summary.reclaimed());
//! ```

pub mod engine;
pub mod groups;
pub mod link;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogError, SortOrder};
use crate::progress::ProgressCallback;
use crate::scanner::HashError;

// Re-export main types
pub use engine::Deduper;
pub use groups::{group_by_key, split_by};
pub use link::{LinkError, Linker};

/// How modification times take part in matching.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MtimePolicy {
    /// Only entries with equal mtime are linked; oldest first.
    ///
    /// The default when `-m` is absent, so not offered on the command line.
    #[default]
    #[value(skip)]
    Match,
    /// Ignore mtime; the oldest entry becomes the source.
    Oldest,
    /// Ignore mtime; the most recent entry becomes the source.
    Latest,
}

impl MtimePolicy {
    /// Whether mtime is part of the bucket key.
    #[must_use]
    pub fn use_mtime(self) -> bool {
        matches!(self, Self::Match)
    }

    /// Primary tie-break order for buckets.
    #[must_use]
    pub fn order(self) -> SortOrder {
        match self {
            Self::Match | Self::Oldest => SortOrder::Ascending,
            Self::Latest => SortOrder::Descending,
        }
    }
}

impl std::fmt::Display for MtimePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Match => write!(f, "match"),
            Self::Oldest => write!(f, "oldest"),
            Self::Latest => write!(f, "latest"),
        }
    }
}

/// Configuration for a dedup run.
#[derive(Clone)]
pub struct DedupConfig {
    /// Only link entries with the same file name.
    pub match_name: bool,
    /// Only link entries with the same owner, permissions and device.
    pub match_attrs: bool,
    /// Modification time policy.
    pub mtime: MtimePolicy,
    /// Report what would be linked without touching the filesystem.
    pub pretend: bool,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for DedupConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupConfig")
            .field("match_name", &self.match_name)
            .field("match_attrs", &self.match_attrs)
            .field("mtime", &self.mtime)
            .field("pretend", &self.pretend)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            match_name: true,
            match_attrs: true,
            mtime: MtimePolicy::Match,
            pretend: false,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl DedupConfig {
    /// Require (or stop requiring) equal file names.
    #[must_use]
    pub fn with_match_name(mut self, enabled: bool) -> Self {
        self.match_name = enabled;
        self
    }

    /// Require (or stop requiring) equal attributes.
    #[must_use]
    pub fn with_match_attrs(mut self, enabled: bool) -> Self {
        self.match_attrs = enabled;
        self
    }

    /// Set the modification time policy.
    #[must_use]
    pub fn with_mtime(mut self, policy: MtimePolicy) -> Self {
        self.mtime = policy;
        self
    }

    /// Enable dry-run mode.
    #[must_use]
    pub fn with_pretend(mut self, enabled: bool) -> Self {
        self.pretend = enabled;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Outcome counts of a dedup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupSummary {
    /// Buckets drained from the catalog
    pub buckets: u64,
    /// Entries replaced by a hard link (or that would be, when pretending)
    pub linked: u64,
    /// Entries that already were the same file as their source
    pub already_linked: u64,
    /// Entries skipped because their attributes differ from the source
    pub attr_mismatch: u64,
    /// Entries that changed or vanished since they were scanned
    pub stale: u64,
    /// Entries alone in their bucket
    pub singletons: u64,
    /// Bytes freed by dropping the last link of a replaced file
    pub bytes_reclaimed: u64,
}

impl DedupSummary {
    /// Add the counts of `other` to `self`.
    pub fn merge(&mut self, other: &Self) {
        self.buckets += other.buckets;
        self.linked += other.linked;
        self.already_linked += other.already_linked;
        self.attr_mismatch += other.attr_mismatch;
        self.stale += other.stale;
        self.singletons += other.singletons;
        self.bytes_reclaimed += other.bytes_reclaimed;
    }

    /// Human-readable reclaimed size.
    #[must_use]
    pub fn reclaimed(&self) -> String {
        ByteSize::b(self.bytes_reclaimed).to_string()
    }
}

/// Errors that abort a dedup run.
#[derive(thiserror::Error, Debug)]
pub enum DedupError {
    /// The run was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Dedup interrupted by user")]
    Interrupted,

    /// The catalog failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Re-validating a candidate failed for a reason other than it vanishing.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading a candidate's content failed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// Replacing a duplicate with a hard link failed.
    #[error(transparent)]
    Link(#[from] LinkError),
}
