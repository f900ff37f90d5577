//! Directory walker that feeds the catalog.
//!
//! # Overview
//!
//! This module provides the [`Scanner`] struct, which walks a root
//! depth-first with [`walkdir`] (sorted by file name, symlinks never
//! followed) and records every regular file and symlink in the
//! [`Catalog`].
//!
//! # Features
//!
//! - One catalog transaction per root: an interrupted or failed scan leaves
//!   the catalog exactly as it was before the root was started
//! - Per-path errors are logged, reported to the progress callback and
//!   collected in the [`ScanSummary`]; the walk continues
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use rustdedup::catalog::Catalog;
//! use rustdedup::scanner::{ScanConfig, Scanner};
//! use std::path::Path;
//!
//! let mut catalog = Catalog::open_in_memory().unwrap();
//! let summary = Scanner::new(&mut catalog, ScanConfig::default())
//!     .scan(Path::new("/srv/data"))
//!     .unwrap();
//! for (path, message) in &summary.errors {
//!     eprintln!("Warning: {}: {}", path.display(), message);
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use super::{ScanConfig, ScanError, ScanSummary};
use crate::catalog::Catalog;
use crate::identity::FileStat;
use crate::progress::{ProgressCallback, PHASE_SCAN};

/// Walks directory trees and records their entries in a catalog.
pub struct Scanner<'a> {
    catalog: &'a mut Catalog,
    config: ScanConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Scanner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl<'a> Scanner<'a> {
    /// Create a scanner writing into `catalog`.
    #[must_use]
    pub fn new(catalog: &'a mut Catalog, config: ScanConfig) -> Self {
        Self {
            catalog,
            config,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// The flag is checked before every walk step. Once it is set the scan
    /// of the current root is rolled back and [`ScanError::Interrupted`] is
    /// returned.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set a progress callback for reporting scan progress.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Scan `root` and record every file and symlink beneath it.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotFound`] or [`ScanError::NotADirectory`] if the
    /// root is unusable, [`ScanError::Interrupted`] on cancellation and
    /// [`ScanError::Catalog`] if the catalog fails. In every error case
    /// nothing from this root is kept.
    pub fn scan(&mut self, root: &Path) -> Result<ScanSummary, ScanError> {
        let metadata = fs::metadata(root).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ScanError::NotFound(root.to_path_buf()),
            _ => ScanError::Io {
                path: root.to_path_buf(),
                source: e,
            },
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        log::info!("Scanning {}", root.display());
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(PHASE_SCAN, 0);
        }

        let mut summary = ScanSummary {
            root: root.to_path_buf(),
            ..ScanSummary::default()
        };

        self.catalog.begin()?;
        let result = self.walk_root(root, &mut summary);
        let result = match result {
            Ok(()) => self.catalog.commit().map_err(ScanError::from),
            Err(e) => {
                if let Err(rollback_err) = self.catalog.rollback() {
                    log::error!("Catalog rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        };

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(PHASE_SCAN);
        }

        match result {
            Ok(()) => {
                log::info!(
                    "Scanned {}: {} entries recorded, {} errors",
                    root.display(),
                    summary.upserted,
                    summary.errors.len()
                );
                Ok(summary)
            }
            Err(ScanError::Interrupted) => {
                log::info!("Scan of {} interrupted, nothing recorded", root.display());
                Err(ScanError::Interrupted)
            }
            Err(e) => Err(e),
        }
    }

    fn walk_root(&mut self, root: &Path, summary: &mut ScanSummary) -> Result<(), ScanError> {
        let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();

        for item in walker {
            if self.is_shutdown_requested() {
                log::debug!("Scan interrupted by shutdown request");
                return Err(ScanError::Interrupted);
            }

            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                    self.skip(summary, path, e.to_string());
                    continue;
                }
            };

            let file_type = entry.file_type();
            let wanted = (file_type.is_file() && self.config.files)
                || (file_type.is_symlink() && self.config.symlinks);
            if !wanted {
                continue;
            }

            summary.visited += 1;
            let path = entry.path();

            // Not following links, so this is the lstat of the entry.
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    self.skip(summary, path.to_path_buf(), e.to_string());
                    continue;
                }
            };

            let stat = FileStat::new(path.to_path_buf(), metadata);
            match self.catalog.upsert(&stat) {
                Ok(()) => {
                    summary.upserted += 1;
                    log::trace!("Recorded {}", path.display());
                }
                Err(e) if e.is_path_error() => {
                    self.skip(summary, path.to_path_buf(), e.to_string());
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(summary.visited, path);
            }
        }

        Ok(())
    }

    fn skip(&self, summary: &mut ScanSummary, path: PathBuf, message: String) {
        log::warn!("Skipping {}: {}", path.display(), message);
        if let Some(ref callback) = self.progress_callback {
            callback.on_error(&path, &message);
        }
        summary.errors.push((path, message));
    }
}
