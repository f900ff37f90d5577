//! Scanner module for catalog ingestion and file hashing.
//!
//! This module provides functionality for:
//! - Depth-first directory walking using walkdir
//! - Recording every file and symlink in the [`Catalog`](crate::catalog::Catalog)
//! - Content hashing with BLAKE3
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and catalog upserts, one transaction per root
//! - [`hasher`]: BLAKE3 file hashing (streaming)
//!
//! # Example
//!
//! ```no_run
//! use rustdedup::catalog::Catalog;
//! use rustdedup::scanner::{ScanConfig, Scanner};
//! use std::path::Path;
//!
//! let mut catalog = Catalog::open(Path::new("rustdedup.db")).unwrap();
//! let mut scanner = Scanner::new(&mut catalog, ScanConfig::default());
//! let summary = scanner.scan(Path::new("/srv/data")).unwrap();
//! println!("{} entries recorded, {} errors", summary.upserted, summary.errors.len());
//! ```

pub mod hasher;
pub mod walker;

use std::path::PathBuf;

use crate::catalog::CatalogError;

// Re-export main types
pub use hasher::{hash_to_hex, Hash, Hasher};
pub use walker::Scanner;

/// Configuration for directory scanning.
///
/// Selects which entry types are recorded in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Record regular files.
    pub files: bool,

    /// Record symbolic links (never followed).
    pub symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            files: true,
            symlinks: true,
        }
    }
}

impl ScanConfig {
    /// Create a new configuration.
    ///
    /// # Arguments
    ///
    /// * `files` - Whether to record regular files
    /// * `symlinks` - Whether to record symbolic links
    #[must_use]
    pub fn new(files: bool, symlinks: bool) -> Self {
        Self { files, symlinks }
    }
}

/// Outcome of scanning one root.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Root that was scanned
    pub root: PathBuf,
    /// Files and symlinks visited
    pub visited: u64,
    /// Entries recorded in the catalog
    pub upserted: u64,
    /// Paths skipped because of I/O errors, with the error message
    pub errors: Vec<(PathBuf, String)>,
}

/// Errors that abort the scan of a root.
///
/// Per-path problems are not errors at this level; they are collected in
/// [`ScanSummary::errors`] and the walk continues.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing the root.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The catalog could not record the scan.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
