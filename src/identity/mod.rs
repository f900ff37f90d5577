//! Platform-neutral file identity.
//!
//! # Overview
//!
//! Deduplication needs four facts about a filesystem entry that the
//! standard library does not expose portably:
//!
//! - the device (volume) the entry lives on
//! - its hard-link count
//! - whether two entries are the same underlying file (already linked)
//! - whether two entries carry the same relevant attributes
//!
//! These are captured by the [`FileIdentity`] trait. The concrete type for
//! the current platform is re-exported as [`FileStat`]:
//!
//! - **Unix**: [`unix::UnixStat`], read straight from `lstat(2)` fields
//! - **Windows**: [`windows::WindowsStat`], which must open a handle to query
//!   the volume serial number and file index. That query is done lazily and
//!   cached per object.
//!
//! # Example
//!
//! ```no_run
//! use rustdedup::identity::{lstat, FileIdentity};
//!
//! let a = lstat("/data/a.bin").unwrap();
//! let b = lstat("/data/b.bin").unwrap();
//! if a.same_file(&b) {
//!     println!("already linked");
//! }
//! ```

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

use std::ffi::OsStr;
use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

#[cfg(unix)]
pub use unix::UnixStat as FileStat;
#[cfg(windows)]
pub use windows::WindowsStat as FileStat;

/// Identity and attribute queries for a single filesystem entry.
pub trait FileIdentity: Sized {
    /// Path this entry was obtained from.
    fn path(&self) -> &Path;

    /// Metadata captured when the entry was created.
    fn metadata(&self) -> &Metadata;

    /// Device (or volume serial) the entry lives on.
    fn device(&self) -> io::Result<u64>;

    /// Number of hard links to the underlying file.
    fn link_count(&self) -> io::Result<u64>;

    /// True if both entries refer to the same underlying file.
    fn same_file(&self, other: &Self) -> bool;

    /// True if owner, permission bits and device match.
    fn same_attributes(&self, other: &Self) -> bool;

    /// Size in bytes as reported by the metadata.
    fn size(&self) -> u64 {
        self.metadata().len()
    }

    /// Modification time truncated to whole seconds since the epoch.
    fn mtime(&self) -> i64 {
        self.metadata()
            .modified()
            .map(unix_seconds)
            .unwrap_or_default()
    }

    fn is_file(&self) -> bool {
        self.metadata().file_type().is_file()
    }

    fn is_symlink(&self) -> bool {
        self.metadata().file_type().is_symlink()
    }

    /// Final path component, or the empty string for roots.
    fn file_name(&self) -> &OsStr {
        self.path().file_name().unwrap_or_default()
    }
}

/// Read the identity of `path` without following a trailing symlink.
pub fn lstat(path: impl AsRef<Path>) -> io::Result<FileStat> {
    let path = path.as_ref();
    let metadata = std::fs::symlink_metadata(path)?;
    Ok(FileStat::new(path.to_path_buf(), metadata))
}

/// Read the identity of `path`, following symlinks.
pub fn stat(path: impl AsRef<Path>) -> io::Result<FileStat> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)?;
    Ok(FileStat::new(path.to_path_buf(), metadata))
}

/// Whole seconds since the Unix epoch; times before the epoch are negative.
pub(crate) fn unix_seconds(time: std::time::SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => {
            let d = e.duration();
            let secs = i64::try_from(d.as_secs()).unwrap_or(i64::MAX);
            if d.subsec_nanos() > 0 {
                -secs - 1
            } else {
                -secs
            }
        }
    }
}
