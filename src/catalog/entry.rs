//! Catalog record definitions.

use std::path::{Path, PathBuf};

/// Kind of pending work, one catalog table per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file, keyed by size.
    File,
    /// Symbolic link, keyed by its target.
    Symlink,
}

impl EntryKind {
    /// Every kind, in processing order.
    pub const ALL: [EntryKind; 2] = [EntryKind::File, EntryKind::Symlink];

    /// Table holding pending records of this kind.
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Symlink => "symlink",
        }
    }

    /// Column holding the bucket key of this kind.
    #[must_use]
    pub(crate) fn key_column(self) -> &'static str {
        match self {
            Self::File => "size",
            Self::Symlink => "target",
        }
    }

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::File => Self::Symlink,
            Self::Symlink => Self::File,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Type-specific part of a pending record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Size in bytes of a regular file.
    Size(u64),
    /// Link target of a symlink, exactly as stored in the link.
    Target(PathBuf),
}

impl Payload {
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Size(_) => EntryKind::File,
            Self::Target(_) => EntryKind::Symlink,
        }
    }
}

/// A path together with the attributes captured when it was scanned.
///
/// This is both the input of [`Catalog::upsert_record`](super::Catalog::upsert_record)
/// and the element type returned by
/// [`Catalog::next_bucket`](super::Catalog::next_bucket).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    /// Path of the entry
    pub path: PathBuf,
    /// Device (volume) id
    pub dev: u64,
    /// Hard-link count
    pub nlink: u64,
    /// Modification time, whole seconds since the epoch
    pub mtime: i64,
    /// Size or link target
    pub payload: Payload,
}

impl PendingEntry {
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.payload.kind()
    }

    /// Size for file entries.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        match self.payload {
            Payload::Size(size) => Some(size),
            Payload::Target(_) => None,
        }
    }

    /// Link target for symlink entries.
    #[must_use]
    pub fn target(&self) -> Option<&Path> {
        match &self.payload {
            Payload::Target(target) => Some(target),
            Payload::Size(_) => None,
        }
    }
}

/// Direction of the modification-time axis of the tie-break order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first
    #[default]
    Ascending,
    /// Newest first
    Descending,
}

// Paths and link targets are stored as raw bytes so that non-UTF-8 names
// survive a round trip on Unix.

#[cfg(unix)]
pub(crate) fn path_to_blob(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
pub(crate) fn blob_to_path(blob: Vec<u8>) -> PathBuf {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(OsString::from_vec(blob))
}

#[cfg(not(unix))]
pub(crate) fn path_to_blob(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
pub(crate) fn blob_to_path(blob: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&blob).into_owned())
}
