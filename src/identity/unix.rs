//! POSIX file identity read directly from `lstat(2)` fields.

use std::fs::Metadata;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use super::FileIdentity;

/// File identity backed by Unix metadata. All queries are free.
#[derive(Debug, Clone)]
pub struct UnixStat {
    path: PathBuf,
    metadata: Metadata,
}

impl UnixStat {
    #[must_use]
    pub fn new(path: PathBuf, metadata: Metadata) -> Self {
        Self { path, metadata }
    }
}

impl FileIdentity for UnixStat {
    fn path(&self) -> &Path {
        &self.path
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn device(&self) -> io::Result<u64> {
        Ok(self.metadata.dev())
    }

    fn link_count(&self) -> io::Result<u64> {
        Ok(self.metadata.nlink())
    }

    fn same_file(&self, other: &Self) -> bool {
        self.metadata.dev() == other.metadata.dev() && self.metadata.ino() == other.metadata.ino()
    }

    fn same_attributes(&self, other: &Self) -> bool {
        let (a, b) = (&self.metadata, &other.metadata);
        a.dev() == b.dev() && a.mode() == b.mode() && a.uid() == b.uid() && a.gid() == b.gid()
    }
}
