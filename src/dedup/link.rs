//! Atomic replacement of a path by a hard link.
//!
//! # Protocol
//!
//! 1. Pick a free temporary name next to `dst`: `<dst>.<pid>_<counter>`
//! 2. Rename `dst` to the temporary name
//! 3. Hard link `src` to `dst`
//! 4. Remove the temporary name
//!
//! If step 3 fails the temporary name is renamed back to `dst`, so `dst`
//! is never left missing by a failed link. A crash between steps 2 and 3
//! leaves the temporary file behind; it is not recovered automatically.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors raised while replacing a path with a hard link.
#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    /// Probing for a free temporary name failed.
    #[error("Cannot probe temporary name {path}: {source}")]
    TempName {
        /// Candidate temporary path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Moving the destination aside failed; nothing was changed.
    #[error("Cannot move {dst} aside to {temp}: {source}")]
    Stash {
        /// Destination being replaced
        dst: PathBuf,
        /// Temporary name
        temp: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Creating the hard link failed; the destination was restored.
    #[error("Cannot link {src} to {dst}: {source}")]
    Link {
        /// Canonical source
        src: PathBuf,
        /// Destination being replaced
        dst: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Creating the hard link failed and the destination could not be
    /// restored. Its content is left at `temp`.
    #[error("Cannot link {src} to {dst} ({link_error}); original left at {temp}: {source}")]
    Restore {
        /// Canonical source
        src: PathBuf,
        /// Destination being replaced
        dst: PathBuf,
        /// Temporary name still holding the original
        temp: PathBuf,
        /// Why the link failed
        link_error: io::Error,
        /// Why the restore failed
        #[source]
        source: io::Error,
    },

    /// The link is in place but the temporary name could not be removed.
    #[error("Cannot remove temporary {temp}: {source}")]
    Cleanup {
        /// Temporary name left behind
        temp: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Replaces destination paths with hard links, one at a time.
///
/// Temporary names embed the process id and a counter owned by this value,
/// so one `Linker` should be used for a whole run.
#[derive(Debug)]
pub struct Linker {
    pid: u32,
    counter: u64,
}

impl Default for Linker {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pid: std::process::id(),
            counter: 0,
        }
    }

    /// Find an unused temporary name next to `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::TempName`] if a candidate cannot be probed.
    pub fn temp_path(&mut self, dst: &Path) -> Result<PathBuf, LinkError> {
        loop {
            let mut name = OsString::from(dst.as_os_str());
            name.push(format!(".{}_{}", self.pid, self.counter));
            self.counter += 1;

            let candidate = PathBuf::from(name);
            match fs::symlink_metadata(&candidate) {
                Ok(_) => {
                    log::debug!("Temporary name {} taken, retrying", candidate.display());
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(candidate),
                Err(e) => {
                    return Err(LinkError::TempName {
                        path: candidate,
                        source: e,
                    })
                }
            }
        }
    }

    /// Replace `dst` with a hard link to `src`.
    ///
    /// # Errors
    ///
    /// Returns a [`LinkError`] describing which step failed. Only
    /// [`LinkError::Restore`] leaves `dst` missing.
    pub fn replace_with_link(&mut self, src: &Path, dst: &Path) -> Result<(), LinkError> {
        let temp = self.temp_path(dst)?;

        fs::rename(dst, &temp).map_err(|source| LinkError::Stash {
            dst: dst.to_path_buf(),
            temp: temp.clone(),
            source,
        })?;

        if let Err(link_error) = fs::hard_link(src, dst) {
            return match fs::rename(&temp, dst) {
                Ok(()) => Err(LinkError::Link {
                    src: src.to_path_buf(),
                    dst: dst.to_path_buf(),
                    source: link_error,
                }),
                Err(source) => {
                    log::error!(
                        "Failed to restore {} from {}: {}",
                        dst.display(),
                        temp.display(),
                        source
                    );
                    Err(LinkError::Restore {
                        src: src.to_path_buf(),
                        dst: dst.to_path_buf(),
                        temp,
                        link_error,
                        source,
                    })
                }
            };
        }

        fs::remove_file(&temp).map_err(|source| LinkError::Cleanup { temp, source })
    }
}
