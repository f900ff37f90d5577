//! Bucket-by-bucket dedup driver.
//!
//! # Overview
//!
//! [`Deduper`] drains pending work from the [`Catalog`]:
//!
//! 1. **Bucket**: pull every pending entry sharing a key (size or target,
//!    device and, depending on [`MtimePolicy`](super::MtimePolicy), mtime)
//! 2. **Re-validate**: drop entries that changed or vanished since the scan
//! 3. **Group**: files by BLAKE3 digest; symlinks already share a target
//! 4. **Link**: within each group (and name subgroup) link every entry to
//!    the first one, unless already linked or attributes differ
//! 5. **Retire**: every entry of the bucket, whatever happened to it
//!
//! Steps 2 to 5 run in one catalog transaction per bucket. A read or link
//! failure rolls the bucket back, so its entries stay pending for the next
//! run.
//!
//! Rolling back only undoes catalog state. Links already made earlier in an
//! interrupted or failed bucket stay on disk; the next run finds them
//! already linked.

use std::fs;
use std::io;
use std::path::Path;

use super::groups::{group_by_key, split_by};
use super::link::Linker;
use super::{DedupConfig, DedupError, DedupSummary};
use crate::catalog::{Catalog, EntryKind, Payload, PendingEntry};
use crate::identity::{self, FileIdentity, FileStat};
use crate::progress::{PHASE_FILES, PHASE_SYMLINKS};
use crate::scanner::{HashError, Hasher};

/// Drains a catalog and replaces duplicates with hard links.
#[derive(Debug)]
pub struct Deduper<'a> {
    catalog: &'a mut Catalog,
    config: DedupConfig,
    hasher: Hasher,
    linker: Linker,
}

impl<'a> Deduper<'a> {
    /// Create a deduper working on `catalog`.
    #[must_use]
    pub fn new(catalog: &'a mut Catalog, config: DedupConfig) -> Self {
        Self {
            catalog,
            config,
            hasher: Hasher::new(),
            linker: Linker::new(),
        }
    }

    /// Process all pending files, then all pending symlinks.
    ///
    /// # Errors
    ///
    /// Stops at the first [`DedupError`]. The bucket in flight is rolled
    /// back; everything committed before it stays retired.
    pub fn run(&mut self) -> Result<DedupSummary, DedupError> {
        let mut summary = self.files()?;
        summary.merge(&self.symlinks()?);
        Ok(summary)
    }

    /// Process all pending regular files.
    pub fn files(&mut self) -> Result<DedupSummary, DedupError> {
        self.phase(EntryKind::File)
    }

    /// Process all pending symlinks.
    pub fn symlinks(&mut self) -> Result<DedupSummary, DedupError> {
        self.phase(EntryKind::Symlink)
    }

    fn phase(&mut self, kind: EntryKind) -> Result<DedupSummary, DedupError> {
        let phase = match kind {
            EntryKind::File => PHASE_FILES,
            EntryKind::Symlink => PHASE_SYMLINKS,
        };

        // The bar length is fixed here even if more work arrives later.
        let (done, total) = self.catalog.counts(kind)?;
        log::info!(
            "Deduplicating {}s: {} pending of {}",
            kind,
            total.saturating_sub(done),
            total
        );
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase, total);
            callback.on_progress(done, Path::new(""));
        }

        let mut summary = DedupSummary::default();
        let result = self.drain(kind, &mut summary);

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(phase);
        }

        match result {
            Ok(()) => {
                log::info!(
                    "{} phase complete: {} linked, {} already linked, {} stale",
                    kind,
                    summary.linked,
                    summary.already_linked,
                    summary.stale
                );
                Ok(summary)
            }
            Err(DedupError::Interrupted) => {
                log::info!("{} phase interrupted by shutdown signal", kind);
                Err(DedupError::Interrupted)
            }
            Err(e) => Err(e),
        }
    }

    fn drain(&mut self, kind: EntryKind, summary: &mut DedupSummary) -> Result<(), DedupError> {
        loop {
            if self.config.is_shutdown_requested() {
                return Err(DedupError::Interrupted);
            }

            let bucket = self.catalog.next_bucket(
                kind,
                self.config.mtime.use_mtime(),
                self.config.mtime.order(),
            )?;
            let Some(first) = bucket.first() else {
                return Ok(());
            };
            let first = first.path.clone();

            let outcome = self.process_bucket(kind, &bucket)?;
            summary.merge(&outcome);

            if let Some(ref callback) = self.config.progress_callback {
                let (done, _) = self.catalog.counts(kind)?;
                callback.on_progress(done, &first);
            }
        }
    }

    /// Process one bucket inside its own catalog transaction.
    ///
    /// Counts are only returned when the bucket commits.
    pub(crate) fn process_bucket(
        &mut self,
        kind: EntryKind,
        bucket: &[PendingEntry],
    ) -> Result<DedupSummary, DedupError> {
        self.catalog.begin()?;
        match self.process_bucket_inner(kind, bucket) {
            Ok(outcome) => {
                self.catalog.commit()?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = self.catalog.rollback() {
                    log::error!("Catalog rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    fn process_bucket_inner(
        &mut self,
        kind: EntryKind,
        bucket: &[PendingEntry],
    ) -> Result<DedupSummary, DedupError> {
        let mut outcome = DedupSummary {
            buckets: 1,
            ..DedupSummary::default()
        };

        if let [only] = bucket {
            log::trace!("Singleton {}", only.path.display());
            self.catalog.retire(&only.path)?;
            outcome.singletons = 1;
            return Ok(outcome);
        }

        let mut live = Vec::with_capacity(bucket.len());
        for entry in bucket {
            match revalidate(entry)? {
                Some(stat) => live.push(stat),
                None => {
                    log::debug!("Stale entry: {}", entry.path.display());
                    outcome.stale += 1;
                }
            }
        }

        let groups = match kind {
            EntryKind::File => self.group_by_content(live, &mut outcome)?,
            EntryKind::Symlink => vec![live],
        };

        for group in groups {
            let subgroups = if self.config.match_name {
                split_by(group, |stat| stat.file_name().to_os_string())
            } else {
                vec![group]
            };
            for subgroup in subgroups {
                self.link_group(subgroup, &mut outcome)?;
            }
        }

        for entry in bucket {
            self.catalog.retire(&entry.path)?;
        }
        Ok(outcome)
    }

    fn group_by_content(
        &self,
        live: Vec<FileStat>,
        outcome: &mut DedupSummary,
    ) -> Result<Vec<Vec<FileStat>>, DedupError> {
        let mut keyed = Vec::with_capacity(live.len());
        for stat in live {
            if self.config.is_shutdown_requested() {
                return Err(DedupError::Interrupted);
            }

            match self.hasher.full_hash(stat.path()) {
                Ok(hash) => keyed.push((hash, stat)),
                Err(HashError::NotFound(path)) => {
                    log::debug!("Stale entry: {}", path.display());
                    outcome.stale += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(group_by_key(keyed))
    }

    /// Link every entry of `group` to its first entry.
    fn link_group(
        &mut self,
        group: Vec<FileStat>,
        outcome: &mut DedupSummary,
    ) -> Result<(), DedupError> {
        let mut entries = group.into_iter();
        let Some(src) = entries.next() else {
            return Ok(());
        };

        let mut announced = false;
        for dst in entries {
            if self.config.is_shutdown_requested() {
                return Err(DedupError::Interrupted);
            }

            if src.same_file(&dst) {
                log::debug!("Already linked: {}", dst.path().display());
                outcome.already_linked += 1;
                continue;
            }
            if self.config.match_attrs && !src.same_attributes(&dst) {
                log::debug!(
                    "Attributes differ: {} and {}",
                    src.path().display(),
                    dst.path().display()
                );
                outcome.attr_mismatch += 1;
                continue;
            }

            if !announced {
                log::info!(">> {}", src.path().display());
                announced = true;
            }
            log::info!(" + {}", dst.path().display());

            let last_link = dst.is_file() && dst.link_count().is_ok_and(|n| n <= 1);
            if !self.config.pretend {
                self.linker.replace_with_link(src.path(), dst.path())?;
            }

            outcome.linked += 1;
            if last_link {
                outcome.bytes_reclaimed += dst.size();
            }
        }
        Ok(())
    }
}

/// Compare a pending entry with the live filesystem.
///
/// Returns `None` when the entry vanished or no longer matches what was
/// scanned.
fn revalidate(entry: &PendingEntry) -> Result<Option<FileStat>, DedupError> {
    let stat = match identity::lstat(&entry.path) {
        Ok(stat) => stat,
        Err(e) if is_vanished(&e) => return Ok(None),
        Err(e) => {
            return Err(DedupError::Io {
                path: entry.path.clone(),
                source: e,
            })
        }
    };

    if stat.mtime() != entry.mtime {
        return Ok(None);
    }

    let fresh = match &entry.payload {
        Payload::Size(size) => stat.is_file() && stat.size() == *size,
        Payload::Target(target) => {
            if !stat.is_symlink() {
                false
            } else {
                match fs::read_link(&entry.path) {
                    Ok(current) => current == *target,
                    Err(e) if is_vanished(&e) => false,
                    Err(e) => {
                        return Err(DedupError::Io {
                            path: entry.path.clone(),
                            source: e,
                        })
                    }
                }
            }
        }
    };

    Ok(fresh.then_some(stat))
}

fn is_vanished(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
