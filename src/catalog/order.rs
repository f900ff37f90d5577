//! Deterministic ordering of pending entries.
//!
//! Buckets come back from SQLite in no particular order. Before the engine
//! picks canonical sources they are sorted by:
//!
//! 1. modification time, ascending or descending
//! 2. hard-link count, descending (an already well-linked file anchors the group)
//! 3. volume, local disks before UNC/shared paths
//! 4. path components, segment by segment, shorter path first on prefix ties

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::path::{Component, Path, Prefix};

use super::entry::{PendingEntry, SortOrder};

/// Sort entries in place by the tie-break order.
pub fn sort_entries(entries: &mut [PendingEntry], order: SortOrder) {
    entries.sort_by(|a, b| compare(a, b, order));
}

/// Compare two entries by the tie-break order.
#[must_use]
pub fn compare(a: &PendingEntry, b: &PendingEntry, order: SortOrder) -> Ordering {
    let by_mtime = match order {
        SortOrder::Ascending => a.mtime.cmp(&b.mtime),
        SortOrder::Descending => b.mtime.cmp(&a.mtime),
    };
    by_mtime
        .then_with(|| b.nlink.cmp(&a.nlink))
        .then_with(|| volume_key(&a.path).cmp(&volume_key(&b.path)))
        .then_with(|| a.path.components().cmp(b.path.components()))
}

/// Rank and name of the volume a path lives on.
fn volume_key(path: &Path) -> (u8, &OsStr) {
    match path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let rank = match prefix.kind() {
                Prefix::UNC(..) | Prefix::VerbatimUNC(..) => 1,
                _ => 0,
            };
            (rank, prefix.as_os_str())
        }
        _ => (0, OsStr::new("")),
    }
}
