use super::support::{create_files, same_file, scan, touch, NOW};
use rustdedup::catalog::{Catalog, EntryKind};
use rustdedup::dedup::{DedupConfig, DedupSummary, Deduper, MtimePolicy};
use rustdedup::identity::{lstat, FileIdentity};
use std::path::PathBuf;
use tempfile::tempdir;

fn dedup_tree(config: DedupConfig) -> (tempfile::TempDir, Vec<PathBuf>, DedupSummary) {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let files = create_files(&root);

    let mut catalog = Catalog::create(&dir.path().join("rustdedup.db")).unwrap();
    scan(&mut catalog, &root);
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (0, files.len() as u64));

    let summary = Deduper::new(&mut catalog, config).files().unwrap();
    assert_eq!(
        catalog.counts(EntryKind::File).unwrap(),
        (files.len() as u64, files.len() as u64)
    );
    assert_eq!(catalog.pending_count(EntryKind::File).unwrap(), 0);
    catalog.close().unwrap();

    (dir, files, summary)
}

#[test]
#[cfg(unix)]
fn test_dedup_files_default() {
    let (_dir, files, summary) = dedup_tree(DedupConfig::default());

    assert!(!same_file(&files[0], &files[1]));
    assert!(same_file(&files[0], &files[2]));
    assert!(!same_file(&files[0], &files[4]));
    assert!(!same_file(&files[1], &files[5]));
    assert!(same_file(&files[1], &files[3]));
    assert!(!same_file(&files[0], &files[6]));
    assert!(!same_file(&files[1], &files[7]));
    assert_eq!(summary.attr_mismatch, 2);
    assert_eq!(summary.linked, 2);
}

#[test]
#[cfg(unix)]
fn test_dedup_files_ignoring_name() {
    let (_dir, files, summary) = dedup_tree(DedupConfig::default().with_match_name(false));

    // root/1 is the source of the NOW bucket, b/1 of the NOW + 3 bucket
    for i in [1, 2, 3] {
        assert!(same_file(&files[0], &files[i]), "{}", files[i].display());
    }
    assert!(same_file(&files[4], &files[5]));
    assert!(!same_file(&files[0], &files[4]));
    assert!(!same_file(&files[0], &files[6]));
    assert!(!same_file(&files[0], &files[7]));
    assert_eq!(summary.linked, 4);
}

#[test]
fn test_dedup_files_ignoring_attrs() {
    let (_dir, files, summary) = dedup_tree(DedupConfig::default().with_match_attrs(false));

    assert!(same_file(&files[0], &files[2]));
    assert!(same_file(&files[0], &files[6]));
    assert!(same_file(&files[1], &files[7]));
    assert!(!same_file(&files[0], &files[4]));
    assert_eq!(summary.attr_mismatch, 0);
    assert_eq!(summary.linked, 4);
}

#[test]
fn test_dedup_files_ignoring_mtime_oldest() {
    let (_dir, files, summary) = dedup_tree(DedupConfig::default().with_mtime(MtimePolicy::Oldest));

    // root/1 is older than b/1, so it stays the source
    assert!(same_file(&files[0], &files[2]));
    assert!(same_file(&files[0], &files[4]));
    assert!(same_file(&files[1], &files[5]));
    assert_eq!(summary.buckets, 1);

    let source = lstat(&files[0]).unwrap();
    assert_eq!(source.mtime(), NOW);
}

#[test]
fn test_dedup_files_ignoring_mtime_latest() {
    let (_dir, files, _summary) = dedup_tree(DedupConfig::default().with_mtime(MtimePolicy::Latest));

    // b/1 is the newest and becomes the source
    assert!(same_file(&files[4], &files[0]));
    assert!(same_file(&files[4], &files[2]));
    let source = lstat(&files[0]).unwrap();
    assert_eq!(source.mtime(), NOW + 3);
}

#[test]
fn test_different_content_is_not_linked() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let a = root.join("a").join("data");
    let b = root.join("b").join("data");
    let c = root.join("c").join("data");
    touch(&a, b"data\n", NOW);
    touch(&b, b"atad\n", NOW);
    touch(&c, b"data\n", NOW);

    let mut catalog = Catalog::open_in_memory().unwrap();
    scan(&mut catalog, &root);
    let summary = Deduper::new(&mut catalog, DedupConfig::default())
        .run()
        .unwrap();

    assert!(same_file(&a, &c));
    assert!(!same_file(&a, &b));
    assert_eq!(summary.buckets, 1);
    assert_eq!(summary.linked, 1);
    assert_eq!(std::fs::read(&b).unwrap(), b"atad\n");
}

#[test]
fn test_changed_files_are_stale() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let mut files = Vec::new();
    for name in ["1", "2", "3"] {
        let path = root.join(name);
        touch(&path, b"", if name == "1" { NOW - 3 } else { NOW });
        files.push(path);
    }

    let mut catalog = Catalog::open_in_memory().unwrap();
    scan(&mut catalog, &root);
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (0, 3));

    // mtime moved and content changed after the scan
    touch(&files[1], b"", NOW - 3);
    touch(&files[2], b"data\n", NOW);

    Deduper::new(&mut catalog, DedupConfig::default().with_match_name(false))
        .files()
        .unwrap();

    assert!(!same_file(&files[0], &files[1]));
    assert!(!same_file(&files[0], &files[2]));
    assert!(!same_file(&files[1], &files[2]));
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (3, 3));
}

#[test]
#[cfg(unix)]
fn test_second_run_finds_nothing_to_do() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    create_files(&root);

    let mut catalog = Catalog::open_in_memory().unwrap();
    scan(&mut catalog, &root);
    Deduper::new(&mut catalog, DedupConfig::default()).run().unwrap();

    let again = Deduper::new(&mut catalog, DedupConfig::default()).run().unwrap();
    assert_eq!(again, DedupSummary::default());

    // A rescan queues everything again; linked pairs are now already linked
    scan(&mut catalog, &root);
    let rescan = Deduper::new(&mut catalog, DedupConfig::default()).run().unwrap();
    assert_eq!(rescan.linked, 0);
    assert_eq!(rescan.already_linked, 2);
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (16, 16));
}
