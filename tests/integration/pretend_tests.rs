use super::support::{create_files, run, same_file, scan};
use rustdedup::catalog::{Catalog, EntryKind, ScratchCatalog};
use rustdedup::dedup::{DedupConfig, Deduper};
use std::ffi::OsStr;
use tempfile::tempdir;

#[test]
fn test_pretend_changes_nothing() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let cache = dir.path().join("rustdedup.db");
    let files = create_files(&root);

    run([
        OsStr::new("-p"),
        OsStr::new("-c"),
        cache.as_os_str(),
        root.as_os_str(),
    ])
    .unwrap();

    for pair in files.windows(2) {
        assert!(!same_file(&pair[0], &pair[1]));
    }
    assert!(!same_file(&files[0], &files[2]));

    // The scan is kept; only the scratch copy was drained
    let catalog = Catalog::open(&cache).unwrap();
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (0, 8));
    assert_eq!(catalog.pending_count(EntryKind::File).unwrap(), 8);
}

#[test]
fn test_pretend_reports_what_a_real_run_does() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let cache = dir.path().join("rustdedup.db");
    let files = create_files(&root);

    let mut catalog = Catalog::create(&cache).unwrap();
    scan(&mut catalog, &root);
    catalog.close().unwrap();

    let mut scratch = ScratchCatalog::copy_of(&cache).unwrap();
    let pretend = Deduper::new(&mut scratch, DedupConfig::default().with_pretend(true))
        .run()
        .unwrap();
    assert_eq!(scratch.counts(EntryKind::File).unwrap(), (8, 8));
    drop(scratch);
    assert!(!same_file(&files[0], &files[2]));

    let mut catalog = Catalog::open(&cache).unwrap();
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (0, 8));
    let real = Deduper::new(&mut catalog, DedupConfig::default())
        .run()
        .unwrap();

    assert_eq!(pretend, real);
    assert!(real.linked > 0);
    assert!(same_file(&files[0], &files[2]));
}
