use super::support::{create_files, run, same_file, scan};
use rustdedup::catalog::{Catalog, EntryKind};
use rustdedup::error::ExitCode;
use std::ffi::OsStr;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_existing_cache_requires_resume() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let cache = dir.path().join("rustdedup.db");
    create_files(&root);
    fs::write(&cache, b"").unwrap();

    let err = run([OsStr::new("-c"), cache.as_os_str(), root.as_os_str()]).unwrap_err();

    assert!(format!("{:#}", err).contains("already exists"));
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
    assert_eq!(fs::metadata(&cache).unwrap().len(), 0);
}

#[test]
fn test_resume_without_cache_is_an_error() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("rustdedup.db");

    let err = run([OsStr::new("-r"), OsStr::new("-c"), cache.as_os_str()]).unwrap_err();

    assert!(format!("{:#}", err).contains("does not exist"));
    assert!(!cache.exists());
}

#[test]
fn test_resume_processes_scanned_cache() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let cache = dir.path().join("rustdedup.db");
    let files = create_files(&root);

    let mut catalog = Catalog::create(&cache).unwrap();
    scan(&mut catalog, &root);
    catalog.close().unwrap();

    let code = run([OsStr::new("-r"), OsStr::new("-c"), cache.as_os_str()]).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(same_file(&files[0], &files[2]));
    assert!(same_file(&files[1], &files[3]));
    let catalog = Catalog::open(&cache).unwrap();
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (8, 8));
}

#[test]
fn test_resume_does_not_rescan() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let cache = dir.path().join("rustdedup.db");
    let files = create_files(&root);

    run([OsStr::new("-c"), cache.as_os_str(), root.as_os_str()]).unwrap();
    // Paths given with --resume are ignored
    run([
        OsStr::new("-r"),
        OsStr::new("-c"),
        cache.as_os_str(),
        root.as_os_str(),
    ])
    .unwrap();

    let catalog = Catalog::open(&cache).unwrap();
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (8, 8));
    assert_eq!(catalog.path_count().unwrap(), files.len() as u64);
}
