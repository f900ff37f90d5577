use super::support::{run, same_file, touch, NOW};
use rustdedup::catalog::{Catalog, EntryKind};
use rustdedup::error::ExitCode;
use rustdedup::scanner::ScanError;
use std::ffi::OsStr;
use tempfile::tempdir;

#[test]
fn test_duplicates_across_roots_are_linked() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    let cache = dir.path().join("rustdedup.db");
    touch(&first.join("photo.jpg"), b"jpeg\n", NOW);
    touch(&second.join("photo.jpg"), b"jpeg\n", NOW);

    run([
        OsStr::new("-c"),
        cache.as_os_str(),
        first.as_os_str(),
        second.as_os_str(),
    ])
    .unwrap();

    assert!(same_file(&first.join("photo.jpg"), &second.join("photo.jpg")));
    let catalog = Catalog::open(&cache).unwrap();
    assert_eq!(catalog.path_count().unwrap(), 2);
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (2, 2));
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("rustdedup.db");
    let missing = dir.path().join("missing");

    let err = run([OsStr::new("-c"), cache.as_os_str(), missing.as_os_str()]).unwrap_err();

    assert!(err
        .chain()
        .any(|e| matches!(e.downcast_ref::<ScanError>(), Some(ScanError::NotFound(_)))));
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
}

#[test]
#[cfg(unix)]
fn test_no_symlinks_skips_links() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let cache = dir.path().join("rustdedup.db");
    touch(&root.join("file"), b"data\n", NOW);
    std::os::unix::fs::symlink("file", root.join("link")).unwrap();

    run([
        OsStr::new("--no-symlinks"),
        OsStr::new("-c"),
        cache.as_os_str(),
        root.as_os_str(),
    ])
    .unwrap();

    let catalog = Catalog::open(&cache).unwrap();
    assert_eq!(catalog.counts(EntryKind::Symlink).unwrap(), (0, 0));
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (1, 1));
    assert_eq!(catalog.path_count().unwrap(), 1);
}
