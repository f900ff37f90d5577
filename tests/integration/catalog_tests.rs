use super::support::{create_files, scan, touch, NOW};
use rustdedup::catalog::{Catalog, CatalogError, EntryKind, SCHEMA_VERSION};
use tempfile::tempdir;

#[test]
fn test_catalog_survives_close_and_open() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let cache = dir.path().join("rustdedup.db");
    let files = create_files(&root);

    let mut catalog = Catalog::create(&cache).unwrap();
    scan(&mut catalog, &root);
    catalog.retire(&files[0]).unwrap();
    catalog.close().unwrap();

    let catalog = Catalog::open(&cache).unwrap();
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (1, 8));
    assert_eq!(catalog.pending_count(EntryKind::File).unwrap(), 7);
    assert_eq!(catalog.path_count().unwrap(), 8);
    assert!(catalog.pending_kinds(&files[0]).unwrap().is_empty());
    assert_eq!(catalog.pending_kinds(&files[1]).unwrap(), vec![EntryKind::File]);
}

#[test]
fn test_create_discards_existing_cache() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let cache = dir.path().join("rustdedup.db");
    create_files(&root);

    let mut catalog = Catalog::create(&cache).unwrap();
    scan(&mut catalog, &root);
    catalog.close().unwrap();

    let catalog = Catalog::create(&cache).unwrap();
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (0, 0));
    assert_eq!(catalog.path_count().unwrap(), 0);
}

#[test]
#[cfg(unix)]
fn test_rescan_after_type_change_moves_pending_record() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let path = root.join("entry");
    touch(&path, b"data\n", NOW);

    let mut catalog = Catalog::open_in_memory().unwrap();
    scan(&mut catalog, &root);
    assert_eq!(catalog.pending_kinds(&path).unwrap(), vec![EntryKind::File]);

    std::fs::remove_file(&path).unwrap();
    std::os::unix::fs::symlink("elsewhere", &path).unwrap();
    scan(&mut catalog, &root);

    assert_eq!(catalog.path_count().unwrap(), 1);
    assert_eq!(catalog.pending_kinds(&path).unwrap(), vec![EntryKind::Symlink]);
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (1, 1));
    assert_eq!(catalog.counts(EntryKind::Symlink).unwrap(), (0, 1));
}

#[test]
fn test_open_rejects_foreign_schema_version() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("rustdedup.db");
    Catalog::create(&cache).unwrap().close().unwrap();

    {
        let conn = rusqlite::Connection::open(&cache).unwrap();
        conn.execute_batch("PRAGMA user_version = 99").unwrap();
    }

    match Catalog::open(&cache) {
        Err(CatalogError::SchemaVersion { found, expected }) => {
            assert_eq!(found, 99);
            assert_eq!(expected, SCHEMA_VERSION);
        }
        other => panic!("expected schema error, got {:?}", other.map(|_| ())),
    }
}
