use super::support::{same_file, scan, touch, NOW};
use rustdedup::catalog::{Catalog, EntryKind};
use rustdedup::dedup::{DedupConfig, DedupError, Deduper};
use rustdedup::progress::ProgressCallback;
use rustdedup::signal::ShutdownHandler;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

/// Requests shutdown once at least `after` entries are reported done.
struct StopAfter {
    after: u64,
    handler: ShutdownHandler,
}

impl ProgressCallback for StopAfter {
    fn on_phase_start(&self, _phase: &str, _total: u64) {}

    fn on_progress(&self, current: u64, _path: &Path) {
        if current >= self.after {
            self.handler.request_shutdown();
        }
    }

    fn on_phase_end(&self, _phase: &str) {}
}

#[test]
fn test_interrupted_dedup_resumes_where_it_stopped() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let cache = dir.path().join("rustdedup.db");

    // Two buckets of two duplicates each
    let pairs = [("a", b"1".as_slice()), ("b", b"22".as_slice())];
    for (name, content) in pairs {
        touch(&root.join("x").join(name), content, NOW);
        touch(&root.join("y").join(name), content, NOW);
    }

    let mut catalog = Catalog::create(&cache).unwrap();
    scan(&mut catalog, &root);

    let handler = ShutdownHandler::new();
    let config = DedupConfig::default()
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(Arc::new(StopAfter {
            after: 2,
            handler: handler.clone(),
        }));
    let err = Deduper::new(&mut catalog, config).run().unwrap_err();

    assert!(matches!(err, DedupError::Interrupted));
    assert!(handler.is_shutdown_requested());
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (2, 4));
    assert_eq!(catalog.pending_count(EntryKind::File).unwrap(), 2);
    assert_eq!(catalog.depth(), 0);
    catalog.close().unwrap();

    let mut catalog = Catalog::open(&cache).unwrap();
    let summary = Deduper::new(&mut catalog, DedupConfig::default())
        .run()
        .unwrap();

    assert_eq!(summary.buckets, 1);
    assert_eq!(summary.linked, 1);
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (4, 4));
    for (name, _) in pairs {
        assert!(same_file(&root.join("x").join(name), &root.join("y").join(name)));
    }
}

#[test]
fn test_shutdown_before_dedup_keeps_all_work() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    touch(&root.join("x"), b"data\n", NOW);
    touch(&root.join("y").join("x"), b"data\n", NOW);

    let mut catalog = Catalog::open_in_memory().unwrap();
    scan(&mut catalog, &root);

    let handler = ShutdownHandler::new();
    handler.request_shutdown();
    let config = DedupConfig::default().with_shutdown_flag(handler.get_flag());
    let err = Deduper::new(&mut catalog, config).run().unwrap_err();

    assert!(matches!(err, DedupError::Interrupted));
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (0, 2));
    assert!(!same_file(&root.join("x"), &root.join("y").join("x")));
}
