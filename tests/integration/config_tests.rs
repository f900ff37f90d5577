use super::support::{run, same_file, touch, NOW};
use rustdedup::catalog::{Catalog, EntryKind};
use rustdedup::config::ConfigError;
use rustdedup::error::ExitCode;
use std::ffi::OsStr;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_file_settings_apply() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let one = root.join("one");
    let two = root.join("two");
    touch(&one, b"data\n", NOW);
    touch(&two, b"data\n", NOW);

    let config = dir.path().join("config.toml");
    fs::write(&config, "ignore_name = true\nprogress = false\n").unwrap();
    let cache = dir.path().join("rustdedup.db");

    let code = run([
        OsStr::new("--config"),
        config.as_os_str(),
        OsStr::new("-c"),
        cache.as_os_str(),
        root.as_os_str(),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(same_file(&one, &two));
}

#[test]
fn test_cli_flags_override_config_file() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    let one = root.join("one");
    let two = root.join("two");
    touch(&one, b"data\n", NOW);
    touch(&two, b"data\n", NOW);

    let cache = dir.path().join("from-config.db");
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        format!("cache = '{}'\nignore_name = false\n", cache.display()),
    )
    .unwrap();

    run([
        OsStr::new("--config"),
        config.as_os_str(),
        OsStr::new("-n"),
        root.as_os_str(),
    ])
    .unwrap();

    assert!(same_file(&one, &two));
    let catalog = Catalog::open(&cache).unwrap();
    assert_eq!(catalog.counts(EntryKind::File).unwrap(), (2, 2));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    touch(&root.join("one"), b"data\n", NOW);
    let cache = dir.path().join("rustdedup.db");
    let config = dir.path().join("missing.toml");

    let err = run([
        OsStr::new("--config"),
        config.as_os_str(),
        OsStr::new("-c"),
        cache.as_os_str(),
        root.as_os_str(),
    ])
    .unwrap_err();

    assert!(err
        .chain()
        .any(|e| matches!(e.downcast_ref::<ConfigError>(), Some(ConfigError::NotFound(_)))));
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
    assert!(!cache.exists());
}
