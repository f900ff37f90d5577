//! Shared fixtures for the integration tests.

use clap::Parser;
use filetime::FileTime;
use rustdedup::catalog::Catalog;
use rustdedup::cli::Cli;
use rustdedup::error::ExitCode;
use rustdedup::identity::{lstat, FileIdentity};
use rustdedup::scanner::{ScanConfig, Scanner};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed mtime so runs do not depend on the clock.
pub const NOW: i64 = 1_700_000_000;

pub fn touch(path: &Path, content: &[u8], mtime: i64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    filetime::set_file_mtime(path, FileTime::from_unix_time(mtime, 0)).unwrap();
}

/// Build the reference tree:
///
/// ```text
/// root/1 root/2       empty, NOW
/// root/a/1 root/a/2   empty, NOW                (duplicates of root/*)
/// root/b/1 root/b/2   empty, NOW + 3            (different mtime)
/// root/c/1 root/c/2   empty, NOW, mode 0444     (different attributes)
/// ```
///
/// Returns the eight files in that order.
pub fn create_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in ["", "a", "b", "c"] {
        for name in ["1", "2"] {
            let path = root.join(dir).join(name);
            let mtime = if dir == "b" { NOW + 3 } else { NOW };
            touch(&path, b"", mtime);
            files.push(path);
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        for name in ["1", "2"] {
            let path = root.join("c").join(name);
            fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();
            // chmod touches ctime only, mtime stays NOW
        }
    }

    files
}

pub fn scan(catalog: &mut Catalog, root: &Path) {
    Scanner::new(catalog, ScanConfig::default())
        .scan(root)
        .unwrap();
}

pub fn same_file(a: &Path, b: &Path) -> bool {
    match (lstat(a), lstat(b)) {
        (Ok(a), Ok(b)) => a.same_file(&b),
        _ => false,
    }
}

/// Run the application as if invoked with `args`.
pub fn run<I, T>(args: I) -> anyhow::Result<ExitCode>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv = std::iter::once(OsString::from("rustdedup")).chain(args.into_iter().map(Into::into));
    let cli = Cli::try_parse_from(argv).unwrap();
    rustdedup::run_app(cli)
}
