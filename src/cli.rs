//! Command-line interface definitions for rustdedup.
//!
//! # Example
//!
//! ```bash
//! # Scan two trees and link duplicates (cache: ./rustdedup.db)
//! rustdedup /srv/photos /srv/backup/photos
//!
//! # See what would be linked, ignoring file names
//! rustdedup --pretend --name /srv/photos
//!
//! # Continue an interrupted run without rescanning
//! rustdedup --resume --cache /var/tmp/photos.db
//! ```

use clap::Parser;
use std::path::PathBuf;

use crate::config::ConfigOverrides;
use crate::dedup::MtimePolicy;

/// Replace duplicate files with hard links.
///
/// Every file and symlink under PATH is recorded in a cache file first.
/// Duplicates are then linked bucket by bucket; an interrupted run can be
/// continued later with --resume.
#[derive(Debug, Parser)]
#[command(name = "rustdedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directories to deduplicate
    #[arg(value_name = "PATH", required_unless_present = "resume")]
    pub paths: Vec<PathBuf>,

    /// Cache file (default: rustdedup.db)
    #[arg(short, long, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Ignore file attributes (owner, permissions)
    #[arg(short = 'a', long = "attrs")]
    pub ignore_attrs: bool,

    /// Ignore file name
    #[arg(short = 'n', long = "name")]
    pub ignore_name: bool,

    /// Ignore mtime and prefer the oldest or latest file as the link source
    #[arg(short, long, value_enum, value_name = "WHEN")]
    pub mtime: Option<MtimePolicy>,

    /// Show what would be linked without changing anything
    ///
    /// Runs on a throwaway copy of the cache, so the real cache still
    /// holds all pending work afterwards.
    #[arg(short, long)]
    pub pretend: bool,

    /// Resume with an existing cache file instead of scanning
    #[arg(short, long)]
    pub resume: bool,

    /// SQLite page cache in KiB (default: 50% of system memory)
    #[arg(short = 's', long = "cache-size", value_name = "KIB")]
    pub cache_size: Option<u64>,

    /// Skip symbolic links
    #[arg(long)]
    pub no_symlinks: bool,

    /// Read settings from this TOML file
    #[arg(long, value_name = "FILE", env = "RUSTDEDUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Report errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}

impl Cli {
    /// Settings given on the command line, as the top config layer.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            cache: self.cache.clone(),
            cache_size: self.cache_size,
            ignore_attrs: self.ignore_attrs.then_some(true),
            ignore_name: self.ignore_name.then_some(true),
            mtime: self.mtime,
            symlinks: self.no_symlinks.then_some(false),
            progress: (self.no_progress || self.quiet).then_some(false),
        }
    }
}
