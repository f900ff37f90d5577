//! rustdedup - resumable hard-link deduplication
//!
//! Scans directory trees into a persistent SQLite catalog, then replaces
//! duplicate files (and symlinks) with hard links, bucket by bucket. The
//! catalog survives interruption, so a run over millions of files can be
//! stopped and resumed later without redoing finished work.
//!
//! # Modules
//!
//! - [`identity`]: device, link count and "same file" queries per platform
//! - [`catalog`]: the persistent, transactional work queue
//! - [`scanner`]: directory walking into the catalog, and content hashing
//! - [`dedup`]: bucket processing and the link-replacement protocol
//! - [`cli`], [`config`], [`logging`], [`progress`], [`signal`], [`error`]:
//!   the command-line application around them

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod identity;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::catalog::{Catalog, ScratchCatalog};
use crate::cli::Cli;
use crate::config::Config;
use crate::dedup::{DedupSummary, Deduper};
use crate::error::ExitCode;
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::Scanner;

/// Run the application for parsed command-line arguments.
///
/// Logging must already be initialized by the caller.
///
/// # Errors
///
/// Returns an error if configuration, the cache, scanning or deduplication
/// fails. Cancellation surfaces as an error whose chain contains
/// [`ScanError::Interrupted`](scanner::ScanError::Interrupted) or
/// [`DedupError::Interrupted`](dedup::DedupError::Interrupted); see
/// [`ExitCode::for_error`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref(), &cli.overrides())
        .context("Failed to load configuration")?;
    log::debug!("Using cache {}", config.cache.display());

    let handler = signal::install_handler()?;
    let progress: Option<Arc<dyn ProgressCallback>> =
        if config.progress && std::io::stderr().is_terminal() {
            Some(Arc::new(Progress::new(false)))
        } else {
            None
        };

    let cache = config.cache.as_path();
    let exists = std::fs::symlink_metadata(cache).is_ok();
    let mut catalog = if cli.resume {
        if !exists {
            bail!("'{}' does not exist, nothing to resume", cache.display());
        }
        Catalog::open(cache)
    } else {
        if exists {
            bail!("'{}' already exists!", cache.display());
        }
        Catalog::create(cache)
    }
    .with_context(|| format!("Failed to open cache {}", cache.display()))?;

    let cache_size = config.cache_size_kib();
    catalog
        .set_cache_size(cache_size)
        .context("Failed to set cache size")?;

    if !cli.resume {
        for path in &cli.paths {
            let root = std::path::absolute(path)
                .with_context(|| format!("Failed to resolve {}", path.display()))?;

            let mut scanner = Scanner::new(&mut catalog, config.scan_config())
                .with_shutdown_flag(handler.get_flag());
            if let Some(ref callback) = progress {
                scanner = scanner.with_progress_callback(Arc::clone(callback));
            }
            let summary = scanner
                .scan(&root)
                .with_context(|| format!("Failed to scan {}", root.display()))?;

            if !summary.errors.is_empty() {
                log::warn!(
                    "{} paths under {} could not be recorded",
                    summary.errors.len(),
                    root.display()
                );
            }
        }
    }

    let mut dedup_config = config
        .dedup_config(cli.pretend)
        .with_shutdown_flag(handler.get_flag());
    if let Some(ref callback) = progress {
        dedup_config = dedup_config.with_progress_callback(Arc::clone(callback));
    }

    let summary = if cli.pretend {
        catalog.close().context("Failed to close cache")?;
        let mut scratch = ScratchCatalog::copy_of(cache)
            .with_context(|| format!("Failed to copy cache {}", cache.display()))?;
        scratch
            .set_cache_size(cache_size)
            .context("Failed to set cache size")?;
        Deduper::new(&mut scratch, dedup_config)
            .run()
            .context("Deduplication failed")?
    } else {
        let summary = Deduper::new(&mut catalog, dedup_config)
            .run()
            .context("Deduplication failed")?;
        catalog.close().context("Failed to close cache")?;
        summary
    };

    report(&summary, cli.pretend);
    Ok(ExitCode::Success)
}

fn report(summary: &DedupSummary, pretend: bool) {
    let verb = if pretend { "would link" } else { "linked" };
    log::info!(
        "Done: {} {} ({} reclaimed), {} already linked, {} attribute mismatches, {} stale",
        verb,
        summary.linked,
        summary.reclaimed(),
        summary.already_linked,
        summary.attr_mismatch,
        summary.stale
    );
}
