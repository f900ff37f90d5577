//! Layered application configuration.
//!
//! Settings are merged with `figment`, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file: `--config <FILE>` or `rustdedup/config.toml` in the
//!    platform config directory (optional)
//! 3. Environment variables prefixed with `RUSTDEDUP_`, e.g.
//!    `RUSTDEDUP_CACHE_SIZE=65536` or `RUSTDEDUP_MTIME=latest`
//! 4. Command-line flags ([`ConfigOverrides`])
//!
//! # Example
//!
//! ```toml
//! cache = "/var/cache/rustdedup.db"
//! cache_size = 262144
//! ignore_name = true
//! mtime = "oldest"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::dedup::{DedupConfig, MtimePolicy};
use crate::scanner::ScanConfig;

/// Default cache file name, relative to the working directory.
pub const DEFAULT_CACHE: &str = "rustdedup.db";

/// Prefix of environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "RUSTDEDUP_";

/// Floor for the computed page cache size (SQLite's own default).
const MIN_CACHE_SIZE_KIB: u64 = 2 * 1024;

/// Errors raised while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer holds a value of the wrong type or an unknown variant.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] figment::Error),
}

/// Effective settings for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache (catalog) file.
    pub cache: PathBuf,
    /// SQLite page cache in KiB. Unset means half of total memory.
    pub cache_size: Option<u64>,
    /// Link files even if owner, permissions or device differ.
    pub ignore_attrs: bool,
    /// Link files even if their names differ.
    pub ignore_name: bool,
    /// Modification time policy.
    pub mtime: MtimePolicy,
    /// Record and deduplicate symlinks.
    pub symlinks: bool,
    /// Show progress bars.
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: PathBuf::from(DEFAULT_CACHE),
            cache_size: None,
            ignore_attrs: false,
            ignore_name: false,
            mtime: MtimePolicy::Match,
            symlinks: true,
            progress: true,
        }
    }
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_attrs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_name: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<MtimePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symlinks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<bool>,
}

impl Config {
    /// Merge every layer into a [`Config`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `file` is given but missing and
    /// [`ConfigError::Invalid`] if any layer fails to deserialize.
    pub fn load(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                log::debug!("Loading config from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = default_config_path().filter(|p| p.is_file()) {
                    log::debug!("Loading config from {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(overrides))
            .extract()?;
        log::trace!("Effective config: {:?}", config);
        Ok(config)
    }

    /// Page cache size in KiB, falling back to half of total memory.
    #[must_use]
    pub fn cache_size_kib(&self) -> u64 {
        self.cache_size.unwrap_or_else(default_cache_size)
    }

    /// Which entry types the scanner records.
    #[must_use]
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::new(true, self.symlinks)
    }

    /// Dedup settings, without cancellation or progress wiring.
    #[must_use]
    pub fn dedup_config(&self, pretend: bool) -> DedupConfig {
        DedupConfig::default()
            .with_match_name(!self.ignore_name)
            .with_match_attrs(!self.ignore_attrs)
            .with_mtime(self.mtime)
            .with_pretend(pretend)
    }
}

/// `rustdedup/config.toml` in the platform config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rustdedup").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Half of total physical memory, in KiB.
#[must_use]
pub fn default_cache_size() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    (sys.total_memory() / 2 / 1024).max(MIN_CACHE_SIZE_KIB)
}
