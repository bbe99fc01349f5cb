//! Settings structs and defaults for each configuration section.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::manager::{
    DEFAULT_MAX_CONCURRENT_LOADS, DEFAULT_MAX_RETRY_BACKOFF_STEPS, DEFAULT_RETENTION_GRACE_STEPS,
    DEFAULT_RETENTION_RADIUS_TILES, DEFAULT_RETRY_BACKOFF_STEPS,
};

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "terracache.log";

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub loader: LoaderSettings,
    pub logging: LoggingSettings,
}

/// `[cache]` section: tile manager tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub retention_radius: u32,
    pub grace_steps: u64,
    pub retry_backoff_steps: u64,
    pub max_retry_backoff_steps: u64,
    pub max_concurrent_loads: usize,
}

/// Where tile payloads come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    /// Files under a local directory.
    Directory,
    /// An HTTP server.
    Http,
    /// Generated terrain, no I/O.
    Synthetic,
}

impl FromStr for LoaderKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "directory" => Ok(LoaderKind::Directory),
            "http" => Ok(LoaderKind::Http),
            "synthetic" => Ok(LoaderKind::Synthetic),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoaderKind::Directory => "directory",
            LoaderKind::Http => "http",
            LoaderKind::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

/// `[loader]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub kind: LoaderKind,
    /// Root for the directory loader
    pub directory: PathBuf,
    /// Base URL for the HTTP loader
    pub base_url: Option<String>,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

/// Get the path to the config directory (~/.terracache).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".terracache")
}

/// Get the path to the config file (~/.terracache/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            retention_radius: DEFAULT_RETENTION_RADIUS_TILES,
            grace_steps: DEFAULT_RETENTION_GRACE_STEPS,
            retry_backoff_steps: DEFAULT_RETRY_BACKOFF_STEPS,
            max_retry_backoff_steps: DEFAULT_MAX_RETRY_BACKOFF_STEPS,
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
        }
    }
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            kind: LoaderKind::Directory,
            directory: config_directory().join("tiles"),
            base_url: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: config_directory().join("logs"),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            loader: LoaderSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
