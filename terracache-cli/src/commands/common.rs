//! Common types and utilities shared across CLI commands.

use std::sync::Arc;

use clap::ValueEnum;
use terracache::config::{ConfigFile, LoaderKind};
use terracache::grid::ResolutionClass;
use terracache::loader::{FileSystemLoader, HttpLoader, SyntheticLoader, TileLoader};

use crate::error::CliError;

/// Grid resolution selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Resolution {
    /// 1 arc-second spacing (~30 m)
    One,
    /// 3 arc-second spacing (~90 m)
    Three,
    /// 30 arc-second spacing (~900 m)
    Thirty,
}

impl From<Resolution> for ResolutionClass {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::One => ResolutionClass::OneArcSecond,
            Resolution::Three => ResolutionClass::ThreeArcSecond,
            Resolution::Thirty => ResolutionClass::ThirtyArcSecond,
        }
    }
}

/// Load the config file, from `path` if given.
pub fn load_config(path: Option<&std::path::Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load()?),
    }
}

/// Build the tile loader selected by config, or a synthetic one when forced.
pub fn build_loader(config: &ConfigFile, synthetic: bool) -> Result<Arc<dyn TileLoader>, CliError> {
    if synthetic {
        return Ok(Arc::new(SyntheticLoader::default()));
    }

    match config.loader.kind {
        LoaderKind::Directory => Ok(Arc::new(FileSystemLoader::new(
            config.loader.directory.clone(),
        ))),
        LoaderKind::Http => {
            let base_url = config.loader.base_url.clone().ok_or_else(|| {
                CliError::Config("loader.base_url is required when loader.kind = http".to_string())
            })?;
            Ok(Arc::new(HttpLoader::new(base_url)?))
        }
        LoaderKind::Synthetic => Ok(Arc::new(SyntheticLoader::default())),
    }
}

/// Multi-threaded Tokio runtime for commands that drive the tile manager.
pub fn build_runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))
}
