//! User configuration file.
//!
//! Settings live in `~/.terracache/config.ini`; a missing file means
//! defaults. Settings structs live in `settings`, INI parsing in `parser`
//! and serialization in `writer`.
//!
//! # Example
//!
//! ```no_run
//! use terracache::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let manager_config = config.manager_config();
//! # Ok::<(), terracache::config::ConfigFileError>(())
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::ConfigFileError;
pub use settings::{
    config_directory, config_file_path, CacheSettings, ConfigFile, LoaderKind, LoaderSettings,
    LoggingSettings, DEFAULT_LOG_FILE,
};
