//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use terracache::bucket::CoordError;
use terracache::codec::CodecError;
use terracache::config::ConfigFileError;
use terracache::loader::LoadError;
use terracache::manager::QueryError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Coordinates or radius rejected
    InvalidCoordinate(CoordError),
    /// Failed to read a tile file
    FileRead { path: PathBuf, error: std::io::Error },
    /// Failed to write a tile file
    FileWrite { path: PathBuf, error: std::io::Error },
    /// Tile file could not be decoded
    Decode { path: PathBuf, error: CodecError },
    /// Tile could not be encoded
    Encode { path: PathBuf, error: CodecError },
    /// Failed to construct a loader
    Loader(LoadError),
    /// Failed to build the async runtime or manager
    Runtime(String),
    /// Terrain query could not be answered
    Query(QueryError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Query(e) if e.is_transient() => {
                eprintln!();
                eprintln!("The tile was not resident yet. Check that the loader can");
                eprintln!("reach the tile source, or try --synthetic.");
            }
            CliError::Decode { .. } => {
                eprintln!();
                eprintln!("The file is not a valid elevation grid (.egrd or .egrd.gz).");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidCoordinate(e) => write!(f, "Invalid coordinate: {}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path.display(), error)
            }
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path.display(), error)
            }
            CliError::Decode { path, error } => {
                write!(f, "Failed to decode '{}': {}", path.display(), error)
            }
            CliError::Encode { path, error } => {
                write!(f, "Failed to encode '{}': {}", path.display(), error)
            }
            CliError::Loader(e) => write!(f, "Failed to create loader: {}", e),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            CliError::Query(e) => write!(f, "Query failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::InvalidCoordinate(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::FileWrite { error, .. } => Some(error),
            CliError::Decode { error, .. } => Some(error),
            CliError::Encode { error, .. } => Some(error),
            CliError::Loader(e) => Some(e),
            CliError::Query(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::InvalidCoordinate(e)
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        CliError::Query(e)
    }
}

impl From<LoadError> for CliError {
    fn from(e: LoadError) -> Self {
        CliError::Loader(e)
    }
}
