//! Resource loaders.
//!
//! The tile manager never touches the file system or network directly. It
//! hands each bucket's canonical key to a [`TileLoader`] and receives the raw
//! payload bytes asynchronously.
//!
//! # Dyn Compatibility
//!
//! `request` returns a boxed future so loaders can be held as
//! `Arc<dyn TileLoader>` and moved into spawned tasks.

mod file;
mod http;
mod memory;
mod synthetic;

pub use file::{FileSystemLoader, TILE_EXTENSION, TILE_GZ_EXTENSION};
pub use http::{HttpLoader, DEFAULT_TIMEOUT_SECS};
pub use memory::MemoryLoader;
pub use synthetic::{synthetic_elevation, SyntheticLoader};

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use thiserror::Error;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transient failures fetching a payload. Retried with backoff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// No resource exists for the key.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Local I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Network or HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The load was abandoned because the manager is shutting down.
    #[error("Load cancelled")]
    Cancelled,
}

/// Fetches tile payloads by canonical bucket key.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; many requests may be in flight at
/// once from different tasks.
pub trait TileLoader: Send + Sync {
    /// Fetches the payload for `key` (e.g. `w075n40/1728687`).
    fn request(&self, key: &str) -> BoxFuture<'_, Result<Bytes, LoadError>>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
