//! Loader reading payloads from a local directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::trace;

use super::{BoxFuture, LoadError, TileLoader};

/// Extension of uncompressed payload files.
pub const TILE_EXTENSION: &str = "egrd";

/// Extension of gzip-compressed payload files.
pub const TILE_GZ_EXTENSION: &str = "egrd.gz";

/// Reads `<root>/<key>.egrd`, falling back to `<root>/<key>.egrd.gz`.
///
/// The key's chunk prefix becomes a subdirectory, e.g.
/// `<root>/w075n40/1728687.egrd`.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the uncompressed payload for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key, TILE_EXTENSION))
    }

    /// Path of the compressed payload for `key`.
    pub fn gz_path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key, TILE_GZ_EXTENSION))
    }

    async fn read(&self, key: String) -> Result<Bytes, LoadError> {
        for path in [self.path_for(&key), self.gz_path_for(&key)] {
            match tokio::fs::read(&path).await {
                Ok(data) => {
                    trace!(path = %path.display(), bytes = data.len(), "Read tile payload");
                    return Ok(Bytes::from(data));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(LoadError::Io(format!("{}: {}", path.display(), e))),
            }
        }
        Err(LoadError::NotFound(key))
    }
}

impl TileLoader for FileSystemLoader {
    fn request(&self, key: &str) -> BoxFuture<'_, Result<Bytes, LoadError>> {
        Box::pin(self.read(key.to_string()))
    }

    fn name(&self) -> &str {
        "directory"
    }
}
