//! Manager and query error types.

use thiserror::Error;

use crate::bucket::CoordError;

/// Why a query could not be answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Unavailable {
    /// The bucket has never been requested or was evicted.
    #[error("tile not loaded")]
    NotLoaded,

    /// A load for the bucket is in flight.
    #[error("tile loading")]
    Loading,

    /// The last load for the bucket failed.
    #[error("tile failed to load")]
    Failed,

    /// The grid has no data at the point.
    #[error("no elevation data")]
    NoData,

    /// The point falls outside the loaded grid.
    #[error("outside grid")]
    OutsideGrid,
}

/// Errors returned by terrain queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error(transparent)]
    InvalidCoordinate(#[from] CoordError),

    #[error("Terrain unavailable: {0}")]
    Unavailable(#[from] Unavailable),
}

impl QueryError {
    /// Whether repeating the query after further steps may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            QueryError::Unavailable(Unavailable::NotLoaded | Unavailable::Loading | Unavailable::Failed)
        )
    }
}

/// Errors constructing a tile manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("TileManager must be created inside a Tokio runtime")]
    NoRuntime,
}
