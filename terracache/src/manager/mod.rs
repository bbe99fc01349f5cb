//! Tile manager and terrain queries.
//!
//! The [`TileManager`] owns the lifecycle of cached tiles around a moving
//! viewer; [`TerrainQuery`] answers elevation and slope questions
//! from whatever is currently resident.

mod config;
mod error;
mod query;
mod tile_manager;

pub use config::{
    TileManagerConfig, DEFAULT_MAX_CONCURRENT_LOADS, DEFAULT_MAX_RETRY_BACKOFF_STEPS,
    DEFAULT_RETENTION_GRACE_STEPS, DEFAULT_RETENTION_RADIUS_TILES, DEFAULT_RETRY_BACKOFF_STEPS,
    MAX_CONCURRENT_LOADS, MAX_RETENTION_RADIUS_TILES,
};
pub use error::{ManagerError, QueryError, Unavailable};
pub use query::TerrainQuery;
pub use tile_manager::{StepReport, TileManager, ViewerPosition};
