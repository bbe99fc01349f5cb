//! terracache - on-demand terrain tiles around a moving viewer
//!
//! This library divides the globe into buckets of roughly equal ground
//! footprint, decodes per-bucket elevation grids, and keeps the grids around
//! a moving viewer resident so elevation and surface-normal queries can be
//! answered at interactive rates.
//!
//! # Overview
//!
//! - [`bucket`] maps coordinates to bucket addresses and canonical keys
//! - [`codec`] decodes (and encodes) the binary elevation grid format
//! - [`grid`] holds decoded grids, bilinear interpolation and plane fitting
//! - [`cache`] is the concurrent tile store
//! - [`loader`] fetches raw tile bytes from disk, HTTP or memory
//! - [`manager`] drives loads, retries and eviction once per step
//!
//! ```ignore
//! use std::sync::Arc;
//! use terracache::loader::SyntheticLoader;
//! use terracache::manager::{TileManager, TileManagerConfig};
//!
//! let mut manager = TileManager::new(TileManagerConfig::default(), Arc::new(SyntheticLoader::default()))?;
//! manager.set_viewer_position(-74.0, 40.7)?;
//! manager.step_once();
//! manager.settle().await;
//! let elevation = manager.elevation_at(-74.0, 40.7)?;
//! ```

pub mod bucket;
pub mod cache;
pub mod codec;
pub mod config;
pub mod grid;
pub mod loader;
pub mod logging;
pub mod manager;
pub mod telemetry;

pub use bucket::{address_for, BucketAddress, CoordError};
pub use grid::{ElevationGrid, GridError, ResolutionClass};
pub use manager::{QueryError, TileManager, TileManagerConfig};

/// Version of the terracache library and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
