//! Tile manager telemetry.
//!
//! ```text
//! TileManager / TerrainQuery ─────► TileMetrics ─────► TelemetrySnapshot ─────► CLI
//!                                   (atomic counters)  (point-in-time copy)
//! ```

mod metrics;
mod snapshot;

pub use metrics::TileMetrics;
pub use snapshot::TelemetrySnapshot;
