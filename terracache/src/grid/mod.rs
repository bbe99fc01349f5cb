//! Elevation grids.
//!
//! An [`ElevationGrid`] is a regular array of 16-bit samples covering one
//! bucket. It answers point elevation queries by bilinear interpolation and
//! can reduce itself to a coarse plane via a least-squares fit.

mod interpolate;
mod plane;
mod types;

pub use plane::{sample_stride, Plane, EARTH_RADIUS_M};
pub use types::{ElevationGrid, GridError, ResolutionClass, Vec3, NO_DATA};
