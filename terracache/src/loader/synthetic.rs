//! Loader that generates analytic terrain for any bucket.

use bytes::Bytes;

use super::{BoxFuture, LoadError, TileLoader};
use crate::bucket::BucketAddress;
use crate::codec;
use crate::grid::{ElevationGrid, ResolutionClass};

/// Smooth rolling terrain in metres, defined everywhere on the globe.
///
/// Continuous across bucket edges so neighbouring synthetic tiles agree on
/// their shared nodes.
pub fn synthetic_elevation(lon: f64, lat: f64) -> i16 {
    let (lon_r, lat_r) = (lon.to_radians(), lat.to_radians());
    let ridges = (lon_r * 40.0).sin() * (lat_r * 55.0).cos() * 350.0;
    let hills = (lon_r * 310.0 + lat_r * 170.0).sin() * 60.0;
    let base = 600.0 + 400.0 * lat_r.cos();
    (base + ridges + hills).round() as i16
}

/// Produces encoded grids of [`synthetic_elevation`] on demand.
#[derive(Debug, Clone)]
pub struct SyntheticLoader {
    resolution: ResolutionClass,
    gzip: bool,
}

impl SyntheticLoader {
    pub fn new(resolution: ResolutionClass) -> Self {
        Self {
            resolution,
            gzip: false,
        }
    }

    /// Serve gzip-compressed payloads.
    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    pub fn resolution(&self) -> ResolutionClass {
        self.resolution
    }

    /// Builds the grid for one bucket.
    pub fn grid_for(&self, address: &BucketAddress) -> ElevationGrid {
        ElevationGrid::for_bucket(address, self.resolution, synthetic_elevation)
    }

    fn generate(&self, key: &str) -> Result<Bytes, LoadError> {
        let address: BucketAddress = key
            .parse()
            .map_err(|_| LoadError::NotFound(key.to_string()))?;
        let grid = self.grid_for(&address);
        if self.gzip {
            codec::encode_gzip(&grid).map_err(|e| LoadError::Io(e.to_string()))
        } else {
            Ok(codec::encode(&grid))
        }
    }
}

impl Default for SyntheticLoader {
    fn default() -> Self {
        Self::new(ResolutionClass::ThirtyArcSecond)
    }
}

impl TileLoader for SyntheticLoader {
    fn request(&self, key: &str) -> BoxFuture<'_, Result<Bytes, LoadError>> {
        let result = self.generate(key);
        Box::pin(async move { result })
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
