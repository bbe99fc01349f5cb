//! Read-only terrain queries against the tile cache.

use std::sync::Arc;

use tracing::trace;

use super::error::{QueryError, Unavailable};
use crate::bucket::{address_for, wrap_longitude, BucketAddress, CoordError, MAX_LAT, MIN_LAT};
use crate::cache::{TileCache, TileStatus};
use crate::grid::{ElevationGrid, GridError, Plane, Vec3, EARTH_RADIUS_M};
use crate::telemetry::TileMetrics;

/// Cheap, cloneable handle answering elevation queries.
///
/// Queries only read the cache, so handles can be used from any thread while
/// the manager steps. A query touches the tile it reads at the cache's
/// current step, keeping tiles in active use from being evicted.
#[derive(Clone)]
pub struct TerrainQuery {
    cache: Arc<TileCache>,
    metrics: Arc<TileMetrics>,
}

impl TerrainQuery {
    pub fn new(cache: Arc<TileCache>, metrics: Arc<TileMetrics>) -> Self {
        Self { cache, metrics }
    }

    /// Elevation in metres at a position.
    pub fn elevation_at(&self, lon: f64, lat: f64) -> Result<f64, QueryError> {
        self.record(self.sample(lon, lat))
    }

    /// Surface normal near a position, in the local east-north-up frame.
    ///
    /// Uses central differences of elevations `radius_m` metres east, west,
    /// north and south of the point. The samples may fall in neighbouring
    /// buckets; all four must be available.
    pub fn normal_near(&self, lon: f64, lat: f64, radius_m: f64) -> Result<Vec3, QueryError> {
        self.record(self.central_difference(lon, lat, radius_m))
    }

    /// Least-squares plane over the grid of the bucket containing a position.
    ///
    /// The plane is expressed in metres relative to that grid's origin. A
    /// grid without enough usable samples reports [`Unavailable::NoData`].
    pub fn plane_near(&self, lon: f64, lat: f64, max_samples: usize) -> Result<Plane, QueryError> {
        let result = self
            .grid_at(lon, lat)
            .and_then(|(_, grid)| grid.fit_plane(max_samples).map_err(grid_unavailable));
        self.record(result)
    }

    /// Resolves the ready grid for the bucket containing a position.
    pub fn grid_at(&self, lon: f64, lat: f64) -> Result<(BucketAddress, Arc<ElevationGrid>), QueryError> {
        let address = address_for(lon, lat)?;
        match self.cache.get(&address) {
            Some(grid) => Ok((address, grid)),
            None => Err(self.unavailable_reason(&address).into()),
        }
    }

    fn unavailable_reason(&self, address: &BucketAddress) -> Unavailable {
        match self.cache.status(address) {
            Some(TileStatus::Loading) => Unavailable::Loading,
            Some(TileStatus::Failed { .. }) => Unavailable::Failed,
            // Evicted between the lookup and the status check
            Some(TileStatus::Ready) | None => Unavailable::NotLoaded,
        }
    }

    fn sample(&self, lon: f64, lat: f64) -> Result<f64, QueryError> {
        let (address, grid) = self.grid_at(lon, lat)?;
        // 180 resolves to the bucket west of the antimeridian
        let lon = wrap_longitude(lon);
        grid.interpolate_elevation(lon, lat).map_err(|e| {
            trace!(address = %address, error = %e, "Elevation sample unavailable");
            grid_unavailable(e)
        })
    }

    fn central_difference(&self, lon: f64, lat: f64, radius_m: f64) -> Result<Vec3, QueryError> {
        address_for(lon, lat)?;
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(CoordError::InvalidRadius(radius_m).into());
        }

        let dlat = (radius_m / EARTH_RADIUS_M).to_degrees();
        let north_lat = (lat + dlat).min(MAX_LAT);
        let south_lat = (lat - dlat).max(MIN_LAT);

        let cos_lat = lat.to_radians().cos().max(1e-9);
        let dlon = (radius_m / (EARTH_RADIUS_M * cos_lat)).to_degrees().min(179.0);
        let east_lon = wrap_longitude(lon + dlon);
        let west_lon = wrap_longitude(lon - dlon);

        let east = self.sample(east_lon, lat)?;
        let west = self.sample(west_lon, lat)?;
        let north = self.sample(lon, north_lat)?;
        let south = self.sample(lon, south_lat)?;

        let east_span = (2.0 * dlon).to_radians() * EARTH_RADIUS_M * cos_lat;
        let north_span = (north_lat - south_lat).to_radians() * EARTH_RADIUS_M;

        Ok(Vec3::new(
            -(east - west) / east_span,
            -(north - south) / north_span,
            1.0,
        )
        .normalize())
    }

    fn record<T>(&self, result: Result<T, QueryError>) -> Result<T, QueryError> {
        match &result {
            Ok(_) => self.metrics.query_answered(),
            Err(_) => self.metrics.query_unavailable(),
        }
        result
    }
}

fn grid_unavailable(error: GridError) -> QueryError {
    match error {
        GridError::OutsideGrid { .. } => Unavailable::OutsideGrid.into(),
        _ => Unavailable::NoData.into(),
    }
}
