//! Least-squares plane fitting over a strided subset of grid nodes.
//!
//! The fit works in a local metric frame anchored at the grid origin: east
//! and north distances in metres (east scaled by the cosine of the grid-centre
//! latitude) and elevation in metres. The resulting plane satisfies
//! `normal · p = offset` for points `p = (east, north, up)`.

use super::types::{ElevationGrid, GridError, Vec3, NO_DATA};
use crate::bucket::ARCSEC_PER_DEGREE;

/// Equatorial radius used for the local metric frame.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Result of a plane fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal with a positive up component.
    pub normal: Vec3,
    /// Plane offset along the normal.
    pub offset: f64,
    /// Root-mean-square vertical residual of the fitted samples, metres.
    pub rms_residual: f64,
    /// Number of samples that contributed.
    pub sample_count: usize,
    /// Node stride used for sampling.
    pub stride: u32,
}

impl Plane {
    /// Elevation of the plane at local east/north metres from the grid origin.
    pub fn elevation_at(&self, east_m: f64, north_m: f64) -> f64 {
        (self.offset - self.normal.x * east_m - self.normal.y * north_m) / self.normal.z
    }

    /// Inclination of the plane from horizontal, degrees.
    pub fn slope_deg(&self) -> f64 {
        self.normal.slope_deg()
    }
}

/// Smallest node stride that keeps the strided sample count within
/// `max_samples`.
///
/// Starts from `ceil(sqrt(cells / max_samples))` and grows until the count of
/// nodes `(i * stride, j * stride)` fits. Returns `None` for `max_samples == 0`.
pub fn sample_stride(columns: u32, rows: u32, max_samples: usize) -> Option<u32> {
    if max_samples == 0 {
        return None;
    }

    let cells = columns as f64 * rows as f64;
    let mut stride = ((cells / max_samples as f64).sqrt().ceil() as u32).max(1);
    while strided_count(columns, rows, stride) > max_samples {
        stride += 1;
    }
    Some(stride)
}

#[inline]
fn strided_count(columns: u32, rows: u32, stride: u32) -> usize {
    let along = |n: u32| if n == 0 { 0 } else { ((n - 1) / stride + 1) as usize };
    along(columns) * along(rows)
}

impl ElevationGrid {
    /// Fits `z = a·east + b·north + c` to at most `max_samples` nodes.
    pub fn fit_plane(&self, max_samples: usize) -> Result<Plane, GridError> {
        let stride = sample_stride(self.columns(), self.rows(), max_samples)
            .ok_or(GridError::InsufficientSamples(0))?;

        let spacing_rad =
            (self.spacing_arcsec() as f64 / ARCSEC_PER_DEGREE as f64).to_radians();
        let (_, origin_lat) = self.origin_deg();
        let (_, extent_lat) = self.extent_arcsec();
        let center_lat = origin_lat + extent_lat as f64 / ARCSEC_PER_DEGREE as f64 / 2.0;
        let east_per_col = spacing_rad * EARTH_RADIUS_M * center_lat.to_radians().cos();
        let north_per_row = spacing_rad * EARTH_RADIUS_M;

        let mut points = Vec::with_capacity(strided_count(self.columns(), self.rows(), stride));
        for row in (0..self.rows()).step_by(stride as usize) {
            for col in (0..self.columns()).step_by(stride as usize) {
                let z = self.node(col, row);
                if z != NO_DATA {
                    points.push((col as f64 * east_per_col, row as f64 * north_per_row, z as f64));
                }
            }
        }

        if points.len() < 3 {
            return Err(GridError::InsufficientSamples(points.len()));
        }

        let n = points.len() as f64;
        let (mut me, mut mn, mut mz) = (0.0, 0.0, 0.0);
        for &(e, no, z) in &points {
            me += e;
            mn += no;
            mz += z;
        }
        me /= n;
        mn /= n;
        mz /= n;

        let (mut see, mut snn, mut sen, mut sez, mut snz) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(e, no, z) in &points {
            let (de, dn, dz) = (e - me, no - mn, z - mz);
            see += de * de;
            snn += dn * dn;
            sen += de * dn;
            sez += de * dz;
            snz += dn * dz;
        }

        let det = see * snn - sen * sen;
        if !(det > 1e-9 * see * snn) {
            return Err(GridError::DegenerateSamples);
        }

        let a = (sez * snn - snz * sen) / det;
        let b = (snz * see - sez * sen) / det;
        let c = mz - a * me - b * mn;

        let residual_sq: f64 = points
            .iter()
            .map(|&(e, no, z)| {
                let r = z - (a * e + b * no + c);
                r * r
            })
            .sum();

        let normal = Vec3::new(-a, -b, 1.0).normalize();
        Ok(Plane {
            normal,
            offset: normal.z * c,
            rms_residual: (residual_sq / n).sqrt(),
            sample_count: points.len(),
            stride,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ResolutionClass;

    #[test]
    fn test_sample_stride_bounds() {
        assert_eq!(sample_stride(151, 151, 0), None);
        assert_eq!(sample_stride(3, 3, 100), Some(1));

        for max in [1usize, 4, 10, 64, 500, 22_801] {
            let stride = sample_stride(151, 151, max).unwrap();
            assert!(strided_count(151, 151, stride) <= max);
            if stride > 1 {
                assert!(strided_count(151, 151, stride - 1) > max);
            }
        }
    }

    #[test]
    fn test_flat_grid_points_up() {
        let grid =
            ElevationGrid::new(ResolutionClass::ThreeArcSecond, 0, 0, 5, 5, vec![250; 25]).unwrap();
        let plane = grid.fit_plane(100).unwrap();

        assert!((plane.normal.z - 1.0).abs() < 1e-12);
        assert!((plane.offset - 250.0).abs() < 1e-9);
        assert!(plane.rms_residual < 1e-9);
        assert_eq!(plane.sample_count, 25);
    }

    #[test]
    fn test_recovers_known_slope() {
        // Rises 1 m per column (~92.7 m at the equator), flat north-south
        let columns = 11;
        let rows = 11;
        let samples = (0..rows)
            .flat_map(|_| (0..columns).map(|c| c as i16))
            .collect();
        let grid =
            ElevationGrid::new(ResolutionClass::ThreeArcSecond, 0, 0, columns, rows, samples)
                .unwrap();
        let plane = grid.fit_plane(1000).unwrap();

        let east_per_col = (3.0f64 / 3600.0).to_radians() * EARTH_RADIUS_M
            * (15.0f64 / 3600.0).to_radians().cos();
        let expected_a = 1.0 / east_per_col;
        let slope = -plane.normal.x / plane.normal.z;
        assert!((slope - expected_a).abs() < 1e-9);
        assert!((plane.normal.y).abs() < 1e-12);
        assert!(plane.rms_residual < 1e-9);
        assert!((plane.elevation_at(5.0 * east_per_col, 0.0) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_respects_max_samples() {
        let grid =
            ElevationGrid::new(ResolutionClass::OneArcSecond, 0, 0, 101, 101, vec![10; 10_201])
                .unwrap();
        let plane = grid.fit_plane(50).unwrap();
        assert!(plane.sample_count <= 50);
        assert!(plane.stride > 1);
    }

    #[test]
    fn test_insufficient_samples() {
        let grid = ElevationGrid::new(
            ResolutionClass::OneArcSecond,
            0,
            0,
            2,
            2,
            vec![NO_DATA, 1, NO_DATA, 2],
        )
        .unwrap();
        assert_eq!(grid.fit_plane(10), Err(GridError::InsufficientSamples(2)));
        assert_eq!(grid.fit_plane(0), Err(GridError::InsufficientSamples(0)));
    }

    #[test]
    fn test_collinear_samples_are_degenerate() {
        let grid =
            ElevationGrid::new(ResolutionClass::OneArcSecond, 0, 0, 5, 1, vec![1, 2, 3, 4, 5])
                .unwrap();
        assert_eq!(grid.fit_plane(10), Err(GridError::DegenerateSamples));
    }
}
