//! Elevation grid type, resolution classes and errors.

use std::fmt;

use thiserror::Error;

use crate::bucket::{BucketAddress, ARCSEC_PER_DEGREE};

/// Sample value marking a node without elevation data.
pub const NO_DATA: i16 = i16::MIN;

/// Tolerance, in cells, used when snapping to nodes and testing bounds.
pub(crate) const CELL_EPSILON: f64 = 1e-7;

/// Sampling resolution of an elevation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionClass {
    /// One sample per arc-second.
    OneArcSecond,
    /// One sample every three arc-seconds.
    ThreeArcSecond,
    /// One sample every thirty arc-seconds.
    ThirtyArcSecond,
}

impl ResolutionClass {
    /// All classes, finest first.
    pub const ALL: [ResolutionClass; 3] = [
        ResolutionClass::OneArcSecond,
        ResolutionClass::ThreeArcSecond,
        ResolutionClass::ThirtyArcSecond,
    ];

    /// Wire code of the class.
    pub fn code(self) -> u8 {
        match self {
            ResolutionClass::OneArcSecond => 1,
            ResolutionClass::ThreeArcSecond => 3,
            ResolutionClass::ThirtyArcSecond => 30,
        }
    }

    /// Class for a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ResolutionClass::OneArcSecond),
            3 => Some(ResolutionClass::ThreeArcSecond),
            30 => Some(ResolutionClass::ThirtyArcSecond),
            _ => None,
        }
    }

    /// Distance between adjacent nodes in arc-seconds.
    pub fn spacing_arcsec(self) -> u32 {
        self.code() as u32
    }
}

impl fmt::Display for ResolutionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\"", self.code())
    }
}

/// Errors raised by grid construction, interpolation and plane fitting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// Sample count does not equal `columns * rows`.
    #[error("Grid dimension mismatch: expected {expected} samples, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A grid with zero columns or rows.
    #[error("Grid must have at least one column and one row")]
    EmptyGrid,

    /// The query point lies outside the grid extent.
    #[error("Point ({lon:.6}, {lat:.6}) is outside the grid")]
    OutsideGrid { lon: f64, lat: f64 },

    /// One of the cell corners carries the no-data sentinel.
    #[error("No elevation data at ({lon:.6}, {lat:.6})")]
    NoData { lon: f64, lat: f64 },

    /// Fewer than three usable samples for a plane fit.
    #[error("Insufficient samples for plane fit: {0}")]
    InsufficientSamples(usize),

    /// Samples are collinear or otherwise singular.
    #[error("Degenerate sample layout for plane fit")]
    DegenerateSamples,
}

/// Plain 3-component vector in a local east-north-up frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const UP: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction; a zero vector is returned unchanged.
    pub fn normalize(&self) -> Vec3 {
        let len = self.length();
        if len > 0.0 {
            Vec3::new(self.x / len, self.y / len, self.z / len)
        } else {
            *self
        }
    }

    /// Angle from vertical in degrees, for a normal in the east-north-up frame.
    pub fn slope_deg(&self) -> f64 {
        let len = self.length();
        if len > 0.0 {
            (self.z / len).clamp(-1.0, 1.0).acos().to_degrees()
        } else {
            0.0
        }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5}, {:.5})", self.x, self.y, self.z)
    }
}

/// Regular grid of 16-bit elevation samples in metres.
///
/// Samples are stored row-major: row 0 is the southernmost row and column 0
/// the westernmost column. The node at `(col, row)` lies at
/// `origin + (col, row) * spacing` arc-seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationGrid {
    resolution: ResolutionClass,
    origin_lon_arcsec: i32,
    origin_lat_arcsec: i32,
    columns: u32,
    rows: u32,
    samples: Vec<i16>,
}

impl ElevationGrid {
    /// Creates a grid, checking that the sample count matches the dimensions.
    pub fn new(
        resolution: ResolutionClass,
        origin_lon_arcsec: i32,
        origin_lat_arcsec: i32,
        columns: u32,
        rows: u32,
        samples: Vec<i16>,
    ) -> Result<Self, GridError> {
        if columns == 0 || rows == 0 {
            return Err(GridError::EmptyGrid);
        }
        let expected = columns as usize * rows as usize;
        if samples.len() != expected {
            return Err(GridError::DimensionMismatch {
                expected,
                actual: samples.len(),
            });
        }

        Ok(Self {
            resolution,
            origin_lon_arcsec,
            origin_lat_arcsec,
            columns,
            rows,
            samples,
        })
    }

    /// Builds the grid covering exactly one bucket, filling each node with
    /// `elevation(lon, lat)`.
    pub fn for_bucket<F>(bucket: &BucketAddress, resolution: ResolutionClass, mut elevation: F) -> Self
    where
        F: FnMut(f64, f64) -> i16,
    {
        let spacing = resolution.spacing_arcsec();
        let (origin_lon, origin_lat) = bucket.origin_arcsec();
        let (width, height) = bucket.size_arcsec();
        let columns = width / spacing + 1;
        let rows = height / spacing + 1;

        let mut samples = Vec::with_capacity(columns as usize * rows as usize);
        for row in 0..rows {
            let lat = (origin_lat as f64 + (row * spacing) as f64) / ARCSEC_PER_DEGREE as f64;
            for col in 0..columns {
                let lon = (origin_lon as f64 + (col * spacing) as f64) / ARCSEC_PER_DEGREE as f64;
                samples.push(elevation(lon, lat));
            }
        }

        Self {
            resolution,
            origin_lon_arcsec: origin_lon,
            origin_lat_arcsec: origin_lat,
            columns,
            rows,
            samples,
        }
    }

    pub fn resolution(&self) -> ResolutionClass {
        self.resolution
    }

    pub fn spacing_arcsec(&self) -> u32 {
        self.resolution.spacing_arcsec()
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// South-west node in arc-seconds.
    pub fn origin_arcsec(&self) -> (i32, i32) {
        (self.origin_lon_arcsec, self.origin_lat_arcsec)
    }

    /// South-west node in degrees.
    pub fn origin_deg(&self) -> (f64, f64) {
        (
            self.origin_lon_arcsec as f64 / ARCSEC_PER_DEGREE as f64,
            self.origin_lat_arcsec as f64 / ARCSEC_PER_DEGREE as f64,
        )
    }

    /// Distance from the first to the last node along each axis, arc-seconds.
    pub fn extent_arcsec(&self) -> (u32, u32) {
        let spacing = self.spacing_arcsec();
        ((self.columns - 1) * spacing, (self.rows - 1) * spacing)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Sample at a node, or `None` outside the grid.
    pub fn sample(&self, col: u32, row: u32) -> Option<i16> {
        if col >= self.columns || row >= self.rows {
            return None;
        }
        Some(self.samples[row as usize * self.columns as usize + col as usize])
    }

    /// Unchecked node lookup for callers that already clamped indices.
    #[inline]
    pub(crate) fn node(&self, col: u32, row: u32) -> i16 {
        self.samples[row as usize * self.columns as usize + col as usize]
    }

    /// Lowest sample, ignoring no-data nodes.
    pub fn min_elevation(&self) -> Option<i16> {
        self.samples.iter().copied().filter(|&s| s != NO_DATA).min()
    }

    /// Highest sample, ignoring no-data nodes.
    pub fn max_elevation(&self) -> Option<i16> {
        self.samples.iter().copied().filter(|&s| s != NO_DATA).max()
    }

    pub fn no_data_count(&self) -> usize {
        self.samples.iter().filter(|&&s| s == NO_DATA).count()
    }

    /// Fractional cell coordinates of a position, relative to the origin.
    pub(crate) fn cell_coords(&self, lon: f64, lat: f64) -> (f64, f64) {
        let spacing = self.spacing_arcsec() as f64;
        let arcsec = ARCSEC_PER_DEGREE as f64;
        (
            (lon * arcsec - self.origin_lon_arcsec as f64) / spacing,
            (lat * arcsec - self.origin_lat_arcsec as f64) / spacing,
        )
    }

    /// Whether a position lies inside the node extent (with node tolerance).
    pub fn contains_deg(&self, lon: f64, lat: f64) -> bool {
        let (x, y) = self.cell_coords(lon, lat);
        within_axis(x, self.columns) && within_axis(y, self.rows)
    }

    /// Whether the grid covers exactly the footprint of `bucket`.
    pub fn is_aligned_with(&self, bucket: &BucketAddress) -> bool {
        self.origin_arcsec() == bucket.origin_arcsec() && self.extent_arcsec() == bucket.size_arcsec()
    }
}

/// Tests `[0, count-1]` membership with the node tolerance; NaN is outside.
#[inline]
pub(crate) fn within_axis(value: f64, count: u32) -> bool {
    value >= -CELL_EPSILON && value <= (count - 1) as f64 + CELL_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::address_for;

    #[test]
    fn test_resolution_codes_roundtrip() {
        for class in ResolutionClass::ALL {
            assert_eq!(ResolutionClass::from_code(class.code()), Some(class));
        }
        assert_eq!(ResolutionClass::from_code(2), None);
        assert_eq!(ResolutionClass::ThirtyArcSecond.spacing_arcsec(), 30);
    }

    #[test]
    fn test_new_rejects_mismatched_samples() {
        let result = ElevationGrid::new(ResolutionClass::ThreeArcSecond, 0, 0, 3, 3, vec![0; 8]);
        assert_eq!(
            result,
            Err(GridError::DimensionMismatch {
                expected: 9,
                actual: 8
            })
        );
    }

    #[test]
    fn test_new_rejects_empty_grid() {
        let result = ElevationGrid::new(ResolutionClass::ThreeArcSecond, 0, 0, 0, 3, vec![]);
        assert_eq!(result, Err(GridError::EmptyGrid));
    }

    #[test]
    fn test_for_bucket_dimensions() {
        let bucket = address_for(8.5, 47.3).unwrap();
        let grid = ElevationGrid::for_bucket(&bucket, ResolutionClass::ThreeArcSecond, |_, _| 400);

        assert_eq!(grid.columns(), 151);
        assert_eq!(grid.rows(), 151);
        assert_eq!(grid.origin_arcsec(), bucket.origin_arcsec());
        assert!(grid.is_aligned_with(&bucket));
        assert!(!grid.is_aligned_with(&bucket.offset(1, 0)));
    }

    #[test]
    fn test_for_bucket_wide_band() {
        // 0.25° wide buckets at 70°N
        let bucket = address_for(20.0, 70.0).unwrap();
        assert_eq!(bucket.width_deg(), 0.25);

        let grid = ElevationGrid::for_bucket(&bucket, ResolutionClass::ThirtyArcSecond, |_, _| 0);
        assert_eq!(grid.columns(), 31);
        assert_eq!(grid.rows(), 16);
        assert_eq!(grid.extent_arcsec(), (900, 450));
    }

    #[test]
    fn test_min_max_ignore_no_data() {
        let grid = ElevationGrid::new(
            ResolutionClass::OneArcSecond,
            0,
            0,
            2,
            2,
            vec![NO_DATA, 12, -4, 7],
        )
        .unwrap();

        assert_eq!(grid.min_elevation(), Some(-4));
        assert_eq!(grid.max_elevation(), Some(12));
        assert_eq!(grid.no_data_count(), 1);
        assert_eq!(grid.sample(1, 0), Some(12));
        assert_eq!(grid.sample(0, 1), Some(-4));
        assert_eq!(grid.sample(2, 0), None);
    }

    #[test]
    fn test_all_no_data_has_no_extremes() {
        let grid =
            ElevationGrid::new(ResolutionClass::OneArcSecond, 0, 0, 1, 2, vec![NO_DATA; 2]).unwrap();
        assert_eq!(grid.min_elevation(), None);
        assert_eq!(grid.max_elevation(), None);
    }

    #[test]
    fn test_contains_deg() {
        let grid = ElevationGrid::new(ResolutionClass::ThreeArcSecond, 3600, 7200, 3, 3, vec![0; 9])
            .unwrap();
        assert_eq!(grid.origin_deg(), (1.0, 2.0));
        assert!(grid.contains_deg(1.0, 2.0));
        assert!(grid.contains_deg(1.0 + 6.0 / 3600.0, 2.0 + 6.0 / 3600.0));
        assert!(!grid.contains_deg(1.0 + 7.0 / 3600.0, 2.0));
        assert!(!grid.contains_deg(f64::NAN, 2.0));
    }

    #[test]
    fn test_vec3_normalize() {
        let v = Vec3::new(3.0, 0.0, 4.0).normalize();
        assert!((v.length() - 1.0).abs() < 1e-12);
        assert!((v.x - 0.6).abs() < 1e-12);
        assert_eq!(Vec3::default().normalize(), Vec3::default());
        assert!(Vec3::UP.slope_deg().abs() < 1e-12);
    }
}
