//! Bucket address type and the latitude band table.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum accepted longitude in degrees (normalised to [`MIN_LON`]).
pub const MAX_LON: f64 = 180.0;

/// Height of every bucket in degrees (1/8°).
pub const BUCKET_HEIGHT_DEG: f64 = 0.125;

/// Number of bucket rows per degree of latitude.
pub const ROWS_PER_DEGREE: i32 = 8;

/// Total number of latitude bands from pole to pole.
pub const LATITUDE_BANDS: i32 = 180 * ROWS_PER_DEGREE;

/// Lower bound of the ground width-to-height ratio of any bucket.
pub const MIN_ASPECT_RATIO: f64 = 0.5;

/// Upper bound of the ground width-to-height ratio of any bucket.
pub const MAX_ASPECT_RATIO: f64 = 2.0;

/// Arc-seconds per degree.
pub const ARCSEC_PER_DEGREE: i32 = 3600;

/// Candidate longitude spans in degrees, narrowest first.
///
/// Every entry divides 360 and each step is at most twice the previous one,
/// which keeps the chosen ratio inside [`MIN_ASPECT_RATIO`, 1.0).
const SPAN_LADDER: [f64; 12] = [
    0.125, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 15.0, 30.0, 45.0, 90.0, 180.0,
];

/// Errors raised for invalid coordinates or bucket identifiers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude is NaN or outside -90..=90.
    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    /// Longitude is NaN or outside -180..=180.
    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    /// A sampling radius that is not a positive finite distance.
    #[error("Invalid radius: {0} (must be a positive number of meters)")]
    InvalidRadius(f64),

    /// Field combination that no position maps to.
    #[error("Invalid bucket: lon={lon} lat={lat} x={x} y={y}")]
    InvalidBucket { lon: i32, lat: i32, x: u8, y: u8 },

    /// A canonical key that does not parse or does not agree with itself.
    #[error("Malformed bucket key: '{0}'")]
    MalformedKey(String),
}

/// Global latitude band for a latitude, clamped so the poles are inside.
#[inline]
pub(crate) fn band_for_latitude(lat: f64) -> i32 {
    let band = ((lat - MIN_LAT) * ROWS_PER_DEGREE as f64).floor() as i32;
    band.clamp(0, LATITUDE_BANDS - 1)
}

/// Latitude of the centre of a band.
#[inline]
pub(crate) fn band_center_latitude(band: i32) -> f64 {
    MIN_LAT + (band as f64 + 0.5) * BUCKET_HEIGHT_DEG
}

/// Longitude span in degrees of every bucket in a latitude band.
///
/// Picks the narrowest ladder width whose ground aspect ratio at the band
/// centre is at least [`MIN_ASPECT_RATIO`].
pub fn span_for_band(band: i32) -> f64 {
    let band = band.clamp(0, LATITUDE_BANDS - 1);
    let cos_lat = band_center_latitude(band).to_radians().cos();
    SPAN_LADDER
        .iter()
        .copied()
        .find(|span| span * cos_lat / BUCKET_HEIGHT_DEG >= MIN_ASPECT_RATIO)
        .unwrap_or(SPAN_LADDER[SPAN_LADDER.len() - 1])
}

/// Number of buckets per degree of longitude for a span (1 for wide spans).
#[inline]
pub(crate) fn subdivisions_for_span(span: f64) -> u8 {
    if span < 1.0 {
        (1.0 / span).round() as u8
    } else {
        1
    }
}

/// Identity of one bucket of the globe.
///
/// A bucket is 1/8° tall; its width depends on its latitude band. The
/// `lon`/`lat` fields name the whole degree the bucket lies in (for wide
/// polar buckets `lon` is the western edge, aligned to the span), `x` and
/// `y` the sub-column and sub-row inside that degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketAddress {
    pub(crate) lon: i16,
    pub(crate) lat: i16,
    pub(crate) x: u8,
    pub(crate) y: u8,
}

impl BucketAddress {
    /// Build an address from its fields, rejecting combinations that no
    /// position maps to.
    pub fn new(lon: i32, lat: i32, x: u8, y: u8) -> Result<Self, CoordError> {
        let invalid = CoordError::InvalidBucket { lon, lat, x, y };

        if !(-180..180).contains(&lon) || !(-90..90).contains(&lat) || y >= 8 {
            return Err(invalid);
        }

        let band = (lat + 90) * ROWS_PER_DEGREE + y as i32;
        let span = span_for_band(band);
        if x >= subdivisions_for_span(span) {
            return Err(invalid);
        }
        if span >= 1.0 {
            let offset = (lon + 180) as f64 / span;
            if offset.fract() != 0.0 {
                return Err(invalid);
            }
        }

        Ok(Self {
            lon: lon as i16,
            lat: lat as i16,
            x,
            y,
        })
    }

    /// Degree column (western edge of the containing degree or wide bucket).
    pub fn lon(&self) -> i32 {
        self.lon as i32
    }

    /// Degree row (southern edge of the containing degree).
    pub fn lat(&self) -> i32 {
        self.lat as i32
    }

    /// Sub-column inside the degree (0..8).
    pub fn x(&self) -> u8 {
        self.x
    }

    /// Sub-row inside the degree (0..8).
    pub fn y(&self) -> u8 {
        self.y
    }

    /// Global latitude band (0 = southernmost).
    pub fn band(&self) -> i32 {
        (self.lat as i32 + 90) * ROWS_PER_DEGREE + self.y as i32
    }

    /// Longitude span of this bucket in degrees.
    pub fn width_deg(&self) -> f64 {
        span_for_band(self.band())
    }

    /// Latitude span of this bucket in degrees (constant).
    pub fn height_deg(&self) -> f64 {
        BUCKET_HEIGHT_DEG
    }

    /// Buckets per degree of longitude in this bucket's band.
    pub fn subdivisions(&self) -> u8 {
        subdivisions_for_span(self.width_deg())
    }

    /// South-west corner as (longitude, latitude) in degrees.
    pub fn origin(&self) -> (f64, f64) {
        let span = self.width_deg();
        let lon = if span < 1.0 {
            self.lon as f64 + self.x as f64 * span
        } else {
            self.lon as f64
        };
        let lat = self.lat as f64 + self.y as f64 * BUCKET_HEIGHT_DEG;
        (lon, lat)
    }

    /// South-west corner in whole arc-seconds (exact for every bucket).
    pub fn origin_arcsec(&self) -> (i32, i32) {
        let (lon, lat) = self.origin();
        (
            (lon * ARCSEC_PER_DEGREE as f64).round() as i32,
            (lat * ARCSEC_PER_DEGREE as f64).round() as i32,
        )
    }

    /// Width and height in whole arc-seconds.
    pub fn size_arcsec(&self) -> (u32, u32) {
        (
            (self.width_deg() * ARCSEC_PER_DEGREE as f64).round() as u32,
            (BUCKET_HEIGHT_DEG * ARCSEC_PER_DEGREE as f64).round() as u32,
        )
    }

    /// Centre as (longitude, latitude) in degrees.
    pub fn center(&self) -> (f64, f64) {
        let (lon, lat) = self.origin();
        (
            lon + self.width_deg() / 2.0,
            lat + BUCKET_HEIGHT_DEG / 2.0,
        )
    }

    /// Ground width-to-height ratio measured at the band centre.
    pub fn aspect_ratio(&self) -> f64 {
        let (_, center_lat) = self.center();
        self.width_deg() * center_lat.to_radians().cos() / BUCKET_HEIGHT_DEG
    }

    /// Packed numeric index, unique per bucket.
    pub fn index(&self) -> u32 {
        (((self.lon as i32 + 180) as u32) << 14)
            | (((self.lat as i32 + 90) as u32) << 6)
            | ((self.y as u32) << 3)
            | self.x as u32
    }

    /// Inverse of [`BucketAddress::index`].
    pub fn from_index(index: u32) -> Result<Self, CoordError> {
        let lon = (index >> 14) as i32 - 180;
        let lat = ((index >> 6) & 0xff) as i32 - 90;
        let y = ((index >> 3) & 0x7) as u8;
        let x = (index & 0x7) as u8;
        Self::new(lon, lat, x, y)
    }

    /// Name of the 1° chunk holding this bucket, e.g. `w075n42`.
    pub fn chunk_name(&self) -> String {
        let lon = self.lon as i32;
        let lat = self.lat as i32;
        let ew = if lon < 0 { 'w' } else { 'e' };
        let ns = if lat < 0 { 's' } else { 'n' };
        format!("{}{:03}{}{:02}", ew, lon.abs(), ns, lat.abs())
    }

    /// Canonical key used for cache diagnostics and resource lookups.
    pub fn key(&self) -> String {
        format!("{}/{}", self.chunk_name(), self.index())
    }
}

impl fmt::Display for BucketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chunk_name(), self.index())
    }
}

impl FromStr for BucketAddress {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoordError::MalformedKey(s.to_string());

        let (_, index) = s.split_once('/').ok_or_else(malformed)?;
        let index: u32 = index.parse().map_err(|_| malformed())?;
        let address = Self::from_index(index).map_err(|_| malformed())?;

        // Only the canonical spelling is accepted: the chunk prefix must
        // agree with the index and the index must not carry signs or padding.
        if address.key() != s {
            return Err(malformed());
        }
        Ok(address)
    }
}
