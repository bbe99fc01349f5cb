//! Bucket addressing module
//!
//! Maps geodetic positions to buckets: fixed-identity tiles of the globe that
//! are 1/8° tall and whose longitude span widens toward the poles so that
//! every bucket stays roughly square on the ground.
//!
//! The mapping is a pure function. Two positions share a bucket exactly when
//! they lie in the same cell, and the south-west corner of every bucket maps
//! back to that bucket.

mod types;

pub use types::{
    span_for_band, BucketAddress, CoordError, ARCSEC_PER_DEGREE, BUCKET_HEIGHT_DEG,
    LATITUDE_BANDS, MAX_ASPECT_RATIO, MAX_LAT, MAX_LON, MIN_ASPECT_RATIO, MIN_LAT, MIN_LON,
    ROWS_PER_DEGREE,
};

use std::collections::HashSet;

use types::{band_for_latitude, subdivisions_for_span};

/// Converts geographic coordinates to the bucket containing them.
///
/// # Arguments
///
/// * `lon` - Longitude in degrees (-180.0 to 180.0, 180 wraps to -180)
/// * `lat` - Latitude in degrees (-90.0 to 90.0)
///
/// # Returns
///
/// The bucket address, or `CoordError` if either input is NaN or out of range.
#[inline]
pub fn address_for(lon: f64, lat: f64) -> Result<BucketAddress, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }

    let lon = if lon >= MAX_LON { lon - 360.0 } else { lon };
    Ok(locate(lon, lat))
}

/// Returns the south-west corner (longitude, latitude) of a bucket.
#[inline]
pub fn origin_of(address: &BucketAddress) -> (f64, f64) {
    address.origin()
}

/// Longitude span of a bucket in degrees.
#[inline]
pub fn width_deg(address: &BucketAddress) -> f64 {
    address.width_deg()
}

/// Latitude span of a bucket in degrees.
#[inline]
pub fn height_deg(address: &BucketAddress) -> f64 {
    address.height_deg()
}

/// Wraps any finite longitude into [-180, 180).
pub fn wrap_longitude(lon: f64) -> f64 {
    if (MIN_LON..MAX_LON).contains(&lon) {
        lon
    } else {
        (lon - MIN_LON).rem_euclid(360.0) + MIN_LON
    }
}

/// Locates a validated position. `lon` must be in [-180, 180).
fn locate(lon: f64, lat: f64) -> BucketAddress {
    let band = band_for_latitude(lat);
    let span = span_for_band(band);
    let lat_deg = band.div_euclid(ROWS_PER_DEGREE) - 90;
    let y = band.rem_euclid(ROWS_PER_DEGREE) as u8;

    let (lon_deg, x) = if span < 1.0 {
        let lon_deg = lon.floor();
        let last = subdivisions_for_span(span) as i32 - 1;
        let x = (((lon - lon_deg) / span).floor() as i32).clamp(0, last);
        (lon_deg as i32, x as u8)
    } else {
        let columns = (360.0 / span).round() as i32;
        let column = (((lon - MIN_LON) / span).floor() as i32).clamp(0, columns - 1);
        ((MIN_LON + column as f64 * span) as i32, 0)
    };

    BucketAddress {
        lon: lon_deg as i16,
        lat: lat_deg as i16,
        x,
        y,
    }
}

impl BucketAddress {
    /// Returns the bucket `dx` columns east and `dy` rows north of this one.
    ///
    /// Rows are stepped first from this bucket's centre (stopping at the
    /// poles), then columns in units of the destination row's span, wrapping
    /// across the antimeridian.
    pub fn offset(&self, dx: i32, dy: i32) -> BucketAddress {
        let (center_lon, center_lat) = self.center();
        let lat = (center_lat + dy as f64 * BUCKET_HEIGHT_DEG).clamp(MIN_LAT, MAX_LAT);
        let span = span_for_band(band_for_latitude(lat));
        let lon = wrap_longitude(center_lon + dx as f64 * span);
        locate(lon, lat)
    }
}

/// Largest radius that can still reach new buckets.
///
/// From any bucket, this many rows in each direction reach both poles and
/// this many columns in each direction wrap the whole globe.
pub const MAX_NEIGHBORHOOD_RADIUS: u32 = LATITUDE_BANDS as u32;

/// Enumerates the buckets within `radius` rows and columns of `center`.
///
/// Expansion happens in bucket-index space, ring by ring, so the result is
/// ordered nearest first. Offsets that collapse onto the same bucket (near
/// the poles, where rows hold only a few buckets) appear once. Radii above
/// [`MAX_NEIGHBORHOOD_RADIUS`] are clamped to it.
pub fn neighborhood(center: &BucketAddress, radius: u32) -> Vec<BucketAddress> {
    let radius = radius.min(MAX_NEIGHBORHOOD_RADIUS) as i32;
    let side = (2 * radius + 1) as usize;
    let capacity = (side * side).min(MAX_PREALLOCATED_NEIGHBORS);
    let mut seen = HashSet::with_capacity(capacity);
    let mut buckets = Vec::with_capacity(capacity);

    // Rows past a pole clamp onto rows already visited
    let (_, center_lat) = center.center();
    let row_exists = |dy: i32| (center_lat + dy as f64 * BUCKET_HEIGHT_DEG).abs() <= MAX_LAT;

    let mut visit = |dx: i32, dy: i32| {
        let bucket = center.offset(dx, dy);
        if seen.insert(bucket) {
            buckets.push(bucket);
        }
    };

    visit(0, 0);
    for ring in 1..=radius {
        for dy in -ring..=ring {
            if !row_exists(dy) {
                continue;
            }
            if dy.abs() == ring {
                for dx in -ring..=ring {
                    visit(dx, dy);
                }
            } else {
                visit(-ring, dy);
                visit(ring, dy);
            }
        }
    }

    buckets
}

const MAX_PREALLOCATED_NEIGHBORS: usize = 4096;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equator_prime_meridian() {
        let bucket = address_for(0.0, 0.0).unwrap();
        assert_eq!(bucket.lon(), 0);
        assert_eq!(bucket.lat(), 0);
        assert_eq!(bucket.x(), 0);
        assert_eq!(bucket.y(), 0);
        assert_eq!(bucket.width_deg(), 0.125);
        assert_eq!(bucket.key(), "e000n00/2954880");
    }

    #[test]
    fn test_new_york_city() {
        // New York City: 40.7128°N, 74.0060°W
        let bucket = address_for(-74.0060, 40.7128).unwrap();
        assert_eq!(bucket.lon(), -75);
        assert_eq!(bucket.lat(), 40);
        assert_eq!(bucket.x(), 7);
        assert_eq!(bucket.y(), 5);
        assert_eq!(bucket.index(), 1728687);
        assert_eq!(bucket.to_string(), "w075n40/1728687");
    }

    #[test]
    fn test_south_west_quadrant_just_below_zero() {
        let bucket = address_for(-0.05, -0.05).unwrap();
        assert_eq!(bucket.lon(), -1);
        assert_eq!(bucket.lat(), -1);
        assert_eq!(bucket.x(), 7);
        assert_eq!(bucket.y(), 7);
        assert_eq!(bucket.key(), "w001s01/2938495");
    }

    #[test]
    fn test_poles_produce_single_valid_address() {
        let north = address_for(0.0, 90.0).unwrap();
        assert_eq!(north.lat(), 89);
        assert_eq!(north.y(), 7);
        assert_eq!(north.width_deg(), 90.0);
        assert_eq!(north, address_for(0.0, 89.95).unwrap());

        let south = address_for(0.0, -90.0).unwrap();
        assert_eq!(south.lat(), -90);
        assert_eq!(south.y(), 0);
        assert_eq!(south.width_deg(), 90.0);
    }

    #[test]
    fn test_longitude_180_wraps_to_antimeridian_west() {
        let east_edge = address_for(180.0, 10.0).unwrap();
        let west_edge = address_for(-180.0, 10.0).unwrap();
        assert_eq!(east_edge, west_edge);
        assert_eq!(east_edge.lon(), -180);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = address_for(0.0, 90.5);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));

        let result = address_for(0.0, f64::NAN);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_longitude() {
        let result = address_for(180.01, 0.0);
        assert!(matches!(result, Err(CoordError::InvalidLongitude(_))));

        let result = address_for(f64::INFINITY, 0.0);
        assert!(matches!(result, Err(CoordError::InvalidLongitude(_))));
    }

    #[test]
    fn test_origin_of_returns_south_west_corner() {
        let bucket = address_for(-74.0060, 40.7128).unwrap();
        let (lon, lat) = origin_of(&bucket);
        assert_eq!(lon, -74.125);
        assert_eq!(lat, 40.625);
        assert_eq!(address_for(lon, lat).unwrap(), bucket);
    }

    #[test]
    fn test_height_is_constant_and_width_widens_toward_poles() {
        let mut last_width = 0.0;
        for lat in [0.0, 30.0, 60.0, 75.0, 85.0, 89.0, 89.9] {
            let bucket = address_for(10.0, lat).unwrap();
            assert_eq!(height_deg(&bucket), BUCKET_HEIGHT_DEG);
            assert!(
                width_deg(&bucket) >= last_width,
                "Width should not shrink moving poleward (lat {})",
                lat
            );
            last_width = width_deg(&bucket);
        }
        assert!(last_width > 1.0, "Polar buckets should span several degrees");
    }

    #[test]
    fn test_aspect_ratio_bounded_across_all_latitudes() {
        for step in 0..=18_000 {
            let lat = (MIN_LAT + step as f64 * 0.01).min(MAX_LAT);
            let bucket = address_for(0.0, lat).unwrap();
            let ratio = bucket.aspect_ratio();
            assert!(
                (MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&ratio),
                "Aspect ratio {} out of bounds at latitude {}",
                ratio,
                lat
            );
        }
    }

    #[test]
    fn test_every_band_has_a_whole_number_of_buckets() {
        for band in 0..LATITUDE_BANDS {
            let span = span_for_band(band);
            let per_globe = 360.0 / span;
            assert_eq!(per_globe.fract(), 0.0, "Band {} span {}", band, span);
            if span < 1.0 {
                assert_eq!((1.0 / span).fract(), 0.0, "Band {} span {}", band, span);
            }
        }
    }

    #[test]
    fn test_band_table_symmetric_between_hemispheres() {
        for band in 0..LATITUDE_BANDS / 2 {
            assert_eq!(
                span_for_band(band),
                span_for_band(LATITUDE_BANDS - 1 - band),
                "Band {} should mirror its opposite",
                band
            );
        }
    }

    #[test]
    fn test_key_parse_roundtrip() {
        let bucket = address_for(139.6917, 35.6895).unwrap();
        let parsed: BucketAddress = bucket.key().parse().unwrap();
        assert_eq!(parsed, bucket);
    }

    #[test]
    fn test_key_parse_rejects_non_canonical() {
        for key in [
            "w075n40/+1728687",
            "e075n40/1728687",
            "w075n40/01728687",
            "w075n40",
            "w075n40/",
            "garbage",
            "w075n40/99999999",
        ] {
            let result = key.parse::<BucketAddress>();
            assert!(
                matches!(result, Err(CoordError::MalformedKey(_))),
                "Key '{}' should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_new_rejects_unreachable_fields() {
        // Equatorial band has 8 sub-columns per degree
        assert!(BucketAddress::new(0, 0, 7, 0).is_ok());
        assert!(BucketAddress::new(0, 0, 8, 0).is_err());
        // Polar band is 90° wide: only 90°-aligned columns with x = 0 exist
        assert!(BucketAddress::new(0, 89, 0, 7).is_ok());
        assert!(BucketAddress::new(0, 89, 1, 7).is_err());
        assert!(BucketAddress::new(10, 89, 0, 7).is_err());
        assert!(BucketAddress::new(180, 0, 0, 0).is_err());
        assert!(BucketAddress::new(0, 90, 0, 0).is_err());
        assert!(BucketAddress::new(0, 0, 0, 8).is_err());
    }

    #[test]
    fn test_origin_arcsec_is_exact() {
        let bucket = address_for(-74.0060, 40.7128).unwrap();
        assert_eq!(bucket.origin_arcsec(), (-74 * 3600 - 450, 40 * 3600 + 5 * 450));
        assert_eq!(bucket.size_arcsec(), (450, 450));
    }

    #[test]
    fn test_offset_cardinal_neighbours() {
        let bucket = address_for(0.01, 0.01).unwrap();
        assert_eq!(bucket.offset(1, 0), address_for(0.13, 0.01).unwrap());
        assert_eq!(bucket.offset(-1, 0), address_for(-0.1, 0.01).unwrap());
        assert_eq!(bucket.offset(0, 1), address_for(0.01, 0.13).unwrap());
        assert_eq!(bucket.offset(0, -1), address_for(0.01, -0.1).unwrap());
        assert_eq!(bucket.offset(0, 0), bucket);
    }

    #[test]
    fn test_offset_wraps_across_antimeridian() {
        let bucket = address_for(179.95, 10.0).unwrap();
        let east = bucket.offset(1, 0);
        assert_eq!(east.lon(), -180);
        assert_eq!(east.x(), 0);

        let back = east.offset(-1, 0);
        assert_eq!(back, bucket);
    }

    #[test]
    fn test_offset_stops_at_pole() {
        let polar = address_for(0.0, 89.99).unwrap();
        assert_eq!(polar.offset(0, 5), polar);
    }

    #[test]
    fn test_neighborhood_radius_one_is_three_by_three() {
        let center = address_for(8.5, 47.3).unwrap();
        let buckets = neighborhood(&center, 1);
        assert_eq!(buckets.len(), 9);
        assert_eq!(buckets[0], center, "Centre should be requested first");

        let unique: HashSet<_> = buckets.iter().collect();
        assert_eq!(unique.len(), 9);
    }

    #[test]
    fn test_neighborhood_radius_zero_is_centre_only() {
        let center = address_for(8.5, 47.3).unwrap();
        assert_eq!(neighborhood(&center, 0), vec![center]);
    }

    #[test]
    fn test_neighborhood_ordered_by_ring() {
        let center = address_for(-122.3, 47.6).unwrap();
        let buckets = neighborhood(&center, 2);
        assert_eq!(buckets.len(), 25);
        // The first ring (8 buckets) precedes the second ring (16 buckets)
        for bucket in &buckets[1..9] {
            assert!(neighborhood(&center, 1).contains(bucket));
        }
    }

    #[test]
    fn test_neighborhood_collapses_at_pole() {
        let center = address_for(0.0, 90.0).unwrap();
        let buckets = neighborhood(&center, 1);
        let unique: HashSet<_> = buckets.iter().collect();
        assert_eq!(unique.len(), buckets.len(), "No duplicates expected");
        assert!(buckets.len() < 9, "Polar rows hold few buckets");
    }

    #[test]
    fn test_neighborhood_huge_radius_covers_globe_once() {
        let center = address_for(0.0, 0.0).unwrap();
        let buckets = neighborhood(&center, u32::MAX);

        let total: usize = (0..LATITUDE_BANDS)
            .map(|band| (360.0 / span_for_band(band)).round() as usize)
            .sum();
        assert_eq!(buckets.len(), total);
        assert_eq!(buckets[0], center);
        assert!(buckets.contains(&address_for(179.99, 89.99).unwrap()));
        assert!(buckets.contains(&address_for(-180.0, -90.0).unwrap()));
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_origin_roundtrip_property(
                lon in -180.0..180.0_f64,
                lat in -90.0..=90.0_f64
            ) {
                let bucket = address_for(lon, lat)?;
                let (origin_lon, origin_lat) = origin_of(&bucket);
                prop_assert_eq!(address_for(origin_lon, origin_lat)?, bucket);
            }

            #[test]
            fn test_bucket_contains_position(
                lon in -180.0..180.0_f64,
                lat in -90.0..=90.0_f64
            ) {
                let bucket = address_for(lon, lat)?;
                let (origin_lon, origin_lat) = bucket.origin();
                let eps = 1e-9;

                prop_assert!(lon >= origin_lon - eps && lon <= origin_lon + bucket.width_deg() + eps,
                    "Longitude {} outside bucket {} [{}, +{}]",
                    lon, bucket, origin_lon, bucket.width_deg());
                prop_assert!(lat >= origin_lat - eps && lat <= origin_lat + bucket.height_deg() + eps,
                    "Latitude {} outside bucket {} [{}, +{}]",
                    lat, bucket, origin_lat, bucket.height_deg());
            }

            #[test]
            fn test_key_roundtrip_property(
                lon in -180.0..180.0_f64,
                lat in -90.0..=90.0_f64
            ) {
                let bucket = address_for(lon, lat)?;
                let parsed: BucketAddress = bucket.key().parse()?;
                prop_assert_eq!(parsed, bucket);
                prop_assert_eq!(BucketAddress::from_index(bucket.index())?, bucket);
            }

            #[test]
            fn test_aspect_ratio_property(
                lon in -180.0..180.0_f64,
                lat in -90.0..=90.0_f64
            ) {
                let ratio = address_for(lon, lat)?.aspect_ratio();
                prop_assert!((MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&ratio));
            }

            #[test]
            fn test_offset_inverse_property(
                lon in -180.0..180.0_f64,
                lat in -60.0..60.0_f64,
                dx in -3i32..=3
            ) {
                // Away from band-width changes, stepping east then west returns home
                let bucket = address_for(lon, lat)?;
                prop_assert_eq!(bucket.offset(dx, 0).offset(-dx, 0), bucket);
            }

            #[test]
            fn test_reject_invalid_latitude(
                lat in 90.0001..1000.0_f64,
                lon in -180.0..180.0_f64
            ) {
                prop_assert!(matches!(address_for(lon, lat), Err(CoordError::InvalidLatitude(_))));
                prop_assert!(matches!(address_for(lon, -lat), Err(CoordError::InvalidLatitude(_))));
            }
        }
    }
}
