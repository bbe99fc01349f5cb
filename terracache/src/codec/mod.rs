//! Binary elevation grid format.
//!
//! All integers are big-endian. A payload is a fixed 36-byte header followed
//! by one profile record per grid row, southernmost row first:
//!
//! ```text
//! offset size field
//!      0    4 magic "EGRD"
//!      4    1 format version (1)
//!      5    1 resolution class code (1, 3 or 30)
//!      6    1 planimetric units code (3 = arc-seconds)
//!      7    1 elevation units code (2 = metres)
//!      8    4 origin longitude, arc-seconds (i32)
//!     12    4 origin latitude, arc-seconds (i32)
//!     16    4 cell spacing, arc-seconds (u32)
//!     20    4 columns (u32)
//!     24    4 rows (u32)
//!     28    4 profile record count (u32)
//!     32    2 minimum elevation (i16)
//!     34    2 maximum elevation (i16)
//!
//! record: profile index (u32), sample count (u32), samples (i16 x columns)
//! ```
//!
//! Payloads that start with the gzip magic are inflated first. Decoding is
//! all-or-nothing: any inconsistency yields a [`CodecError`] and no grid.

mod error;

pub use error::CodecError;

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::bucket::{ARCSEC_PER_DEGREE, ROWS_PER_DEGREE};
use crate::grid::{ElevationGrid, ResolutionClass, NO_DATA};

/// Leading bytes of every uncompressed payload.
pub const MAGIC: [u8; 4] = *b"EGRD";

/// The only format version understood.
pub const FORMAT_VERSION: u8 = 1;

/// Planimetric units code for arc-seconds.
pub const UNITS_ARCSEC: u8 = 3;

/// Elevation units code for metres.
pub const UNITS_METRES: u8 = 2;

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 36;

/// Size of a profile record header (index + sample count).
const RECORD_HEADER_LEN: u64 = 8;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Widest bucket span in degrees (the polar rows).
const MAX_BUCKET_WIDTH_DEG: u64 = 90;

/// Largest legal raw payload: the widest bucket at one-arc-second spacing.
pub const MAX_PAYLOAD_LEN: u64 = {
    let arcsec = ARCSEC_PER_DEGREE as u64;
    let columns = MAX_BUCKET_WIDTH_DEG * arcsec + 1;
    let rows = arcsec / ROWS_PER_DEGREE as u64 + 1;
    HEADER_LEN as u64 + rows * (RECORD_HEADER_LEN + 2 * columns)
};

/// Parsed and validated header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridHeader {
    pub resolution: ResolutionClass,
    pub origin_lon_arcsec: i32,
    pub origin_lat_arcsec: i32,
    pub spacing_arcsec: u32,
    pub columns: u32,
    pub rows: u32,
    pub min_elevation: i16,
    pub max_elevation: i16,
}

impl GridHeader {
    /// Total payload length implied by the dimensions.
    pub fn payload_len(&self) -> u64 {
        let record = RECORD_HEADER_LEN + 2 * self.columns as u64;
        HEADER_LEN as u64 + self.rows as u64 * record
    }
}

/// Whether a payload is gzip-compressed.
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Decodes a complete payload into a grid.
pub fn decode(data: &[u8]) -> Result<ElevationGrid, CodecError> {
    if is_gzip(data) {
        let inflated = inflate(data, MAX_PAYLOAD_LEN)?;
        decode_raw(&inflated)
    } else {
        decode_raw(data)
    }
}

/// Parses and validates only the header of a payload.
pub fn peek_header(data: &[u8]) -> Result<GridHeader, CodecError> {
    if is_gzip(data) {
        let inflated = inflate_prefix(data, HEADER_LEN as u64)?;
        read_header(&mut &inflated[..])
    } else {
        read_header(&mut &data[..])
    }
}

/// Encodes a grid. The header range is computed from the samples.
pub fn encode(grid: &ElevationGrid) -> Bytes {
    let columns = grid.columns();
    let rows = grid.rows();
    let (origin_lon, origin_lat) = grid.origin_arcsec();
    let min = grid.min_elevation().unwrap_or(0);
    let max = grid.max_elevation().unwrap_or(0);

    let capacity = HEADER_LEN + rows as usize * (RECORD_HEADER_LEN as usize + 2 * columns as usize);
    let mut buf = BytesMut::with_capacity(capacity);

    buf.put_slice(&MAGIC);
    buf.put_u8(FORMAT_VERSION);
    buf.put_u8(grid.resolution().code());
    buf.put_u8(UNITS_ARCSEC);
    buf.put_u8(UNITS_METRES);
    buf.put_i32(origin_lon);
    buf.put_i32(origin_lat);
    buf.put_u32(grid.spacing_arcsec());
    buf.put_u32(columns);
    buf.put_u32(rows);
    buf.put_u32(rows);
    buf.put_i16(min);
    buf.put_i16(max);

    for (row, profile) in grid.samples().chunks(columns as usize).enumerate() {
        buf.put_u32(row as u32);
        buf.put_u32(columns);
        for &sample in profile {
            buf.put_i16(sample);
        }
    }

    buf.freeze()
}

/// Encodes a grid and gzip-compresses the result.
pub fn encode_gzip(grid: &ElevationGrid) -> Result<Bytes, CodecError> {
    let raw = encode(grid);
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder
        .write_all(&raw)
        .map_err(|e| CodecError::Compress(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CodecError::Compress(e.to_string()))?;
    Ok(Bytes::from(compressed))
}

/// Inflates a gzip stream, rejecting output longer than `limit` bytes.
fn inflate(data: &[u8], limit: u64) -> Result<Vec<u8>, CodecError> {
    let inflated = inflate_prefix(data, limit.saturating_add(1))?;
    if inflated.len() as u64 > limit {
        return Err(CodecError::TooLarge { limit });
    }
    Ok(inflated)
}

/// Inflates at most `len` bytes from the start of a gzip stream.
fn inflate_prefix(data: &[u8], len: u64) -> Result<Vec<u8>, CodecError> {
    let capacity = (data.len() as u64).saturating_mul(4).min(len) as usize;
    let mut inflated = Vec::with_capacity(capacity);
    GzDecoder::new(data)
        .take(len)
        .read_to_end(&mut inflated)
        .map_err(|e| CodecError::Decompress(e.to_string()))?;
    Ok(inflated)
}

fn read_header(buf: &mut &[u8]) -> Result<GridHeader, CodecError> {
    if buf.remaining() < HEADER_LEN {
        return Err(CodecError::TooShort {
            len: buf.remaining(),
        });
    }

    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    if magic != MAGIC {
        return Err(CodecError::BadMagic { found: magic });
    }

    let version = buf.get_u8();
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let class_code = buf.get_u8();
    let resolution =
        ResolutionClass::from_code(class_code).ok_or(CodecError::UnknownResolution(class_code))?;

    let xy_units = buf.get_u8();
    if xy_units != UNITS_ARCSEC {
        return Err(CodecError::UnitsMismatch {
            field: "planimetric",
            code: xy_units,
        });
    }
    let z_units = buf.get_u8();
    if z_units != UNITS_METRES {
        return Err(CodecError::UnitsMismatch {
            field: "elevation",
            code: z_units,
        });
    }

    let origin_lon_arcsec = buf.get_i32();
    let origin_lat_arcsec = buf.get_i32();

    let spacing_arcsec = buf.get_u32();
    if spacing_arcsec != resolution.spacing_arcsec() {
        return Err(CodecError::SpacingMismatch {
            expected: resolution.spacing_arcsec(),
            found: spacing_arcsec,
        });
    }

    let columns = buf.get_u32();
    let rows = buf.get_u32();
    if columns == 0 || rows == 0 || columns > i32::MAX as u32 || rows > i32::MAX as u32 {
        return Err(CodecError::InvalidDimensions { columns, rows });
    }

    let record_count = buf.get_u32();
    if record_count != rows {
        return Err(CodecError::RecordCountMismatch {
            expected: rows,
            found: record_count,
        });
    }

    let min_elevation = buf.get_i16();
    let max_elevation = buf.get_i16();
    if min_elevation > max_elevation {
        return Err(CodecError::InvalidElevationRange {
            min: min_elevation,
            max: max_elevation,
        });
    }

    Ok(GridHeader {
        resolution,
        origin_lon_arcsec,
        origin_lat_arcsec,
        spacing_arcsec,
        columns,
        rows,
        min_elevation,
        max_elevation,
    })
}

fn decode_raw(data: &[u8]) -> Result<ElevationGrid, CodecError> {
    let mut buf = data;
    let header = read_header(&mut buf)?;

    let expected = header.payload_len();
    if data.len() as u64 != expected {
        return Err(CodecError::SizeMismatch {
            expected,
            actual: data.len() as u64,
        });
    }

    let columns = header.columns;
    let mut samples = Vec::with_capacity(columns as usize * header.rows as usize);

    for row in 0..header.rows {
        let index = buf.get_u32();
        if index != row {
            return Err(CodecError::RecordIndexMismatch {
                ordinal: row,
                found: index,
            });
        }
        let count = buf.get_u32();
        if count != columns {
            return Err(CodecError::RecordLengthMismatch {
                ordinal: row,
                expected: columns,
                found: count,
            });
        }

        for column in 0..columns {
            let value = buf.get_i16();
            if value != NO_DATA && !(header.min_elevation..=header.max_elevation).contains(&value) {
                return Err(CodecError::ElevationOutOfRange {
                    column,
                    row,
                    value,
                    min: header.min_elevation,
                    max: header.max_elevation,
                });
            }
            samples.push(value);
        }
    }

    ElevationGrid::new(
        header.resolution,
        header.origin_lon_arcsec,
        header.origin_lat_arcsec,
        columns,
        header.rows,
        samples,
    )
    .map_err(|_| CodecError::InvalidDimensions {
        columns,
        rows: header.rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::address_for;

    fn sample_grid() -> ElevationGrid {
        ElevationGrid::new(
            ResolutionClass::ThreeArcSecond,
            -266_850,
            146_250,
            3,
            2,
            vec![10, 20, NO_DATA, -5, 0, 1200],
        )
        .unwrap()
    }

    /// Overwrites a big-endian u32 at `offset`.
    fn patch_u32(data: &mut [u8], offset: usize, value: u32) {
        data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    #[test]
    fn test_header_layout() {
        let data = encode(&sample_grid());

        assert_eq!(&data[0..4], b"EGRD");
        assert_eq!(data[4], 1);
        assert_eq!(data[5], 3);
        assert_eq!(data[6], 3);
        assert_eq!(data[7], 2);
        assert_eq!(&data[8..12], &(-266_850i32).to_be_bytes());
        assert_eq!(&data[20..24], &3u32.to_be_bytes());
        assert_eq!(&data[24..28], &2u32.to_be_bytes());
        assert_eq!(&data[32..34], &(-5i16).to_be_bytes());
        assert_eq!(&data[34..36], &1200i16.to_be_bytes());
        assert_eq!(data.len(), 36 + 2 * (8 + 2 * 3));
    }

    #[test]
    fn test_decode_preserves_sentinels() {
        let grid = sample_grid();
        let decoded = decode(&encode(&grid)).unwrap();
        assert_eq!(decoded, grid);
        assert_eq!(decoded.sample(2, 0), Some(NO_DATA));
    }

    #[test]
    fn test_gzip_payload() {
        let grid = sample_grid();
        let compressed = encode_gzip(&grid).unwrap();
        assert!(is_gzip(&compressed));
        assert_eq!(decode(&compressed).unwrap(), grid);
        assert_eq!(peek_header(&compressed).unwrap().columns, 3);
    }

    #[test]
    fn test_corrupt_gzip() {
        // Valid gzip member header followed by a reserved deflate block type
        let payload = [0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0xff, 0x07, 0, 0, 0];
        assert!(matches!(decode(&payload), Err(CodecError::Decompress(_))));
        assert!(matches!(decode(&[0x1f, 0x8b]), Err(CodecError::Decompress(_))));
    }

    #[test]
    fn test_inflate_rejects_oversized_output() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&[0u8; 64 * 1024]).unwrap();
        let bomb = encoder.finish().unwrap();
        assert!(bomb.len() < 1024);

        assert!(matches!(
            inflate(&bomb, 4096),
            Err(CodecError::TooLarge { limit: 4096 })
        ));
        assert_eq!(inflate(&bomb, 64 * 1024).unwrap().len(), 64 * 1024);
        assert_eq!(inflate_prefix(&bomb, HEADER_LEN as u64).unwrap().len(), HEADER_LEN);
    }

    #[test]
    fn test_payload_limit_covers_widest_bucket() {
        let widest = (0..crate::bucket::LATITUDE_BANDS)
            .map(crate::bucket::span_for_band)
            .fold(0.0, f64::max);
        assert!(widest <= MAX_BUCKET_WIDTH_DEG as f64);

        let polar = address_for(0.0, 89.99).unwrap();
        let (width, height) = polar.size_arcsec();
        let header = GridHeader {
            resolution: ResolutionClass::OneArcSecond,
            origin_lon_arcsec: 0,
            origin_lat_arcsec: 0,
            spacing_arcsec: 1,
            columns: width + 1,
            rows: height + 1,
            min_elevation: 0,
            max_elevation: 0,
        };
        assert_eq!(header.payload_len(), MAX_PAYLOAD_LEN);
    }

    #[test]
    fn test_truncated_body() {
        let data = encode(&sample_grid());
        for len in [HEADER_LEN, data.len() - 1, data.len() - 7] {
            assert!(matches!(
                decode(&data[..len]),
                Err(CodecError::SizeMismatch { .. })
            ));
        }
        assert!(matches!(
            decode(&data[..20]),
            Err(CodecError::TooShort { len: 20 })
        ));
        assert!(matches!(decode(&[]), Err(CodecError::TooShort { len: 0 })));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut data = encode(&sample_grid()).to_vec();
        data.push(0);
        assert!(matches!(
            decode(&data),
            Err(CodecError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut data = encode(&sample_grid()).to_vec();
        data[0] = b'X';
        assert!(matches!(decode(&data), Err(CodecError::BadMagic { .. })));

        let mut data = encode(&sample_grid()).to_vec();
        data[4] = 2;
        assert_eq!(decode(&data), Err(CodecError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_class_and_units_checks() {
        let mut data = encode(&sample_grid()).to_vec();
        data[5] = 7;
        assert_eq!(decode(&data), Err(CodecError::UnknownResolution(7)));

        let mut data = encode(&sample_grid()).to_vec();
        data[6] = 1;
        assert!(matches!(
            decode(&data),
            Err(CodecError::UnitsMismatch {
                field: "planimetric",
                ..
            })
        ));

        let mut data = encode(&sample_grid()).to_vec();
        patch_u32(&mut data, 16, 30);
        assert_eq!(
            decode(&data),
            Err(CodecError::SpacingMismatch {
                expected: 3,
                found: 30
            })
        );
    }

    #[test]
    fn test_record_checks() {
        let mut data = encode(&sample_grid()).to_vec();
        patch_u32(&mut data, 28, 3);
        assert!(matches!(
            decode(&data),
            Err(CodecError::RecordCountMismatch { .. })
        ));

        // Second record starts at 36 + 14
        let mut data = encode(&sample_grid()).to_vec();
        patch_u32(&mut data, 50, 5);
        assert_eq!(
            decode(&data),
            Err(CodecError::RecordIndexMismatch {
                ordinal: 1,
                found: 5
            })
        );

        let mut data = encode(&sample_grid()).to_vec();
        patch_u32(&mut data, 40, 2);
        assert!(matches!(
            decode(&data),
            Err(CodecError::RecordLengthMismatch { ordinal: 0, .. })
        ));
    }

    #[test]
    fn test_zero_dimensions() {
        let mut data = encode(&sample_grid()).to_vec();
        patch_u32(&mut data, 20, 0);
        assert!(matches!(
            decode(&data),
            Err(CodecError::InvalidDimensions { columns: 0, .. })
        ));
    }

    #[test]
    fn test_huge_dimensions_do_not_allocate() {
        let mut data = encode(&sample_grid()).to_vec();
        patch_u32(&mut data, 20, 1_000_000_000);
        patch_u32(&mut data, 24, 1_000_000_000);
        patch_u32(&mut data, 28, 1_000_000_000);
        assert!(matches!(
            decode(&data),
            Err(CodecError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_sample_outside_header_range() {
        let mut data = encode(&sample_grid()).to_vec();
        // Narrow the max below the 1200 sample
        data[34..36].copy_from_slice(&1000i16.to_be_bytes());
        assert!(matches!(
            decode(&data),
            Err(CodecError::ElevationOutOfRange {
                column: 2,
                row: 1,
                value: 1200,
                ..
            })
        ));
    }

    #[test]
    fn test_exact_at_every_node_of_decoded_grid() {
        let bucket = address_for(8.5, 47.3).unwrap();
        let grid = ElevationGrid::for_bucket(&bucket, ResolutionClass::ThirtyArcSecond, |lon, lat| {
            ((lon * 1000.0).sin() * 300.0 + (lat * 700.0).cos() * 200.0 + 800.0) as i16
        });
        let decoded = decode(&encode(&grid)).unwrap();

        let (origin_lon, origin_lat) = decoded.origin_arcsec();
        for row in 0..decoded.rows() {
            for col in 0..decoded.columns() {
                let lon = (origin_lon + (col * 30) as i32) as f64 / 3600.0;
                let lat = (origin_lat + (row * 30) as i32) as f64 / 3600.0;
                let z = decoded.interpolate_elevation(lon, lat).unwrap();
                assert_eq!(z, decoded.sample(col, row).unwrap() as f64);
            }
        }
    }
}
