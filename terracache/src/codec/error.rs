//! Codec error types.

use thiserror::Error;

/// Reasons a payload is rejected as a corrupt elevation grid.
///
/// Every variant means the resource itself is bad; retrying the same bytes
/// will fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Payload too short for a grid header: {len} bytes")]
    TooShort { len: usize },

    #[error("Bad magic: expected \"EGRD\", found {found:02x?}")]
    BadMagic { found: [u8; 4] },

    #[error("Unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown resolution class code {0}")]
    UnknownResolution(u8),

    #[error("Unexpected {field} units code {code}")]
    UnitsMismatch { field: &'static str, code: u8 },

    #[error("Cell spacing {found}\" does not match resolution class ({expected}\")")]
    SpacingMismatch { expected: u32, found: u32 },

    #[error("Invalid grid dimensions {columns}x{rows}")]
    InvalidDimensions { columns: u32, rows: u32 },

    #[error("Invalid elevation range: min {min} > max {max}")]
    InvalidElevationRange { min: i16, max: i16 },

    #[error("Profile record count {found} does not match row count {expected}")]
    RecordCountMismatch { expected: u32, found: u32 },

    #[error("Profile record {ordinal} carries index {found}")]
    RecordIndexMismatch { ordinal: u32, found: u32 },

    #[error("Profile record {ordinal} holds {found} samples, expected {expected}")]
    RecordLengthMismatch { ordinal: u32, expected: u32, found: u32 },

    #[error("Payload size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Sample {value} at column {column}, row {row} is outside [{min}, {max}]")]
    ElevationOutOfRange {
        column: u32,
        row: u32,
        value: i16,
        min: i16,
        max: i16,
    },

    #[error("Failed to decompress payload: {0}")]
    Decompress(String),

    #[error("Decompressed payload exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Failed to compress payload: {0}")]
    Compress(String),
}
