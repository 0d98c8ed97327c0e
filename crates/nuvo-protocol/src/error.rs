//! Error types for Nuvo command formatting

use thiserror::Error;

/// A caller-supplied value that cannot be encoded
///
/// These are raised before anything is written to the link.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArgumentError {
    /// Zone id outside the range the deployment or the wire allows
    #[error("zone {zone} out of range 1..={max}")]
    ZoneOutOfRange { zone: u32, max: u8 },

    /// Source id outside the range the deployment allows
    #[error("source {id} out of range 1..={max}")]
    SourceOutOfRange { id: u32, max: u8 },

    /// Numeric argument that is NaN or infinite
    #[error("{what} must be a finite number, got {value}")]
    NotFinite { what: &'static str, value: f64 },
}
