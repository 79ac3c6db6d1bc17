//! Error types for the raster crate.

use thiserror::Error;

/// Errors that can occur when reading, writing or transforming rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing or inconsistent georeferencing tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Unsupported sample type in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),

    /// The raster has more than one band.
    #[error("Unsupported band layout: {0} (only single-band elevation rasters are supported)")]
    UnsupportedBandCount(String),

    /// EPSG code missing from the projection database.
    #[error("Unknown CRS EPSG:{0}")]
    UnknownCrs(u16),

    /// A coordinate transform between two CRSs failed.
    #[error("Projection from EPSG:{from} to EPSG:{to} failed: {reason}")]
    Projection {
        /// Source EPSG code.
        from: u16,
        /// Target EPSG code.
        to: u16,
        /// Reason for failure.
        reason: String,
    },

    /// Bounds with min >= max or non-finite coordinates.
    #[error("Degenerate bounds ({min_x}, {min_y}) - ({max_x}, {max_y})")]
    DegenerateBounds {
        /// Minimum x.
        min_x: f64,
        /// Minimum y.
        min_y: f64,
        /// Maximum x.
        max_x: f64,
        /// Maximum y.
        max_y: f64,
    },

    /// Two operands were expected to share a CRS.
    #[error("CRS mismatch: EPSG:{expected} vs EPSG:{actual}")]
    CrsMismatch {
        /// Expected EPSG code.
        expected: u16,
        /// Actual EPSG code.
        actual: u16,
    },

    /// Pixel buffer does not match the raster dimensions.
    #[error("Pixel buffer holds {actual} samples, expected {expected}")]
    BufferSize {
        /// Expected sample count (width * height).
        expected: usize,
        /// Actual sample count.
        actual: usize,
    },

    /// A pixel window that does not fit inside the raster.
    #[error("Window {width}x{height} at ({col_off}, {row_off}) exceeds raster bounds")]
    WindowOutOfRange {
        /// First column.
        col_off: usize,
        /// First row.
        row_off: usize,
        /// Window width.
        width: usize,
        /// Window height.
        height: usize,
    },

    /// A raster with zero width or height.
    #[error("Raster has zero dimensions ({width}x{height})")]
    EmptyRaster {
        /// Width in pixels.
        width: usize,
        /// Height in pixels.
        height: usize,
    },
}
