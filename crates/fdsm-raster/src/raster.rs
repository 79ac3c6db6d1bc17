//! In-memory single-band elevation raster.

use crate::{BoundingBox, Crs, GeoTransform, RasterError, Result};

/// Sample type of the band as stored on disk.
///
/// Samples are held as `f64` in memory; the on-disk type is remembered so a
/// raster is written back in the type it was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 32-bit integer.
    I32,
    /// 32-bit IEEE float.
    F32,
    /// 64-bit IEEE float.
    F64,
}

impl DataType {
    /// Whether samples are floating point.
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Convert a value to the nearest representable sample of this type.
    pub fn quantize(&self, value: f64) -> f64 {
        match self {
            DataType::U8 => value as u8 as f64,
            DataType::I8 => value as i8 as f64,
            DataType::U16 => value as u16 as f64,
            DataType::I16 => value as i16 as f64,
            DataType::U32 => value as u32 as f64,
            DataType::I32 => value as i32 as f64,
            DataType::F32 => value as f32 as f64,
            DataType::F64 => value,
        }
    }
}

/// A grid of elevation samples with its georeferencing.
///
/// Rows run north to south, columns west to east. Each pipeline stage
/// produces a new `GeoRaster` rather than mutating its input.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRaster {
    width: usize,
    height: usize,
    transform: GeoTransform,
    crs: Crs,
    nodata: Option<f64>,
    data_type: DataType,
    data: Vec<f64>,
}

impl GeoRaster {
    /// Create a raster, checking the buffer against the dimensions.
    pub fn new(
        width: usize,
        height: usize,
        transform: GeoTransform,
        crs: Crs,
        nodata: Option<f64>,
        data_type: DataType,
        data: Vec<f64>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RasterError::EmptyRaster { width, height });
        }
        if data.len() != width * height {
            return Err(RasterError::BufferSize {
                expected: width * height,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            transform,
            crs,
            nodata,
            data_type,
            data,
        })
    }

    /// Create a raster of the given shape where every sample is the fill value.
    pub fn filled(
        width: usize,
        height: usize,
        transform: GeoTransform,
        crs: Crs,
        nodata: Option<f64>,
        data_type: DataType,
    ) -> Result<Self> {
        let fill = fill_value(nodata, data_type);
        Self::new(
            width,
            height,
            transform,
            crs,
            nodata,
            data_type,
            vec![fill; width * height],
        )
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Dimensions `(width, height)` in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Pixel-to-world transform.
    pub fn transform(&self) -> GeoTransform {
        self.transform
    }

    /// Coordinate reference system.
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// No-data value, if declared.
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// On-disk sample type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Samples in row-major order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Consume the raster and return its samples.
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Absolute pixel sizes `(x, y)`.
    pub fn resolution(&self) -> (f64, f64) {
        self.transform.resolution()
    }

    /// Footprint in the raster's CRS.
    pub fn bounds(&self) -> Result<BoundingBox> {
        self.transform.bounds(self.width, self.height, self.crs)
    }

    /// Sample at (col, row). Panics when out of range, like slice indexing.
    pub fn get(&self, col: usize, row: usize) -> f64 {
        self.data[row * self.width + col]
    }

    /// Value written where no source sample exists.
    pub fn fill_value(&self) -> f64 {
        fill_value(self.nodata, self.data_type)
    }

    /// Whether `value` marks a missing sample (the no-data value or NaN).
    pub fn is_nodata(&self, value: f64) -> bool {
        if value.is_nan() {
            return true;
        }
        match self.nodata {
            Some(nd) => value == nd,
            None => false,
        }
    }

    /// Sample nearest to a world coordinate, or `None` outside the grid.
    pub fn sample_nearest(&self, x: f64, y: f64) -> Option<f64> {
        let (col, row) = self.transform.world_to_pixel(x, y);
        let (col, row) = (col.floor(), row.floor());
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some(self.get(col as usize, row as usize))
    }

    /// Copy out the `width` x `height` window whose top-left pixel is
    /// (col_off, row_off). The window must lie inside the raster.
    pub fn window(&self, col_off: usize, row_off: usize, width: usize, height: usize) -> Result<Self> {
        if col_off + width > self.width || row_off + height > self.height {
            return Err(RasterError::WindowOutOfRange {
                col_off,
                row_off,
                width,
                height,
            });
        }

        let mut data = Vec::with_capacity(width * height);
        for row in row_off..row_off + height {
            let start = row * self.width + col_off;
            data.extend_from_slice(&self.data[start..start + width]);
        }

        Self::new(
            width,
            height,
            self.transform.offset(col_off, row_off),
            self.crs,
            self.nodata,
            self.data_type,
            data,
        )
    }
}

/// Fill value for missing samples: the no-data value when declared,
/// otherwise NaN for float data and zero for integer data.
pub fn fill_value(nodata: Option<f64>, data_type: DataType) -> f64 {
    match nodata {
        Some(nd) => nd,
        None if data_type.is_float() => f64::NAN,
        None => 0.0,
    }
}
