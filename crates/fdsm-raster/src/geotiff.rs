//! Single-band GeoTIFF reading and writing.
//!
//! Only the subset of GeoTIFF used by elevation products is handled: one
//! band, an axis-aligned grid given by ModelTiepoint + ModelPixelScale or a
//! rotation-free ModelTransformation, and an EPSG-coded CRS in the
//! GeoKeyDirectory. The GDAL_NODATA tag is read and written when present.

use crate::{Crs, DataType, GeoRaster, GeoTransform, RasterError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{
    ColorType, Gray16, Gray32, Gray32Float, Gray64Float, Gray8, GrayI16, GrayI32, GrayI8,
};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind, TiffValue};
use tiff::tags::Tag;

// GeoTIFF tag IDs
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

// GeoKey IDs
const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

/// Georeferencing and layout of a GeoTIFF, read without decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTiffInfo {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Pixel-to-world transform.
    pub transform: GeoTransform,
    /// Coordinate reference system.
    pub crs: Crs,
    /// No-data value from GDAL_NODATA, if present.
    pub nodata: Option<f64>,
    /// On-disk sample type.
    pub data_type: DataType,
}

/// Keys of interest from a GeoKeyDirectory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeoKeys {
    /// GTModelTypeGeoKey.
    pub model_type: Option<u16>,
    /// GTRasterTypeGeoKey.
    pub raster_type: Option<u16>,
    /// GeographicTypeGeoKey.
    pub geographic_type: Option<u16>,
    /// ProjectedCSTypeGeoKey.
    pub projected_type: Option<u16>,
}

impl GeoKeys {
    /// Parse a GeoKeyDirectory: a 4-entry header followed by
    /// `[key, location, count, value]` quadruples. Keys stored in other
    /// tags (location != 0) are ignored.
    pub fn parse(directory: &[u16]) -> Result<Self> {
        if directory.len() < 4 {
            return Err(RasterError::InvalidGeoTiff(format!(
                "GeoKeyDirectory has {} entries, need at least 4",
                directory.len()
            )));
        }

        let num_keys = directory[3] as usize;
        let mut keys = GeoKeys::default();

        for entry in directory[4..].chunks_exact(4).take(num_keys) {
            let (key, location, value) = (entry[0], entry[1], entry[3]);
            if location != 0 {
                continue;
            }
            match key {
                GT_MODEL_TYPE_KEY => keys.model_type = Some(value),
                GT_RASTER_TYPE_KEY => keys.raster_type = Some(value),
                GEOGRAPHIC_TYPE_KEY => keys.geographic_type = Some(value),
                PROJECTED_CS_TYPE_KEY => keys.projected_type = Some(value),
                _ => {}
            }
        }

        Ok(keys)
    }

    /// The CRS these keys declare. A projected CRS takes precedence over the
    /// geographic base it is built on.
    pub fn crs(&self) -> Result<Crs> {
        let code = match (self.projected_type, self.geographic_type) {
            (Some(code), _) if code != 0 && code != USER_DEFINED => code,
            (_, Some(code)) if code != 0 && code != USER_DEFINED => code,
            (Some(USER_DEFINED), _) | (_, Some(USER_DEFINED)) => {
                return Err(RasterError::InvalidGeoTiff(
                    "user-defined CRS is not supported".to_string(),
                ))
            }
            _ => {
                return Err(RasterError::InvalidGeoTiff(
                    "no EPSG code in GeoKeyDirectory".to_string(),
                ))
            }
        };
        Ok(Crs::from_epsg(code))
    }

    fn pixel_is_point(&self) -> bool {
        self.raster_type == Some(RASTER_PIXEL_IS_POINT)
    }

    /// Directory declaring `crs` with PixelIsArea semantics.
    #[rustfmt::skip]
    pub fn directory_for(crs: Crs) -> Vec<u16> {
        let (model_type, crs_key) = if crs.is_geographic() {
            (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_KEY)
        } else {
            (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_KEY)
        };

        vec![
            1, 1, 0, 3, // version, revision, minor revision, key count
            GT_MODEL_TYPE_KEY, 0, 1, model_type,
            GT_RASTER_TYPE_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
            crs_key, 0, 1, crs.epsg(),
        ]
    }
}

/// Read a single-band GeoTIFF into memory.
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<GeoRaster> {
    let mut decoder = open_decoder(path.as_ref())?;
    let info = read_header(&mut decoder)?;
    let (data_type, data) = decode_samples(&mut decoder)?;

    GeoRaster::new(
        info.width,
        info.height,
        info.transform,
        info.crs,
        info.nodata,
        data_type,
        data,
    )
}

/// Read only the georeferencing of a GeoTIFF.
pub fn read_info<P: AsRef<Path>>(path: P) -> Result<GeoTiffInfo> {
    let mut decoder = open_decoder(path.as_ref())?;
    read_header(&mut decoder)
}

/// Write a raster as an uncompressed single-band GeoTIFF in its own sample type.
///
/// Output depends only on the raster contents, so writing the same raster
/// twice yields identical bytes.
pub fn write_geotiff<P: AsRef<Path>>(raster: &GeoRaster, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_geotiff_to(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a raster to any seekable writer.
pub fn write_geotiff_to<W: Write + Seek>(raster: &GeoRaster, writer: W) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    let data = raster.data();

    match raster.data_type() {
        DataType::U8 => encode::<_, Gray8>(&mut encoder, raster, &convert(data, |v| v as u8)),
        DataType::I8 => encode::<_, GrayI8>(&mut encoder, raster, &convert(data, |v| v as i8)),
        DataType::U16 => encode::<_, Gray16>(&mut encoder, raster, &convert(data, |v| v as u16)),
        DataType::I16 => encode::<_, GrayI16>(&mut encoder, raster, &convert(data, |v| v as i16)),
        DataType::U32 => encode::<_, Gray32>(&mut encoder, raster, &convert(data, |v| v as u32)),
        DataType::I32 => encode::<_, GrayI32>(&mut encoder, raster, &convert(data, |v| v as i32)),
        DataType::F32 => {
            encode::<_, Gray32Float>(&mut encoder, raster, &convert(data, |v| v as f32))
        }
        DataType::F64 => encode::<_, Gray64Float>(&mut encoder, raster, data),
    }
}

fn convert<T>(data: &[f64], f: impl Fn(f64) -> T) -> Vec<T> {
    data.iter().map(|&v| f(v)).collect()
}

fn encode<W, C>(encoder: &mut TiffEncoder<W>, raster: &GeoRaster, samples: &[C::Inner]) -> Result<()>
where
    W: Write + Seek,
    C: ColorType,
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(raster.width() as u32, raster.height() as u32)?;
    write_geo_tags(image.encoder(), raster)?;
    image.write_data(samples)?;
    Ok(())
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    raster: &GeoRaster,
) -> Result<()> {
    let gt = raster.transform();

    let pixel_scale = [gt.pixel_width.abs(), gt.pixel_height.abs(), 0.0];
    dir.write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), pixel_scale.as_slice())?;

    // Pixel (0, 0) tied to the top-left corner
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    dir.write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), tiepoint.as_slice())?;

    let geokeys = GeoKeys::directory_for(raster.crs());
    dir.write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), geokeys.as_slice())?;

    if let Some(nodata) = raster.nodata() {
        dir.write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), format_nodata(nodata).as_str())?;
    }

    Ok(())
}

/// GDAL writes integral no-data values without a fractional part.
fn format_nodata(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else if nodata.fract() == 0.0 && nodata.abs() < 1e15 {
        format!("{}", nodata as i64)
    } else {
        format!("{nodata}")
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    let decoder = Decoder::new(BufReader::new(file))?;

    // 3DEP DSM tiles run to tens of thousands of pixels on a side
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 4 * 1024 * 1024 * 1024;
    limits.intermediate_buffer_size = 1024 * 1024 * 1024;
    limits.ifd_value_size = 1024 * 1024 * 1024;

    Ok(decoder.with_limits(limits))
}

fn read_header<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTiffInfo> {
    let (width, height) = decoder.dimensions()?;
    let data_type = header_data_type(decoder)?;

    let directory = decoder
        .get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
        .map_err(|_| RasterError::InvalidGeoTiff("missing GeoKeyDirectory".to_string()))?;
    let keys = GeoKeys::parse(&directory)?;
    let crs = keys.crs()?;

    let mut transform = read_transform(decoder)?;
    if keys.pixel_is_point() {
        // Tie points reference pixel centres; shift to the corner
        transform.origin_x -= transform.pixel_width / 2.0;
        transform.origin_y -= transform.pixel_height / 2.0;
    }

    Ok(GeoTiffInfo {
        width: width as usize,
        height: height as usize,
        transform,
        crs,
        nodata: read_nodata(decoder),
        data_type,
    })
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT));
    let pixel_scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE));

    if let (Ok(tiepoint), Ok(scale)) = (tiepoint, pixel_scale) {
        if tiepoint.len() >= 6 && scale.len() >= 2 {
            // Tiepoint format: [i, j, k, x, y, z] relating pixel (i, j) to (x, y)
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    if let Ok(matrix) = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION)) {
        return transform_from_matrix(&matrix);
    }

    Err(RasterError::InvalidGeoTiff(
        "no ModelTiepoint/ModelPixelScale or ModelTransformation".to_string(),
    ))
}

/// Convert a row-major 4x4 ModelTransformation to an axis-aligned transform.
fn transform_from_matrix(m: &[f64]) -> Result<GeoTransform> {
    if m.len() < 16 {
        return Err(RasterError::InvalidGeoTiff(format!(
            "ModelTransformation has {} values, need 16",
            m.len()
        )));
    }
    if m[1] != 0.0 || m[4] != 0.0 {
        return Err(RasterError::InvalidGeoTiff(
            "rotated ModelTransformation is not supported".to_string(),
        ));
    }
    Ok(GeoTransform::new(m[3], m[7], m[0], m[5]))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA)).ok()?;
    text.trim_end_matches('\0').trim().parse().ok()
}

fn header_data_type<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<DataType> {
    let bits = match decoder.colortype()? {
        tiff::ColorType::Gray(bits) => bits,
        other => {
            return Err(RasterError::UnsupportedBandCount(format!("{other:?}")));
        }
    };

    // SampleFormat: 1 unsigned, 2 signed, 3 IEEE float
    let format = decoder
        .find_tag_unsigned_vec::<u16>(Tag::SampleFormat)
        .ok()
        .flatten()
        .and_then(|v| v.first().copied())
        .unwrap_or(1);

    data_type_from(bits, format)
}

fn data_type_from(bits: u8, format: u16) -> Result<DataType> {
    match (format, bits) {
        (1, 8) => Ok(DataType::U8),
        (1, 16) => Ok(DataType::U16),
        (1, 32) => Ok(DataType::U32),
        (2, 8) => Ok(DataType::I8),
        (2, 16) => Ok(DataType::I16),
        (2, 32) => Ok(DataType::I32),
        (3, 32) => Ok(DataType::F32),
        (3, 64) => Ok(DataType::F64),
        _ => Err(RasterError::UnsupportedDataType(format!(
            "{bits}-bit samples with SampleFormat {format}"
        ))),
    }
}

fn decode_samples<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<(DataType, Vec<f64>)> {
    let result = decoder.read_image()?;

    let decoded = match result {
        DecodingResult::F32(data) => (DataType::F32, data.into_iter().map(f64::from).collect()),
        DecodingResult::F64(data) => (DataType::F64, data),
        DecodingResult::I16(data) => (DataType::I16, data.into_iter().map(f64::from).collect()),
        DecodingResult::I32(data) => (DataType::I32, data.into_iter().map(f64::from).collect()),
        DecodingResult::U16(data) => (DataType::U16, data.into_iter().map(f64::from).collect()),
        DecodingResult::U32(data) => (DataType::U32, data.into_iter().map(f64::from).collect()),
        DecodingResult::U8(data) => (DataType::U8, data.into_iter().map(f64::from).collect()),
        DecodingResult::I8(data) => (DataType::I8, data.into_iter().map(f64::from).collect()),
        DecodingResult::U64(_) | DecodingResult::I64(_) => {
            return Err(RasterError::UnsupportedDataType(
                "64-bit integer samples".to_string(),
            ))
        }
    };

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_raster(data_type: DataType, nodata: Option<f64>) -> GeoRaster {
        GeoRaster::new(
            3,
            2,
            GeoTransform::new(500_000.0, 4_400_002.0, 1.0, -1.0),
            Crs::from_epsg(32618),
            nodata,
            data_type,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
        .unwrap()
    }

    #[test]
    fn test_parse_geokeys() {
        let dir = GeoKeys::directory_for(Crs::from_epsg(32618));
        let keys = GeoKeys::parse(&dir).unwrap();
        assert_eq!(keys.model_type, Some(MODEL_TYPE_PROJECTED));
        assert_eq!(keys.projected_type, Some(32618));
        assert_eq!(keys.crs().unwrap(), Crs::from_epsg(32618));
    }

    #[test]
    fn test_geographic_geokeys() {
        let dir = GeoKeys::directory_for(Crs::WGS84);
        let keys = GeoKeys::parse(&dir).unwrap();
        assert_eq!(keys.model_type, Some(MODEL_TYPE_GEOGRAPHIC));
        assert_eq!(keys.crs().unwrap(), Crs::WGS84);
    }

    #[test]
    fn test_missing_crs_is_invalid() {
        let keys = GeoKeys::parse(&[1, 1, 0, 1, GT_MODEL_TYPE_KEY, 0, 1, 1]).unwrap();
        assert!(matches!(keys.crs(), Err(RasterError::InvalidGeoTiff(_))));

        let user = GeoKeys::parse(&[1, 1, 0, 1, PROJECTED_CS_TYPE_KEY, 0, 1, USER_DEFINED]).unwrap();
        assert!(matches!(user.crs(), Err(RasterError::InvalidGeoTiff(_))));
    }

    #[test]
    fn test_rotated_matrix_rejected() {
        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[1] = 0.5;
        m[5] = -1.0;
        assert!(transform_from_matrix(&m).is_err());

        m[1] = 0.0;
        m[3] = 10.0;
        m[7] = 20.0;
        let gt = transform_from_matrix(&m).unwrap();
        assert_eq!(gt, GeoTransform::new(10.0, 20.0, 1.0, -1.0));
    }

    #[test]
    fn test_write_then_read_preserves_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tile.tif");
        let raster = sample_raster(DataType::F32, Some(-9999.0));

        write_geotiff(&raster, &path).unwrap();
        let read = read_geotiff(&path).unwrap();

        assert_eq!(read, raster);
        let info = read_info(&path).unwrap();
        assert_eq!(info.crs, Crs::from_epsg(32618));
        assert_eq!(info.nodata, Some(-9999.0));
        assert_eq!(info.data_type, DataType::F32);
    }

    #[test]
    fn test_integer_type_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("int.tif");
        write_geotiff(&sample_raster(DataType::I16, None), &path).unwrap();

        let read = read_geotiff(&path).unwrap();
        assert_eq!(read.data_type(), DataType::I16);
        assert_eq!(read.nodata(), None);
        assert_eq!(read.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_writes_are_deterministic() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.tif");
        let b = dir.path().join("b.tif");
        let raster = sample_raster(DataType::F64, Some(-1.5));

        write_geotiff(&raster, &a).unwrap();
        write_geotiff(&raster, &b).unwrap();
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }

    #[test]
    fn test_plain_tiff_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.tif");
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
        encoder
            .write_image::<Gray32Float>(2, 2, &[0.0f32, 1.0, 2.0, 3.0])
            .unwrap();
        drop(encoder);

        assert!(matches!(
            read_geotiff(&path),
            Err(RasterError::InvalidGeoTiff(_))
        ));
    }

    #[test]
    fn test_format_nodata() {
        assert_eq!(format_nodata(-9999.0), "-9999");
        assert_eq!(format_nodata(-3.5), "-3.5");
    }
}
