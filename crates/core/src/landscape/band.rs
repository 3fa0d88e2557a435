//! Source bands of a landscape
//!
//! A [`RasterBand`] is one decoded single-band raster plus the bits of its
//! `GeoTIFF` header the landscape needs: declared nodata and georeferencing.

use crate::error::{FireModelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;

/// `GeoTIFF` and GDAL tag numbers
pub(crate) mod tags {
    pub const MODEL_PIXEL_SCALE: u16 = 33550;
    pub const MODEL_TIEPOINT: u16 = 33922;
    pub const MODEL_TRANSFORMATION: u16 = 34264;
    pub const GEO_KEY_DIRECTORY: u16 = 34735;
    pub const GEO_DOUBLE_PARAMS: u16 = 34736;
    pub const GEO_ASCII_PARAMS: u16 = 34737;
    pub const GDAL_METADATA: u16 = 42112;
    pub const GDAL_NODATA: u16 = 42113;
}

/// Semantic role of each landscape band, in container order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandRole {
    Elevation,
    Slope,
    Aspect,
    FuelModel,
    CanopyCover,
    CanopyHeight,
    CanopyBaseHeight,
    CanopyBulkDensity,
}

impl BandRole {
    pub const ALL: [BandRole; 8] = [
        BandRole::Elevation,
        BandRole::Slope,
        BandRole::Aspect,
        BandRole::FuelModel,
        BandRole::CanopyCover,
        BandRole::CanopyHeight,
        BandRole::CanopyBaseHeight,
        BandRole::CanopyBulkDensity,
    ];

    /// Short band name stored in the container
    pub fn name(self) -> &'static str {
        match self {
            BandRole::Elevation => "elev",
            BandRole::Slope => "slope",
            BandRole::Aspect => "aspect",
            BandRole::FuelModel => "fbfm",
            BandRole::CanopyCover => "cnpy_cvr",
            BandRole::CanopyHeight => "cnpy_ht",
            BandRole::CanopyBaseHeight => "cbh",
            BandRole::CanopyBulkDensity => "cbd",
        }
    }

    /// All eight short names, comma separated
    pub fn descriptions() -> String {
        Self::ALL.map(BandRole::name).join(",")
    }
}

impl fmt::Display for BandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Georeferencing tags carried over from the reference band
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Georeference {
    pub pixel_scale: Option<Vec<f64>>,
    pub tiepoint: Option<Vec<f64>>,
    pub transformation: Option<Vec<f64>>,
    pub geo_keys: Option<Vec<u16>>,
    pub geo_doubles: Option<Vec<f64>>,
    pub geo_ascii: Option<String>,
}

impl Georeference {
    /// Pixel size along X, from the pixel scale or the transformation matrix
    pub fn resolution(&self) -> Option<f64> {
        if let Some(scale) = &self.pixel_scale {
            return scale.first().copied();
        }
        self.transformation
            .as_ref()
            .and_then(|m| m.first().copied())
            .map(f64::abs)
    }

    /// Whether `other` describes the same grid, when both are georeferenced
    pub(crate) fn same_grid(&self, other: &Self) -> bool {
        fn close(a: Option<&Vec<f64>>, b: Option<&Vec<f64>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => {
                    a.len() == b.len()
                        && a.iter().zip(b).all(|(x, y)| {
                            (x - y).abs() <= 1e-6 * x.abs().max(y.abs()).max(1.0)
                        })
                }
                _ => true,
            }
        }
        close(self.pixel_scale.as_ref(), other.pixel_scale.as_ref())
            && close(self.tiepoint.as_ref(), other.tiepoint.as_ref())
            && close(self.transformation.as_ref(), other.transformation.as_ref())
    }
}

/// One decoded single-band raster, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBand {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f64>,
    /// Declared nodata sentinel, rewritten to -999 in the landscape
    pub nodata: Option<f64>,
    pub georeference: Georeference,
}

impl RasterBand {
    /// In-memory band
    ///
    /// # Errors
    /// Returns [`FireModelError::Config`] if `data` does not hold
    /// `width * height` cells.
    pub fn new(width: u32, height: u32, data: Vec<f64>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(FireModelError::Config(format!(
                "band of {width}x{height} needs {expected} cells, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            nodata: None,
            georeference: Georeference::default(),
        })
    }

    #[must_use]
    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    #[must_use]
    pub fn with_georeference(mut self, georeference: Georeference) -> Self {
        self.georeference = georeference;
        self
    }

    /// Whether `value` is this band's declared nodata
    pub fn is_nodata(&self, value: f64) -> bool {
        match self.nodata {
            Some(nd) if nd.is_nan() => value.is_nan(),
            Some(nd) => value == nd,
            None => false,
        }
    }

    /// Decode the first image of a single-band `GeoTIFF`.
    ///
    /// # Errors
    /// Returns [`FireModelError::SourceNotFound`] if `path` is missing and
    /// [`FireModelError::SourceRead`] if it is not a readable single-band
    /// TIFF.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FireModelError::SourceNotFound(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|e| FireModelError::source_read(path, e))?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| FireModelError::source_read(path, e))?
            .with_limits(Limits::unlimited());

        let colortype = decoder
            .colortype()
            .map_err(|e| FireModelError::source_read(path, e))?;
        if !matches!(colortype, ColorType::Gray(_)) {
            return Err(FireModelError::source_read(
                path,
                format!("expected a single-band raster, found {colortype:?}"),
            ));
        }

        let (width, height) = decoder
            .dimensions()
            .map_err(|e| FireModelError::source_read(path, e))?;
        let nodata = read_ascii(&mut decoder, tags::GDAL_NODATA)
            .map_err(|e| FireModelError::source_read(path, e))?
            .and_then(|s| s.trim().trim_end_matches('\0').parse::<f64>().ok());
        let georeference =
            read_georeference(&mut decoder).map_err(|e| FireModelError::source_read(path, e))?;
        let image = decoder
            .read_image()
            .map_err(|e| FireModelError::source_read(path, e))?;
        let data = decoded_to_f64(image).ok_or_else(|| {
            FireModelError::source_read(path, "unsupported sample format")
        })?;

        let mut band = Self::new(width, height, data)
            .map_err(|e| FireModelError::source_read(path, e))?
            .with_georeference(georeference);
        band.nodata = nodata;
        Ok(band)
    }
}

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

fn read_f64s<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    code: u16,
) -> tiff::TiffResult<Option<Vec<f64>>> {
    decoder
        .find_tag(tag(code))?
        .map(tiff::decoder::ifd::Value::into_f64_vec)
        .transpose()
}

fn read_ascii<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    code: u16,
) -> tiff::TiffResult<Option<String>> {
    decoder
        .find_tag(tag(code))?
        .map(tiff::decoder::ifd::Value::into_string)
        .transpose()
}

fn read_georeference<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> tiff::TiffResult<Georeference> {
    Ok(Georeference {
        pixel_scale: read_f64s(decoder, tags::MODEL_PIXEL_SCALE)?,
        tiepoint: read_f64s(decoder, tags::MODEL_TIEPOINT)?,
        transformation: read_f64s(decoder, tags::MODEL_TRANSFORMATION)?,
        geo_keys: decoder.find_tag_unsigned_vec::<u16>(tag(tags::GEO_KEY_DIRECTORY))?,
        geo_doubles: read_f64s(decoder, tags::GEO_DOUBLE_PARAMS)?,
        geo_ascii: read_ascii(decoder, tags::GEO_ASCII_PARAMS)?,
    })
}

#[expect(
    clippy::cast_precision_loss,
    reason = "64-bit integer rasters are not used for landscape layers"
)]
fn decoded_to_f64(image: DecodingResult) -> Option<Vec<f64>> {
    #[allow(unreachable_patterns)]
    let data = match image {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        _ => return None,
    };
    Some(data)
}

/// Where a landscape band comes from
#[derive(Debug, Clone, PartialEq)]
pub enum BandSource {
    /// Single-band `GeoTIFF` on disk
    Path(PathBuf),
    /// Already decoded band
    Memory(RasterBand),
}

impl BandSource {
    pub(crate) fn path(&self) -> Option<&Path> {
        match self {
            BandSource::Path(p) => Some(p),
            BandSource::Memory(_) => None,
        }
    }

    pub(crate) fn load(self) -> Result<RasterBand> {
        match self {
            BandSource::Path(p) => RasterBand::read(p),
            BandSource::Memory(band) => Ok(band),
        }
    }
}

impl From<PathBuf> for BandSource {
    fn from(path: PathBuf) -> Self {
        BandSource::Path(path)
    }
}

impl From<&Path> for BandSource {
    fn from(path: &Path) -> Self {
        BandSource::Path(path.to_path_buf())
    }
}

impl From<&str> for BandSource {
    fn from(path: &str) -> Self {
        BandSource::Path(PathBuf::from(path))
    }
}

impl From<RasterBand> for BandSource {
    fn from(band: RasterBand) -> Self {
        BandSource::Memory(band)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names_in_order() {
        assert_eq!(
            BandRole::descriptions(),
            "elev,slope,aspect,fbfm,cnpy_cvr,cnpy_ht,cbh,cbd"
        );
    }

    #[test]
    fn test_new_checks_cell_count() {
        assert!(RasterBand::new(2, 2, vec![0.0; 4]).is_ok());
        assert!(RasterBand::new(2, 2, vec![0.0; 5]).is_err());
    }

    #[test]
    fn test_nan_nodata_matches_nan() {
        let band = RasterBand::new(1, 1, vec![f64::NAN]).unwrap().with_nodata(f64::NAN);
        assert!(band.is_nodata(f64::NAN));
        assert!(!band.is_nodata(0.0));
    }

    #[test]
    fn test_resolution_from_transformation() {
        let georef = Georeference {
            transformation: Some(vec![-30.0, 0.0, 0.0, 100.0]),
            ..Georeference::default()
        };
        assert_eq!(georef.resolution(), Some(30.0));
    }

    #[test]
    fn test_same_grid_ignores_missing_georeference() {
        let a = Georeference {
            pixel_scale: Some(vec![30.0, 30.0, 0.0]),
            ..Georeference::default()
        };
        let b = Georeference {
            pixel_scale: Some(vec![25.0, 25.0, 0.0]),
            ..Georeference::default()
        };
        assert!(a.same_grid(&Georeference::default()));
        assert!(!a.same_grid(&b));
    }

    #[test]
    fn test_missing_source() {
        let err = RasterBand::read("/nonexistent/elev.tif").unwrap_err();
        assert!(matches!(err, FireModelError::SourceNotFound(_)));
    }
}
