//! Tiled `BigTIFF` writer for the landscape container
//!
//! Writes one image of eight signed 16-bit planes, 128x128 tiles, Adobe
//! Deflate with horizontal differencing. Tiles are ordered plane-major
//! (all tiles of band 1, then band 2, ...). The `tiff` crate's encoder only
//! writes strips, so the container is laid out by hand here.

use super::band::{tags, Georeference};
use super::stats::BandStats;
use super::{BandRole, NODATA, TILE_SIZE};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rayon::prelude::*;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

pub(crate) const BIGTIFF_VERSION: u16 = 43;
pub(crate) const COMPRESSION_ADOBE_DEFLATE: u16 = 8;
pub(crate) const PREDICTOR_HORIZONTAL: u16 = 2;
pub(crate) const PLANAR_SEPARATE: u16 = 2;
pub(crate) const SAMPLE_FORMAT_INT: u16 = 2;

mod field_type {
    pub const ASCII: u16 = 2;
    pub const SHORT: u16 = 3;
    pub const LONG: u16 = 4;
    pub const DOUBLE: u16 = 12;
    pub const LONG8: u16 = 16;
}

mod baseline {
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const PHOTOMETRIC: u16 = 262;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const PLANAR_CONFIGURATION: u16 = 284;
    pub const PREDICTOR: u16 = 317;
    pub const TILE_WIDTH: u16 = 322;
    pub const TILE_LENGTH: u16 = 323;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;
    pub const EXTRA_SAMPLES: u16 = 338;
    pub const SAMPLE_FORMAT: u16 = 339;
}

pub(crate) use baseline::*;

enum TagValue {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Long8(Vec<u64>),
    Double(Vec<f64>),
    Ascii(String),
}

impl TagValue {
    fn field_type(&self) -> u16 {
        match self {
            TagValue::Short(_) => field_type::SHORT,
            TagValue::Long(_) => field_type::LONG,
            TagValue::Long8(_) => field_type::LONG8,
            TagValue::Double(_) => field_type::DOUBLE,
            TagValue::Ascii(_) => field_type::ASCII,
        }
    }

    fn count(&self) -> u64 {
        let n = match self {
            TagValue::Short(v) => v.len(),
            TagValue::Long(v) => v.len(),
            TagValue::Long8(v) => v.len(),
            TagValue::Double(v) => v.len(),
            TagValue::Ascii(s) => s.len() + 1,
        };
        n as u64
    }

    fn bytes(&self) -> Vec<u8> {
        match self {
            TagValue::Short(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Long(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Long8(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Double(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Ascii(s) => {
                let mut b = s.as_bytes().to_vec();
                b.push(0);
                b
            }
        }
    }
}

/// Grid and content of one container
pub(crate) struct LandscapeImage<'a> {
    pub width: u32,
    pub height: u32,
    pub bands: &'a [Vec<i16>],
    pub stats: &'a [BandStats],
    pub georeference: &'a Georeference,
}

impl LandscapeImage<'_> {
    fn tiles_across(&self) -> usize {
        (self.width as usize).div_ceil(TILE_SIZE)
    }

    fn tiles_down(&self) -> usize {
        (self.height as usize).div_ceil(TILE_SIZE)
    }

    /// Raw tile of `band`, padded with nodata past the raster edge
    fn tile(&self, band: usize, tile_row: usize, tile_col: usize) -> Vec<i16> {
        let width = self.width as usize;
        let height = self.height as usize;
        let data = &self.bands[band];
        let mut tile = vec![NODATA; TILE_SIZE * TILE_SIZE];

        let x0 = tile_col * TILE_SIZE;
        let y0 = tile_row * TILE_SIZE;
        let cols = TILE_SIZE.min(width - x0);
        for r in 0..TILE_SIZE.min(height - y0) {
            let src = (y0 + r) * width + x0;
            tile[r * TILE_SIZE..r * TILE_SIZE + cols].copy_from_slice(&data[src..src + cols]);
        }
        tile
    }
}

/// Horizontal differencing, row by row, with wrapping arithmetic
pub(crate) fn apply_predictor(tile: &mut [i16]) {
    for row in tile.chunks_exact_mut(TILE_SIZE) {
        for i in (1..row.len()).rev() {
            row[i] = row[i].wrapping_sub(row[i - 1]);
        }
    }
}

fn compress_tile(mut tile: Vec<i16>) -> io::Result<Vec<u8>> {
    apply_predictor(&mut tile);
    let raw: Vec<u8> = tile.iter().flat_map(|v| v.to_le_bytes()).collect();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&raw)?;
    encoder.finish()
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn number(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else {
        v.to_string()
    }
}

/// GDAL metadata document: band names, statistics and histograms
pub(crate) fn gdal_metadata(stats: &[BandStats]) -> String {
    let mut xml = String::from("<GDALMetadata>\n");
    let _ = writeln!(
        xml,
        "  <Item name=\"DESCRIPTIONS\" sample=\"0\">{}</Item>",
        xml_escape(&BandRole::descriptions())
    );
    for (sample, (role, s)) in BandRole::ALL.iter().zip(stats).enumerate() {
        let items = [
            ("min", number(s.min)),
            ("max", number(s.max)),
            ("mean", number(s.mean)),
            ("std", number(s.std)),
            ("histogram", s.histogram_string()),
        ];
        for (name, value) in items {
            let _ = writeln!(
                xml,
                "  <Item name=\"{name}\" sample=\"{sample}\">{}</Item>",
                xml_escape(&value)
            );
        }
        let _ = writeln!(
            xml,
            "  <Item name=\"DESCRIPTION\" sample=\"{sample}\" role=\"description\">{}</Item>",
            xml_escape(role.name())
        );
    }
    xml.push_str("</GDALMetadata>");
    xml
}

fn pad_to_even<W: Write + Seek>(out: &mut W) -> io::Result<u64> {
    let pos = out.stream_position()?;
    if pos % 2 == 1 {
        out.write_all(&[0])?;
        return Ok(pos + 1);
    }
    Ok(pos)
}

/// Write `image` to a new file at `path`
pub(crate) fn write(path: &Path, image: &LandscapeImage<'_>) -> io::Result<()> {
    let band_count = image.bands.len();
    let tiles_per_band = image.tiles_across() * image.tiles_down();

    let tiles: Vec<Vec<u8>> = (0..band_count * tiles_per_band)
        .into_par_iter()
        .map(|i| {
            let band = i / tiles_per_band;
            let t = i % tiles_per_band;
            compress_tile(image.tile(band, t / image.tiles_across(), t % image.tiles_across()))
        })
        .collect::<io::Result<_>>()?;

    let mut out = BufWriter::new(File::create(path)?);

    // Header, IFD offset patched at the end
    out.write_all(b"II")?;
    out.write_all(&BIGTIFF_VERSION.to_le_bytes())?;
    out.write_all(&8u16.to_le_bytes())?;
    out.write_all(&0u16.to_le_bytes())?;
    out.write_all(&0u64.to_le_bytes())?;

    let mut offsets = Vec::with_capacity(tiles.len());
    let mut byte_counts = Vec::with_capacity(tiles.len());
    for tile in &tiles {
        offsets.push(pad_to_even(&mut out)?);
        byte_counts.push(tile.len() as u64);
        out.write_all(tile)?;
    }

    let samples = u16::try_from(band_count)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many bands"))?;
    #[expect(clippy::cast_possible_truncation, reason = "TILE_SIZE is 128")]
    let tile_size = TILE_SIZE as u32;

    let mut entries = vec![
        (IMAGE_WIDTH, TagValue::Long(vec![image.width])),
        (IMAGE_LENGTH, TagValue::Long(vec![image.height])),
        (BITS_PER_SAMPLE, TagValue::Short(vec![16; band_count])),
        (COMPRESSION, TagValue::Short(vec![COMPRESSION_ADOBE_DEFLATE])),
        (PHOTOMETRIC, TagValue::Short(vec![1])),
        (SAMPLES_PER_PIXEL, TagValue::Short(vec![samples])),
        (PLANAR_CONFIGURATION, TagValue::Short(vec![PLANAR_SEPARATE])),
        (PREDICTOR, TagValue::Short(vec![PREDICTOR_HORIZONTAL])),
        (TILE_WIDTH, TagValue::Long(vec![tile_size])),
        (TILE_LENGTH, TagValue::Long(vec![tile_size])),
        (TILE_OFFSETS, TagValue::Long8(offsets)),
        (TILE_BYTE_COUNTS, TagValue::Long8(byte_counts)),
        (EXTRA_SAMPLES, TagValue::Short(vec![0; band_count.saturating_sub(1)])),
        (SAMPLE_FORMAT, TagValue::Short(vec![SAMPLE_FORMAT_INT; band_count])),
        (tags::GDAL_METADATA, TagValue::Ascii(gdal_metadata(image.stats))),
        (tags::GDAL_NODATA, TagValue::Ascii(NODATA.to_string())),
    ];
    let georef = image.georeference;
    if let Some(v) = &georef.pixel_scale {
        entries.push((tags::MODEL_PIXEL_SCALE, TagValue::Double(v.clone())));
    }
    if let Some(v) = &georef.tiepoint {
        entries.push((tags::MODEL_TIEPOINT, TagValue::Double(v.clone())));
    }
    if let Some(v) = &georef.transformation {
        entries.push((tags::MODEL_TRANSFORMATION, TagValue::Double(v.clone())));
    }
    if let Some(v) = &georef.geo_keys {
        entries.push((tags::GEO_KEY_DIRECTORY, TagValue::Short(v.clone())));
    }
    if let Some(v) = &georef.geo_doubles {
        entries.push((tags::GEO_DOUBLE_PARAMS, TagValue::Double(v.clone())));
    }
    if let Some(v) = &georef.geo_ascii {
        entries.push((tags::GEO_ASCII_PARAMS, TagValue::Ascii(v.clone())));
    }
    entries.retain(|(_, v)| v.count() > 0);
    entries.sort_by_key(|(tag, _)| *tag);

    // Values that do not fit the 8-byte entry slot go before the IFD
    let mut encoded = Vec::with_capacity(entries.len());
    for (tag, value) in &entries {
        let bytes = value.bytes();
        let slot = if bytes.len() > 8 {
            let offset = pad_to_even(&mut out)?;
            out.write_all(&bytes)?;
            offset.to_le_bytes()
        } else {
            let mut inline = [0u8; 8];
            inline[..bytes.len()].copy_from_slice(&bytes);
            inline
        };
        encoded.push((*tag, value.field_type(), value.count(), slot));
    }

    let ifd_offset = pad_to_even(&mut out)?;
    out.write_all(&(encoded.len() as u64).to_le_bytes())?;
    for (tag, field_type, count, slot) in encoded {
        out.write_all(&tag.to_le_bytes())?;
        out.write_all(&field_type.to_le_bytes())?;
        out.write_all(&count.to_le_bytes())?;
        out.write_all(&slot)?;
    }
    out.write_all(&0u64.to_le_bytes())?;

    out.seek(SeekFrom::Start(8))?;
    out.write_all(&ifd_offset.to_le_bytes())?;
    out.flush()?;
    out.into_inner().map_err(io::IntoInnerError::into_error)?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predictor_wraps() {
        let mut tile = vec![0i16; TILE_SIZE * TILE_SIZE];
        tile[0] = i16::MIN;
        tile[1] = i16::MAX;
        tile[2] = i16::MAX;
        apply_predictor(&mut tile);
        assert_eq!(tile[1], -1);
        assert_eq!(tile[2], 0);
        assert_eq!(tile[3], -i16::MAX);
    }

    #[test]
    fn test_metadata_lists_every_band() {
        let stats = vec![BandStats::empty(); 8];
        let xml = gdal_metadata(&stats);
        assert!(xml.contains(
            "<Item name=\"DESCRIPTIONS\" sample=\"0\">elev,slope,aspect,fbfm,cnpy_cvr,cnpy_ht,cbh,cbd</Item>"
        ));
        assert!(xml.contains("<Item name=\"DESCRIPTION\" sample=\"7\" role=\"description\">cbd</Item>"));
        assert!(xml.contains("<Item name=\"mean\" sample=\"3\">nan</Item>"));
    }

    #[test]
    fn test_edge_tile_is_padded() {
        let bands = vec![vec![5i16; 3 * 2]];
        let stats = vec![BandStats::empty()];
        let georeference = Georeference::default();
        let image = LandscapeImage {
            width: 3,
            height: 2,
            bands: &bands,
            stats: &stats,
            georeference: &georeference,
        };
        let tile = image.tile(0, 0, 0);
        assert_eq!(&tile[..3], &[5, 5, 5]);
        assert_eq!(tile[3], NODATA);
        assert_eq!(tile[TILE_SIZE + 2], 5);
        assert_eq!(tile[2 * TILE_SIZE], NODATA);
    }
}
