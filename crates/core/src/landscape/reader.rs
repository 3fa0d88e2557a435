//! Read-back of landscape containers written by this crate
//!
//! Only the layout produced by [`super::tiff_writer`] is understood:
//! little-endian `BigTIFF`, one image, separate planes, signed 16-bit tiles
//! compressed with Deflate and horizontal differencing.

use super::band::{tags, Georeference};
use super::stats::BandStats;
use super::tiff_writer::{
    BITS_PER_SAMPLE, BIGTIFF_VERSION, COMPRESSION, COMPRESSION_ADOBE_DEFLATE, IMAGE_LENGTH,
    IMAGE_WIDTH, PLANAR_CONFIGURATION, PLANAR_SEPARATE, PREDICTOR, PREDICTOR_HORIZONTAL,
    SAMPLES_PER_PIXEL, SAMPLE_FORMAT, TILE_BYTE_COUNTS, TILE_LENGTH, TILE_OFFSETS, TILE_WIDTH,
};
use crate::error::{FireModelError, Result};
use flate2::read::ZlibDecoder;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Metadata of one band as stored in the container
#[derive(Debug, Clone, PartialEq)]
pub struct BandInfo {
    pub name: String,
    pub stats: BandStats,
}

/// Structure and metadata of a landscape container
#[derive(Debug, Clone)]
pub struct LandscapeInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub band_count: usize,
    pub bits_per_sample: Vec<u16>,
    pub sample_format: Vec<u16>,
    pub tile_width: u32,
    pub tile_height: u32,
    pub compression: u16,
    pub predictor: u16,
    pub nodata: Option<f64>,
    /// Combined band name list stored with band 1
    pub descriptions: Option<String>,
    pub bands: Vec<BandInfo>,
    pub georeference: Georeference,
    tile_offsets: Vec<u64>,
    tile_byte_counts: Vec<u64>,
}

struct RawEntry {
    field_type: u16,
    data: Vec<u8>,
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

fn type_size(field_type: u16) -> io::Result<u64> {
    match field_type {
        1 | 2 | 6 | 7 => Ok(1),
        3 | 8 => Ok(2),
        4 | 9 | 11 => Ok(4),
        5 | 10 | 12 | 16 | 17 => Ok(8),
        other => Err(invalid(format!("unsupported field type {other}"))),
    }
}

fn read_u16<R: Read>(r: &mut R) -> io::Result<u16> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)?;
    Ok(u16::from_le_bytes(b))
}

fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(u64::from_le_bytes(b))
}

fn read_ifd<R: Read + Seek>(r: &mut R) -> io::Result<FxHashMap<u16, RawEntry>> {
    let mut magic = [0u8; 2];
    r.read_exact(&mut magic)?;
    if &magic != b"II" || read_u16(r)? != BIGTIFF_VERSION {
        return Err(invalid("not a little-endian BigTIFF"));
    }
    if read_u16(r)? != 8 || read_u16(r)? != 0 {
        return Err(invalid("unexpected BigTIFF offset size"));
    }
    let ifd_offset = read_u64(r)?;
    r.seek(SeekFrom::Start(ifd_offset))?;

    let count = read_u64(r)?;
    let mut raw = Vec::new();
    for _ in 0..count {
        let tag = read_u16(r)?;
        let field_type = read_u16(r)?;
        let n = read_u64(r)?;
        let mut slot = [0u8; 8];
        r.read_exact(&mut slot)?;
        raw.push((tag, field_type, n, slot));
    }

    let mut entries = FxHashMap::default();
    for (tag, field_type, count, slot) in raw {
        let len = type_size(field_type)? * count;
        let data = if len <= 8 {
            slot[..usize::try_from(len).map_err(|_| invalid("entry too large"))?].to_vec()
        } else {
            r.seek(SeekFrom::Start(u64::from_le_bytes(slot)))?;
            let mut data = vec![0u8; usize::try_from(len).map_err(|_| invalid("entry too large"))?];
            r.read_exact(&mut data)?;
            data
        };
        entries.insert(
            tag,
            RawEntry { field_type, data },
        );
    }
    Ok(entries)
}

impl RawEntry {
    fn unsigned(&self) -> io::Result<Vec<u64>> {
        let values = match self.field_type {
            3 => self
                .data
                .chunks_exact(2)
                .map(|c| u64::from(u16::from_le_bytes([c[0], c[1]])))
                .collect(),
            4 => self
                .data
                .chunks_exact(4)
                .map(|c| u64::from(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
            16 => self
                .data
                .chunks_exact(8)
                .map(|c| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(c);
                    u64::from_le_bytes(b)
                })
                .collect(),
            other => return Err(invalid(format!("field type {other} is not unsigned"))),
        };
        Ok(values)
    }

    fn doubles(&self) -> io::Result<Vec<f64>> {
        if self.field_type != 12 {
            return Err(invalid("expected DOUBLE values"));
        }
        Ok(self
            .data
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                f64::from_le_bytes(b)
            })
            .collect())
    }

    fn ascii(&self) -> String {
        String::from_utf8_lossy(&self.data)
            .trim_end_matches('\0')
            .to_string()
    }
}

fn scalar(entries: &FxHashMap<u16, RawEntry>, tag: u16) -> io::Result<u64> {
    entries
        .get(&tag)
        .ok_or_else(|| invalid(format!("missing tag {tag}")))?
        .unsigned()?
        .first()
        .copied()
        .ok_or_else(|| invalid(format!("empty tag {tag}")))
}

fn shorts(entries: &FxHashMap<u16, RawEntry>, tag: u16) -> io::Result<Vec<u16>> {
    match entries.get(&tag) {
        Some(e) => e
            .unsigned()?
            .into_iter()
            .map(|v| u16::try_from(v).map_err(|_| invalid("SHORT out of range")))
            .collect(),
        None => Ok(Vec::new()),
    }
}

fn to_u32(v: u64) -> io::Result<u32> {
    u32::try_from(v).map_err(|_| invalid("value exceeds 32 bits"))
}

fn xml_unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let key = format!("{name}=\"");
    let start = tag.find(&key)? + key.len();
    let len = tag[start..].find('"')?;
    Some(&tag[start..start + len])
}

/// `(name, sample, value)` for every `<Item>` in a GDAL metadata document
fn metadata_items(xml: &str) -> Vec<(String, usize, String)> {
    let mut items = Vec::new();
    let mut rest = xml;
    while let Some(open) = rest.find("<Item ") {
        rest = &rest[open..];
        let Some(gt) = rest.find('>') else { break };
        let Some(close) = rest.find("</Item>") else { break };
        if close < gt {
            break;
        }
        let head = &rest[..gt];
        if let (Some(name), Some(sample)) = (
            attribute(head, "name"),
            attribute(head, "sample").and_then(|s| s.parse().ok()),
        ) {
            items.push((name.to_string(), sample, xml_unescape(&rest[gt + 1..close])));
        }
        rest = &rest[close + "</Item>".len()..];
    }
    items
}

fn parse_number(text: &str) -> f64 {
    text.trim().parse().unwrap_or(f64::NAN)
}

impl LandscapeInfo {
    /// Read the structure and metadata of a container.
    ///
    /// # Errors
    /// Returns [`FireModelError::SourceNotFound`] if `path` is missing and
    /// [`FireModelError::SourceRead`] if it is not a container written by
    /// [`super::build_landscape`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FireModelError::SourceNotFound(path.to_path_buf()));
        }
        Self::parse(path).map_err(|e| FireModelError::source_read(path, e))
    }

    fn parse(path: &Path) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let entries = read_ifd(&mut reader)?;

        let band_count = usize::try_from(scalar(&entries, SAMPLES_PER_PIXEL)?)
            .map_err(|_| invalid("band count"))?;
        let planar = scalar(&entries, PLANAR_CONFIGURATION)?;
        if band_count > 1 && planar != u64::from(PLANAR_SEPARATE) {
            return Err(invalid("only separate planes are supported"));
        }

        let georeference = Georeference {
            pixel_scale: entries
                .get(&tags::MODEL_PIXEL_SCALE)
                .map(RawEntry::doubles)
                .transpose()?,
            tiepoint: entries
                .get(&tags::MODEL_TIEPOINT)
                .map(RawEntry::doubles)
                .transpose()?,
            transformation: entries
                .get(&tags::MODEL_TRANSFORMATION)
                .map(RawEntry::doubles)
                .transpose()?,
            geo_keys: entries
                .contains_key(&tags::GEO_KEY_DIRECTORY)
                .then(|| shorts(&entries, tags::GEO_KEY_DIRECTORY))
                .transpose()?,
            geo_doubles: entries
                .get(&tags::GEO_DOUBLE_PARAMS)
                .map(RawEntry::doubles)
                .transpose()?,
            geo_ascii: entries.get(&tags::GEO_ASCII_PARAMS).map(RawEntry::ascii),
        };

        let mut bands: Vec<BandInfo> = (0..band_count)
            .map(|_| BandInfo {
                name: String::new(),
                stats: BandStats::empty(),
            })
            .collect();
        let mut descriptions = None;
        if let Some(xml) = entries.get(&tags::GDAL_METADATA).map(RawEntry::ascii) {
            for (name, sample, value) in metadata_items(&xml) {
                if name == "DESCRIPTIONS" {
                    descriptions = Some(value);
                    continue;
                }
                let Some(band) = bands.get_mut(sample) else {
                    continue;
                };
                match name.as_str() {
                    "DESCRIPTION" => band.name = value,
                    "min" => band.stats.min = parse_number(&value),
                    "max" => band.stats.max = parse_number(&value),
                    "mean" => band.stats.mean = parse_number(&value),
                    "std" => band.stats.std = parse_number(&value),
                    "histogram" => {
                        band.stats.histogram = value
                            .split(',')
                            .filter_map(|c| c.trim().parse().ok())
                            .collect();
                        band.stats.valid_cells =
                            usize::try_from(band.stats.histogram.iter().sum::<u64>())
                                .unwrap_or(usize::MAX);
                    }
                    _ => {}
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            width: to_u32(scalar(&entries, IMAGE_WIDTH)?)?,
            height: to_u32(scalar(&entries, IMAGE_LENGTH)?)?,
            band_count,
            bits_per_sample: shorts(&entries, BITS_PER_SAMPLE)?,
            sample_format: shorts(&entries, SAMPLE_FORMAT)?,
            tile_width: to_u32(scalar(&entries, TILE_WIDTH)?)?,
            tile_height: to_u32(scalar(&entries, TILE_LENGTH)?)?,
            compression: u16::try_from(scalar(&entries, COMPRESSION)?)
                .map_err(|_| invalid("compression"))?,
            predictor: entries
                .contains_key(&PREDICTOR)
                .then(|| scalar(&entries, PREDICTOR))
                .transpose()?
                .map_or(Ok(1), u16::try_from)
                .map_err(|_| invalid("predictor"))?,
            nodata: entries
                .get(&tags::GDAL_NODATA)
                .and_then(|e| e.ascii().trim().parse().ok()),
            descriptions,
            bands,
            georeference,
            tile_offsets: entries
                .get(&TILE_OFFSETS)
                .ok_or_else(|| invalid("missing tile offsets"))?
                .unsigned()?,
            tile_byte_counts: entries
                .get(&TILE_BYTE_COUNTS)
                .ok_or_else(|| invalid("missing tile byte counts"))?
                .unsigned()?,
        })
    }

    /// Pixel size along X
    pub fn resolution(&self) -> Option<f64> {
        self.georeference.resolution()
    }

    /// Decode band `index` (zero based) to row-major cells.
    ///
    /// # Errors
    /// Returns [`FireModelError::SourceRead`] if the index is out of range or
    /// a tile cannot be decoded.
    pub fn read_band(&self, index: usize) -> Result<Vec<i16>> {
        self.decode_band(index)
            .map_err(|e| FireModelError::source_read(&self.path, e))
    }

    fn decode_band(&self, index: usize) -> io::Result<Vec<i16>> {
        if index >= self.band_count {
            return Err(invalid(format!(
                "band {index} out of range, container has {}",
                self.band_count
            )));
        }
        if self.compression != COMPRESSION_ADOBE_DEFLATE {
            return Err(invalid(format!("unsupported compression {}", self.compression)));
        }

        let width = self.width as usize;
        let height = self.height as usize;
        let tw = self.tile_width as usize;
        let th = self.tile_height as usize;
        let across = width.div_ceil(tw);
        let down = height.div_ceil(th);
        let per_band = across * down;
        if self.tile_offsets.len() < per_band * self.band_count
            || self.tile_byte_counts.len() < per_band * self.band_count
        {
            return Err(invalid("tile table shorter than the image"));
        }

        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut cells = vec![0i16; width * height];
        for t in 0..per_band {
            let i = index * per_band + t;
            reader.seek(SeekFrom::Start(self.tile_offsets[i]))?;
            let len = usize::try_from(self.tile_byte_counts[i])
                .map_err(|_| invalid("tile too large"))?;
            let mut compressed = vec![0u8; len];
            reader.read_exact(&mut compressed)?;

            let mut raw = Vec::with_capacity(tw * th * 2);
            ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut raw)?;
            if raw.len() != tw * th * 2 {
                return Err(invalid(format!("tile {i} decodes to {} bytes", raw.len())));
            }
            let mut tile: Vec<i16> = raw
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect();
            if self.predictor == PREDICTOR_HORIZONTAL {
                for row in tile.chunks_exact_mut(tw) {
                    for x in 1..row.len() {
                        row[x] = row[x].wrapping_add(row[x - 1]);
                    }
                }
            }

            let x0 = (t % across) * tw;
            let y0 = (t / across) * th;
            let cols = tw.min(width - x0);
            for r in 0..th.min(height - y0) {
                let dst = (y0 + r) * width + x0;
                cells[dst..dst + cols].copy_from_slice(&tile[r * tw..r * tw + cols]);
            }
        }
        Ok(cells)
    }
}

/// Pixel size of a landscape container, as used for `MTT_RESOLUTION`.
///
/// # Errors
/// Returns [`FireModelError::SourceRead`] when the container carries no
/// georeferencing.
pub fn landscape_resolution(path: impl AsRef<Path>) -> Result<f64> {
    let info = LandscapeInfo::open(path)?;
    info.resolution()
        .ok_or_else(|| FireModelError::source_read(&info.path, "no pixel size in georeferencing"))
}
