//! Landscape container codec
//!
//! Stacks the eight co-registered terrain and fuel rasters into the single
//! multiband `GeoTIFF` the simulators read as their landscape:
//!
//! - band order is fixed (see [`BandRole::ALL`])
//! - every cell is a signed 16-bit integer, nodata is unified to [`NODATA`]
//! - each band carries min/max/mean/std and a 256-bin histogram of its valid
//!   cells, band 1 also the list of all band names
//! - 128x128 tiles, Deflate with horizontal differencing, `BigTIFF` offsets
//!
//! All bands are held in memory for the duration of one write.

mod band;
mod reader;
pub mod stats;
mod tiff_writer;

pub use band::{BandRole, BandSource, Georeference, RasterBand};
pub use reader::{landscape_resolution, BandInfo, LandscapeInfo};
pub use stats::BandStats;

use crate::error::{FireModelError, Result};
use crate::helpers;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Shared nodata sentinel of every landscape band
pub const NODATA: i16 = -999;

/// Tile edge length in cells
pub const TILE_SIZE: usize = 128;

/// The eight band sources of a landscape, by role
#[derive(Debug, Clone, PartialEq)]
pub struct LandscapeSources {
    pub elevation: BandSource,
    pub slope: BandSource,
    pub aspect: BandSource,
    pub fuel_model: BandSource,
    pub canopy_cover: BandSource,
    pub canopy_height: BandSource,
    pub canopy_base_height: BandSource,
    pub canopy_bulk_density: BandSource,
}

impl LandscapeSources {
    /// Sources given in container order
    pub fn from_ordered<S: Into<BandSource>>(sources: [S; 8]) -> Self {
        let [elevation, slope, aspect, fuel_model, canopy_cover, canopy_height, canopy_base_height, canopy_bulk_density] =
            sources.map(Into::<BandSource>::into);
        Self {
            elevation,
            slope,
            aspect,
            fuel_model,
            canopy_cover,
            canopy_height,
            canopy_base_height,
            canopy_bulk_density,
        }
    }

    /// `(role, source)` pairs in container order
    pub fn into_ordered(self) -> [(BandRole, BandSource); 8] {
        [
            (BandRole::Elevation, self.elevation),
            (BandRole::Slope, self.slope),
            (BandRole::Aspect, self.aspect),
            (BandRole::FuelModel, self.fuel_model),
            (BandRole::CanopyCover, self.canopy_cover),
            (BandRole::CanopyHeight, self.canopy_height),
            (BandRole::CanopyBaseHeight, self.canopy_base_height),
            (BandRole::CanopyBulkDensity, self.canopy_bulk_density),
        ]
    }
}

/// What [`build_landscape`] wrote
#[derive(Debug, Clone)]
pub struct LandscapeSummary {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bands: Vec<(BandRole, BandStats)>,
}

fn grid(band: &RasterBand) -> String {
    match band.georeference.resolution() {
        Some(res) => format!("{}x{} cells at {res}", band.width, band.height),
        None => format!("{}x{} cells", band.width, band.height),
    }
}

/// Rewrite NaN and declared nodata to [`NODATA`] and convert to 16-bit cells.
///
/// Values outside the `i16` range saturate; keeping sources in range is the
/// caller's job.
#[expect(
    clippy::cast_possible_truncation,
    reason = "landscape layers are 16-bit by definition"
)]
pub fn encode_cells(band: &RasterBand) -> Vec<i16> {
    band.data
        .par_iter()
        .map(|&v| {
            if v.is_nan() || band.is_nodata(v) {
                NODATA
            } else {
                v as i16
            }
        })
        .collect()
}

/// Build the landscape container at `out_path` from `sources`.
///
/// Any file already at `out_path` is deleted first. A failed write removes
/// what was written.
///
/// # Errors
/// - [`FireModelError::SourceNotFound`] if a source path does not exist;
///   nothing is read or deleted in that case
/// - [`FireModelError::SourceRead`] if a source cannot be decoded
/// - [`FireModelError::ShapeMismatch`] if a band's grid differs from the
///   elevation band; no file is written
/// - [`FireModelError::WriteError`] if the container cannot be written
pub fn build_landscape(
    sources: LandscapeSources,
    out_path: impl AsRef<Path>,
) -> Result<LandscapeSummary> {
    let out_path = out_path.as_ref();
    let sources = sources.into_ordered();

    for (_, source) in &sources {
        if let Some(path) = source.path() {
            if !path.exists() {
                return Err(FireModelError::SourceNotFound(path.to_path_buf()));
            }
        }
    }

    helpers::remove_existing(out_path)?;
    info!("Building landscape {}", out_path.display());

    let bands: Vec<(BandRole, RasterBand)> = sources
        .into_iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(role, source)| source.load().map(|band| (role, band)))
        .collect::<Result<_>>()?;

    let reference = &bands[0].1;
    for (role, band) in &bands[1..] {
        if band.width != reference.width
            || band.height != reference.height
            || !band.georeference.same_grid(&reference.georeference)
        {
            return Err(FireModelError::ShapeMismatch {
                band: role.name(),
                expected: grid(reference),
                found: grid(band),
            });
        }
    }

    let cells: Vec<Vec<i16>> = bands.iter().map(|(_, band)| encode_cells(band)).collect();
    let band_stats: Vec<BandStats> = cells.iter().map(|c| stats::compute(c)).collect();
    for ((role, _), s) in bands.iter().zip(&band_stats) {
        debug!(
            "{role}: min {} max {} mean {:.3} std {:.3} ({} valid cells)",
            s.min, s.max, s.mean, s.std, s.valid_cells
        );
    }

    let image = tiff_writer::LandscapeImage {
        width: reference.width,
        height: reference.height,
        bands: &cells,
        stats: &band_stats,
        georeference: &reference.georeference,
    };
    if let Err(e) = tiff_writer::write(out_path, &image) {
        let _ = helpers::remove_existing(out_path);
        return Err(FireModelError::write(out_path, e));
    }

    let path = std::path::absolute(out_path).map_err(|e| FireModelError::write(out_path, e))?;
    info!(
        "Landscape complete: {}x{} cells, {} bands, {}",
        reference.width,
        reference.height,
        bands.len(),
        path.display()
    );

    Ok(LandscapeSummary {
        path,
        width: reference.width,
        height: reference.height,
        bands: bands
            .iter()
            .map(|(role, _)| *role)
            .zip(band_stats)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(width: u32, height: u32, value: f64) -> RasterBand {
        RasterBand::new(width, height, vec![value; (width * height) as usize]).unwrap()
    }

    fn sources(bands: [RasterBand; 8]) -> LandscapeSources {
        LandscapeSources::from_ordered(bands)
    }

    #[test]
    fn test_encode_cells_unifies_nodata() {
        let band = RasterBand::new(4, 1, vec![-9999.0, 1.4, 2.0, 40000.0])
            .unwrap()
            .with_nodata(-9999.0);
        assert_eq!(encode_cells(&band), [NODATA, 1, 2, i16::MAX]);
    }

    #[test]
    fn test_undeclared_nodata_passes_through() {
        let band = RasterBand::new(3, 1, vec![-9999.0, 5.0, -40000.0]).unwrap();
        assert_eq!(encode_cells(&band), [-9999, 5, i16::MIN]);
    }

    #[test]
    fn test_nan_cells_become_nodata() {
        let band = RasterBand::new(2, 1, vec![f64::NAN, 5.0]).unwrap();
        let cells = encode_cells(&band);
        assert_eq!(cells, [NODATA, 5]);

        let stats = stats::compute(&cells);
        assert_eq!(stats.valid_cells, 1);
        assert_eq!(stats.min, 5.0);
    }

    #[test]
    fn test_in_memory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("lcp.tif");
        let bands = std::array::from_fn(|i| band(130, 3, f64::from(i as u8) * 10.0));

        let summary = build_landscape(sources(bands), &out).unwrap();
        assert_eq!(summary.bands.len(), 8);

        let info = LandscapeInfo::open(&out).unwrap();
        assert_eq!((info.width, info.height, info.band_count), (130, 3, 8));
        assert_eq!(info.nodata, Some(-999.0));
        assert_eq!(info.bands[3].name, "fbfm");
        let slope = info.read_band(1).unwrap();
        assert_eq!(slope.len(), 390);
        assert!(slope.iter().all(|&v| v == 10));
    }

    #[test]
    fn test_size_mismatch_names_band() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("lcp.tif");
        let mut bands: [RasterBand; 8] = std::array::from_fn(|_| band(4, 4, 1.0));
        bands[2] = band(4, 5, 1.0);

        let err = build_landscape(sources(bands), &out).unwrap_err();
        assert!(matches!(err, FireModelError::ShapeMismatch { band: "aspect", .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_source_leaves_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("lcp.tif");
        std::fs::write(&out, "old").unwrap();

        let mut list: Vec<BandSource> = (0..8).map(|_| band(2, 2, 0.0).into()).collect();
        list[5] = BandSource::from(dir.path().join("missing.tif"));
        let arr: [BandSource; 8] = list.try_into().unwrap();

        let err = build_landscape(LandscapeSources::from_ordered(arr), &out).unwrap_err();
        assert!(matches!(err, FireModelError::SourceNotFound(_)));
        assert!(out.exists());
    }
}
