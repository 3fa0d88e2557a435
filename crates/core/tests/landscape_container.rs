//! Landscape container built from single-band `GeoTIFF` sources on disk
//!
//! Sources are authored with the `tiff` encoder (Float32, `GeoTIFF` pixel scale
//! and tie point, GDAL nodata tag), stacked, and read back.

use approx::assert_relative_eq;
use fire_model_core::landscape::{landscape_resolution, LandscapeInfo, LandscapeSources};
use fire_model_core::{build_landscape, FireModelError, NODATA};
use std::fs::File;
use std::path::{Path, PathBuf};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const WIDTH: u32 = 150;
const HEIGHT: u32 = 140;
const NAMES: [&str; 8] = [
    "elev", "slope", "aspect", "fbfm", "cnpy_cvr", "cnpy_ht", "cbh", "cbd",
];

fn write_source(path: &Path, width: u32, height: u32, data: &[f32], nodata: Option<&str>) {
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder
        .new_image::<colortype::Gray32Float>(width, height)
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(33550), &[30.0f64, 30.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::from_u16_exhaustive(33922),
            &[0.0f64, 0.0, 0.0, 500_000.0, 5_600_000.0, 0.0][..],
        )
        .unwrap();
    if let Some(nodata) = nodata {
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(42113), nodata)
            .unwrap();
    }
    image.write_data(data).unwrap();
}

/// Elevation ramp with a nodata block in the top-left corner; every other
/// band is constant `band index * 10`.
#[allow(clippy::cast_precision_loss)]
fn elevation_cells(width: u32, height: u32) -> Vec<f32> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            if x < 10 && y < 10 {
                -9999.0
            } else {
                (100 + x + y) as f32
            }
        })
        .collect()
}

fn write_sources(dir: &Path, elevation_height: u32, slope_height: u32) -> [PathBuf; 8] {
    std::array::from_fn(|i| {
        let path = dir.join(format!("{}.tif", NAMES[i]));
        match i {
            0 => write_source(
                &path,
                WIDTH,
                elevation_height,
                &elevation_cells(WIDTH, elevation_height),
                Some("-9999"),
            ),
            _ => {
                let height = if i == 1 { slope_height } else { elevation_height };
                #[allow(clippy::cast_precision_loss)]
                let value = (i * 10) as f32;
                write_source(
                    &path,
                    WIDTH,
                    height,
                    &vec![value; (WIDTH * height) as usize],
                    None,
                );
            }
        }
        path
    })
}

#[test]
fn test_eight_band_container() {
    let dir = tempfile::tempdir().unwrap();
    let sources = write_sources(dir.path(), HEIGHT, HEIGHT);
    let out = dir.path().join("landscape.tif");

    let summary = build_landscape(LandscapeSources::from_ordered(sources), &out).unwrap();
    assert!(summary.path.is_absolute());

    let info = LandscapeInfo::open(&out).unwrap();
    assert_eq!((info.width, info.height), (WIDTH, HEIGHT));
    assert_eq!(info.band_count, 8);
    assert_eq!(info.bits_per_sample, vec![16; 8]);
    assert_eq!(info.sample_format, vec![2; 8]);
    assert_eq!((info.tile_width, info.tile_height), (128, 128));
    assert_eq!(info.compression, 8);
    assert_eq!(info.predictor, 2);
    assert_eq!(info.nodata, Some(-999.0));
    assert_eq!(info.descriptions.as_deref(), Some(NAMES.join(",").as_str()));
    let names: Vec<&str> = info.bands.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, NAMES);
}

#[test]
fn test_declared_nodata_is_unified_and_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let sources = write_sources(dir.path(), HEIGHT, HEIGHT);
    let out = dir.path().join("landscape.tif");
    build_landscape(LandscapeSources::from_ordered(sources), &out).unwrap();

    let info = LandscapeInfo::open(&out).unwrap();
    let elevation = info.read_band(0).unwrap();
    assert_eq!(elevation.len(), (WIDTH * HEIGHT) as usize);
    assert_eq!(elevation[0], NODATA);
    assert_eq!(elevation[9 * WIDTH as usize + 9], NODATA);
    assert_eq!(elevation[10], 110);
    assert_eq!(elevation[(HEIGHT as usize - 1) * WIDTH as usize + WIDTH as usize - 1], 100 + 149 + 139);
    assert_eq!(elevation.iter().filter(|&&v| v == NODATA).count(), 100);

    let stats = &info.bands[0].stats;
    assert_relative_eq!(stats.min, 110.0);
    assert_relative_eq!(stats.max, 388.0);
    assert_eq!(stats.histogram.len(), 256);
    assert_eq!(stats.histogram.iter().sum::<u64>(), u64::from(WIDTH * HEIGHT) - 100);

    let canopy_cover = &info.bands[4].stats;
    assert_relative_eq!(canopy_cover.mean, 40.0);
    assert_relative_eq!(canopy_cover.std, 0.0);
    assert_eq!(info.read_band(7).unwrap()[WIDTH as usize * 130 + 140], 70);
}

#[test]
fn test_georeferencing_is_carried_over() {
    let dir = tempfile::tempdir().unwrap();
    let sources = write_sources(dir.path(), HEIGHT, HEIGHT);
    let out = dir.path().join("landscape.tif");
    build_landscape(LandscapeSources::from_ordered(sources), &out).unwrap();

    assert_relative_eq!(landscape_resolution(&out).unwrap(), 30.0);
    let info = LandscapeInfo::open(&out).unwrap();
    assert_eq!(
        info.georeference.tiepoint.as_deref(),
        Some(&[0.0, 0.0, 0.0, 500_000.0, 5_600_000.0, 0.0][..])
    );
}

#[test]
fn test_slope_with_extra_row_is_shape_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let sources = write_sources(dir.path(), HEIGHT, HEIGHT + 1);
    let out = dir.path().join("landscape.tif");
    std::fs::write(&out, "stale container").unwrap();

    let err = build_landscape(LandscapeSources::from_ordered(sources), &out).unwrap_err();
    match err {
        FireModelError::ShapeMismatch { band, .. } => assert_eq!(band, "slope"),
        other => panic!("expected ShapeMismatch, got {other}"),
    }
    assert!(!out.exists());
}

#[test]
fn test_missing_source_is_reported_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let mut sources = write_sources(dir.path(), HEIGHT, HEIGHT);
    sources[6] = dir.path().join("cbh_missing.tif");

    let err = build_landscape(
        LandscapeSources::from_ordered(sources),
        dir.path().join("landscape.tif"),
    )
    .unwrap_err();
    assert!(matches!(err, FireModelError::SourceNotFound(p) if p.ends_with("cbh_missing.tif")));
}

#[test]
fn test_rebuild_replaces_existing_container() {
    let dir = tempfile::tempdir().unwrap();
    let sources = write_sources(dir.path(), HEIGHT, HEIGHT);
    let out = dir.path().join("landscape.tif");
    std::fs::write(&out, vec![0u8; 1 << 20]).unwrap();

    build_landscape(LandscapeSources::from_ordered(sources), &out).unwrap();
    let info = LandscapeInfo::open(&out).unwrap();
    assert_eq!(info.band_count, 8);
}
