//! End-to-end tests of the change and series branches against an
//! in-memory scene source.
//!
//! The synthetic study area is a 1 km x 1 km square in UTM 43N covered by
//! 100 x 100 pixel scenes at 10 m. A second set of scenes covers the Jaipur
//! box in WGS84 at 0.001°.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use landdelta_algorithms::imagery::IndexKind;
use landdelta_algorithms::pipeline::{
    compute_change_product, compute_year_series, export_change_report, run_change_branch,
    PipelineConfig, RegionConfig,
};
use landdelta_algorithms::statistics::{aggregate_area, AreaModel, ZonalSampling};
use landdelta_core::io::{read_geotiff, write_geotiff};
use landdelta_core::raster::{GeoTransform, Raster, RasterElement};
use landdelta_core::scene::{Band, SceneImage};
use landdelta_core::{CatalogSource, Error, MemorySource, Region, CRS};
use std::path::Path;

const SIZE: usize = 100;
const CLOUD_BIT: u16 = 1 << 3;

/// Reflectances (red, nir, swir1) of one pixel
type Pixel = (f64, f64, f64);

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Scene grid: transform and CRS shared by every band
type Grid = (GeoTransform, CRS);

fn utm_grid() -> Grid {
    (GeoTransform::new(0.0, 1000.0, 10.0, -10.0), CRS::utm(43, true))
}

fn jaipur_grid() -> Grid {
    (GeoTransform::new(75.75, 26.95, 0.001, -0.001), CRS::wgs84())
}

fn raster_on<T: RasterElement>(grid: &Grid, f: impl Fn(usize, usize) -> T) -> Raster<T> {
    let data = (0..SIZE * SIZE).map(|i| f(i / SIZE, i % SIZE)).collect();
    let mut r = Raster::from_vec(data, SIZE, SIZE).unwrap();
    r.set_transform(grid.0);
    r.set_crs(Some(grid.1.clone()));
    r
}

fn scene_on(
    grid: &Grid,
    id: &str,
    acquired: NaiveDate,
    cloud: f64,
    qa: impl Fn(usize, usize) -> u16,
    pixel: impl Fn(usize, usize) -> Pixel,
) -> SceneImage {
    SceneImage::new(id, acquired, cloud, raster_on(grid, qa))
        .with_band(Band::Red, raster_on(grid, |r, c| pixel(r, c).0))
        .unwrap()
        .with_band(Band::Nir, raster_on(grid, |r, c| pixel(r, c).1))
        .unwrap()
        .with_band(Band::Swir1, raster_on(grid, |r, c| pixel(r, c).2))
        .unwrap()
}

fn make_scene(
    id: &str,
    acquired: NaiveDate,
    cloud: f64,
    qa: impl Fn(usize, usize) -> u16,
    pixel: impl Fn(usize, usize) -> Pixel,
) -> SceneImage {
    scene_on(&utm_grid(), id, acquired, cloud, qa, pixel)
}

fn clear_scene(id: &str, acquired: NaiveDate, pixel: impl Fn(usize, usize) -> Pixel) -> SceneImage {
    make_scene(id, acquired, 5.0, |_, _| 0, pixel)
}

/// SWIR1 giving the wanted NDBI against `nir`
fn swir_for(ndbi: f64, nir: f64) -> f64 {
    nir * (1.0 + ndbi) / (1.0 - ndbi)
}

fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig {
        region: RegionConfig {
            bbox: [0.0, 0.0, 1000.0, 1000.0],
            crs: CRS::utm(43, true),
        },
        ..PipelineConfig::default()
    };
    config.aggregation.resolution_m = 100.0;
    config.aggregation.max_pixels = 1_000_000;
    config.aggregation.simplify_tolerance_m = 0.0;
    config.export.resolution_m = None;
    config
}

/// Baseline: NDVI 0.5 and NDBI -1/3 everywhere.
/// Current: left half NDVI 0.2 (change -0.3) and NDBI +0.05;
/// right half NDVI unchanged and NDBI +0.15.
fn study_scenes() -> Vec<SceneImage> {
    let base_ndbi = -1.0 / 3.0;
    let baseline: Pixel = (0.2, 0.6, swir_for(base_ndbi, 0.6));

    vec![
        clear_scene("LC08_2014_a", date(2014, 2, 10), |_, _| baseline),
        // Cloud-flagged everywhere with absurd reflectances: must be ignored
        make_scene("LC08_2014_b", date(2014, 3, 14), 12.0, |_, _| CLOUD_BIT, |_, _| (0.9, 0.1, 0.9)),
        // Too cloudy to pass the scene filter
        make_scene("LC08_2014_c", date(2014, 4, 2), 35.0, |_, _| 0, |_, _| (0.9, 0.1, 0.9)),
        clear_scene("LC08_2024_a", date(2024, 1, 20), move |_, col| {
            if col < SIZE / 2 {
                (0.4, 0.6, swir_for(base_ndbi + 0.05, 0.6))
            } else {
                (0.2, 0.6, swir_for(base_ndbi + 0.15, 0.6))
            }
        }),
    ]
}

fn study_source() -> MemorySource {
    MemorySource::new(study_scenes())
}

#[test]
fn vegetation_loss_half_the_area() {
    let mut scenes = study_scenes();
    scenes.push(make_scene("LC08_2024_b", date(2024, 5, 5), 55.0, |_, _| 0, |_, _| (0.9, 0.1, 0.9)));
    let report = run_change_branch(&MemorySource::new(scenes), &test_config()).unwrap();

    let ndvi = report.get(IndexKind::Ndvi).unwrap();
    let product = ndvi.product.as_ref().unwrap();
    assert_eq!(product.baseline.image_count, 2);
    assert_eq!(product.current.image_count, 1, "55% cloud scene must be filtered out");

    // The cloud-flagged baseline scene does not pull the median down
    assert_relative_eq!(product.baseline.raster.get(50, 50).unwrap(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(product.change.get(10, 10).unwrap(), -0.3, epsilon = 1e-12);
    assert_relative_eq!(product.change.get(10, 90).unwrap(), 0.0, epsilon = 1e-12);

    let mask = ndvi.mask.as_ref().unwrap();
    assert_eq!(mask.get(10, 10).unwrap(), 1);
    assert_eq!(mask.get(10, 90).unwrap(), 0);

    assert_relative_eq!(report.areas.get("vegetation_loss").unwrap(), 0.5, epsilon = 1e-9);
}

#[test]
fn new_urban_only_above_threshold() {
    let report = run_change_branch(&study_source(), &test_config()).unwrap();

    let ndbi = report.get(IndexKind::Ndbi).unwrap();
    let change = &ndbi.product.as_ref().unwrap().change;
    assert_relative_eq!(change.get(0, 0).unwrap(), 0.05, epsilon = 1e-9);
    assert_relative_eq!(change.get(0, 99).unwrap(), 0.15, epsilon = 1e-9);

    let mask = ndbi.mask.as_ref().unwrap();
    assert_eq!(mask.get(0, 0).unwrap(), 0);
    assert_eq!(mask.get(0, 99).unwrap(), 1);
    assert_relative_eq!(report.areas.get("new_urban").unwrap(), 0.5, epsilon = 1e-9);
}

#[test]
fn change_product_for_single_index() {
    let product = compute_change_product(&study_source(), &test_config(), IndexKind::Ndvi)
        .unwrap()
        .unwrap();
    assert_eq!(product.index, IndexKind::Ndvi);
    assert_eq!(product.change.shape(), (SIZE, SIZE));
}

#[test]
fn missing_epoch_gives_no_area() {
    let source = MemorySource::new(vec![clear_scene("only_2014", date(2014, 6, 1), |_, _| (0.2, 0.6, 0.3))]);
    let report = run_change_branch(&source, &test_config()).unwrap();

    for change in &report.changes {
        assert!(change.product.is_none());
        assert!(change.mask.is_none());
        assert!(change.area_km2.is_none());
    }
    assert_eq!(report.areas.km2.len(), 2);
    assert!(report.areas.get("vegetation_loss").is_none());
    assert!(compute_change_product(&source, &test_config(), IndexKind::Ndbi).unwrap().is_none());
}

#[test]
fn full_square_kilometre_at_100m() {
    let region = Region::from_bbox(0.0, 0.0, 1000.0, 1000.0, CRS::utm(43, true)).unwrap();
    let mut mask: Raster<u8> = Raster::filled(SIZE, SIZE, 1);
    mask.set_transform(GeoTransform::new(0.0, 1000.0, 10.0, -10.0));

    let km2 = aggregate_area(&mask, &region, &ZonalSampling::new(100.0, 100)).unwrap();
    assert_relative_eq!(km2, 1.0, epsilon = 1e-9);
}

#[test]
fn geographic_default_run_uses_ellipsoidal_cell_areas() {
    let grid = jaipur_grid();
    let source = MemorySource::new(vec![
        scene_on(&grid, "LC08_2014", date(2014, 2, 10), 5.0, |_, _| 0, |_, _| (0.2, 0.6, 0.3)),
        // Left half loses vegetation: NDVI 0.5 -> 0.2
        scene_on(&grid, "LC08_2024", date(2024, 2, 10), 5.0, |_, _| 0, |_, col| {
            if col < SIZE / 2 {
                (0.4, 0.6, 0.3)
            } else {
                (0.2, 0.6, 0.3)
            }
        }),
    ]);

    let mut config = PipelineConfig::default();
    config.aggregation.simplify_tolerance_m = 0.0;
    config.export.resolution_m = None;
    assert!(config.region.crs.is_geographic());
    assert_eq!(config.sampling().area_model, AreaModel::Ellipsoidal);

    let report = run_change_branch(&source, &config).unwrap();
    let km2 = report.areas.get("vegetation_loss").unwrap();

    let region = config.aggregation_region().unwrap();
    let half = region.area_km2() / 2.0;
    assert!((km2 - half).abs() / half < 0.03, "{} vs {}", km2, half);

    let mask = report.get(IndexKind::Ndvi).unwrap().mask.as_ref().unwrap();
    let ellipsoidal = ZonalSampling::new(120.0, 50_000_000).with_area_model(AreaModel::Ellipsoidal);
    assert_relative_eq!(km2, aggregate_area(mask, &region, &ellipsoidal).unwrap(), epsilon = 1e-12);
}

fn write_band(dir: &Path, name: &str, f: impl Fn(usize, usize) -> f64) {
    write_geotiff(&raster_on(&utm_grid(), f), dir.join(name), None).unwrap();
}

#[test]
fn scaled_catalog_reflectances_keep_index_in_range() {
    let dir = tempfile::tempdir().unwrap();
    // Left half red DN 5000 scales to -0.0625; right half to 0.075
    write_band(dir.path(), "red.tif", |_, col| if col < SIZE / 2 { 5000.0 } else { 10000.0 });
    write_band(dir.path(), "nir.tif", |_, _| 20000.0);
    write_band(dir.path(), "swir1.tif", |_, _| 16000.0);
    write_band(dir.path(), "qa.tif", |_, _| 0.0);

    let entry = |id: &str, date: &str| {
        format!(
            r#"{{"id": "{id}", "date": "{date}", "cloud_cover": 3.0,
                "bands": {{"SR_B4": "red.tif", "SR_B5": "nir.tif", "SR_B6": "swir1.tif"}},
                "quality": "qa.tif", "scale": 0.0000275, "offset": -0.2}}"#
        )
    };
    let doc = format!(
        r#"{{"scenes": [{}, {}]}}"#,
        entry("LC08_2014", "2014-03-05"),
        entry("LC08_2024", "2024-03-05")
    );
    let path = dir.path().join("catalog.json");
    std::fs::write(&path, doc).unwrap();
    let source = CatalogSource::open(&path).unwrap();

    let product = compute_change_product(&source, &test_config(), IndexKind::Ndvi)
        .unwrap()
        .unwrap();
    let baseline = &product.baseline.raster;
    assert!(baseline.get(10, 10).unwrap().is_nan());
    assert_relative_eq!(baseline.get(10, 90).unwrap(), 0.275 / 0.425, epsilon = 1e-9);
    for &v in baseline.data().iter().filter(|v| !v.is_nan()) {
        assert!((-1.0..=1.0).contains(&v), "{}", v);
    }
    assert_eq!(product.change.valid_count(), SIZE * SIZE / 2);
}

#[test]
fn area_is_monotonic_in_the_mask() {
    let region = Region::from_bbox(0.0, 0.0, 1000.0, 1000.0, CRS::utm(43, true)).unwrap();
    let sampling = ZonalSampling::new(50.0, 10_000);

    let nested = |limit: usize| {
        let data = (0..SIZE * SIZE)
            .map(|i| u8::from((i / SIZE) + (i % SIZE) < limit))
            .collect();
        let mut m = Raster::from_vec(data, SIZE, SIZE).unwrap();
        m.set_transform(GeoTransform::new(0.0, 1000.0, 10.0, -10.0));
        m
    };

    let areas: Vec<f64> = [0, 30, 60, 120, 200]
        .iter()
        .map(|&l| aggregate_area(&nested(l), &region, &sampling).unwrap())
        .collect();
    assert_eq!(areas[0], 0.0);
    for w in areas.windows(2) {
        assert!(w[0] <= w[1], "{:?}", areas);
    }
    assert_relative_eq!(areas[4], 1.0, epsilon = 1e-9);
}

#[test]
fn resource_cap_fails_before_any_work() {
    let mut config = test_config();
    config.aggregation.resolution_m = 1.0;
    config.aggregation.max_pixels = 10_000;

    match run_change_branch(&study_source(), &config) {
        Err(Error::ResourceExceeded {
            estimated,
            max_pixels,
        }) => {
            assert_eq!(estimated, 1_000_000);
            assert_eq!(max_pixels, 10_000);
        }
        other => panic!("expected ResourceExceeded, got {:?}", other.map(|r| r.areas)),
    }
    assert!(matches!(
        compute_year_series(&study_source(), &config, IndexKind::Ndvi),
        Err(Error::ResourceExceeded { .. })
    ));
}

#[test]
fn year_series_covers_every_year_in_order() {
    let source = MemorySource::new(vec![
        clear_scene("y2014", date(2014, 3, 1), |_, _| (0.2, 0.6, 0.3)),
        clear_scene("y2019a", date(2019, 3, 1), |_, _| (0.3, 0.6, 0.3)),
        clear_scene("y2019b", date(2019, 9, 1), |_, _| (0.1, 0.6, 0.3)),
        clear_scene("y2024", date(2024, 3, 1), |_, _| (0.4, 0.6, 0.3)),
        // Outside the series span
        clear_scene("y2025", date(2025, 3, 1), |_, _| (0.4, 0.6, 0.3)),
    ]);

    let series = compute_year_series(&source, &test_config(), IndexKind::Ndvi).unwrap();
    assert_eq!(series.len(), 11);
    assert_eq!(series.years().collect::<Vec<_>>(), (2014..=2024).collect::<Vec<_>>());
    assert_eq!(series.missing_years().len(), 8);

    assert_relative_eq!(series.get(2014).unwrap().value.unwrap(), 0.5, epsilon = 1e-12);
    // Median of 1/3 and 5/7
    let expected = (1.0 / 3.0 + 5.0 / 7.0) / 2.0;
    assert_relative_eq!(series.get(2019).unwrap().value.unwrap(), expected, epsilon = 1e-12);
    assert_eq!(series.get(2019).unwrap().image_count, 2);
    assert_relative_eq!(series.get(2024).unwrap().value.unwrap(), 0.2, epsilon = 1e-12);
    assert!(series.get(2015).unwrap().value.is_none());

    let json = serde_json::to_value(&series).unwrap();
    assert!(json["entries"][1]["value"].is_null());
}

#[test]
fn export_writes_change_rasters_and_masks() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.export.directory = dir.path().to_path_buf();
    config.export.prefix = "Test".into();
    config.export.resolution_m = Some(100.0);
    config.export.write_masks = true;

    let report = run_change_branch(&study_source(), &config).unwrap();
    let written = export_change_report(&report, &config).unwrap();
    assert_eq!(written.len(), 4);

    let ndvi_path = dir.path().join("Test_NDVI_change.tif");
    assert!(ndvi_path.exists());
    assert!(dir.path().join("Test_NDBI_change.tif").exists());
    assert!(dir.path().join("Test_vegetation_loss_mask.tif").exists());
    assert!(dir.path().join("Test_new_urban_mask.tif").exists());

    let back: Raster<f64> = read_geotiff(&ndvi_path).unwrap();
    assert_eq!(back.shape(), (10, 10));
    assert_relative_eq!(back.get(0, 0).unwrap(), -0.3, epsilon = 1e-6);
    assert_relative_eq!(back.get(0, 9).unwrap(), 0.0, epsilon = 1e-6);
}

#[test]
fn export_grid_over_the_cap_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.export.directory = dir.path().join("out");
    config.export.resolution_m = Some(0.5);

    let report = run_change_branch(&study_source(), &config).unwrap();
    match export_change_report(&report, &config) {
        Err(Error::ResourceExceeded {
            estimated,
            max_pixels,
        }) => {
            assert_eq!(estimated, 4_000_000);
            assert_eq!(max_pixels, 1_000_000);
        }
        other => panic!("expected ResourceExceeded, got {:?}", other),
    }
    assert!(!config.export.directory.exists());
}
