//! End-to-end detection runs over small on-disk tile trees

use demdelta_core::io::write_geotiff;
use demdelta_core::Raster;
use demdelta_detect::{run, MetricConfig, RunConfig};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_tile(root: &Path, relative: &str, raster: &Raster<f64>) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    write_geotiff(raster, &path).unwrap();
    path
}

fn base_config(workspace: &TempDir) -> RunConfig {
    let reference_dir = workspace.path().join("reference");
    let target_dir = workspace.path().join("target");
    fs::create_dir_all(&reference_dir).unwrap();
    fs::create_dir_all(&target_dir).unwrap();

    RunConfig {
        reference_dir,
        target_dir,
        metrics: MetricConfig {
            mean: Some(0.5),
            ..Default::default()
        },
        save_dir: None,
        reference_las_dir: None,
        target_las_dir: None,
        save_las_dir: None,
        copy_tif: false,
        copy_las: false,
        threads: 1,
        change_list: workspace.path().join("changed.txt"),
    }
}

fn changed_stems_on_disk(config: &RunConfig) -> HashSet<String> {
    fs::read_to_string(&config.change_list)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Reference mean 5.0 against target mean 5.6 with a 0.5 mean threshold:
/// the canonical "building grew" case.
#[test]
fn test_mixed_run_counts_and_change_list() {
    let workspace = TempDir::new().unwrap();
    let config = base_config(&workspace);

    // unchanged pair
    write_tile(&config.reference_dir, "10/0001.tif", &Raster::filled(10, 10, 5.0));
    write_tile(&config.target_dir, "10/0001.tif", &Raster::filled(10, 10, 5.0));

    // changed pair: mean difference 0.6 > 0.5
    write_tile(&config.reference_dir, "10/0002.tif", &Raster::filled(10, 10, 5.0));
    write_tile(&config.target_dir, "10/0002.tif", &Raster::filled(10, 10, 5.6));

    // unmatched: no target tile
    write_tile(&config.reference_dir, "11/0003.tif", &Raster::filled(10, 10, 5.0));

    // target-only: new building, unconditionally changed
    write_tile(&config.target_dir, "12/0004.tif", &Raster::filled(10, 10, 8.0));

    let summary = run(&config).unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.changed, 2);
    assert_eq!(summary.unmatched, 1);
    assert_eq!(summary.target_only, 1);

    let stems = changed_stems_on_disk(&config);
    assert_eq!(
        stems,
        HashSet::from(["0002".to_string(), "0004".to_string()])
    );
    let text = fs::read_to_string(&config.change_list).unwrap();
    assert!(text.ends_with('\n'));
}

#[test]
fn test_changed_count_invariant_to_pool_size() {
    let workspace = TempDir::new().unwrap();
    let mut config = base_config(&workspace);

    for i in 0..12 {
        let name = format!("t/{:04}.tif", i);
        write_tile(&config.reference_dir, &name, &Raster::filled(6, 6, 10.0));
        // every third tile grows by 1.0
        let value = if i % 3 == 0 { 11.0 } else { 10.0 };
        write_tile(&config.target_dir, &name, &Raster::filled(6, 6, value));
    }

    config.threads = 1;
    let serial = run(&config).unwrap();
    let serial_stems = changed_stems_on_disk(&config);

    config.threads = 4;
    let parallel = run(&config).unwrap();
    let parallel_stems = changed_stems_on_disk(&config);

    assert_eq!(serial.changed, 4);
    assert_eq!(parallel.changed, 4);
    assert_eq!(serial.unmatched, 0);
    assert_eq!(parallel.unmatched, 0);
    assert_eq!(serial_stems, parallel_stems);
}

#[test]
fn test_nodata_pixels_do_not_bias_verdict() {
    let workspace = TempDir::new().unwrap();
    let config = base_config(&workspace);

    // identical heights except where one epoch has no measurement
    let mut reference = Raster::filled(10, 10, 5.0);
    reference.set_nodata(Some(-9999.0));
    reference.set(0, 0, -9999.0).unwrap();

    let mut target = Raster::filled(10, 10, 5.0);
    target.set_nodata(Some(-9999.0));
    target.set(9, 9, -9999.0).unwrap();

    write_tile(&config.reference_dir, "a/0001.tif", &reference);
    write_tile(&config.target_dir, "a/0001.tif", &target);

    let summary = run(&config).unwrap();
    assert_eq!(summary.changed, 0);
    assert_eq!(summary.unmatched, 0);
}

/// Legacy placeholder rasters (1x1) carry no signal and must never be
/// reported as changed. Compatibility shim for an older tiling stage.
#[test]
fn test_placeholder_pair_is_unchanged() {
    let workspace = TempDir::new().unwrap();
    let config = base_config(&workspace);

    write_tile(&config.reference_dir, "p/0001.tif", &Raster::filled(1, 1, 42.0));
    write_tile(&config.target_dir, "p/0001.tif", &Raster::filled(30, 30, 3.0));

    let summary = run(&config).unwrap();
    assert_eq!(summary.changed, 0);
    assert_eq!(summary.unmatched, 0);
    assert_eq!(summary.total, 1);
}

#[test]
fn test_dimension_mismatch_aborts_run() {
    let workspace = TempDir::new().unwrap();
    let config = base_config(&workspace);

    write_tile(&config.reference_dir, "m/0001.tif", &Raster::filled(8, 8, 1.0));
    write_tile(&config.target_dir, "m/0001.tif", &Raster::filled(8, 9, 1.0));

    let err = run(&config).unwrap_err();
    assert!(matches!(
        err,
        demdelta_core::Error::SizeMismatch { er: 8, ec: 8, ar: 8, ac: 9 }
    ));
}

#[test]
fn test_changed_artifacts_are_archived() {
    let workspace = TempDir::new().unwrap();
    let mut config = base_config(&workspace);
    config.copy_tif = true;
    config.save_dir = Some(workspace.path().join("save"));

    write_tile(&config.reference_dir, "10/0002.tif", &Raster::filled(10, 10, 5.0));
    write_tile(&config.target_dir, "10/0002.tif", &Raster::filled(10, 10, 5.6));

    // unchanged tiles are not archived
    write_tile(&config.reference_dir, "10/0001.tif", &Raster::filled(10, 10, 5.0));
    write_tile(&config.target_dir, "10/0001.tif", &Raster::filled(10, 10, 5.0));

    let summary = run(&config).unwrap();
    assert_eq!(summary.changed, 1);

    let save_dir = config.save_dir.as_ref().unwrap();
    assert!(save_dir.join("10/0002.reference.tif").is_file());
    assert!(save_dir.join("10/0002.target.tif").is_file());
    assert!(!save_dir.join("10/0001.reference.tif").exists());
}

#[test]
fn test_empty_metrics_reports_nothing_changed() {
    let workspace = TempDir::new().unwrap();
    let mut config = base_config(&workspace);
    config.metrics = MetricConfig::default();

    write_tile(&config.reference_dir, "e/0001.tif", &Raster::filled(5, 5, 0.0));
    write_tile(&config.target_dir, "e/0001.tif", &Raster::filled(5, 5, 100.0));

    let summary = run(&config).unwrap();
    assert_eq!(summary.changed, 0);
    assert_eq!(summary.total, 1);
}
