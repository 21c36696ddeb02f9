use approx::assert_abs_diff_eq;
use std::fs;
use sxs_l1::core::calibrate::OutOfRangePolicy;
use sxs_l1::{read_calibration_tables, CalibrationTablePaths, Level1Context, ProcessingConfig};

const COUNTS_DB: &str = "\
# L1a calibration, counts in dB, one row per ANZ port
20.0 30.0 40.0 50.0
21.0 31.0 41.0 51.0
19.0 29.0 39.0 49.0
";

const POWER_DBM: &str = "\
-110.0 -100.0 -90.0 -80.0
-111.0 -101.0 -91.0 -81.0
-109.0 -99.0 -89.0 -79.0
";

#[test]
fn test_read_tables_from_directory() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let paths = CalibrationTablePaths::in_directory(dir.path());
    fs::write(&paths.counts_db, COUNTS_DB).expect("Failed to write counts table");
    fs::write(&paths.power_dbm, POWER_DBM).expect("Failed to write power table");

    let result = read_calibration_tables(&paths);
    assert!(result.is_ok());
    let tables = result.unwrap();
    assert_eq!(tables.len(), 3);

    let port2 = tables.curve(2).unwrap();
    assert_eq!(port2.domain(), (19.0, 49.0));
    assert_abs_diff_eq!(port2.evaluate(34.0, OutOfRangePolicy::Nan), -94.0, epsilon = 1e-12);
    assert!(port2.evaluate(60.0, OutOfRangePolicy::Nan).is_nan());

    let context = Level1Context::new(ProcessingConfig::default(), tables);
    assert!(context.is_ok());
}

#[test]
fn test_config_and_tables_from_disk() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config_path = dir.path().join("l1_config.json");
    fs::write(
        &config_path,
        r#"{
            "max_ngrx_channels": 12,
            "binning_threshold_db": [50.0, 50.0, 50.0],
            "out_of_range_policy": "extrapolate",
            "extra_leap_seconds": [
                { "effective_unix": 1798761600, "gps_utc_offset": 19 }
            ],
            "leap_table_expires": "2027-06-28T00:00:00Z"
        }"#,
    )
    .expect("Failed to write config");

    let config = ProcessingConfig::from_file(&config_path).expect("Failed to read config");
    assert_eq!(config.max_ngrx_channels, 12);
    assert_eq!(config.out_of_range_policy, OutOfRangePolicy::Extrapolate);

    let paths = CalibrationTablePaths::in_directory(dir.path());
    fs::write(&paths.counts_db, COUNTS_DB).unwrap();
    fs::write(&paths.power_dbm, POWER_DBM).unwrap();
    let tables = read_calibration_tables(&paths).unwrap();

    let context = Level1Context::new(config, tables).unwrap();
    // 2027-01-01 onwards: GPS - UTC = 19 s
    assert_eq!(context.leap_seconds().offset_at_utc(1_798_761_600.0), 19);
    assert_eq!(context.leap_seconds().offset_at_utc(1_798_761_599.0), 18);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let paths = CalibrationTablePaths::in_directory(dir.path());
    let err = read_calibration_tables(&paths).unwrap_err();
    assert!(matches!(err, sxs_l1::GnssrError::Io(_)));
}
