//! L1a calibration table reader.
//!
//! The tables ship as a pair of whitespace-separated text files, one with
//! counts in dB and one with power in dBm. Row `k` of each file describes ANZ
//! port `k`; lines starting with `#` are comments.

use crate::core::calibrate::{CalibrationCurve, CalibrationTables};
use crate::types::{GnssrError, GnssrResult};
use std::path::{Path, PathBuf};

/// Locations of the two halves of the L1a calibration table
#[derive(Debug, Clone)]
pub struct CalibrationTablePaths {
    pub counts_db: PathBuf,
    pub power_dbm: PathBuf,
}

impl CalibrationTablePaths {
    /// Standard file names inside a calibration directory
    pub fn in_directory<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            counts_db: dir.join("L1A_cal_ddm_counts_dB.dat"),
            power_dbm: dir.join("L1A_cal_ddm_power_dBm.dat"),
        }
    }
}

pub fn read_calibration_tables(paths: &CalibrationTablePaths) -> GnssrResult<CalibrationTables> {
    log::info!(
        "Reading L1a calibration tables: {} / {}",
        paths.counts_db.display(),
        paths.power_dbm.display()
    );
    let counts_text = std::fs::read_to_string(&paths.counts_db)?;
    let power_text = std::fs::read_to_string(&paths.power_dbm)?;
    parse_calibration_tables(&counts_text, &power_text)
}

/// Pair counts and power rows into one curve per ANZ port
pub fn parse_calibration_tables(counts_text: &str, power_text: &str) -> GnssrResult<CalibrationTables> {
    let counts_rows = parse_rows(counts_text)?;
    let power_rows = parse_rows(power_text)?;

    if counts_rows.len() != power_rows.len() {
        return Err(GnssrError::InvalidFormat(format!(
            "counts table has {} ports, power table has {}",
            counts_rows.len(),
            power_rows.len()
        )));
    }

    let curves = counts_rows
        .iter()
        .zip(&power_rows)
        .enumerate()
        .map(|(port, (counts, power))| {
            CalibrationCurve::new(counts, power).map_err(|e| {
                GnssrError::InvalidFormat(format!("ANZ port {} calibration row: {}", port, e))
            })
        })
        .collect::<GnssrResult<Vec<_>>>()?;

    log::debug!("Loaded {} calibration curves", curves.len());
    CalibrationTables::new(curves)
}

fn parse_rows(text: &str) -> GnssrResult<Vec<Vec<f64>>> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(i, line)| {
            parse_space_separated_numbers(line)
                .map_err(|e| GnssrError::InvalidFormat(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}

fn parse_space_separated_numbers<T>(input: &str) -> GnssrResult<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    input
        .split_whitespace()
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| GnssrError::InvalidFormat(format!("cannot parse '{}': {}", s, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calibrate::OutOfRangePolicy;
    use approx::assert_abs_diff_eq;

    const COUNTS: &str = "# counts dB per port\n0 40 80\n\n10 50 90\n";
    const POWER: &str = "-100 -60 -20\n-95 -55 -15\n";

    #[test]
    fn test_parse_pairs_rows_by_port() {
        let tables = parse_calibration_tables(COUNTS, POWER).unwrap();
        assert_eq!(tables.len(), 2);

        let port1 = tables.curve(1).unwrap();
        assert_eq!(port1.domain(), (10.0, 90.0));
        assert_abs_diff_eq!(port1.evaluate(30.0, OutOfRangePolicy::Nan), -75.0, epsilon = 1e-12);
    }

    #[test]
    fn test_row_count_mismatch() {
        assert!(parse_calibration_tables(COUNTS, "-100 -60 -20\n").is_err());
    }

    #[test]
    fn test_bad_number_reports_line() {
        let err = parse_calibration_tables("0 4x0 80\n", "-100 -60 -20\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_standard_file_names() {
        let paths = CalibrationTablePaths::in_directory("/data/L1a_cal");
        assert!(paths.counts_db.ends_with("L1A_cal_ddm_counts_dB.dat"));
        assert!(paths.power_dbm.ends_with("L1A_cal_ddm_power_dBm.dat"));
    }
}
