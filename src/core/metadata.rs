use crate::types::{GnssrError, GnssrResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Algorithm and lookup table versions recorded in the L1 product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LutVersions {
    pub l1_algorithm: String,
    pub l1_data: String,
    pub l1a_signal_lut: String,
    pub l1a_noise_lut: String,
    pub ngrx_port_mapping: String,
    pub nadir_antenna: String,
    pub zenith_antenna: String,
    pub prn_sv_maps: String,
    pub gps_eirp_params: String,
    pub land_mask: String,
    pub surface_type: String,
    pub mean_sea_surface: String,
    pub per_bin_antenna: String,
}

impl Default for LutVersions {
    fn default() -> Self {
        Self {
            l1_algorithm: "1.1".to_string(),
            l1_data: "1".to_string(),
            l1a_signal_lut: "1".to_string(),
            l1a_noise_lut: "1".to_string(),
            ngrx_port_mapping: "1".to_string(),
            nadir_antenna: "1".to_string(),
            zenith_antenna: "1".to_string(),
            prn_sv_maps: "1".to_string(),
            gps_eirp_params: "7".to_string(),
            land_mask: "1".to_string(),
            surface_type: "1".to_string(),
            mean_sea_surface: "1".to_string(),
            per_bin_antenna: "1".to_string(),
        }
    }
}

/// Fixed acquisition descriptors of the campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductConstants {
    pub aircraft_registration: String,
    /// 1 = GPS signal simulator, 2 = aircraft
    pub ddm_source: u8,
    /// 1 = middle of DDM sampling period
    pub ddm_time_type_selector: u8,
    pub delay_resolution_chips: f64,
    pub doppler_resolution_hz: f64,
    pub dem_source: String,
    pub versions: LutVersions,
}

impl Default for ProductConstants {
    fn default() -> Self {
        Self {
            aircraft_registration: "ZK-NFA".to_string(),
            ddm_source: 2,
            ddm_time_type_selector: 1,
            delay_resolution_chips: 0.25,
            doppler_resolution_hz: 500.0,
            dem_source: "SRTM30".to_string(),
            versions: LutVersions::default(),
        }
    }
}

/// Temporal extent of the DDM records in a flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeCoverage {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Spacing of the first two DDM epochs, seconds
    pub resolution_s: Option<f64>,
    /// ISO 8601 duration, counting the last record's second
    pub duration: String,
}

impl TimeCoverage {
    pub fn from_ddm_utc(ddm_utc: &[f64]) -> GnssrResult<Self> {
        let (first, last) = match (ddm_utc.first(), ddm_utc.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(GnssrError::Processing(
                    "cannot derive time coverage without DDM epochs".to_string(),
                ))
            }
        };

        let resolution_s = match ddm_utc {
            [a, b, ..] => Some(b - a),
            _ => None,
        };

        Ok(Self {
            start: unix_to_datetime(first)?,
            end: unix_to_datetime(last)?,
            resolution_s,
            duration: iso8601_duration(last - first + 1.0),
        })
    }

    pub fn start_string(&self) -> String {
        self.start.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Same layout as [`start_string`](Self::start_string). Earlier L1
    /// products wrote the end as `%d-%m-%Y %H:%M:%S`; readers comparing
    /// against those files must reformat.
    pub fn end_string(&self) -> String {
        self.end.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// True when the flight crosses a UTC midnight
    pub fn spans_day_change(&self) -> bool {
        self.start.date_naive() != self.end.date_naive()
    }
}

/// UTC unix seconds (fractional) to a chrono timestamp
pub fn unix_to_datetime(utc_unix: f64) -> GnssrResult<DateTime<Utc>> {
    if !utc_unix.is_finite() {
        return Err(GnssrError::Processing(format!(
            "timestamp {} is not finite",
            utc_unix
        )));
    }

    let secs = utc_unix.floor();
    let nanos = ((utc_unix - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos)
        .ok_or_else(|| GnssrError::Processing(format!("timestamp {} out of range", utc_unix)))
}

/// Whole-second duration as `P0DT{h}H{m}M{s}S`
pub fn iso8601_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("P0DT{}H{}M{}S", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_format() {
        assert_eq!(iso8601_duration(0.0), "P0DT0H0M0S");
        assert_eq!(iso8601_duration(3725.0), "P0DT1H2M5S");
        assert_eq!(iso8601_duration(59.9), "P0DT0H0M59S");
    }

    #[test]
    fn test_coverage_of_flight() {
        // 2022-11-03T12:14:16.5Z onwards at 1 Hz
        let ddm_utc: Vec<f64> = (0..3600).map(|i| 1_667_477_656.5 + i as f64).collect();
        let coverage = TimeCoverage::from_ddm_utc(&ddm_utc).unwrap();

        assert_eq!(coverage.start_string(), "2022-11-03 12:14:16");
        assert_eq!(coverage.end_string(), "2022-11-03 13:14:15");
        assert_eq!(coverage.resolution_s, Some(1.0));
        assert_eq!(coverage.duration, "P0DT1H0M0S");
        assert!(!coverage.spans_day_change());
    }

    #[test]
    fn test_single_epoch_and_empty() {
        let coverage = TimeCoverage::from_ddm_utc(&[1_667_477_656.0]).unwrap();
        assert_eq!(coverage.resolution_s, None);
        assert_eq!(coverage.duration, "P0DT0H0M1S");

        assert!(TimeCoverage::from_ddm_utc(&[]).is_err());
    }

    #[test]
    fn test_midnight_crossing() {
        // 2022-11-03T23:59:58Z .. 2022-11-04T00:00:01Z
        let ddm_utc = [1_667_519_998.0, 1_667_519_999.0, 1_667_520_000.0, 1_667_520_001.0];
        let coverage = TimeCoverage::from_ddm_utc(&ddm_utc).unwrap();
        assert!(coverage.spans_day_change());
    }

    #[test]
    fn test_product_constants_defaults() {
        let constants = ProductConstants::default();
        assert_eq!(constants.ddm_source, 2);
        assert_eq!(constants.versions.gps_eirp_params, "7");
    }
}
