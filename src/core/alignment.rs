use crate::core::context::Level1Context;
use crate::core::geolocation::{classify_land_ocean, ecef_to_geodetic};
use crate::core::interpolate::{interpolate_columns, LinearInterpolator};
use crate::types::{
    ChannelTable, DdmTelemetry, EngineeringTelemetry, GeodeticPosition, GnssrError, GnssrResult,
    GpsEpoch, NavigationTelemetry, SurfaceStatus,
};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Antenna temperatures resampled onto DDM epochs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntennaTemperatures {
    pub zenith: Vec<f64>,
    pub nadir: Vec<f64>,
}

/// Receiver state at every DDM epoch
#[derive(Debug, Clone)]
pub struct AlignedNavigation {
    /// Navigation fix times, UTC unix seconds
    pub pvt_utc: Vec<f64>,
    /// DDM timestamps (middle of the sampling period), UTC unix seconds
    pub ddm_utc: Vec<f64>,
    pub ddm_gps: Vec<GpsEpoch>,
    pub rx_position: [Vec<f64>; 3],
    pub rx_velocity: [Vec<f64>; 3],
    /// Roll, pitch, yaw in degrees
    pub rx_attitude: [Vec<f64>; 3],
    pub rx_clock_bias_m: Vec<f64>,
    pub rx_clock_drift_mps: Vec<f64>,
    /// Per NGRx channel (epoch x channel)
    pub add_range_to_sp: ChannelTable,
    pub antenna_temperatures: Option<AntennaTemperatures>,
    pub rx_geodetic: Vec<GeodeticPosition>,
    pub surface_status: Vec<Option<SurfaceStatus>>,
    /// False when some epoch lies past the leap-second table expiry
    pub leap_table_current: bool,
}

impl AlignedNavigation {
    pub fn len(&self) -> usize {
        self.ddm_utc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ddm_utc.is_empty()
    }

    /// Status flag codes, `None` where the land mask had no coverage
    pub fn surface_status_codes(&self) -> Vec<Option<u8>> {
        self.surface_status
            .iter()
            .map(|s| s.map(SurfaceStatus::code))
            .collect()
    }
}

/// DDM epochs: navigation time plus half the non-coherent integration
pub fn ddm_epochs(pvt_utc: &[f64], non_coherent_integration_s: &[f64]) -> GnssrResult<Vec<f64>> {
    if pvt_utc.len() != non_coherent_integration_s.len() {
        return Err(GnssrError::Shape(format!(
            "{} navigation epochs but {} DDM integration times",
            pvt_utc.len(),
            non_coherent_integration_s.len()
        )));
    }

    Ok(pvt_utc
        .iter()
        .zip(non_coherent_integration_s)
        .map(|(&t, &integration)| t + integration / 2.0)
        .collect())
}

/// Resamples navigation and engineering telemetry onto DDM epochs
pub struct NavigationAligner<'a> {
    context: &'a Level1Context,
}

impl<'a> NavigationAligner<'a> {
    pub fn new(context: &'a Level1Context) -> Self {
        Self { context }
    }

    pub fn align(
        &self,
        navigation: &NavigationTelemetry,
        ddm: &DdmTelemetry,
        engineering: Option<&EngineeringTelemetry>,
    ) -> GnssrResult<AlignedNavigation> {
        navigation.validate()?;
        ddm.validate()?;

        if navigation.len() != ddm.n_seconds() {
            return Err(GnssrError::Shape(format!(
                "{} navigation fixes but {} DDM seconds",
                navigation.len(),
                ddm.n_seconds()
            )));
        }

        log::info!("Aligning {} navigation fixes to DDM epochs", navigation.len());

        let leap_seconds = self.context.leap_seconds();
        let pvt_utc = leap_seconds.gps_to_utc_array(&navigation.gps_week, &navigation.gps_seconds)?;
        let ddm_utc = ddm_epochs(&pvt_utc, &ddm.non_coherent_integration_s)?;
        let ddm_gps = leap_seconds.utc_to_gps_array(&ddm_utc);
        let leap_table_current = leap_seconds.check_validity(&ddm_utc);

        let resample = |values: &[f64]| -> GnssrResult<Vec<f64>> {
            Ok(LinearInterpolator::new(&pvt_utc, values)?.evaluate_many(&ddm_utc))
        };

        let rx_position = [
            resample(&navigation.position_ecef[0])?,
            resample(&navigation.position_ecef[1])?,
            resample(&navigation.position_ecef[2])?,
        ];
        let rx_velocity = [
            resample(&navigation.velocity_ecef[0])?,
            resample(&navigation.velocity_ecef[1])?,
            resample(&navigation.velocity_ecef[2])?,
        ];
        let rx_attitude = [
            resample(&navigation.roll)?,
            resample(&navigation.pitch)?,
            resample(&navigation.yaw)?,
        ];
        let rx_clock_bias_m = resample(&navigation.clock_bias_m)?;
        let rx_clock_drift_mps = resample(&navigation.clock_drift_mps)?;

        let add_range_to_sp = interpolate_columns(&pvt_utc, ddm.add_range_to_sp.view(), &ddm_utc)?;

        let antenna_temperatures = engineering
            .map(|eng| resample_engineering(eng, &ddm_utc))
            .transpose()?;

        let rx_geodetic = ecef_to_geodetic(&rx_position[0], &rx_position[1], &rx_position[2])?;
        let surface_status = match self.context.land_mask() {
            Some(raster) => {
                let lats: Vec<f64> = rx_geodetic.iter().map(|p| p.latitude).collect();
                let lons: Vec<f64> = rx_geodetic.iter().map(|p| p.longitude).collect();
                classify_land_ocean(&lats, &lons, raster)?
            }
            None => {
                log::warn!("No land mask loaded; surface status left unset");
                vec![None; ddm_utc.len()]
            }
        };

        log::debug!(
            "Aligned {} epochs, {} with surface status",
            ddm_utc.len(),
            surface_status.iter().filter(|s| s.is_some()).count()
        );

        Ok(AlignedNavigation {
            pvt_utc,
            ddm_utc,
            ddm_gps,
            rx_position,
            rx_velocity,
            rx_attitude,
            rx_clock_bias_m,
            rx_clock_drift_mps,
            add_range_to_sp,
            antenna_temperatures,
            rx_geodetic,
            surface_status,
            leap_table_current,
        })
    }
}

fn resample_engineering(
    engineering: &EngineeringTelemetry,
    ddm_utc: &[f64],
) -> GnssrResult<AntennaTemperatures> {
    let times = &engineering.packet_time_utc;
    Ok(AntennaTemperatures {
        zenith: LinearInterpolator::new(times, &engineering.zenith_antenna_temp)?
            .evaluate_many(ddm_utc),
        nadir: LinearInterpolator::new(times, &engineering.nadir_antenna_temp)?
            .evaluate_many(ddm_utc),
    })
}

/// Index of the first DDM epoch on a new GPS day, if the flight crosses UTC
/// midnight
pub fn detect_day_boundary(ddm_utc: &[f64], ddm_gps: &[GpsEpoch]) -> Option<usize> {
    let (&first, &last) = (ddm_utc.first()?, ddm_utc.last()?);
    let utc_day = |t: f64| (t / SECONDS_PER_DAY).floor();
    if utc_day(first) == utc_day(last) {
        return None;
    }

    let gps_day = |e: &GpsEpoch| (e.total_seconds() / SECONDS_PER_DAY).floor();
    ddm_gps
        .windows(2)
        .position(|w| gps_day(&w[1]) > gps_day(&w[0]))
        .map(|i| i + 1)
}

/// Hook for splitting per-day transmitter products at a day boundary.
///
/// Downstream transmitter geometry selects one orbit file per GPS day; that
/// stage is not part of this crate, so the boundary is only reported here and
/// the aligned navigation is left untouched.
pub fn apply_day_boundary_correction(navigation: &AlignedNavigation, boundary: Option<usize>) {
    if let Some(index) = boundary {
        log::info!(
            "DDM epochs cross a day boundary at record {} of {}; no per-day correction applied",
            index,
            navigation.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::LeapSecondTable;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ddm_epochs_offset_by_half_integration() {
        let epochs = ddm_epochs(&[100.0, 101.0], &[1.0, 0.5]).unwrap();
        assert_abs_diff_eq!(epochs[0], 100.5, epsilon = 1e-12);
        assert_abs_diff_eq!(epochs[1], 101.25, epsilon = 1e-12);

        assert!(ddm_epochs(&[100.0], &[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_day_boundary_detection() {
        let table = LeapSecondTable::builtin();
        // 2022-11-03T23:59:40Z at 1 Hz for 60 s; GPS runs 18 s ahead of UTC
        let ddm_utc: Vec<f64> = (0..60).map(|i| 1_667_519_980.0 + i as f64).collect();
        let ddm_gps = table.utc_to_gps_array(&ddm_utc);

        let boundary = detect_day_boundary(&ddm_utc, &ddm_gps);
        assert_eq!(boundary, Some(2));

        let same_day: Vec<f64> = (0..10).map(|i| 1_667_477_656.0 + i as f64).collect();
        let same_day_gps = table.utc_to_gps_array(&same_day);
        assert_eq!(detect_day_boundary(&same_day, &same_day_gps), None);
    }

    #[test]
    fn test_day_boundary_at_gps_week_rollover() {
        let table = LeapSecondTable::builtin();
        // GPS week 2235 starts at 2022-11-05T23:59:42Z, 18 s before UTC midnight
        let ddm_utc: Vec<f64> = (0..60).map(|i| 1_667_692_770.0 + i as f64).collect();
        let ddm_gps = table.utc_to_gps_array(&ddm_utc);

        assert_eq!(ddm_gps[11].week, 2234);
        assert_eq!(ddm_gps[12].week, 2235);
        assert_abs_diff_eq!(ddm_gps[12].seconds, 0.0, epsilon = 1e-6);

        assert_eq!(detect_day_boundary(&ddm_utc, &ddm_gps), Some(12));
    }
}
