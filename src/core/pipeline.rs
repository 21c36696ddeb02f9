//! Full L0 to L1a pass over one flight: alignment, calibration and product
//! metadata.

use crate::core::alignment::{
    apply_day_boundary_correction, detect_day_boundary, AlignedNavigation, NavigationAligner,
};
use crate::core::calibrate::{CalibratedDdms, CalibrationProcessor};
use crate::core::context::Level1Context;
use crate::core::metadata::{ProductConstants, TimeCoverage};
use crate::core::validity::ValiditySummary;
use crate::types::{DdmTelemetry, EngineeringTelemetry, GnssrResult, NavigationTelemetry};

/// Decoded L0 telemetry of one flight
#[derive(Debug, Clone)]
pub struct FlightTelemetry {
    pub navigation: NavigationTelemetry,
    pub ddm: DdmTelemetry,
    pub engineering: Option<EngineeringTelemetry>,
}

/// Everything the L1a stage hands to product writing
#[derive(Debug, Clone)]
pub struct Level1Products {
    pub navigation: AlignedNavigation,
    pub calibrated: CalibratedDdms,
    pub summary: ValiditySummary,
    pub coverage: TimeCoverage,
    /// First record on the new day when the flight crosses midnight
    pub day_boundary: Option<usize>,
    /// Sorted unique PRNs seen in the flight
    pub transmitters: Vec<u16>,
    pub constants: ProductConstants,
}

pub struct Level1Processor<'a> {
    context: &'a Level1Context,
}

impl<'a> Level1Processor<'a> {
    pub fn new(context: &'a Level1Context) -> Self {
        Self { context }
    }

    pub fn process(&self, flight: &FlightTelemetry) -> GnssrResult<Level1Products> {
        log::info!(
            "Starting L1 processing: {} seconds, {} NGRx channels",
            flight.ddm.n_seconds(),
            flight.ddm.n_channels()
        );

        let navigation = NavigationAligner::new(self.context).align(
            &flight.navigation,
            &flight.ddm,
            flight.engineering.as_ref(),
        )?;

        let coverage = TimeCoverage::from_ddm_utc(&navigation.ddm_utc)?;
        log::info!(
            "Time coverage {} to {} ({})",
            coverage.start_string(),
            coverage.end_string(),
            coverage.duration
        );

        let day_boundary = detect_day_boundary(&navigation.ddm_utc, &navigation.ddm_gps);
        apply_day_boundary_correction(&navigation, day_boundary);

        let (calibrated, summary) = CalibrationProcessor::new(self.context).calibrate(&flight.ddm)?;

        let transmitters = flight.ddm.unique_transmitters();
        log::debug!("{} transmitters tracked: {:?}", transmitters.len(), transmitters);

        log::info!("L1 processing complete");

        Ok(Level1Products {
            navigation,
            calibrated,
            summary,
            coverage,
            day_boundary,
            transmitters,
            constants: self.context.config().product.clone(),
        })
    }
}
