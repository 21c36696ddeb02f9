//! sxs-l1: Level-0 to Level-1a processing for airborne GNSS reflectometry
//!
//! Aligns receiver navigation to DDM epochs, geolocates the receiver, and
//! calibrates raw delay-Doppler map counts into power in watts.

pub mod core;
pub mod io;
pub mod types;

#[cfg(feature = "python")]
mod python;

// Re-export main types
pub use crate::types::{
    DdmTelemetry, EngineeringTelemetry, GeodeticPosition, GnssrError, GnssrResult, GpsEpoch,
    NavigationTelemetry, SurfaceStatus,
};

pub use crate::core::{
    CalibratedDdms, CalibrationProcessor, FlightTelemetry, Level1Context, Level1Processor,
    Level1Products, ProcessingConfig,
};
pub use crate::io::{read_calibration_tables, CalibrationTablePaths};
