//! Core L1 processing modules

pub mod alignment;
pub mod calibrate;
pub mod context;
pub mod geolocation;
pub mod interpolate;
pub mod metadata;
pub mod pipeline;
pub mod time;
pub mod validity;

// Re-export main types
pub use alignment::{AlignedNavigation, AntennaTemperatures, NavigationAligner};
pub use calibrate::{
    CalibratedDdms, CalibratedRecord, CalibrationCurve, CalibrationProcessor, CalibrationTables,
    OutOfRangePolicy, PortMapping, RecordOutcome,
};
pub use context::{Level1Context, PortAssignment, ProcessingConfig};
pub use geolocation::{classify_land_ocean, ecef_to_geodetic, DistanceRaster};
pub use interpolate::{interpolate, LinearInterpolator};
pub use metadata::{LutVersions, ProductConstants, TimeCoverage};
pub use pipeline::{FlightTelemetry, Level1Processor, Level1Products};
pub use time::{LeapSecond, LeapSecondTable};
pub use validity::{check_record, RecordValidity, ValiditySummary};
