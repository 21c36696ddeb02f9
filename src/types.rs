use ndarray::{Array2, Array4, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum number of concurrent NGRx tracking channels (J)
pub const MAX_NGRX_CHANNELS: usize = 20;

/// Physical RF paths: RF1 zenith RHCP, RF2 nadir LHCP, RF3 nadir RHCP
pub const NUM_RF_PATHS: usize = 3;

/// Seconds in one GPS week
pub const SECONDS_PER_WEEK: f64 = 604_800.0;

/// Single DDM grid (delay bins x Doppler bins)
pub type DdmGrid = Array2<f64>;

/// DDMs for a whole flight (second x channel x delay x Doppler)
pub type DdmCube = Array4<f64>;

/// One value per (second, channel)
pub type ChannelTable = Array2<f64>;

/// Per-second noise standard deviation for each RF path
pub type NoiseStdDev = [f64; NUM_RF_PATHS];

/// GPS time expressed as week number and second of week
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsEpoch {
    pub week: i64,
    pub seconds: f64, // [0, 604800)
}

impl GpsEpoch {
    pub fn new(week: i64, seconds: f64) -> Self {
        Self { week, seconds }
    }

    /// Elapsed seconds since the GPS epoch (1980-01-06T00:00:00Z)
    pub fn total_seconds(&self) -> f64 {
        self.week as f64 * SECONDS_PER_WEEK + self.seconds
    }
}

/// Land/ocean classification of a sub-receiver point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceStatus {
    /// Over land, or on the coastline
    Land,
    /// Over ocean
    Ocean,
}

impl SurfaceStatus {
    /// Classify a signed distance-to-coast value (positive offshore)
    pub fn from_distance(distance: f64) -> Option<Self> {
        if distance.is_nan() {
            None
        } else if distance > 0.0 {
            Some(SurfaceStatus::Ocean)
        } else {
            Some(SurfaceStatus::Land)
        }
    }

    /// Status flag code written to the L1 product
    pub fn code(self) -> u8 {
        match self {
            SurfaceStatus::Land => 4,
            SurfaceStatus::Ocean => 5,
        }
    }
}

impl std::fmt::Display for SurfaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceStatus::Land => write!(f, "land"),
            SurfaceStatus::Ocean => write!(f, "ocean"),
        }
    }
}

/// WGS84 geodetic position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPosition {
    pub latitude: f64,  // degrees
    pub longitude: f64, // degrees
    pub altitude: f64,  // meters above the ellipsoid
}

/// Receiver navigation, attitude and clock solution at its native 1 Hz rate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationTelemetry {
    pub gps_week: Vec<i64>,
    pub gps_seconds: Vec<f64>,
    pub position_ecef: [Vec<f64>; 3], // meters
    pub velocity_ecef: [Vec<f64>; 3], // m/s
    pub roll: Vec<f64>,               // degrees
    pub pitch: Vec<f64>,              // degrees
    pub yaw: Vec<f64>,                // degrees
    pub clock_bias_m: Vec<f64>,
    pub clock_drift_mps: Vec<f64>,
}

impl NavigationTelemetry {
    pub fn len(&self) -> usize {
        self.gps_week.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gps_week.is_empty()
    }

    /// Check that every channel is aligned with the GPS time samples
    pub fn validate(&self) -> GnssrResult<()> {
        let n = self.len();
        let channels: [(&str, usize); 12] = [
            ("gps_seconds", self.gps_seconds.len()),
            ("position_x", self.position_ecef[0].len()),
            ("position_y", self.position_ecef[1].len()),
            ("position_z", self.position_ecef[2].len()),
            ("velocity_x", self.velocity_ecef[0].len()),
            ("velocity_y", self.velocity_ecef[1].len()),
            ("velocity_z", self.velocity_ecef[2].len()),
            ("roll", self.roll.len()),
            ("pitch", self.pitch.len()),
            ("yaw", self.yaw.len()),
            ("clock_bias_m", self.clock_bias_m.len()),
            ("clock_drift_mps", self.clock_drift_mps.len()),
        ];

        for (name, len) in channels {
            if len != n {
                return Err(GnssrError::Shape(format!(
                    "navigation channel {} has {} samples, expected {}",
                    name, len, n
                )));
            }
        }

        Ok(())
    }
}

/// DDM science telemetry, one record per (second, NGRx channel)
#[derive(Debug, Clone)]
pub struct DdmTelemetry {
    /// Transmitter PRN, `None` when the channel has no valid track
    pub transmitter_id: Array2<Option<u16>>,
    pub raw_counts: DdmCube,
    pub first_scale_factor: ChannelTable,
    pub rf_source: Array2<u8>,
    pub noise_std_dev: Vec<NoiseStdDev>,
    /// Non-coherent integration time per second, in seconds
    pub non_coherent_integration_s: Vec<f64>,
    /// NGRx estimate of the additional range to the specular point, meters
    pub add_range_to_sp: ChannelTable,
}

impl DdmTelemetry {
    pub fn n_seconds(&self) -> usize {
        self.raw_counts.dim().0
    }

    pub fn n_channels(&self) -> usize {
        self.raw_counts.dim().1
    }

    /// (delay bins, Doppler bins) of every DDM in the flight
    pub fn grid_dim(&self) -> (usize, usize) {
        let (_, _, delay, doppler) = self.raw_counts.dim();
        (delay, doppler)
    }

    /// Raw counts of one record
    pub fn raw_grid(&self, second: usize, channel: usize) -> ArrayView2<'_, f64> {
        self.raw_counts.slice(ndarray::s![second, channel, .., ..])
    }

    /// Check that the per-record tables agree with the counts cube
    pub fn validate(&self) -> GnssrResult<()> {
        let (n_sec, n_ch, _, _) = self.raw_counts.dim();
        let expected = (n_sec, n_ch);

        let tables: [(&str, (usize, usize)); 4] = [
            ("transmitter_id", self.transmitter_id.dim()),
            ("first_scale_factor", self.first_scale_factor.dim()),
            ("rf_source", self.rf_source.dim()),
            ("add_range_to_sp", self.add_range_to_sp.dim()),
        ];
        for (name, dim) in tables {
            if dim != expected {
                return Err(GnssrError::Shape(format!(
                    "DDM table {} has shape {:?}, expected {:?}",
                    name, dim, expected
                )));
            }
        }

        if self.noise_std_dev.len() != n_sec {
            return Err(GnssrError::Shape(format!(
                "noise std-dev has {} seconds, expected {}",
                self.noise_std_dev.len(),
                n_sec
            )));
        }
        if self.non_coherent_integration_s.len() != n_sec {
            return Err(GnssrError::Shape(format!(
                "non-coherent integration has {} seconds, expected {}",
                self.non_coherent_integration_s.len(),
                n_sec
            )));
        }

        Ok(())
    }

    /// Sorted unique PRNs tracked at any point during the flight
    pub fn unique_transmitters(&self) -> Vec<u16> {
        self.transmitter_id
            .iter()
            .filter_map(|prn| *prn)
            .filter(|&prn| prn > 0)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Engineering housekeeping stream (antenna temperatures)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineeringTelemetry {
    /// Packet creation time, UTC unix seconds
    pub packet_time_utc: Vec<f64>,
    pub zenith_antenna_temp: Vec<f64>,
    pub nadir_antenna_temp: Vec<f64>,
}

/// Error types for L1 processing
#[derive(Debug, thiserror::Error)]
pub enum GnssrError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RF source {tag} at second {second}, channel {channel} has no ANZ port mapping")]
    UnknownRfSource {
        tag: u8,
        second: usize,
        channel: usize,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for L1 operations
pub type GnssrResult<T> = Result<T, GnssrError>;
