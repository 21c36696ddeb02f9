//! Processing configuration and the immutable context shared by every stage.

use crate::core::calibrate::{
    CalibrationTables, OutOfRangePolicy, PortMapping, DEFAULT_BINNING_THRESHOLD_DB,
    DEFAULT_PORT_MAPPING, NUM_ANZ_PORTS,
};
use crate::core::geolocation::DistanceRaster;
use crate::core::metadata::ProductConstants;
use crate::core::time::{LeapSecond, LeapSecondTable};
use crate::types::{GnssrError, GnssrResult, MAX_NGRX_CHANNELS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One RF source tag to ANZ port assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAssignment {
    pub rf_source: u8,
    pub anz_port: usize,
}

/// Tunable parameters of an L1 run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Receiver tracking capacity J
    pub max_ngrx_channels: usize,
    pub port_mapping: Vec<PortAssignment>,
    /// Binning threshold per ANZ port, dB
    pub binning_threshold_db: [f64; NUM_ANZ_PORTS],
    pub out_of_range_policy: OutOfRangePolicy,
    /// Calibrate records on the rayon pool (needs the `parallel` feature)
    pub parallel: bool,
    /// Leap seconds announced after the builtin table was compiled
    pub extra_leap_seconds: Vec<LeapSecond>,
    pub leap_table_expires: Option<DateTime<Utc>>,
    pub product: ProductConstants,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_ngrx_channels: MAX_NGRX_CHANNELS,
            port_mapping: DEFAULT_PORT_MAPPING
                .iter()
                .map(|&(rf_source, anz_port)| PortAssignment {
                    rf_source,
                    anz_port,
                })
                .collect(),
            binning_threshold_db: DEFAULT_BINNING_THRESHOLD_DB,
            out_of_range_policy: OutOfRangePolicy::default(),
            parallel: cfg!(feature = "parallel"),
            extra_leap_seconds: Vec::new(),
            leap_table_expires: None,
            product: ProductConstants::default(),
        }
    }
}

impl ProcessingConfig {
    pub fn from_json_str(json: &str) -> GnssrResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> GnssrResult<Self> {
        log::info!("Reading processing config: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> GnssrResult<()> {
        if self.max_ngrx_channels == 0 {
            return Err(GnssrError::Config(
                "max_ngrx_channels must be positive".to_string(),
            ));
        }
        if let Some(bad) = self.binning_threshold_db.iter().find(|t| !t.is_finite()) {
            return Err(GnssrError::Config(format!(
                "binning threshold {} is not finite",
                bad
            )));
        }
        self.build_port_mapping()?;
        Ok(())
    }

    pub fn build_port_mapping(&self) -> GnssrResult<PortMapping> {
        let pairs: Vec<(u8, usize)> = self
            .port_mapping
            .iter()
            .map(|a| (a.rf_source, a.anz_port))
            .collect();
        PortMapping::new(&pairs)
    }

    pub fn build_leap_table(&self) -> GnssrResult<LeapSecondTable> {
        if self.extra_leap_seconds.is_empty() && self.leap_table_expires.is_none() {
            return Ok(LeapSecondTable::builtin());
        }
        LeapSecondTable::extended(&self.extra_leap_seconds, self.leap_table_expires)
    }
}

/// Everything a run reads but never mutates, built once at startup
#[derive(Debug, Clone)]
pub struct Level1Context {
    config: ProcessingConfig,
    port_mapping: PortMapping,
    calibration: CalibrationTables,
    leap_seconds: LeapSecondTable,
    land_mask: Option<DistanceRaster>,
}

impl Level1Context {
    pub fn new(config: ProcessingConfig, calibration: CalibrationTables) -> GnssrResult<Self> {
        config.validate()?;
        let port_mapping = config.build_port_mapping()?;
        let leap_seconds = config.build_leap_table()?;

        if let Some(max_port) = port_mapping.max_port() {
            if max_port >= calibration.len() {
                return Err(GnssrError::Config(format!(
                    "port mapping reaches ANZ port {} but only {} calibration curves are loaded",
                    max_port,
                    calibration.len()
                )));
            }
        }

        if cfg!(not(feature = "parallel")) && config.parallel {
            log::warn!("Parallel calibration requested but the `parallel` feature is disabled");
        }

        log::debug!(
            "L1 context ready: {} calibration curves, J = {}, leap table expires {:?}",
            calibration.len(),
            config.max_ngrx_channels,
            leap_seconds.expires()
        );

        Ok(Self {
            config,
            port_mapping,
            calibration,
            leap_seconds,
            land_mask: None,
        })
    }

    pub fn with_land_mask(mut self, raster: DistanceRaster) -> Self {
        self.land_mask = Some(raster);
        self
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn port_mapping(&self) -> &PortMapping {
        &self.port_mapping
    }

    pub fn calibration(&self) -> &CalibrationTables {
        &self.calibration
    }

    pub fn leap_seconds(&self) -> &LeapSecondTable {
        &self.leap_seconds
    }

    pub fn land_mask(&self) -> Option<&DistanceRaster> {
        self.land_mask.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calibrate::CalibrationCurve;

    fn tables(count: usize) -> CalibrationTables {
        let curve = CalibrationCurve::new(&[0.0, 100.0], &[-120.0, -20.0]).unwrap();
        CalibrationTables::new(vec![curve; count]).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ProcessingConfig::default();
        assert_eq!(config.max_ngrx_channels, 20);
        assert_eq!(config.binning_threshold_db, [50.5, 49.6, 50.4]);
        assert_eq!(config.port_mapping.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "out_of_range_policy": "extrapolate", "parallel": false }"#;
        let config = ProcessingConfig::from_json_str(json).unwrap();
        assert_eq!(config.out_of_range_policy, OutOfRangePolicy::Extrapolate);
        assert!(!config.parallel);
        assert_eq!(config.max_ngrx_channels, 20);
    }

    #[test]
    fn test_invalid_mapping_rejected() {
        let json = r#"{ "port_mapping": [
            { "rf_source": 0, "anz_port": 0 },
            { "rf_source": 4, "anz_port": 0 }
        ] }"#;
        assert!(ProcessingConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_context_needs_curve_per_port() {
        let result = Level1Context::new(ProcessingConfig::default(), tables(2));
        assert!(result.is_err());

        let context = Level1Context::new(ProcessingConfig::default(), tables(3)).unwrap();
        assert_eq!(context.port_mapping().port_for(8), Some(2));
        assert!(context.land_mask().is_none());
    }
}
