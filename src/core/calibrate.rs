use crate::core::context::Level1Context;
use crate::core::interpolate::LinearInterpolator;
use crate::core::validity::{check_record, RecordValidity, ValiditySummary};
use crate::types::{
    ChannelTable, DdmCube, DdmGrid, DdmTelemetry, GnssrError, GnssrResult, NoiseStdDev,
    NUM_RF_PATHS,
};
use ndarray::{s, Array2, Array4, ArrayView2};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Number of physical ANZ acquisition ports
pub const NUM_ANZ_PORTS: usize = 3;

/// Fixed binning/detection threshold baked into the raw counts, per ANZ port
pub const DEFAULT_BINNING_THRESHOLD_DB: [f64; NUM_ANZ_PORTS] = [50.5, 49.6, 50.4];

/// Default RF source tag to ANZ port assignment
pub const DEFAULT_PORT_MAPPING: [(u8, usize); NUM_ANZ_PORTS] = [(0, 0), (4, 1), (8, 2)];

/// What a calibration curve returns for inputs outside its tabulated range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Return NaN, which propagates through the affected DDM bins
    #[default]
    Nan,
    /// Extend the edge segments linearly
    Extrapolate,
}

fn lit<T: Float>(value: f64) -> T {
    T::from(value).unwrap_or_else(T::nan)
}

/// Power ratio to dB; non-positive input has no logarithm and yields NaN
pub fn power_to_db<T: Float>(power: T) -> T {
    if power > T::zero() {
        lit::<T>(10.0) * power.log10()
    } else {
        T::nan()
    }
}

/// Amplitude ratio to dB (20 log10); zero maps to -inf
pub fn amplitude_to_db<T: Float>(amplitude: T) -> T {
    lit::<T>(20.0) * amplitude.log10()
}

pub fn db_to_power<T: Float>(db: T) -> T {
    lit::<T>(10.0).powf(db / lit(10.0))
}

pub fn dbm_to_watts<T: Float>(dbm: T) -> T {
    db_to_power(dbm - lit(30.0))
}

/// Monotone counts-in-dB to power-in-dBm mapping for one ANZ port
#[derive(Debug, Clone)]
pub struct CalibrationCurve {
    interpolator: LinearInterpolator,
}

impl CalibrationCurve {
    pub fn new(counts_db: &[f64], power_dbm: &[f64]) -> GnssrResult<Self> {
        if counts_db.len() != power_dbm.len() {
            return Err(GnssrError::InvalidFormat(format!(
                "calibration curve has {} counts but {} power values",
                counts_db.len(),
                power_dbm.len()
            )));
        }
        if counts_db.len() < 2 {
            return Err(GnssrError::InvalidFormat(
                "calibration curve needs at least 2 points".to_string(),
            ));
        }

        let increasing = counts_db.windows(2).all(|w| w[1] > w[0]);
        let decreasing = counts_db.windows(2).all(|w| w[1] < w[0]);

        let interpolator = if increasing {
            LinearInterpolator::new(counts_db, power_dbm)?
        } else if decreasing {
            let x: Vec<f64> = counts_db.iter().rev().copied().collect();
            let y: Vec<f64> = power_dbm.iter().rev().copied().collect();
            LinearInterpolator::new(&x, &y)?
        } else {
            return Err(GnssrError::InvalidFormat(
                "calibration curve counts are not strictly monotonic".to_string(),
            ));
        };

        let power_monotone = power_dbm.windows(2).all(|w| w[1] >= w[0])
            || power_dbm.windows(2).all(|w| w[1] <= w[0]);
        if !power_monotone {
            log::warn!("Calibration curve power values are not monotonic");
        }

        Ok(Self { interpolator })
    }

    /// Tabulated counts range in dB
    pub fn domain(&self) -> (f64, f64) {
        self.interpolator.domain()
    }

    pub fn evaluate(&self, counts_db: f64, policy: OutOfRangePolicy) -> f64 {
        if counts_db.is_nan() {
            return f64::NAN;
        }
        match policy {
            OutOfRangePolicy::Nan if !self.interpolator.contains(counts_db) => f64::NAN,
            _ => self.interpolator.evaluate(counts_db),
        }
    }
}

/// Calibration curves indexed by zero-based ANZ port
#[derive(Debug, Clone)]
pub struct CalibrationTables {
    curves: Vec<CalibrationCurve>,
}

impl CalibrationTables {
    pub fn new(curves: Vec<CalibrationCurve>) -> GnssrResult<Self> {
        if curves.is_empty() {
            return Err(GnssrError::Config(
                "at least one calibration curve is required".to_string(),
            ));
        }
        Ok(Self { curves })
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn curve(&self, port: usize) -> GnssrResult<&CalibrationCurve> {
        self.curves.get(port).ok_or_else(|| {
            GnssrError::Config(format!(
                "no calibration curve for ANZ port {} ({} loaded)",
                port,
                self.curves.len()
            ))
        })
    }
}

/// Injective RF source tag to zero-based ANZ port mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    assignments: Vec<(u8, usize)>,
}

impl Default for PortMapping {
    fn default() -> Self {
        Self {
            assignments: DEFAULT_PORT_MAPPING.to_vec(),
        }
    }
}

impl PortMapping {
    pub fn new(assignments: &[(u8, usize)]) -> GnssrResult<Self> {
        for (i, &(tag, port)) in assignments.iter().enumerate() {
            if port >= NUM_ANZ_PORTS {
                return Err(GnssrError::Config(format!(
                    "RF source {} mapped to ANZ port {}, only {} ports exist",
                    tag, port, NUM_ANZ_PORTS
                )));
            }
            for &(other_tag, other_port) in &assignments[..i] {
                if other_tag == tag {
                    return Err(GnssrError::Config(format!(
                        "RF source {} is mapped twice",
                        tag
                    )));
                }
                if other_port == port {
                    return Err(GnssrError::Config(format!(
                        "ANZ port {} is the target of RF sources {} and {}",
                        port, other_tag, tag
                    )));
                }
            }
        }

        Ok(Self {
            assignments: assignments.to_vec(),
        })
    }

    pub fn port_for(&self, rf_source: u8) -> Option<usize> {
        self.assignments
            .iter()
            .find(|&&(tag, _)| tag == rf_source)
            .map(|&(_, port)| port)
    }

    /// Highest port any tag maps to
    pub fn max_port(&self) -> Option<usize> {
        self.assignments.iter().map(|&(_, port)| port).max()
    }
}

/// Calibration products of a single (second, channel) DDM
#[derive(Debug, Clone)]
pub struct CalibratedRecord {
    pub counts_scaled: DdmGrid,
    pub power_watts: DdmGrid,
    /// 1-based ANZ port identifier
    pub anz_port: u8,
    pub peak_counts: f64,
    pub peak_power: f64,
    /// Delay row of the first bin holding the peak counts (row-major order)
    pub peak_delay_bin: Option<usize>,
    /// Counts per watt at the DDM peak; NaN when any bin has no power
    pub instrument_gain: f64,
}

#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Skipped(RecordValidity),
    Calibrated(CalibratedRecord),
}

/// Output slots for a whole flight, pre-filled with NaN / `None`
#[derive(Debug, Clone)]
pub struct CalibratedDdms {
    pub counts_scaled: DdmCube,
    pub power_watts: DdmCube,
    pub anz_port: Array2<Option<u8>>,
    pub instrument_gain: ChannelTable,
    pub peak_delay_bin: Array2<Option<usize>>,
    /// Gate outcome per record, `None` until processed
    pub validity: Array2<Option<RecordValidity>>,
}

impl CalibratedDdms {
    pub fn new_empty(seconds: usize, channels: usize, delay_bins: usize, doppler_bins: usize) -> Self {
        let cube = (seconds, channels, delay_bins, doppler_bins);
        let table = (seconds, channels);
        Self {
            counts_scaled: Array4::from_elem(cube, f64::NAN),
            power_watts: Array4::from_elem(cube, f64::NAN),
            anz_port: Array2::from_elem(table, None),
            instrument_gain: Array2::from_elem(table, f64::NAN),
            peak_delay_bin: Array2::from_elem(table, None),
            validity: Array2::from_elem(table, None),
        }
    }

    /// Empty outputs shaped like the given telemetry
    pub fn for_telemetry(ddm: &DdmTelemetry) -> Self {
        let (delay, doppler) = ddm.grid_dim();
        Self::new_empty(ddm.n_seconds(), ddm.n_channels(), delay, doppler)
    }

    pub fn dim(&self) -> (usize, usize, usize, usize) {
        self.counts_scaled.dim()
    }

    fn store(&mut self, second: usize, channel: usize, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Skipped(validity) => {
                self.validity[[second, channel]] = Some(*validity);
            }
            RecordOutcome::Calibrated(record) => {
                self.counts_scaled
                    .slice_mut(s![second, channel, .., ..])
                    .assign(&record.counts_scaled);
                self.power_watts
                    .slice_mut(s![second, channel, .., ..])
                    .assign(&record.power_watts);
                self.anz_port[[second, channel]] = Some(record.anz_port);
                self.instrument_gain[[second, channel]] = record.instrument_gain;
                self.peak_delay_bin[[second, channel]] = record.peak_delay_bin;
                self.validity[[second, channel]] = Some(RecordValidity::Valid);
            }
        }
    }
}

/// L1a DDM calibration: raw counts to power in watts
pub struct CalibrationProcessor<'a> {
    context: &'a Level1Context,
}

impl<'a> CalibrationProcessor<'a> {
    pub fn new(context: &'a Level1Context) -> Self {
        Self { context }
    }

    /// Convert a grid of scaled counts to calibrated power in watts
    pub fn counts_to_watts(
        &self,
        counts: ArrayView2<'_, f64>,
        port: usize,
        std_dev: &NoiseStdDev,
    ) -> GnssrResult<DdmGrid> {
        let (curve, correction_db) = self.port_calibration(port, std_dev)?;
        let policy = self.context.config().out_of_range_policy;
        Ok(counts.mapv(|c| bin_to_watts(curve, c, correction_db, policy)))
    }

    /// Scalar form of [`counts_to_watts`](Self::counts_to_watts)
    pub fn counts_to_watts_scalar(
        &self,
        counts: f64,
        port: usize,
        std_dev: &NoiseStdDev,
    ) -> GnssrResult<f64> {
        let (curve, correction_db) = self.port_calibration(port, std_dev)?;
        let policy = self.context.config().out_of_range_policy;
        Ok(bin_to_watts(curve, counts, correction_db, policy))
    }

    /// Curve for a port and its dB correction (noise floor minus binning threshold)
    fn port_calibration(
        &self,
        port: usize,
        std_dev: &NoiseStdDev,
    ) -> GnssrResult<(&'a CalibrationCurve, f64)> {
        if port >= NUM_RF_PATHS {
            return Err(GnssrError::Config(format!(
                "ANZ port {} has no noise statistics",
                port
            )));
        }

        let curve = self.context.calibration().curve(port)?;
        let std_db = amplitude_to_db(std_dev[port]);
        // Cable loss is compensated later, when computing the BRCS
        let correction_db = std_db - self.context.config().binning_threshold_db[port];
        Ok((curve, correction_db))
    }

    /// Gate and calibrate one (second, channel) record
    pub fn calibrate_record(
        &self,
        ddm: &DdmTelemetry,
        second: usize,
        channel: usize,
    ) -> GnssrResult<RecordOutcome> {
        let raw_counts = ddm.raw_grid(second, channel);
        let validity = check_record(ddm.transmitter_id[[second, channel]], raw_counts);
        if !validity.is_valid() {
            return Ok(RecordOutcome::Skipped(validity));
        }

        let tag = ddm.rf_source[[second, channel]];
        let port = self
            .context
            .port_mapping()
            .port_for(tag)
            .ok_or(GnssrError::UnknownRfSource {
                tag,
                second,
                channel,
            })?;

        let scale = ddm.first_scale_factor[[second, channel]];
        let counts_scaled = raw_counts.mapv(|c| c * scale);
        let power_watts =
            self.counts_to_watts(counts_scaled.view(), port, &ddm.noise_std_dev[second])?;

        let (peak_counts, peak_delay_bin) = peak_with_delay_bin(counts_scaled.view());
        let peak_power = propagating_max(power_watts.iter().copied());

        Ok(RecordOutcome::Calibrated(CalibratedRecord {
            counts_scaled,
            power_watts,
            anz_port: (port + 1) as u8,
            peak_counts,
            peak_power,
            peak_delay_bin,
            instrument_gain: peak_counts / peak_power,
        }))
    }

    /// Calibrate every record into pre-allocated outputs
    pub fn calibrate_into(
        &self,
        ddm: &DdmTelemetry,
        output: &mut CalibratedDdms,
    ) -> GnssrResult<ValiditySummary> {
        ddm.validate()?;

        let (n_sec, n_ch) = (ddm.n_seconds(), ddm.n_channels());
        let (delay, doppler) = ddm.grid_dim();
        if output.dim() != (n_sec, n_ch, delay, doppler) {
            return Err(GnssrError::Shape(format!(
                "calibration outputs have shape {:?}, telemetry is {:?}",
                output.dim(),
                (n_sec, n_ch, delay, doppler)
            )));
        }

        let max_channels = self.context.config().max_ngrx_channels;
        if n_ch > max_channels {
            return Err(GnssrError::Shape(format!(
                "telemetry has {} NGRx channels, receiver capacity is {}",
                n_ch, max_channels
            )));
        }

        log::info!(
            "Calibrating {} DDM records ({} s x {} channels, {}x{} bins)",
            n_sec * n_ch,
            n_sec,
            n_ch,
            delay,
            doppler
        );

        let mut summary = ValiditySummary::default();

        #[cfg(feature = "parallel")]
        {
            if self.context.config().parallel {
                for (second, channel, outcome) in self.calibrate_records_parallel(ddm)? {
                    record_outcome(output, &mut summary, second, channel, &outcome);
                }
                log_summary(&summary);
                return Ok(summary);
            }
        }

        for second in 0..n_sec {
            for channel in 0..n_ch {
                let outcome = self.calibrate_record(ddm, second, channel)?;
                record_outcome(output, &mut summary, second, channel, &outcome);
            }
        }

        log_summary(&summary);
        Ok(summary)
    }

    /// Calibrate every record into freshly allocated outputs
    pub fn calibrate(&self, ddm: &DdmTelemetry) -> GnssrResult<(CalibratedDdms, ValiditySummary)> {
        let mut output = CalibratedDdms::for_telemetry(ddm);
        let summary = self.calibrate_into(ddm, &mut output)?;
        Ok((output, summary))
    }

    /// Records are independent, so they can be calibrated in any order
    #[cfg(feature = "parallel")]
    fn calibrate_records_parallel(
        &self,
        ddm: &DdmTelemetry,
    ) -> GnssrResult<Vec<(usize, usize, RecordOutcome)>> {
        use rayon::prelude::*;

        log::debug!("Calibrating DDM records in parallel");

        let n_ch = ddm.n_channels();
        let indices: Vec<(usize, usize)> = (0..ddm.n_seconds())
            .flat_map(|second| (0..n_ch).map(move |channel| (second, channel)))
            .collect();

        indices
            .into_par_iter()
            .map(|(second, channel)| {
                self.calibrate_record(ddm, second, channel)
                    .map(|outcome| (second, channel, outcome))
            })
            .collect()
    }
}

fn record_outcome(
    output: &mut CalibratedDdms,
    summary: &mut ValiditySummary,
    second: usize,
    channel: usize,
    outcome: &RecordOutcome,
) {
    match outcome {
        RecordOutcome::Skipped(validity) => summary.record(*validity),
        RecordOutcome::Calibrated(_) => summary.record(RecordValidity::Valid),
    }
    output.store(second, channel, outcome);
}

fn log_summary(summary: &ValiditySummary) {
    log::info!(
        "Calibrated {} of {} DDM records ({} skipped)",
        summary.valid,
        summary.total(),
        summary.skipped()
    );
    log::debug!(
        "Skipped records: {} without track, {} dead, {} stuck, {} undersized",
        summary.no_track,
        summary.dead_record,
        summary.stuck_buffer,
        summary.grid_too_small
    );
}

fn bin_to_watts(
    curve: &CalibrationCurve,
    counts: f64,
    correction_db: f64,
    policy: OutOfRangePolicy,
) -> f64 {
    let counts_db = power_to_db(counts);
    let power_dbm = curve.evaluate(counts_db, policy) + correction_db;
    dbm_to_watts(power_dbm)
}

/// Largest non-NaN value; NaN when every value is NaN
fn nan_max(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::NAN, f64::max)
}

/// Largest value, NaN as soon as any value is NaN
fn propagating_max(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::NEG_INFINITY, |peak, v| {
        if peak.is_nan() || v.is_nan() {
            f64::NAN
        } else {
            peak.max(v)
        }
    })
}

fn peak_with_delay_bin(counts: ArrayView2<'_, f64>) -> (f64, Option<usize>) {
    let peak = nan_max(counts.iter().copied());
    let delay_bin = counts
        .indexed_iter()
        .find(|&(_, &value)| value == peak)
        .map(|((delay, _), _)| delay);
    (peak, delay_bin)
}
