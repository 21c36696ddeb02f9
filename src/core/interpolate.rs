use crate::types::{GnssrError, GnssrResult};
use ndarray::{Array2, ArrayView2, Axis};

/// Piecewise-linear interpolant with linear extrapolation past both ends.
///
/// Source epochs must be non-decreasing. When several samples share an epoch
/// the first one is kept and the later duplicates are dropped.
#[derive(Debug, Clone)]
pub struct LinearInterpolator {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl LinearInterpolator {
    pub fn new(x: &[f64], y: &[f64]) -> GnssrResult<Self> {
        if x.len() != y.len() {
            return Err(GnssrError::Shape(format!(
                "interpolation source has {} epochs but {} values",
                x.len(),
                y.len()
            )));
        }

        let mut xs = Vec::with_capacity(x.len());
        let mut ys = Vec::with_capacity(y.len());
        let mut duplicates = 0usize;

        for (i, (&xi, &yi)) in x.iter().zip(y).enumerate() {
            if xi.is_nan() {
                return Err(GnssrError::Processing(format!(
                    "interpolation source epoch {} is NaN",
                    i
                )));
            }
            match xs.last() {
                Some(&prev) if xi < prev => {
                    return Err(GnssrError::Processing(format!(
                        "interpolation source epochs decrease at index {} ({} < {})",
                        i, xi, prev
                    )));
                }
                Some(&prev) if xi == prev => duplicates += 1,
                _ => {
                    xs.push(xi);
                    ys.push(yi);
                }
            }
        }

        if duplicates > 0 {
            log::debug!("Dropped {} duplicate interpolation epochs", duplicates);
        }

        if xs.len() < 2 {
            return Err(GnssrError::Processing(format!(
                "linear interpolation needs at least 2 distinct epochs, got {}",
                xs.len()
            )));
        }

        Ok(Self { x: xs, y: ys })
    }

    /// First and last source epoch
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    pub fn contains(&self, t: f64) -> bool {
        let (lo, hi) = self.domain();
        t >= lo && t <= hi
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        let n = self.x.len();
        // Segment whose left edge is the last epoch <= t, clamped so that
        // targets outside the domain reuse the edge segments.
        let upper = self.x.partition_point(|&v| v <= t).clamp(1, n - 1);
        let lower = upper - 1;

        let (x0, x1) = (self.x[lower], self.x[upper]);
        let (y0, y1) = (self.y[lower], self.y[upper]);
        let weight = (t - x0) / (x1 - x0);

        y0 + weight * (y1 - y0)
    }

    pub fn evaluate_many(&self, targets: &[f64]) -> Vec<f64> {
        targets.iter().map(|&t| self.evaluate(t)).collect()
    }
}

/// Resample one telemetry channel onto new epochs
pub fn interpolate(
    source_epochs: &[f64],
    source_values: &[f64],
    target_epochs: &[f64],
) -> GnssrResult<Vec<f64>> {
    let interpolator = LinearInterpolator::new(source_epochs, source_values)?;
    Ok(interpolator.evaluate_many(target_epochs))
}

/// Resample a multi-channel table (epoch x channel) column by column
pub fn interpolate_columns(
    source_epochs: &[f64],
    source_values: ArrayView2<'_, f64>,
    target_epochs: &[f64],
) -> GnssrResult<Array2<f64>> {
    let (rows, cols) = source_values.dim();
    if rows != source_epochs.len() {
        return Err(GnssrError::Shape(format!(
            "table has {} rows but {} source epochs",
            rows,
            source_epochs.len()
        )));
    }

    let mut resampled = Array2::from_elem((target_epochs.len(), cols), f64::NAN);
    for (column, mut out) in source_values
        .axis_iter(Axis(1))
        .zip(resampled.axis_iter_mut(Axis(1)))
    {
        let values = column.to_vec();
        let interpolator = LinearInterpolator::new(source_epochs, &values)?;
        for (slot, &t) in out.iter_mut().zip(target_epochs) {
            *slot = interpolator.evaluate(t);
        }
    }

    Ok(resampled)
}
