//! Compression of masked L0 telemetry.
//!
//! Decoded L0 variables mark missing samples explicitly as `None`. Each
//! telemetry shape has its own compression rule, applied before the data is
//! assembled into [`NavigationTelemetry`](crate::types::NavigationTelemetry)
//! or [`DdmTelemetry`](crate::types::DdmTelemetry).

use crate::types::{GnssrError, GnssrResult};
use ndarray::{Array2, Array4, ArrayView2, ArrayView4, Axis};

/// 1D series: drop missing samples
pub fn compress_series<T: Copy>(values: &[Option<T>]) -> Vec<T> {
    values.iter().flatten().copied().collect()
}

/// 2D table: drop every row holding a missing or non-finite value
pub fn compress_rows(table: ArrayView2<'_, Option<f64>>) -> GnssrResult<Array2<f64>> {
    let cols = table.ncols();
    let kept: Vec<f64> = table
        .axis_iter(Axis(0))
        .filter(|row| row.iter().all(|v| v.map_or(false, f64::is_finite)))
        .flat_map(|row| row.into_iter().flatten().copied())
        .collect();

    let rows = if cols == 0 { 0 } else { kept.len() / cols };
    if rows < table.nrows() {
        log::debug!("Dropped {} incomplete rows of {}", table.nrows() - rows, table.nrows());
    }

    Array2::from_shape_vec((rows, cols), kept)
        .map_err(|e| GnssrError::Shape(format!("compressed table: {}", e)))
}

/// 4D cube (second x channel x delay x Doppler): keep the seconds whose
/// `[s, 0, 0, 0]` sample is present; missing bins inside a kept second
/// become NaN
pub fn compress_seconds(cube: ArrayView4<'_, Option<f64>>) -> Array4<f64> {
    let (_, channels, delay, doppler) = cube.dim();
    let has_corner = channels > 0 && delay > 0 && doppler > 0;
    let kept: Vec<usize> = (0..cube.dim().0)
        .filter(|&s| has_corner && cube[[s, 0, 0, 0]].is_some())
        .collect();

    if kept.len() < cube.dim().0 {
        log::debug!("Dropped {} masked seconds of {}", cube.dim().0 - kept.len(), cube.dim().0);
    }

    cube.select(Axis(0), &kept).mapv(|v| v.unwrap_or(f64::NAN))
}

/// PRN decoded from a float telemetry field; only a non-finite value means
/// the channel had no track. PRN 0 stays `Some(0)` and is still calibrated.
pub fn transmitter_from_raw(value: f64) -> Option<u16> {
    if value.is_finite() {
        // float to int casts saturate, so out-of-range values clamp
        Some(value.round() as u16)
    } else {
        None
    }
}

pub fn transmitter_table_from_raw(raw: ArrayView2<'_, f64>) -> Array2<Option<u16>> {
    raw.mapv(transmitter_from_raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validity::{check_record, RecordValidity};
    use ndarray::{array, Array4};

    #[test]
    fn test_compress_series() {
        let values = [Some(1.0), None, Some(3.0), None];
        assert_eq!(compress_series(&values), vec![1.0, 3.0]);
        assert!(compress_series::<f64>(&[None, None]).is_empty());
    }

    #[test]
    fn test_compress_rows_drops_incomplete() {
        let table = array![
            [Some(1.0), Some(2.0)],
            [Some(3.0), None],
            [Some(f64::NAN), Some(4.0)],
            [Some(5.0), Some(6.0)]
        ];
        let compressed = compress_rows(table.view()).unwrap();
        assert_eq!(compressed, array![[1.0, 2.0], [5.0, 6.0]]);
    }

    #[test]
    fn test_compress_seconds_uses_corner_sample() {
        let mut cube = Array4::from_elem((3, 2, 2, 2), Some(7.0));
        cube[[1, 0, 0, 0]] = None;
        cube[[2, 1, 1, 1]] = None;

        let compressed = compress_seconds(cube.view());
        assert_eq!(compressed.dim(), (2, 2, 2, 2));
        assert_eq!(compressed[[0, 0, 0, 0]], 7.0);
        assert!(compressed[[1, 1, 1, 1]].is_nan());
    }

    #[test]
    fn test_transmitter_decoding() {
        assert_eq!(transmitter_from_raw(12.0), Some(12));
        assert_eq!(transmitter_from_raw(f64::NAN), None);
        assert_eq!(transmitter_from_raw(f64::INFINITY), None);

        let table = transmitter_table_from_raw(array![[3.0, f64::NAN]].view());
        assert_eq!(table[[0, 0]], Some(3));
        assert_eq!(table[[0, 1]], None);
    }

    #[test]
    fn test_prn_zero_passes_gate() {
        let table = transmitter_table_from_raw(array![[0.0]].view());
        assert_eq!(table[[0, 0]], Some(0));

        let mut grid = ndarray::Array2::from_elem((40, 5), 1000.0);
        grid[[20, 2]] = 1001.0;
        assert_eq!(check_record(table[[0, 0]], grid.view()), RecordValidity::Valid);
    }
}
