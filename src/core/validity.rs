//! Per-record admissibility checks applied before DDM calibration.
//!
//! The bin-level rules are sentinel detectors inherited from the L0 format, not
//! physical criteria. Their exact bin positions are part of the product
//! definition, so they must not be changed, but nobody has documented why
//! these bins were picked and they assume a grid of at least 21 x 3 bins.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Interior bin that reads exactly zero in a dead (flat) record
pub const DEAD_RECORD_BIN: (usize, usize) = (1, 1);

/// Bin pair that holds identical values when the DDM buffer is stuck
pub const STUCK_BUFFER_BINS: [(usize, usize); 2] = [(0, 0), (20, 2)];

/// Outcome of the validity gate for one (second, channel) record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordValidity {
    Valid,
    /// No transmitter assigned to the channel this second
    NoTrack,
    /// Grid too small to hold the sentinel bins
    GridTooSmall,
    /// Dead-record sentinel bin is zero
    DeadRecord,
    /// Stuck-buffer sentinel bins are bit-identical
    StuckBuffer,
}

impl RecordValidity {
    pub fn is_valid(self) -> bool {
        self == RecordValidity::Valid
    }
}

/// Decide whether a record may be calibrated
pub fn check_record(transmitter_id: Option<u16>, raw_counts: ArrayView2<'_, f64>) -> RecordValidity {
    if transmitter_id.is_none() {
        return RecordValidity::NoTrack;
    }

    let (delay_bins, doppler_bins) = raw_counts.dim();
    let needed = std::iter::once(DEAD_RECORD_BIN)
        .chain(STUCK_BUFFER_BINS)
        .fold((0, 0), |(r, c), (br, bc)| (r.max(br + 1), c.max(bc + 1)));
    if delay_bins < needed.0 || doppler_bins < needed.1 {
        return RecordValidity::GridTooSmall;
    }

    if raw_counts[DEAD_RECORD_BIN] == 0.0 {
        return RecordValidity::DeadRecord;
    }

    let [a, b] = STUCK_BUFFER_BINS;
    if raw_counts[a].to_bits() == raw_counts[b].to_bits() {
        return RecordValidity::StuckBuffer;
    }

    RecordValidity::Valid
}

/// Count of records per gate outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValiditySummary {
    pub valid: usize,
    pub no_track: usize,
    pub grid_too_small: usize,
    pub dead_record: usize,
    pub stuck_buffer: usize,
}

impl ValiditySummary {
    pub fn record(&mut self, validity: RecordValidity) {
        match validity {
            RecordValidity::Valid => self.valid += 1,
            RecordValidity::NoTrack => self.no_track += 1,
            RecordValidity::GridTooSmall => self.grid_too_small += 1,
            RecordValidity::DeadRecord => self.dead_record += 1,
            RecordValidity::StuckBuffer => self.stuck_buffer += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.no_track + self.grid_too_small + self.dead_record + self.stuck_buffer
    }

    pub fn total(&self) -> usize {
        self.valid + self.skipped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn healthy_grid() -> Array2<f64> {
        Array2::from_shape_fn((128, 20), |(i, j)| 1000.0 + (i * 20 + j) as f64)
    }

    #[test]
    fn test_healthy_record_is_valid() {
        let grid = healthy_grid();
        assert_eq!(check_record(Some(12), grid.view()), RecordValidity::Valid);
    }

    #[test]
    fn test_missing_prn_skips() {
        let grid = healthy_grid();
        assert_eq!(check_record(None, grid.view()), RecordValidity::NoTrack);
    }

    #[test]
    fn test_dead_bin_skips() {
        let mut grid = healthy_grid();
        grid[[1, 1]] = 0.0;
        assert_eq!(check_record(Some(12), grid.view()), RecordValidity::DeadRecord);
    }

    #[test]
    fn test_stuck_buffer_skips() {
        let mut grid = healthy_grid();
        grid[[20, 2]] = grid[[0, 0]];
        assert_eq!(check_record(Some(12), grid.view()), RecordValidity::StuckBuffer);
    }

    #[test]
    fn test_small_grid_skips() {
        let grid = Array2::from_elem((10, 3), 5.0);
        assert_eq!(check_record(Some(3), grid.view()), RecordValidity::GridTooSmall);
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = ValiditySummary::default();
        summary.record(RecordValidity::Valid);
        summary.record(RecordValidity::NoTrack);
        summary.record(RecordValidity::StuckBuffer);
        assert_eq!(summary.valid, 1);
        assert_eq!(summary.skipped(), 2);
        assert_eq!(summary.total(), 3);
    }
}
