//! Readers for the ancillary inputs of the L1 processor

pub mod cal_table;
pub mod masked;

pub use cal_table::{parse_calibration_tables, read_calibration_tables, CalibrationTablePaths};
pub use masked::{
    compress_rows, compress_seconds, compress_series, transmitter_from_raw,
    transmitter_table_from_raw,
};
