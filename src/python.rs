//! NumPy-facing bindings, built with the `python` feature

use crate::core::calibrate::{power_to_db, CalibrationCurve, CalibrationProcessor, CalibrationTables};
use crate::core::context::{Level1Context, ProcessingConfig};
use crate::core::geolocation::ecef_to_geodetic;
use crate::core::interpolate::interpolate;
use crate::core::time::LeapSecondTable;
use crate::types::GnssrError;
use numpy::{PyReadonlyArray1, PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn to_py_err(err: GnssrError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn numpy_to_vec(arr: PyReadonlyArray1<f64>) -> Vec<f64> {
    arr.as_array().to_vec()
}

/// GPS week / second of week to UTC unix seconds
#[pyfunction]
fn gps_to_utc(py: Python, weeks: Vec<i64>, seconds: PyReadonlyArray1<f64>) -> PyResult<PyObject> {
    let utc = LeapSecondTable::builtin()
        .gps_to_utc_array(&weeks, &numpy_to_vec(seconds))
        .map_err(to_py_err)?;
    Ok(utc.to_pyarray(py).into())
}

/// UTC unix seconds to (GPS week, second of week)
#[pyfunction]
fn utc_to_gps(py: Python, utc: PyReadonlyArray1<f64>) -> PyResult<(PyObject, PyObject)> {
    let epochs = LeapSecondTable::builtin().utc_to_gps_array(&numpy_to_vec(utc));
    let weeks: Vec<i64> = epochs.iter().map(|e| e.week).collect();
    let seconds: Vec<f64> = epochs.iter().map(|e| e.seconds).collect();
    Ok((weeks.to_pyarray(py).into(), seconds.to_pyarray(py).into()))
}

/// Linear resampling with edge extrapolation
#[pyfunction]
fn interpolate_series(
    py: Python,
    source_epochs: PyReadonlyArray1<f64>,
    source_values: PyReadonlyArray1<f64>,
    target_epochs: PyReadonlyArray1<f64>,
) -> PyResult<PyObject> {
    let resampled = interpolate(
        &numpy_to_vec(source_epochs),
        &numpy_to_vec(source_values),
        &numpy_to_vec(target_epochs),
    )
    .map_err(to_py_err)?;
    Ok(resampled.to_pyarray(py).into())
}

/// WGS84 ECEF to (lat, lon, alt)
#[pyfunction]
fn ecef_to_lla(
    py: Python,
    x: PyReadonlyArray1<f64>,
    y: PyReadonlyArray1<f64>,
    z: PyReadonlyArray1<f64>,
) -> PyResult<(PyObject, PyObject, PyObject)> {
    let positions =
        ecef_to_geodetic(&numpy_to_vec(x), &numpy_to_vec(y), &numpy_to_vec(z)).map_err(to_py_err)?;
    let lat: Vec<f64> = positions.iter().map(|p| p.latitude).collect();
    let lon: Vec<f64> = positions.iter().map(|p| p.longitude).collect();
    let alt: Vec<f64> = positions.iter().map(|p| p.altitude).collect();
    Ok((
        lat.to_pyarray(py).into(),
        lon.to_pyarray(py).into(),
        alt.to_pyarray(py).into(),
    ))
}

/// L1a counts-to-watts conversion of one scaled DDM
#[pyfunction]
#[pyo3(signature = (counts, anz_port, std_dev, counts_db_table, power_dbm_table, config_json=None))]
fn ddm_counts_to_watts(
    py: Python,
    counts: PyReadonlyArray2<f64>,
    anz_port: usize,
    std_dev: [f64; 3],
    counts_db_table: Vec<Vec<f64>>,
    power_dbm_table: Vec<Vec<f64>>,
    config_json: Option<String>,
) -> PyResult<PyObject> {
    if counts_db_table.len() != power_dbm_table.len() {
        return Err(PyValueError::new_err(
            "counts and power tables must have the same number of ports",
        ));
    }

    let curves = counts_db_table
        .iter()
        .zip(&power_dbm_table)
        .map(|(c, p)| CalibrationCurve::new(c, p))
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_py_err)?;
    let tables = CalibrationTables::new(curves).map_err(to_py_err)?;

    let config = match config_json {
        Some(json) => ProcessingConfig::from_json_str(&json).map_err(to_py_err)?,
        None => ProcessingConfig::default(),
    };
    let context = Level1Context::new(config, tables).map_err(to_py_err)?;

    let watts = CalibrationProcessor::new(&context)
        .counts_to_watts(counts.as_array(), anz_port, &std_dev)
        .map_err(to_py_err)?;
    Ok(watts.to_pyarray(py).into())
}

/// Power ratio to dB, NaN for non-positive values
#[pyfunction]
fn power_to_db_array(py: Python, values: PyReadonlyArray2<f64>) -> PyResult<PyObject> {
    let db = values.as_array().mapv(power_to_db::<f64>);
    Ok(db.to_pyarray(py).into())
}

#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(gps_to_utc, m)?)?;
    m.add_function(wrap_pyfunction!(utc_to_gps, m)?)?;
    m.add_function(wrap_pyfunction!(interpolate_series, m)?)?;
    m.add_function(wrap_pyfunction!(ecef_to_lla, m)?)?;
    m.add_function(wrap_pyfunction!(ddm_counts_to_watts, m)?)?;
    m.add_function(wrap_pyfunction!(power_to_db_array, m)?)?;
    Ok(())
}
