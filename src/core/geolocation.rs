use crate::types::{GeodeticPosition, GnssrError, GnssrResult, SurfaceStatus};
use ndarray::{Array2, Axis};

/// WGS84 semi-major axis (meters)
const WGS84_A: f64 = 6_378_137.0;

/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257223563;

/// WGS84 first eccentricity squared
const WGS84_ECC_SQ: f64 = WGS84_F * (2.0 - WGS84_F);

const MAX_LATITUDE_ITERATIONS: usize = 20;

/// Convert one ECEF position to WGS84 latitude/longitude/altitude.
///
/// Fixed-point iteration on `tan(lat) = (z + e² N sin(lat)) / p`, which
/// converges to well under a millimetre within a handful of steps for any
/// point near the Earth's surface.
pub fn ecef_to_geodetic_point(x: f64, y: f64, z: f64) -> GeodeticPosition {
    let longitude = y.atan2(x);
    let p = x.hypot(y);

    let mut latitude = z.atan2(p * (1.0 - WGS84_ECC_SQ));
    for _ in 0..MAX_LATITUDE_ITERATIONS {
        let sin_lat = latitude.sin();
        let n = WGS84_A / (1.0 - WGS84_ECC_SQ * sin_lat * sin_lat).sqrt();
        let next = (z + WGS84_ECC_SQ * n * sin_lat).atan2(p);
        let converged = (next - latitude).abs() < 1e-14;
        latitude = next;
        if converged {
            break;
        }
    }

    // Height form that stays well conditioned at the poles
    let (sin_lat, cos_lat) = latitude.sin_cos();
    let altitude =
        p * cos_lat + z * sin_lat - WGS84_A * (1.0 - WGS84_ECC_SQ * sin_lat * sin_lat).sqrt();

    GeodeticPosition {
        latitude: latitude.to_degrees(),
        longitude: longitude.to_degrees(),
        altitude,
    }
}

/// Convert ECEF position arrays to geodetic positions
pub fn ecef_to_geodetic(x: &[f64], y: &[f64], z: &[f64]) -> GnssrResult<Vec<GeodeticPosition>> {
    if x.len() != y.len() || x.len() != z.len() {
        return Err(GnssrError::Shape(format!(
            "ECEF components differ in length ({}, {}, {})",
            x.len(),
            y.len(),
            z.len()
        )));
    }

    Ok(x.iter()
        .zip(y)
        .zip(z)
        .map(|((&x, &y), &z)| ecef_to_geodetic_point(x, y, z))
        .collect())
}

/// Convert WGS84 latitude/longitude (degrees) and altitude to ECEF
pub fn geodetic_to_ecef(lat: f64, lon: f64, alt: f64) -> [f64; 3] {
    let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon.to_radians().sin_cos();

    let n = WGS84_A / (1.0 - WGS84_ECC_SQ * sin_lat * sin_lat).sqrt();

    [
        (n + alt) * cos_lat * cos_lon,
        (n + alt) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_ECC_SQ) + alt) * sin_lat,
    ]
}

/// Gridded signed distance-to-coast field (positive offshore)
#[derive(Debug, Clone)]
pub struct DistanceRaster {
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    /// Indexed `[lon, lat]`, axes ascending
    distance: Array2<f64>,
}

impl DistanceRaster {
    /// Build a raster from its axes and a `(n_lon, n_lat)` distance grid.
    ///
    /// Each axis must be strictly monotonic. Descending axes are flipped along
    /// with the grid so lookups always run on ascending axes.
    pub fn new(
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        distance: Array2<f64>,
    ) -> GnssrResult<Self> {
        let expected = (longitudes.len(), latitudes.len());
        if distance.dim() != expected {
            return Err(GnssrError::Shape(format!(
                "distance raster has shape {:?}, expected (lon, lat) = {:?}",
                distance.dim(),
                expected
            )));
        }

        let mut latitudes = latitudes;
        let mut longitudes = longitudes;
        let mut distance = distance;

        if axis_direction("latitude", &latitudes)? == AxisDirection::Descending {
            log::debug!("Flipping descending latitude axis of distance raster");
            latitudes.reverse();
            distance.invert_axis(Axis(1));
        }
        if axis_direction("longitude", &longitudes)? == AxisDirection::Descending {
            log::debug!("Flipping descending longitude axis of distance raster");
            longitudes.reverse();
            distance.invert_axis(Axis(0));
        }

        Ok(Self {
            latitudes,
            longitudes,
            distance: distance.as_standard_layout().to_owned(),
        })
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    /// Bilinear distance at (lat, lon); `None` outside the raster
    pub fn distance_at(&self, lat: f64, lon: f64) -> Option<f64> {
        let (i0, fx) = locate(&self.longitudes, lon)?;
        let (j0, fy) = locate(&self.latitudes, lat)?;
        let (i1, j1) = (i0 + 1, j0 + 1);

        let v00 = self.distance[[i0, j0]];
        let v10 = self.distance[[i1, j0]];
        let v01 = self.distance[[i0, j1]];
        let v11 = self.distance[[i1, j1]];

        Some(
            v00 * (1.0 - fx) * (1.0 - fy)
                + v10 * fx * (1.0 - fy)
                + v01 * (1.0 - fx) * fy
                + v11 * fx * fy,
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
enum AxisDirection {
    Ascending,
    Descending,
}

fn axis_direction(name: &str, axis: &[f64]) -> GnssrResult<AxisDirection> {
    if axis.len() < 2 {
        return Err(GnssrError::InvalidFormat(format!(
            "{} axis needs at least 2 samples, got {}",
            name,
            axis.len()
        )));
    }

    if axis.windows(2).all(|w| w[1] > w[0]) {
        Ok(AxisDirection::Ascending)
    } else if axis.windows(2).all(|w| w[1] < w[0]) {
        Ok(AxisDirection::Descending)
    } else {
        Err(GnssrError::InvalidFormat(format!(
            "{} axis is not strictly monotonic",
            name
        )))
    }
}

/// Cell index and fractional offset of `value` on an ascending axis
fn locate(axis: &[f64], value: f64) -> Option<(usize, f64)> {
    let n = axis.len();
    if !(value >= axis[0] && value <= axis[n - 1]) {
        return None;
    }

    let i0 = axis.partition_point(|&v| v <= value).clamp(1, n - 1) - 1;
    let fraction = (value - axis[i0]) / (axis[i0 + 1] - axis[i0]);
    Some((i0, fraction))
}

/// Land/ocean status of each (lat, lon) from a distance-to-coast raster
pub fn classify_land_ocean(
    latitudes: &[f64],
    longitudes: &[f64],
    raster: &DistanceRaster,
) -> GnssrResult<Vec<Option<SurfaceStatus>>> {
    if latitudes.len() != longitudes.len() {
        return Err(GnssrError::Shape(format!(
            "{} latitudes but {} longitudes",
            latitudes.len(),
            longitudes.len()
        )));
    }

    let status: Vec<Option<SurfaceStatus>> = latitudes
        .iter()
        .zip(longitudes)
        .map(|(&lat, &lon)| {
            raster
                .distance_at(lat, lon)
                .and_then(SurfaceStatus::from_distance)
        })
        .collect();

    let unclassified = status.iter().filter(|s| s.is_none()).count();
    if unclassified > 0 {
        log::warn!(
            "{} of {} positions fall outside the land mask and have no surface status",
            unclassified,
            status.len()
        );
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    #[test]
    fn test_equator_prime_meridian() {
        let pos = ecef_to_geodetic_point(WGS84_A, 0.0, 0.0);
        assert_abs_diff_eq!(pos.latitude, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pos.longitude, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pos.altitude, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_round_trip_aircraft_positions() {
        // Christchurch to Napier flight envelope
        for &(lat, lon, alt) in &[
            (-43.49, 172.53, 10.0),
            (-41.0, 175.0, 6000.0),
            (-39.47, 176.87, 3500.0),
            (60.0, -150.0, 12_000.0),
            (89.9, 10.0, 500.0),
        ] {
            let [x, y, z] = geodetic_to_ecef(lat, lon, alt);
            let pos = ecef_to_geodetic_point(x, y, z);
            assert_abs_diff_eq!(pos.latitude, lat, epsilon = 1e-9);
            assert_abs_diff_eq!(pos.longitude, lon, epsilon = 1e-9);
            assert_abs_diff_eq!(pos.altitude, alt, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_array_length_mismatch() {
        assert!(ecef_to_geodetic(&[1.0], &[1.0, 2.0], &[1.0]).is_err());
    }

    fn coastal_raster() -> DistanceRaster {
        // Distance grows eastwards: negative (land) west of lon 171.5
        let lats = vec![-44.0, -43.0, -42.0];
        let lons = vec![170.0, 171.0, 172.0, 173.0];
        let distance = Array2::from_shape_fn((4, 3), |(i, _)| (i as f64 - 1.5) * 10.0);
        DistanceRaster::new(lats, lons, distance).unwrap()
    }

    #[test]
    fn test_bilinear_distance() {
        let raster = coastal_raster();
        assert_abs_diff_eq!(raster.distance_at(-43.0, 171.0).unwrap(), -5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(raster.distance_at(-42.5, 172.5).unwrap(), 10.0, epsilon = 1e-12);
        assert!(raster.distance_at(-45.0, 171.0).is_none());
    }

    #[test]
    fn test_classification_codes() {
        let raster = coastal_raster();
        let status =
            classify_land_ocean(&[-43.0, -43.0, -43.0, -50.0], &[170.5, 171.5, 172.9, 171.0], &raster)
                .unwrap();
        assert_eq!(status[0], Some(SurfaceStatus::Land));
        // Exactly on the coastline counts as land
        assert_eq!(status[1], Some(SurfaceStatus::Land));
        assert_eq!(status[2].map(SurfaceStatus::code), Some(5));
        assert_eq!(status[3], None);
    }

    #[test]
    fn test_descending_axes_are_normalised() {
        let ascending = coastal_raster();

        let lats = vec![-42.0, -43.0, -44.0];
        let lons = vec![173.0, 172.0, 171.0, 170.0];
        let distance = Array2::from_shape_fn((4, 3), |(i, _)| (1.5 - i as f64) * 10.0);
        let descending = DistanceRaster::new(lats, lons, distance).unwrap();

        assert_eq!(descending.latitudes(), ascending.latitudes());
        assert_eq!(descending.longitudes(), ascending.longitudes());
        for &(lat, lon) in &[(-43.2, 170.4), (-42.1, 172.8), (-44.0, 173.0)] {
            assert_abs_diff_eq!(
                descending.distance_at(lat, lon).unwrap(),
                ascending.distance_at(lat, lon).unwrap(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_non_monotonic_axis_rejected() {
        let lats = vec![-44.0, -42.0, -43.0];
        let lons = vec![170.0, 171.0];
        let result = DistanceRaster::new(lats, lons, Array2::zeros((2, 3)));
        assert!(result.is_err());
    }
}
