//! # Great-Circle Helpers
//!
//! Distance and initial bearing between two points. Arguments are ordered
//! longitude first to match how station coordinates are stored.

/// Earth radius used for distances, in km
pub const EARTH_RADIUS_KM: f64 = 6366.71;

/// Haversine distance in km between `(lon0, lat0)` and `(lon1, lat1)`.
///
/// # Examples
///
/// ```
/// use aprs_gateway::codec::geo::distance_km;
///
/// let d = distance_km(100.5, 13.75, 100.5, 14.75);
/// assert!((d - 111.12).abs() < 0.01);
/// ```
#[must_use]
pub fn distance_km(lon0: f64, lat0: f64, lon1: f64, lat1: f64) -> f64 {
    let phi0 = lat0.to_radians();
    let phi1 = lat1.to_radians();
    let d_phi = phi1 - phi0;
    let d_lambda = (lon1 - lon0).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi0.cos() * phi1.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Initial bearing in degrees from `(lon0, lat0)` towards `(lon1, lat1)`, in `[0, 360)`.
#[must_use]
pub fn bearing_degrees(lon0: f64, lat0: f64, lon1: f64, lat1: f64) -> f64 {
    let phi0 = lat0.to_radians();
    let phi1 = lat1.to_radians();
    let d_lambda = (lon1 - lon0).to_radians();

    let y = d_lambda.sin() * phi1.cos();
    let x = phi0.cos() * phi1.sin() - phi0.sin() * phi1.cos() * d_lambda.cos();
    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can land exactly on 360.0 for tiny negative inputs
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}
