//! Spatial helpers for waypoint placement and plan statistics.

/// Degrees per meter used to place photo waypoints around a structure.
///
/// A local flat-earth approximation applied to both latitude and longitude,
/// which keeps plans reproducible regardless of where they are flown.
pub const DEGREES_PER_METER: f64 = 0.000_008_993_22;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Offset a position by meters east and north using [`DEGREES_PER_METER`].
///
/// # Returns
/// (new_lat, new_lon) in degrees
pub fn offset_flat(lat: f64, lon: f64, east_m: f64, north_m: f64) -> (f64, f64) {
    (lat + north_m * DEGREES_PER_METER, lon + east_m * DEGREES_PER_METER)
}

/// Calculate distance between two points in meters (Haversine formula).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Straight-line 3D distance between two positions in meters.
pub fn distance_3d(lat1: f64, lon1: f64, alt1_m: f64, lat2: f64, lon2: f64, alt2_m: f64) -> f64 {
    let horizontal = haversine_distance(lat1, lon1, lat2, lon2);
    let vertical = alt2_m - alt1_m;
    (horizontal * horizontal + vertical * vertical).sqrt()
}
