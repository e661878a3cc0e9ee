/// Mean Earth radius in nautical miles.
const EARTH_RADIUS_NM: f64 = 3440.065;

/// A complete position fix. Only built when latitude, longitude and
/// altitude are all known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// WGS84 latitude angle in degrees
    pub latitude: f64,
    /// WGS84 longitude angle in degrees
    pub longitude: f64,
    /// Altitude in metres
    pub altitude: f64,
}

/// Great-circle distance between two fixes in nautical miles, using the
/// haversine formula. Altitude does not enter the computation.
pub fn great_circle_nm(from: &Position, to: &Position) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = (to.latitude - from.latitude).to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_NM * c
}
