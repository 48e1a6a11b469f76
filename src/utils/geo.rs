use crate::models::Coordinate;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in metres (haversine).
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // rounding can push h a hair outside [0, 1]
    let h = h.clamp(0.0, 1.0);

    EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Point `meters` north and east of `origin`, using a flat-earth approximation.
///
/// Good to well under a metre for the few-hundred-metre offsets used when
/// synthesizing tracks.
pub fn offset_meters(origin: &Coordinate, north_m: f64, east_m: f64) -> Coordinate {
    let d_lat = north_m / EARTH_RADIUS_M;
    let d_lon = east_m / (EARTH_RADIUS_M * origin.latitude.to_radians().cos());
    Coordinate::new(
        origin.latitude + d_lat.to_degrees(),
        origin.longitude + d_lon.to_degrees(),
    )
}
