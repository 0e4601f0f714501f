use crate::geocoding::Coordinates;

/// Mean Earth radius in kilometres (IUGG)
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance between two points, rounded to whole kilometres.
pub fn distance_km(from: Coordinates, to: Coordinates) -> i32 {
    let (lat1, lat2) = (from.latitude.to_radians(), to.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    (EARTH_RADIUS_KM * c).round() as i32
}
