use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Extracts a trailing `(lat, lng)` suffix from an address string. Addresses
/// without a well-formed, in-range suffix yield `None`.
pub fn parse_coords(address: &str) -> Option<GeoPoint> {
    let trimmed = address.trim_end();
    let inner = trimmed.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let (lat_raw, lng_raw) = inner[open + 1..].split_once(',')?;

    let lat: f64 = lat_raw.trim().parse().ok()?;
    let lng: f64 = lng_raw.trim().parse().ok()?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }

    Some(GeoPoint { lat, lng })
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Distance between two addresses, in kilometers rounded to one decimal.
/// `None` when either address lacks coordinates; callers must omit the
/// distance rather than guess.
pub fn estimate_distance_km(pickup_address: &str, dropoff_address: &str) -> Option<f64> {
    let pickup = parse_coords(pickup_address)?;
    let dropoff = parse_coords(dropoff_address)?;

    Some((haversine_km(&pickup, &dropoff) * 10.0).round() / 10.0)
}
