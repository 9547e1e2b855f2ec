use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Equatorial circumference in meters (Web Mercator ground resolution)
pub const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;

/// A geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both components are finite and within -90..=90 / -180..=180
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Parse "lat,lng" as used in configuration values
    pub fn parse_pair(s: &str) -> Option<Self> {
        let (lat, lng) = s.split_once(',')?;
        let point = Self::new(lat.trim().parse().ok()?, lng.trim().parse().ok()?);
        point.is_valid().then_some(point)
    }

    /// Format as "lat,lng" for query strings
    pub fn to_query(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

/// Wrap longitude into -180..=180
#[inline(always)]
pub fn wrap_lng(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }
}

/// Haversine distance in kilometers
pub fn haversine_km(a: LatLng, b: LatLng) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
