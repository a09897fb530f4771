//! Great-circle distance helpers.

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    fn as_point(&self) -> Point<f64> {
        // geo uses (x, y) = (longitude, latitude)
        Point::new(self.longitude, self.latitude)
    }

    /// Distance to another coordinate in kilometers.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(*self, *other)
    }
}

/// Haversine distance between two coordinates in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    a.as_point().haversine_distance(&b.as_point()) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAGOS: GeoPoint = GeoPoint {
        latitude: 6.5244,
        longitude: 3.3792,
    };
    const IKEJA: GeoPoint = GeoPoint {
        latitude: 6.6018,
        longitude: 3.3515,
    };

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(haversine_km(LAGOS, LAGOS), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let ab = haversine_km(LAGOS, IKEJA);
        let ba = haversine_km(IKEJA, LAGOS);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_known_distance() {
        // Roughly 9.1 km between Lagos Island and Ikeja
        let d = LAGOS.distance_km(&IKEJA);
        assert!(d > 8.5 && d < 9.7, "unexpected distance {d}");
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        let d = haversine_km(a, b);
        assert!((d - 111.19).abs() < 0.1, "unexpected distance {d}");
    }

    #[test]
    fn test_geo_point_serialization() {
        let json = serde_json::to_string(&LAGOS).unwrap();
        assert!(json.contains("\"latitude\":6.5244"));
        let back: GeoPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LAGOS);
    }
}
