//! Straight-line ETA and arrival detection for live tracking.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingPolicy {
    /// Distance under which the technician counts as on site.
    pub arrival_threshold_km: f64,
    /// km/h used when the reported speed is missing or implausible.
    pub default_speed_kmh: f64,
    pub min_plausible_speed_kmh: f64,
    /// Parking and last-metres allowance added to every ETA.
    pub buffer_minutes: f64,
}

impl Default for TrackingPolicy {
    fn default() -> Self {
        Self {
            arrival_threshold_km: 0.1,
            default_speed_kmh: 30.0,
            min_plausible_speed_kmh: 5.0,
            buffer_minutes: 3.0,
        }
    }
}

impl TrackingPolicy {
    pub fn effective_speed(&self, reported_kmh: Option<f64>) -> f64 {
        match reported_kmh {
            Some(speed) if speed.is_finite() && speed >= self.min_plausible_speed_kmh => speed,
            _ => self.default_speed_kmh,
        }
    }

    /// Whole minutes to arrival, rounded up.
    pub fn eta_minutes(&self, distance_km: f64, reported_kmh: Option<f64>) -> i64 {
        let speed = self.effective_speed(reported_kmh);
        (distance_km / speed * 60.0 + self.buffer_minutes).ceil() as i64
    }

    pub fn has_arrived(&self, distance_km: f64) -> bool {
        distance_km < self.arrival_threshold_km
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_or_missing_speed_falls_back() {
        let p = TrackingPolicy::default();
        assert_eq!(p.effective_speed(None), 30.0);
        assert_eq!(p.effective_speed(Some(2.0)), 30.0);
        assert_eq!(p.effective_speed(Some(45.0)), 45.0);
    }

    #[test]
    fn test_eta_minutes() {
        let p = TrackingPolicy::default();
        // 10 km at 30 km/h = 20 min + 3
        assert_eq!(p.eta_minutes(10.0, None), 23);
        // 6 km at 60 km/h = 6 min + 3
        assert_eq!(p.eta_minutes(6.0, Some(60.0)), 9);
        assert_eq!(p.eta_minutes(0.0, None), 3);
    }

    #[test]
    fn test_arrival_threshold() {
        let p = TrackingPolicy::default();
        assert!(p.has_arrived(0.05));
        assert!(!p.has_arrived(0.1));
        assert!(!p.has_arrived(2.0));
    }
}
