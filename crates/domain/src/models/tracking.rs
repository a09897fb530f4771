//! Live technician tracking models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::GeoPoint;
use uuid::Uuid;
use validator::Validate;

use super::emergency::RequestStatus;
use super::sla::SlaStatus;

/// Location ping body posted by a technician's device.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportLocationRequest {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    /// km/h
    #[validate(custom(function = "shared::validation::validate_speed"))]
    pub speed: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_heading"))]
    pub heading: Option<f64>,

    pub timestamp: Option<DateTime<Utc>>,
}

impl ReportLocationRequest {
    pub fn into_location(self, technician_id: Uuid, received_at: DateTime<Utc>) -> TechnicianLocation {
        TechnicianLocation {
            technician_id,
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            heading: self.heading,
            timestamp: self.timestamp.unwrap_or(received_at),
        }
    }
}

/// Last known technician position, held in the short-lived cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianLocation {
    pub technician_id: Uuid,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[validate(custom(function = "shared::validation::validate_speed"))]
    pub speed: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_heading"))]
    pub heading: Option<f64>,

    pub timestamp: DateTime<Utc>,
}

impl TechnicianLocation {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    EnRoute,
    Arrived,
}

/// Event pushed to customer-facing subscribers of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdate {
    pub request_id: Uuid,
    pub technician_id: Uuid,
    pub technician_name: String,
    pub technician_photo: Option<String>,
    pub current_location: GeoPoint,
    pub distance_remaining_km: f64,
    pub eta_minutes: i64,
    pub status: TrackingStatus,
    pub updated_at: DateTime<Utc>,
}

impl TrackingUpdate {
    /// The arrival event closes the stream for this request.
    pub fn is_terminal(&self) -> bool {
        self.status == TrackingStatus::Arrived
    }
}

/// Point-in-time tracking view returned by `get_tracking`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSnapshot {
    pub request_id: Uuid,
    pub status: RequestStatus,
    pub customer_location: GeoPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_location: Option<TechnicianLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_arrival: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_remaining_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_minutes: Option<i64>,
    pub sla_status: SlaStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_defaults_timestamp() {
        let body: ReportLocationRequest =
            serde_json::from_str(r#"{"latitude": 6.52, "longitude": 3.37, "speed": 22.5}"#)
                .unwrap();
        assert!(body.validate().is_ok());
        let now = Utc::now();
        let tech = Uuid::new_v4();
        let loc = body.into_location(tech, now);
        assert_eq!(loc.technician_id, tech);
        assert_eq!(loc.timestamp, now);
        assert_eq!(loc.speed, Some(22.5));
    }

    #[test]
    fn test_report_rejects_bad_coordinates() {
        let body = ReportLocationRequest {
            latitude: -91.0,
            longitude: 3.0,
            speed: None,
            heading: None,
            timestamp: None,
        };
        assert!(body.validate().is_err());

        let body = ReportLocationRequest {
            latitude: 6.0,
            longitude: 3.0,
            speed: Some(-4.0),
            heading: None,
            timestamp: None,
        };
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_update_serialization() {
        let update = TrackingUpdate {
            request_id: Uuid::nil(),
            technician_id: Uuid::nil(),
            technician_name: "Ada".into(),
            technician_photo: None,
            current_location: GeoPoint::new(6.5, 3.3),
            distance_remaining_km: 1.2,
            eta_minutes: 6,
            status: TrackingStatus::Arrived,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "arrived");
        assert_eq!(json["etaMinutes"], 6);
        assert!(update.is_terminal());
    }
}
