//! Technician availability model and ranked dispatch candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::GeoPoint;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use super::emergency::{EmergencyCategory, UrgencyLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnicianStatus {
    Available,
    Busy,
    EnRoute,
    OnJob,
    Offline,
    OnBreak,
}

impl TechnicianStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TechnicianStatus::Available => "available",
            TechnicianStatus::Busy => "busy",
            TechnicianStatus::EnRoute => "en_route",
            TechnicianStatus::OnJob => "on_job",
            TechnicianStatus::Offline => "offline",
            TechnicianStatus::OnBreak => "on_break",
        }
    }
}

impl fmt::Display for TechnicianStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TechnicianStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(TechnicianStatus::Available),
            "busy" => Ok(TechnicianStatus::Busy),
            "en_route" => Ok(TechnicianStatus::EnRoute),
            "on_job" => Ok(TechnicianStatus::OnJob),
            "offline" => Ok(TechnicianStatus::Offline),
            "on_break" => Ok(TechnicianStatus::OnBreak),
            _ => Err(format!("Invalid technician status: {}", s)),
        }
    }
}

/// Persisted availability row for a field technician.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub id: Uuid,

    #[validate(length(min = 1, max = 100))]
    pub name: String,

    pub photo_url: Option<String>,
    pub phone: Option<String>,
    pub categories: Vec<EmergencyCategory>,
    pub is_online: bool,
    pub status: TechnicianStatus,
    pub is_verified: bool,
    pub location: Option<GeoPoint>,
    pub location_updated_at: Option<DateTime<Utc>>,

    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: f64,

    /// Historical mean minutes from acceptance to arrival; zero when unknown.
    pub avg_arrival_minutes: f64,

    pub current_jobs: i32,

    #[validate(range(min = 1))]
    pub max_concurrent_jobs: i32,

    pub completed_jobs: i32,
}

impl Technician {
    pub fn serves(&self, category: EmergencyCategory) -> bool {
        self.categories.contains(&category)
    }

    /// Whether the technician can take another job right now.
    pub fn is_dispatchable(&self) -> bool {
        self.is_online
            && self.is_verified
            && self.status == TechnicianStatus::Available
            && self.current_jobs < self.max_concurrent_jobs
    }
}

/// Filter for the availability query behind candidate matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvailabilityQuery {
    pub category: EmergencyCategory,
    pub origin: GeoPoint,
    pub radius_km: f64,
    pub limit: usize,
}

/// A technician returned by the availability query with its raw distance.
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicianMatch {
    pub technician: Technician,
    pub distance_km: f64,
}

/// Matching inputs for one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCriteria {
    pub category: EmergencyCategory,
    pub urgency: UrgencyLevel,
    pub origin: GeoPoint,
    pub radius_km: f64,
}

/// A ranked candidate for one matching pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianCandidate {
    pub technician_id: Uuid,
    pub name: String,
    pub photo_url: Option<String>,
    pub location: GeoPoint,
    pub rating: f64,
    pub avg_arrival_minutes: f64,
    pub distance_km: f64,
    pub eta_minutes: f64,
    pub price_estimate: f64,
    pub score: f64,
}
