//! Technician availability database entity.

use chrono::{DateTime, Utc};
use domain::models::{EmergencyCategory, Technician, TechnicianMatch, TechnicianStatus};
use domain::StoreError;
use shared::GeoPoint;
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for technicians table.
#[derive(Debug, Clone, FromRow)]
pub struct TechnicianEntity {
    pub id: Uuid,
    pub name: String,
    pub photo_url: Option<String>,
    pub phone: Option<String>,
    pub categories: Vec<String>,
    pub is_online: bool,
    pub status: String,
    pub is_verified: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_updated_at: Option<DateTime<Utc>>,
    pub rating: f64,
    pub avg_arrival_minutes: f64,
    pub current_jobs: i32,
    pub max_concurrent_jobs: i32,
    pub completed_jobs: i32,
}

/// Availability query row: a technician plus its distance from the origin.
#[derive(Debug, Clone, FromRow)]
pub struct TechnicianMatchRow {
    #[sqlx(flatten)]
    pub technician: TechnicianEntity,
    pub distance_km: f64,
}

impl TryFrom<TechnicianEntity> for Technician {
    type Error = StoreError;

    fn try_from(entity: TechnicianEntity) -> Result<Self, Self::Error> {
        let categories = entity
            .categories
            .iter()
            .map(|c| c.parse::<EmergencyCategory>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Database)?;
        let status = entity
            .status
            .parse::<TechnicianStatus>()
            .map_err(StoreError::Database)?;
        let location = match (entity.latitude, entity.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        };

        Ok(Self {
            id: entity.id,
            name: entity.name,
            photo_url: entity.photo_url,
            phone: entity.phone,
            categories,
            is_online: entity.is_online,
            status,
            is_verified: entity.is_verified,
            location,
            location_updated_at: entity.location_updated_at,
            rating: entity.rating,
            avg_arrival_minutes: entity.avg_arrival_minutes,
            current_jobs: entity.current_jobs,
            max_concurrent_jobs: entity.max_concurrent_jobs,
            completed_jobs: entity.completed_jobs,
        })
    }
}

impl TryFrom<TechnicianMatchRow> for TechnicianMatch {
    type Error = StoreError;

    fn try_from(row: TechnicianMatchRow) -> Result<Self, Self::Error> {
        Ok(Self {
            technician: row.technician.try_into()?,
            distance_km: row.distance_km,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> TechnicianEntity {
        TechnicianEntity {
            id: Uuid::nil(),
            name: "Bola".into(),
            photo_url: None,
            phone: None,
            categories: vec!["plumbing".into(), "hvac".into()],
            is_online: true,
            status: "available".into(),
            is_verified: true,
            latitude: Some(6.5),
            longitude: Some(3.4),
            location_updated_at: None,
            rating: 4.2,
            avg_arrival_minutes: 18.0,
            current_jobs: 0,
            max_concurrent_jobs: 2,
            completed_jobs: 40,
        }
    }

    #[test]
    fn test_entity_converts() {
        let t: Technician = entity().try_into().unwrap();
        assert_eq!(
            t.categories,
            vec![EmergencyCategory::Plumbing, EmergencyCategory::Hvac]
        );
        assert_eq!(t.status, TechnicianStatus::Available);
        assert_eq!(t.location, Some(GeoPoint::new(6.5, 3.4)));
    }

    #[test]
    fn test_unknown_category_is_a_store_error() {
        let mut e = entity();
        e.categories.push("carpentry".into());
        let err = Technician::try_from(e).unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_half_location_is_none() {
        let mut e = entity();
        e.longitude = None;
        let t: Technician = e.try_into().unwrap();
        assert!(t.location.is_none());
    }
}
