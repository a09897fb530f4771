//! Emergency request database entity.
//!
//! The request is stored as a JSONB document alongside the columns used for
//! filtering and the optimistic-concurrency version.

use chrono::{DateTime, Utc};
use domain::models::EmergencyRequest;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for emergency_requests table.
#[derive(Debug, Clone, FromRow)]
pub struct EmergencyEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub assigned_technician_id: Option<Uuid>,
    pub version: i64,
    pub document: Json<EmergencyRequest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EmergencyEntity> for EmergencyRequest {
    fn from(entity: EmergencyEntity) -> Self {
        let mut request = entity.document.0;
        // Columns are authoritative for the fields they mirror.
        request.version = entity.version;
        request.updated_at = entity.updated_at;
        request
    }
}
