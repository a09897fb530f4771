//! SLA metrics database entity.

use chrono::{DateTime, Utc};
use domain::models::{SlaMetrics, SlaOutcome};
use domain::StoreError;
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for sla_metrics table.
#[derive(Debug, Clone, FromRow)]
pub struct SlaMetricsEntity {
    pub emergency_id: Uuid,
    pub response_sla_minutes: i64,
    pub actual_response_minutes: Option<i64>,
    pub arrival_sla_minutes: i64,
    pub actual_arrival_minutes: Option<i64>,
    pub sla_status: String,
    pub refund_percentage: f64,
    pub refund_amount: Option<f64>,
    pub refund_processed: bool,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SlaMetricsEntity> for SlaMetrics {
    type Error = StoreError;

    fn try_from(entity: SlaMetricsEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            emergency_id: entity.emergency_id,
            response_sla_minutes: entity.response_sla_minutes,
            actual_response_minutes: entity.actual_response_minutes,
            arrival_sla_minutes: entity.arrival_sla_minutes,
            actual_arrival_minutes: entity.actual_arrival_minutes,
            sla_status: entity
                .sla_status
                .parse::<SlaOutcome>()
                .map_err(StoreError::Database)?,
            refund_percentage: entity.refund_percentage,
            refund_amount: entity.refund_amount,
            refund_processed: entity.refund_processed,
            updated_at: entity.updated_at,
        })
    }
}
