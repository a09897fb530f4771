//! SLA metrics repository implementation.

use domain::models::SlaMetrics;
use domain::services::{SlaStore, StoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::SlaMetricsEntity;
use crate::error::from_sqlx;
use crate::metrics::QueryTimer;

/// Repository for SLA ledger rows.
#[derive(Clone)]
pub struct PgSlaStore {
    pool: PgPool,
}

impl PgSlaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SlaStore for PgSlaStore {
    async fn insert(&self, metrics: &SlaMetrics) -> StoreResult<()> {
        let timer = QueryTimer::new("insert_sla_metrics");
        let result = sqlx::query(
            r#"
            INSERT INTO sla_metrics (
                emergency_id, response_sla_minutes, actual_response_minutes,
                arrival_sla_minutes, actual_arrival_minutes, sla_status,
                refund_percentage, refund_amount, refund_processed, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(metrics.emergency_id)
        .bind(metrics.response_sla_minutes)
        .bind(metrics.actual_response_minutes)
        .bind(metrics.arrival_sla_minutes)
        .bind(metrics.actual_arrival_minutes)
        .bind(metrics.sla_status.as_str())
        .bind(metrics.refund_percentage)
        .bind(metrics.refund_amount)
        .bind(metrics.refund_processed)
        .bind(metrics.updated_at)
        .execute(&self.pool)
        .await;
        timer.finish(result).map_err(from_sqlx)?;
        Ok(())
    }

    async fn get(&self, emergency_id: Uuid) -> StoreResult<Option<SlaMetrics>> {
        let timer = QueryTimer::new("get_sla_metrics");
        let result = sqlx::query_as::<_, SlaMetricsEntity>(
            r#"
            SELECT emergency_id, response_sla_minutes, actual_response_minutes,
                   arrival_sla_minutes, actual_arrival_minutes, sla_status,
                   refund_percentage, refund_amount, refund_processed, updated_at
            FROM sla_metrics
            WHERE emergency_id = $1
            "#,
        )
        .bind(emergency_id)
        .fetch_optional(&self.pool)
        .await;
        timer
            .finish(result)
            .map_err(from_sqlx)?
            .map(SlaMetrics::try_from)
            .transpose()
    }

    /// Updates timings and status; the refund columns are owned by `record_refund`.
    async fn update(&self, metrics: &SlaMetrics) -> StoreResult<()> {
        let timer = QueryTimer::new("update_sla_metrics");
        let result = sqlx::query(
            r#"
            UPDATE sla_metrics
            SET actual_response_minutes = COALESCE(actual_response_minutes, $2),
                actual_arrival_minutes = COALESCE(actual_arrival_minutes, $3),
                sla_status = $4,
                updated_at = $5
            WHERE emergency_id = $1
            "#,
        )
        .bind(metrics.emergency_id)
        .bind(metrics.actual_response_minutes)
        .bind(metrics.actual_arrival_minutes)
        .bind(metrics.sla_status.as_str())
        .bind(metrics.updated_at)
        .execute(&self.pool)
        .await;
        timer.finish(result).map_err(from_sqlx)?;
        Ok(())
    }

    async fn record_refund(&self, emergency_id: Uuid, amount: f64) -> StoreResult<bool> {
        let timer = QueryTimer::new("record_sla_refund");
        let result = sqlx::query(
            r#"
            UPDATE sla_metrics
            SET refund_amount = $2, updated_at = NOW()
            WHERE emergency_id = $1
              AND refund_amount IS NULL
              AND sla_status = 'breached'
            "#,
        )
        .bind(emergency_id)
        .bind(amount)
        .execute(&self.pool)
        .await;
        Ok(timer.finish(result).map_err(from_sqlx)?.rows_affected() == 1)
    }
}
