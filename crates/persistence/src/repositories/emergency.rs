//! Emergency request repository implementation.

use chrono::{DateTime, Utc};
use domain::models::{EmergencyRequest, RequestStatus};
use domain::services::{EmergencyStore, PageCursor, StoreResult};
use domain::StoreError;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::EmergencyEntity;
use crate::error::from_sqlx;
use crate::metrics::QueryTimer;

/// Repository for emergency request database operations.
#[derive(Clone)]
pub struct PgEmergencyStore {
    pool: PgPool,
}

impl PgEmergencyStore {
    /// Creates a new emergency request repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EmergencyStore for PgEmergencyStore {
    async fn insert(&self, request: &EmergencyRequest) -> StoreResult<()> {
        let timer = QueryTimer::new("insert_emergency");
        let result = sqlx::query(
            r#"
            INSERT INTO emergency_requests (
                id, user_id, status, urgency, category, assigned_technician_id,
                response_deadline, arrival_deadline, version, document,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.status.as_str())
        .bind(request.urgency.as_str())
        .bind(request.category.as_str())
        .bind(request.assigned_technician_id)
        .bind(request.response_deadline)
        .bind(request.arrival_deadline)
        .bind(request.version)
        .bind(Json(request))
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await;
        timer.finish(result).map_err(from_sqlx)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<EmergencyRequest>> {
        let timer = QueryTimer::new("get_emergency");
        let result = sqlx::query_as::<_, EmergencyEntity>(
            r#"
            SELECT id, user_id, status, assigned_technician_id, version, document,
                   created_at, updated_at
            FROM emergency_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        Ok(timer.finish(result).map_err(from_sqlx)?.map(Into::into))
    }

    async fn save(&self, request: &EmergencyRequest) -> StoreResult<EmergencyRequest> {
        let mut stored = request.clone();
        stored.version = request.version + 1;

        let timer = QueryTimer::new("save_emergency");
        let result = sqlx::query(
            r#"
            UPDATE emergency_requests
            SET status = $3,
                assigned_technician_id = $4,
                version = $5,
                document = $6,
                updated_at = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(request.id)
        .bind(request.version)
        .bind(stored.status.as_str())
        .bind(stored.assigned_technician_id)
        .bind(stored.version)
        .bind(Json(&stored))
        .bind(stored.updated_at)
        .execute(&self.pool)
        .await;
        let rows = timer.finish(result).map_err(from_sqlx)?.rows_affected();

        if rows == 1 {
            return Ok(stored);
        }
        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM emergency_requests WHERE id = $1")
                .bind(request.id)
                .fetch_optional(&self.pool)
                .await
                .map_err(from_sqlx)?;
        match exists {
            Some(_) => Err(StoreError::VersionConflict),
            None => Err(StoreError::NotFound),
        }
    }

    async fn find_active_for_technician(
        &self,
        technician_id: Uuid,
    ) -> StoreResult<Vec<EmergencyRequest>> {
        let timer = QueryTimer::new("find_active_emergencies_for_technician");
        let result = sqlx::query_as::<_, EmergencyEntity>(
            r#"
            SELECT id, user_id, status, assigned_technician_id, version, document,
                   created_at, updated_at
            FROM emergency_requests
            WHERE assigned_technician_id = $1
              AND status IN ('accepted', 'en_route')
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(technician_id)
        .fetch_all(&self.pool)
        .await;
        Ok(into_requests(timer.finish(result).map_err(from_sqlx)?))
    }

    async fn list_by_status(
        &self,
        statuses: &[RequestStatus],
        after: Option<PageCursor>,
        limit: usize,
    ) -> StoreResult<Vec<EmergencyRequest>> {
        let statuses: Vec<&str> = statuses.iter().map(RequestStatus::as_str).collect();
        let timer = QueryTimer::new("list_emergencies_by_status");
        let result = sqlx::query_as::<_, EmergencyEntity>(
            r#"
            SELECT id, user_id, status, assigned_technician_id, version, document,
                   created_at, updated_at
            FROM emergency_requests
            WHERE status = ANY($1)
              AND ($2::timestamptz IS NULL OR (created_at, id) > ($2, $3::uuid))
            ORDER BY created_at ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(statuses)
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.id))
        .bind(page_limit(limit))
        .fetch_all(&self.pool)
        .await;
        Ok(into_requests(timer.finish(result).map_err(from_sqlx)?))
    }

    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: usize,
    ) -> StoreResult<Vec<EmergencyRequest>> {
        let terminal: Vec<&str> = RequestStatus::TERMINAL
            .iter()
            .map(RequestStatus::as_str)
            .collect();
        let timer = QueryTimer::new("list_overdue_emergencies");
        let result = sqlx::query_as::<_, EmergencyEntity>(
            r#"
            SELECT id, user_id, status, assigned_technician_id, version, document,
                   created_at, updated_at
            FROM emergency_requests
            WHERE status <> ALL($1)
              AND (response_deadline < $2 OR arrival_deadline < $2)
              AND ($3::timestamptz IS NULL OR (created_at, id) > ($3, $4::uuid))
            ORDER BY created_at ASC, id ASC
            LIMIT $5
            "#,
        )
        .bind(terminal)
        .bind(now)
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.id))
        .bind(page_limit(limit))
        .fetch_all(&self.pool)
        .await;
        Ok(into_requests(timer.finish(result).map_err(from_sqlx)?))
    }
}

fn page_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn into_requests(rows: Vec<EmergencyEntity>) -> Vec<EmergencyRequest> {
    rows.into_iter().map(Into::into).collect()
}
