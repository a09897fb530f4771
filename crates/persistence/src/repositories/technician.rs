//! Technician availability repository implementation.

use domain::models::{AvailabilityQuery, Technician, TechnicianMatch};
use domain::services::{StoreResult, TechnicianStore};
use shared::GeoPoint;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{TechnicianEntity, TechnicianMatchRow};
use crate::error::from_sqlx;
use crate::metrics::QueryTimer;

/// Repository for technician database operations.
#[derive(Clone)]
pub struct PgTechnicianStore {
    pool: PgPool,
}

impl PgTechnicianStore {
    /// Creates a new technician repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TechnicianStore for PgTechnicianStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Technician>> {
        let timer = QueryTimer::new("get_technician");
        let result = sqlx::query_as::<_, TechnicianEntity>(
            r#"
            SELECT id, name, photo_url, phone, categories, is_online, status, is_verified,
                   latitude, longitude, location_updated_at, rating, avg_arrival_minutes,
                   current_jobs, max_concurrent_jobs, completed_jobs
            FROM technicians
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer
            .finish(result)
            .map_err(from_sqlx)?
            .map(Technician::try_from)
            .transpose()
    }

    async fn upsert(&self, technician: &Technician) -> StoreResult<()> {
        let categories: Vec<&str> = technician.categories.iter().map(|c| c.as_str()).collect();
        let timer = QueryTimer::new("upsert_technician");
        let result = sqlx::query(
            r#"
            INSERT INTO technicians (
                id, name, photo_url, phone, categories, is_online, status, is_verified,
                latitude, longitude, location_updated_at, rating, avg_arrival_minutes,
                current_jobs, max_concurrent_jobs, completed_jobs
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                photo_url = EXCLUDED.photo_url,
                phone = EXCLUDED.phone,
                categories = EXCLUDED.categories,
                is_online = EXCLUDED.is_online,
                status = EXCLUDED.status,
                is_verified = EXCLUDED.is_verified,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                location_updated_at = EXCLUDED.location_updated_at,
                rating = EXCLUDED.rating,
                avg_arrival_minutes = EXCLUDED.avg_arrival_minutes,
                max_concurrent_jobs = EXCLUDED.max_concurrent_jobs,
                completed_jobs = EXCLUDED.completed_jobs,
                updated_at = NOW()
            "#,
        )
        .bind(technician.id)
        .bind(&technician.name)
        .bind(&technician.photo_url)
        .bind(&technician.phone)
        .bind(&categories)
        .bind(technician.is_online)
        .bind(technician.status.as_str())
        .bind(technician.is_verified)
        .bind(technician.location.map(|l| l.latitude))
        .bind(technician.location.map(|l| l.longitude))
        .bind(technician.location_updated_at)
        .bind(technician.rating)
        .bind(technician.avg_arrival_minutes)
        .bind(technician.current_jobs)
        .bind(technician.max_concurrent_jobs)
        .bind(technician.completed_jobs)
        .execute(&self.pool)
        .await;
        timer.finish(result).map_err(from_sqlx)?;
        Ok(())
    }

    async fn find_available(&self, query: &AvailabilityQuery) -> StoreResult<Vec<TechnicianMatch>> {
        let timer = QueryTimer::new("find_available_technicians");
        // Haversine on the mean Earth radius, matching shared::haversine_km.
        let result = sqlx::query_as::<_, TechnicianMatchRow>(
            r#"
            WITH candidates AS (
                SELECT t.id, t.name, t.photo_url, t.phone, t.categories, t.is_online, t.status,
                       t.is_verified, t.latitude, t.longitude, t.location_updated_at, t.rating,
                       t.avg_arrival_minutes, t.current_jobs, t.max_concurrent_jobs,
                       t.completed_jobs,
                       6371.0088 * 2 * ASIN(SQRT(
                           POWER(SIN(RADIANS(t.latitude - $1) / 2), 2)
                           + COS(RADIANS($1)) * COS(RADIANS(t.latitude))
                             * POWER(SIN(RADIANS(t.longitude - $2) / 2), 2)
                       )) AS distance_km
                FROM technicians t
                WHERE t.is_online
                  AND t.is_verified
                  AND t.status = 'available'
                  AND t.current_jobs < t.max_concurrent_jobs
                  AND $3 = ANY(t.categories)
                  AND t.latitude IS NOT NULL
                  AND t.longitude IS NOT NULL
            )
            SELECT * FROM candidates
            WHERE distance_km <= $4
            ORDER BY distance_km ASC, id ASC
            LIMIT $5
            "#,
        )
        .bind(query.origin.latitude)
        .bind(query.origin.longitude)
        .bind(query.category.as_str())
        .bind(query.radius_km)
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await;
        timer
            .finish(result)
            .map_err(from_sqlx)?
            .into_iter()
            .map(TechnicianMatch::try_from)
            .collect()
    }

    async fn update_location(&self, id: Uuid, location: GeoPoint) -> StoreResult<()> {
        let timer = QueryTimer::new("update_technician_location");
        let result = sqlx::query(
            r#"
            UPDATE technicians
            SET latitude = $2, longitude = $3, location_updated_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(location.latitude)
        .bind(location.longitude)
        .execute(&self.pool)
        .await;
        timer.finish(result).map_err(from_sqlx)?;
        Ok(())
    }

    async fn reserve_job_slot(&self, id: Uuid) -> StoreResult<bool> {
        let timer = QueryTimer::new("reserve_job_slot");
        let result = sqlx::query(
            r#"
            UPDATE technicians
            SET current_jobs = current_jobs + 1,
                status = CASE WHEN current_jobs + 1 >= max_concurrent_jobs
                              THEN 'busy' ELSE status END,
                updated_at = NOW()
            WHERE id = $1 AND current_jobs < max_concurrent_jobs
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await;
        Ok(timer.finish(result).map_err(from_sqlx)?.rows_affected() == 1)
    }

    async fn release_job_slot(&self, id: Uuid) -> StoreResult<()> {
        let timer = QueryTimer::new("release_job_slot");
        let result = sqlx::query(
            r#"
            UPDATE technicians
            SET current_jobs = GREATEST(current_jobs - 1, 0),
                status = CASE WHEN status = 'busy' THEN 'available' ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await;
        timer.finish(result).map_err(from_sqlx)?;
        Ok(())
    }
}
