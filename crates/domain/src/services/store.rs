//! Storage and cache collaborator contracts.
//!
//! Implemented by the persistence crate for PostgreSQL, Redis and in-process use.

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    AvailabilityQuery, EmergencyRequest, RequestStatus, SlaMetrics, Technician,
    TechnicianLocation, TechnicianMatch,
};
use shared::GeoPoint;

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyset position for paging through requests oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl From<&EmergencyRequest> for PageCursor {
    fn from(request: &EmergencyRequest) -> Self {
        Self {
            created_at: request.created_at,
            id: request.id,
        }
    }
}

#[async_trait::async_trait]
pub trait EmergencyStore: Send + Sync {
    /// Persist a new request. The stored version starts at the given value.
    async fn insert(&self, request: &EmergencyRequest) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<EmergencyRequest>>;

    /// Compare-and-swap on `request.version`.
    ///
    /// Returns the stored copy with its version bumped, or
    /// `StoreError::VersionConflict` when someone else wrote first.
    async fn save(&self, request: &EmergencyRequest) -> StoreResult<EmergencyRequest>;

    /// The technician's requests in `accepted` or `en_route`, oldest first.
    async fn find_active_for_technician(
        &self,
        technician_id: Uuid,
    ) -> StoreResult<Vec<EmergencyRequest>>;

    /// Requests in any of `statuses`, ordered by `(created_at, id)` and
    /// starting strictly after `after`.
    async fn list_by_status(
        &self,
        statuses: &[RequestStatus],
        after: Option<PageCursor>,
        limit: usize,
    ) -> StoreResult<Vec<EmergencyRequest>>;

    /// Non-terminal requests with a response or arrival deadline before
    /// `now`, in the same order as [`EmergencyStore::list_by_status`].
    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: usize,
    ) -> StoreResult<Vec<EmergencyRequest>>;
}

#[async_trait::async_trait]
pub trait TechnicianStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Technician>>;

    async fn upsert(&self, technician: &Technician) -> StoreResult<()>;

    /// Dispatchable technicians serving the category within the radius,
    /// nearest first (ties by id), at most `query.limit` rows.
    async fn find_available(&self, query: &AvailabilityQuery) -> StoreResult<Vec<TechnicianMatch>>;

    async fn update_location(&self, id: Uuid, location: GeoPoint) -> StoreResult<()>;

    /// Atomically takes one job slot. Returns false when the technician is at capacity.
    async fn reserve_job_slot(&self, id: Uuid) -> StoreResult<bool>;

    /// Atomically gives back one job slot; never drops below zero.
    async fn release_job_slot(&self, id: Uuid) -> StoreResult<()>;
}

#[async_trait::async_trait]
pub trait SlaStore: Send + Sync {
    async fn insert(&self, metrics: &SlaMetrics) -> StoreResult<()>;

    async fn get(&self, emergency_id: Uuid) -> StoreResult<Option<SlaMetrics>>;

    async fn update(&self, metrics: &SlaMetrics) -> StoreResult<()>;

    /// Sets the refund amount unless one is already recorded.
    /// Returns true when this call wrote it.
    async fn record_refund(&self, emergency_id: Uuid, amount: f64) -> StoreResult<bool>;
}

/// Short-lived technician position cache. Last write wins.
#[async_trait::async_trait]
pub trait LocationCache: Send + Sync {
    async fn put(&self, location: &TechnicianLocation, ttl: Duration) -> StoreResult<()>;

    /// `None` once the entry expired.
    async fn get(&self, technician_id: Uuid) -> StoreResult<Option<TechnicianLocation>>;

    /// Drops expired entries; returns how many were removed. Backends with
    /// native expiry have nothing to do.
    async fn purge_expired(&self) -> StoreResult<usize> {
        Ok(0)
    }
}
