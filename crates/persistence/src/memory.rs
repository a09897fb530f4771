//! In-process store implementations.
//!
//! Used when no database URL is configured and throughout the test suites.
//! Every method takes one lock for its whole read-modify-write, which gives the
//! same atomicity the SQL statements provide.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::models::{
    AvailabilityQuery, EmergencyRequest, RequestStatus, SlaMetrics, SlaOutcome, Technician,
    TechnicianMatch, TechnicianStatus,
};
use domain::services::{EmergencyStore, PageCursor, SlaStore, StoreResult, TechnicianStore};
use domain::StoreError;
use shared::{haversine_km, GeoPoint};
use tokio::sync::RwLock;
use uuid::Uuid;

// ============================================================================
// Emergency requests
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemoryEmergencyStore {
    requests: Arc<RwLock<HashMap<Uuid, EmergencyRequest>>>,
    /// Number of upcoming `save` calls that fail as unavailable.
    failing_saves: Arc<AtomicUsize>,
}

impl InMemoryEmergencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` saves fail with `StoreError::Unavailable`.
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait::async_trait]
impl EmergencyStore for InMemoryEmergencyStore {
    async fn insert(&self, request: &EmergencyRequest) -> StoreResult<()> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.id) {
            return Err(StoreError::Database(format!(
                "duplicate emergency id {}",
                request.id
            )));
        }
        requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<EmergencyRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn save(&self, request: &EmergencyRequest) -> StoreResult<EmergencyRequest> {
        if self.take_injected_failure() {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        let mut requests = self.requests.write().await;
        let current = requests.get_mut(&request.id).ok_or(StoreError::NotFound)?;
        if current.version != request.version {
            return Err(StoreError::VersionConflict);
        }
        let mut stored = request.clone();
        stored.version += 1;
        *current = stored.clone();
        Ok(stored)
    }

    async fn find_active_for_technician(
        &self,
        technician_id: Uuid,
    ) -> StoreResult<Vec<EmergencyRequest>> {
        Ok(self
            .page(None, usize::MAX, |r| {
                r.assigned_technician_id == Some(technician_id) && r.status.is_trackable()
            })
            .await)
    }

    async fn list_by_status(
        &self,
        statuses: &[RequestStatus],
        after: Option<PageCursor>,
        limit: usize,
    ) -> StoreResult<Vec<EmergencyRequest>> {
        Ok(self
            .page(after, limit, |r| statuses.contains(&r.status))
            .await)
    }

    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: usize,
    ) -> StoreResult<Vec<EmergencyRequest>> {
        Ok(self
            .page(after, limit, |r| {
                !r.is_terminal() && (r.response_deadline < now || r.arrival_deadline < now)
            })
            .await)
    }
}

impl InMemoryEmergencyStore {
    async fn page(
        &self,
        after: Option<PageCursor>,
        limit: usize,
        keep: impl Fn(&EmergencyRequest) -> bool,
    ) -> Vec<EmergencyRequest> {
        let after = after.map(|c| (c.created_at, c.id));
        let mut rows: Vec<EmergencyRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| after.map_or(true, |key| (r.created_at, r.id) > key) && keep(r))
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.created_at, r.id));
        rows.truncate(limit);
        rows
    }
}

// ============================================================================
// Technicians
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemoryTechnicianStore {
    technicians: Arc<RwLock<HashMap<Uuid, Technician>>>,
}

impl InMemoryTechnicianStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TechnicianStore for InMemoryTechnicianStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Technician>> {
        Ok(self.technicians.read().await.get(&id).cloned())
    }

    async fn upsert(&self, technician: &Technician) -> StoreResult<()> {
        self.technicians
            .write()
            .await
            .insert(technician.id, technician.clone());
        Ok(())
    }

    async fn find_available(&self, query: &AvailabilityQuery) -> StoreResult<Vec<TechnicianMatch>> {
        let technicians = self.technicians.read().await;
        let mut matches: Vec<TechnicianMatch> = technicians
            .values()
            .filter(|t| t.is_dispatchable() && t.serves(query.category))
            .filter_map(|t| {
                let location = t.location?;
                let distance_km = haversine_km(query.origin, location);
                (distance_km <= query.radius_km).then(|| TechnicianMatch {
                    technician: t.clone(),
                    distance_km,
                })
            })
            .collect();
        matches.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then_with(|| a.technician.id.cmp(&b.technician.id))
        });
        matches.truncate(query.limit);
        Ok(matches)
    }

    async fn update_location(&self, id: Uuid, location: GeoPoint) -> StoreResult<()> {
        let mut technicians = self.technicians.write().await;
        let technician = technicians.get_mut(&id).ok_or(StoreError::NotFound)?;
        technician.location = Some(location);
        technician.location_updated_at = Some(Utc::now());
        Ok(())
    }

    async fn reserve_job_slot(&self, id: Uuid) -> StoreResult<bool> {
        let mut technicians = self.technicians.write().await;
        let technician = technicians.get_mut(&id).ok_or(StoreError::NotFound)?;
        if technician.current_jobs >= technician.max_concurrent_jobs {
            return Ok(false);
        }
        technician.current_jobs += 1;
        if technician.current_jobs >= technician.max_concurrent_jobs {
            technician.status = TechnicianStatus::Busy;
        }
        Ok(true)
    }

    async fn release_job_slot(&self, id: Uuid) -> StoreResult<()> {
        let mut technicians = self.technicians.write().await;
        let technician = technicians.get_mut(&id).ok_or(StoreError::NotFound)?;
        technician.current_jobs = (technician.current_jobs - 1).max(0);
        if technician.status == TechnicianStatus::Busy {
            technician.status = TechnicianStatus::Available;
        }
        Ok(())
    }
}

// ============================================================================
// SLA metrics
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemorySlaStore {
    metrics: Arc<RwLock<HashMap<Uuid, SlaMetrics>>>,
}

impl InMemorySlaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SlaStore for InMemorySlaStore {
    async fn insert(&self, metrics: &SlaMetrics) -> StoreResult<()> {
        self.metrics
            .write()
            .await
            .insert(metrics.emergency_id, metrics.clone());
        Ok(())
    }

    async fn get(&self, emergency_id: Uuid) -> StoreResult<Option<SlaMetrics>> {
        Ok(self.metrics.read().await.get(&emergency_id).cloned())
    }

    async fn update(&self, metrics: &SlaMetrics) -> StoreResult<()> {
        let mut all = self.metrics.write().await;
        let current = all
            .get_mut(&metrics.emergency_id)
            .ok_or(StoreError::NotFound)?;
        current.actual_response_minutes = current
            .actual_response_minutes
            .or(metrics.actual_response_minutes);
        current.actual_arrival_minutes = current
            .actual_arrival_minutes
            .or(metrics.actual_arrival_minutes);
        current.sla_status = metrics.sla_status;
        current.updated_at = metrics.updated_at;
        Ok(())
    }

    async fn record_refund(&self, emergency_id: Uuid, amount: f64) -> StoreResult<bool> {
        let mut all = self.metrics.write().await;
        let current = all.get_mut(&emergency_id).ok_or(StoreError::NotFound)?;
        if current.refund_amount.is_some() || current.sla_status != SlaOutcome::Breached {
            return Ok(false);
        }
        current.refund_amount = Some(amount);
        current.updated_at = Utc::now();
        Ok(true)
    }
}
