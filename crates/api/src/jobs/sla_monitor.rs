//! Flags SLA breaches on open requests as soon as a deadline passes.

use chrono::{DateTime, Utc};
use domain::models::{EmergencyRequest, SlaOutcome, SlaStatus};
use domain::services::{sla, EmergencyStore, PageCursor, SlaStore};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, warn};

use super::scheduler::{Job, JobError, JobFrequency};

/// Requests read per store round trip.
const PAGE_SIZE: usize = 200;

pub struct SlaMonitorJob {
    emergencies: Arc<dyn EmergencyStore>,
    sla: Arc<dyn SlaStore>,
}

impl SlaMonitorJob {
    pub fn new(emergencies: Arc<dyn EmergencyStore>, sla: Arc<dyn SlaStore>) -> Self {
        Self { emergencies, sla }
    }

    /// Marks newly breached ledgers. Returns how many were flagged.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<usize, JobError> {
        let mut flagged = 0;
        let mut after: Option<PageCursor> = None;
        loop {
            let page = self.emergencies.list_overdue(now, after, PAGE_SIZE).await?;
            for request in &page {
                if self.flag(request, now).await? {
                    flagged += 1;
                }
            }
            match page.last() {
                Some(last) if page.len() == PAGE_SIZE => after = Some(last.into()),
                _ => break,
            }
        }
        Ok(flagged)
    }

    async fn flag(&self, request: &EmergencyRequest, now: DateTime<Utc>) -> Result<bool, JobError> {
        if sla::evaluate(request, now) != SlaStatus::Breached {
            return Ok(false);
        }

        let Some(mut metrics) = self.sla.get(request.id).await? else {
            debug!(emergency_id = %request.id, "Breached request has no SLA ledger");
            return Ok(false);
        };
        if metrics.sla_status != SlaOutcome::Pending {
            return Ok(false);
        }

        metrics.sla_status = SlaOutcome::Breached;
        metrics.updated_at = now;
        self.sla.update(&metrics).await?;
        counter!("sla_breaches_detected_total").increment(1);
        warn!(
            emergency_id = %request.id,
            status = %request.status,
            urgency = %request.urgency,
            response_deadline = %request.response_deadline,
            arrival_deadline = %request.arrival_deadline,
            "SLA breached"
        );
        Ok(true)
    }
}

#[async_trait::async_trait]
impl Job for SlaMonitorJob {
    fn name(&self) -> &'static str {
        "sla_monitor"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), JobError> {
        let flagged = self.scan(Utc::now()).await?;
        if flagged > 0 {
            debug!(flagged, "SLA monitor run");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{
        CreateEmergencyRequest, EmergencyCategory, EmergencyLocation, RequestStatus, SlaMetrics,
        UrgencyLevel,
    };
    use persistence::{InMemoryEmergencyStore, InMemorySlaStore};
    use uuid::Uuid;

    fn request(urgency: UrgencyLevel) -> EmergencyRequest {
        EmergencyRequest::new(
            Uuid::new_v4(),
            CreateEmergencyRequest {
                category: EmergencyCategory::Electrical,
                subcategory: None,
                urgency,
                title: "Sparking outlet".to_string(),
                description: String::new(),
                location: EmergencyLocation {
                    address: "4 Bourdillon Road".to_string(),
                    unit: None,
                    city: "Lagos".to_string(),
                    state: "Lagos".to_string(),
                    postal_code: None,
                    latitude: 6.4541,
                    longitude: 3.4246,
                },
                access_instructions: None,
            },
            Utc::now(),
        )
    }

    async fn setup() -> (SlaMonitorJob, Arc<InMemorySlaStore>, EmergencyRequest) {
        let emergencies = Arc::new(InMemoryEmergencyStore::new());
        let sla_store = Arc::new(InMemorySlaStore::new());
        let req = request(UrgencyLevel::Critical);
        emergencies.insert(&req).await.unwrap();
        sla_store.insert(&SlaMetrics::for_request(&req)).await.unwrap();
        (
            SlaMonitorJob::new(emergencies, sla_store.clone()),
            sla_store,
            req,
        )
    }

    #[tokio::test]
    async fn test_within_deadlines_not_flagged() {
        let (job, sla_store, req) = setup().await;
        assert_eq!(job.scan(Utc::now()).await.unwrap(), 0);
        let metrics = sla_store.get(req.id).await.unwrap().unwrap();
        assert_eq!(metrics.sla_status, SlaOutcome::Pending);
    }

    #[tokio::test]
    async fn test_breach_flagged_once() {
        let (job, sla_store, req) = setup().await;
        let later = req.response_deadline + chrono::Duration::minutes(1);

        assert_eq!(job.scan(later).await.unwrap(), 1);
        assert_eq!(job.scan(later).await.unwrap(), 0);

        let metrics = sla_store.get(req.id).await.unwrap().unwrap();
        assert_eq!(metrics.sla_status, SlaOutcome::Breached);
        assert!(metrics.refund_amount.is_none());
    }

    #[tokio::test]
    async fn test_breaches_found_beyond_first_page() {
        let emergencies = Arc::new(InMemoryEmergencyStore::new());
        let sla_store = Arc::new(InMemorySlaStore::new());
        let base = Utc::now() - chrono::Duration::days(1);

        // Older requests already flagged and parked in escalation fill more
        // than a full page ahead of the new breach.
        for i in 0..(PAGE_SIZE as i64 + 5) {
            let mut old = request(UrgencyLevel::Critical);
            old.created_at = base + chrono::Duration::seconds(i);
            old.response_deadline = old.created_at + chrono::Duration::minutes(30);
            old.arrival_deadline = old.created_at + chrono::Duration::minutes(60);
            old.status = RequestStatus::Escalated;
            let mut metrics = SlaMetrics::for_request(&old);
            metrics.sla_status = SlaOutcome::Breached;
            emergencies.insert(&old).await.unwrap();
            sla_store.insert(&metrics).await.unwrap();
        }
        let fresh = request(UrgencyLevel::Critical);
        emergencies.insert(&fresh).await.unwrap();
        sla_store.insert(&SlaMetrics::for_request(&fresh)).await.unwrap();

        let job = SlaMonitorJob::new(emergencies, sla_store.clone());
        let later = fresh.response_deadline + chrono::Duration::minutes(1);
        assert_eq!(job.scan(later).await.unwrap(), 1);
        let metrics = sla_store.get(fresh.id).await.unwrap().unwrap();
        assert_eq!(metrics.sla_status, SlaOutcome::Breached);
    }
}
