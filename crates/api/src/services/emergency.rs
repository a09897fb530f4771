//! Emergency service facade: the operations exposed over HTTP.

use chrono::Utc;
use domain::models::{
    Actor, AssignmentResponse, CreateEmergencyRequest, EmergencyRequest, EmergencyStatus,
    FinalPrice, FinalPriceRequest, ReportLocationRequest, RequestStatus, SlaMetrics, SlaOutcome,
    TrackingSnapshot, TrackingUpdate,
};
use domain::services::{
    candidate_eta_minutes, sla, CandidateMatcher, CustomerUpdatePayload, EmergencyStore,
    LocationCache, NotificationService, NotificationType, PageCursor, PricingEngine, SlaStore,
    TechnicianStore, TrackingPolicy,
};
use domain::DomainError;
use metrics::counter;
use shared::haversine_km;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use super::dispatch::{log_failed_notification, DispatchEngine, DispatchOutcome, DispatchPolicy};
use super::registry::{DispatchRegistry, OfferResponse};
use super::tracking::{TrackingHub, TrackingService};
use super::versioned::{load_request, update_request};

/// External collaborators the service is written against.
#[derive(Clone)]
pub struct Collaborators {
    pub emergencies: Arc<dyn EmergencyStore>,
    pub technicians: Arc<dyn TechnicianStore>,
    pub sla: Arc<dyn SlaStore>,
    pub locations: Arc<dyn LocationCache>,
    pub notifier: Arc<dyn NotificationService>,
}

/// Tunables for the tracking side.
#[derive(Debug, Clone, Copy)]
pub struct TrackingSettings {
    pub policy: TrackingPolicy,
    pub location_ttl: Duration,
    pub hub_capacity: usize,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            policy: TrackingPolicy::default(),
            location_ttl: Duration::from_secs(300),
            hub_capacity: 64,
        }
    }
}

pub struct EmergencyService {
    emergencies: Arc<dyn EmergencyStore>,
    technicians: Arc<dyn TechnicianStore>,
    sla: Arc<dyn SlaStore>,
    notifier: Arc<dyn NotificationService>,
    pricing: Arc<PricingEngine>,
    dispatch: DispatchEngine,
    tracking: TrackingService,
}

impl EmergencyService {
    pub fn new(
        collaborators: Collaborators,
        pricing: PricingEngine,
        dispatch_policy: DispatchPolicy,
        tracking: TrackingSettings,
    ) -> Self {
        let Collaborators {
            emergencies,
            technicians,
            sla,
            locations,
            notifier,
        } = collaborators;
        let pricing = Arc::new(pricing);

        let dispatch = DispatchEngine::new(
            emergencies.clone(),
            CandidateMatcher::new(technicians.clone(), pricing.clone()),
            notifier.clone(),
            DispatchRegistry::new(),
            dispatch_policy,
        );
        let tracking = TrackingService::new(
            emergencies.clone(),
            technicians.clone(),
            sla.clone(),
            locations,
            notifier.clone(),
            TrackingHub::with_capacity(tracking.hub_capacity),
            tracking.policy,
            tracking.location_ttl,
        );

        Self {
            emergencies,
            technicians,
            sla,
            notifier,
            pricing,
            dispatch,
            tracking,
        }
    }

    pub fn dispatch(&self) -> &DispatchEngine {
        &self.dispatch
    }

    pub fn tracking(&self) -> &TrackingService {
        &self.tracking
    }

    pub fn emergencies(&self) -> &Arc<dyn EmergencyStore> {
        &self.emergencies
    }

    pub fn sla_store(&self) -> &Arc<dyn SlaStore> {
        &self.sla
    }

    /// Validates and stores a request, then starts its dispatch run.
    pub async fn submit(
        &self,
        user_id: Uuid,
        input: CreateEmergencyRequest,
    ) -> Result<(EmergencyRequest, JoinHandle<DispatchOutcome>), DomainError> {
        input.validate()?;
        let request = EmergencyRequest::new(user_id, input, Utc::now());

        self.emergencies.insert(&request).await?;
        self.sla.insert(&SlaMetrics::for_request(&request)).await?;

        info!(
            emergency_id = %request.id,
            user_id = %user_id,
            category = %request.category,
            urgency = %request.urgency,
            "Emergency created"
        );
        let handle = self.dispatch.start(request.id);
        Ok((request, handle))
    }

    pub async fn create_emergency(
        &self,
        user_id: Uuid,
        input: CreateEmergencyRequest,
    ) -> Result<EmergencyRequest, DomainError> {
        self.submit(user_id, input).await.map(|(request, _)| request)
    }

    /// Restarts dispatch for every request a previous process left mid-search,
    /// reading the store `page_size` rows at a time.
    pub async fn resume_dispatch(&self, page_size: usize) -> Result<usize, DomainError> {
        let page_size = page_size.max(1);
        let mut resumed = 0;
        let mut after: Option<PageCursor> = None;
        loop {
            let page = self
                .emergencies
                .list_by_status(&RequestStatus::DISPATCHING, after, page_size)
                .await?;
            for request in &page {
                self.dispatch.start(request.id);
                resumed += 1;
            }
            match page.last() {
                Some(last) if page.len() == page_size => after = Some(last.into()),
                _ => break,
            }
        }
        if resumed > 0 {
            info!(resumed, "Resumed dispatch runs");
        }
        Ok(resumed)
    }

    pub async fn get_status(&self, id: Uuid) -> Result<EmergencyStatus, DomainError> {
        let request = load_request(self.emergencies.as_ref(), id).await?;
        let technician = match request.assigned_technician_id {
            Some(tech) => self.technicians.get(tech).await.unwrap_or_else(|e| {
                warn!(technician_id = %tech, error = %e, "Technician lookup failed");
                None
            }),
            None => None,
        };
        let sla_status = sla::evaluate(&request, Utc::now());
        Ok(EmergencyStatus::new(&request, technician.as_ref(), sla_status))
    }

    pub async fn get_tracking(&self, id: Uuid) -> Result<TrackingSnapshot, DomainError> {
        let request = load_request(self.emergencies.as_ref(), id).await?;
        let now = Utc::now();
        let customer_location = request.customer_location();

        let technician_location = match request.assigned_technician_id {
            Some(tech) if request.status.is_trackable() => {
                self.tracking.cached_location(tech).await
            }
            _ => None,
        };
        let distance_remaining_km = technician_location
            .as_ref()
            .map(|l| l.point())
            .or(request.technician_location)
            .filter(|_| request.status.has_technician() && !request.is_terminal())
            .map(|p| haversine_km(p, customer_location));
        let time_remaining_minutes = request
            .estimated_arrival
            .filter(|_| request.status.is_trackable())
            .map(|eta| (eta - now).num_minutes().max(0));

        Ok(TrackingSnapshot {
            request_id: request.id,
            status: request.status,
            customer_location,
            technician_location,
            estimated_arrival: request.estimated_arrival,
            distance_remaining_km,
            time_remaining_minutes,
            sla_status: sla::evaluate(&request, now),
        })
    }

    /// Binds the technician to the request. At most one acceptance wins.
    pub async fn accept_offer(
        &self,
        request_id: Uuid,
        technician_id: Uuid,
    ) -> Result<EmergencyRequest, DomainError> {
        let request = load_request(self.emergencies.as_ref(), request_id).await?;
        let technician = self
            .technicians
            .get(technician_id)
            .await?
            .ok_or_else(|| DomainError::technician_not_found(technician_id))?;
        if !technician.serves(request.category) {
            return Err(DomainError::TechnicianUnavailable(format!(
                "technician {technician_id} does not serve {}",
                request.category
            )));
        }
        if !request.status.accepts_offers() {
            // Cheap rejection before touching the job counter.
            let mut probe = request.clone();
            probe.accept(technician_id, Utc::now(), None, Utc::now())?;
        }
        if !self.technicians.reserve_job_slot(technician_id).await? {
            return Err(DomainError::TechnicianUnavailable(format!(
                "technician {technician_id} has no free job slot"
            )));
        }

        let position = match self.tracking.cached_location(technician_id).await {
            Some(location) => Some(location.point()),
            None => technician.location,
        };
        let distance_km = position.map(|p| haversine_km(p, request.customer_location()));

        let accepted = update_request(self.emergencies.as_ref(), request_id, |req| {
            let now = Utc::now();
            let estimated_arrival = match distance_km {
                Some(d) => {
                    let minutes = candidate_eta_minutes(d, technician.avg_arrival_minutes);
                    now + chrono::Duration::seconds((minutes * 60.0).round() as i64)
                }
                None => req.arrival_deadline,
            };
            let estimate = distance_km
                .map(|d| self.pricing.estimate(req.category, req.urgency, d, now));
            req.accept(technician_id, estimated_arrival, estimate, now)?;
            if let Some(p) = position {
                req.technician_location = Some(p);
            }
            Ok(true)
        })
        .await;

        let accepted = match accepted {
            Ok(updated) => updated.request,
            Err(e) => {
                self.release_slot(technician_id).await;
                return Err(e);
            }
        };

        counter!("dispatch_acceptances_total").increment(1);
        info!(
            emergency_id = %request_id,
            technician_id = %technician_id,
            response_minutes = accepted.response_minutes(),
            "Offer accepted"
        );

        self.dispatch
            .registry()
            .respond(request_id, technician_id, OfferResponse::Accepted(technician_id))
            .await;

        match self.sla.get(request_id).await {
            Ok(Some(mut metrics)) => {
                sla::record_response(&mut metrics, &accepted);
                if let Err(e) = self.sla.update(&metrics).await {
                    warn!(emergency_id = %request_id, error = %e, "Failed to record SLA response");
                }
            }
            Ok(None) => warn!(emergency_id = %request_id, "No SLA ledger for request"),
            Err(e) => warn!(emergency_id = %request_id, error = %e, "SLA ledger read failed"),
        }

        let eta_minutes = accepted
            .estimated_arrival
            .map(|eta| (eta - Utc::now()).num_minutes().max(0));
        let result = self
            .notifier
            .notify_customer(
                accepted.user_id,
                CustomerUpdatePayload {
                    notification_type: NotificationType::TechnicianAssigned,
                    request_id,
                    status: accepted.status,
                    message: format!("{} is on the way.", technician.name),
                    technician_id: Some(technician_id),
                    technician_name: Some(technician.name.clone()),
                    technician_phone: technician.phone.clone(),
                    eta_minutes,
                    timestamp: Utc::now(),
                },
            )
            .await;
        log_failed_notification(&result, request_id, "technician_assigned");

        Ok(accepted)
    }

    /// Technician turns down their pending offer.
    pub async fn decline_offer(
        &self,
        request_id: Uuid,
        technician_id: Uuid,
    ) -> Result<(), DomainError> {
        let request = load_request(self.emergencies.as_ref(), request_id).await?;
        if request
            .pending_offer()
            .map_or(true, |offer| offer.technician_id != technician_id)
        {
            return Err(DomainError::NotFound(format!(
                "no pending offer for technician {technician_id} on emergency {request_id}"
            )));
        }

        // A live run records the decline itself and moves on to the next candidate.
        if self
            .dispatch
            .registry()
            .respond(request_id, technician_id, OfferResponse::Declined)
            .await
        {
            info!(emergency_id = %request_id, technician_id = %technician_id, "Offer declined");
            return Ok(());
        }

        update_request(self.emergencies.as_ref(), request_id, |req| {
            let now = Utc::now();
            if !req.resolve_offer(technician_id, AssignmentResponse::Declined, now) {
                return Ok(false);
            }
            if req.status == RequestStatus::Assigned {
                req.transition_to(RequestStatus::Searching, Actor::Technician, None, now)?;
            }
            Ok(true)
        })
        .await?;
        info!(emergency_id = %request_id, technician_id = %technician_id, "Offer declined without live run");
        Ok(())
    }

    pub async fn report_technician_location(
        &self,
        technician_id: Uuid,
        ping: ReportLocationRequest,
    ) -> Result<(), DomainError> {
        self.tracking.report_location(technician_id, ping).await
    }

    /// Finishes a job. Only the assigned technician may complete it.
    pub async fn complete_job(
        &self,
        request_id: Uuid,
        technician_id: Uuid,
        work_notes: &str,
        final_cost: f64,
    ) -> Result<EmergencyRequest, DomainError> {
        if work_notes.trim().is_empty() {
            return Err(DomainError::InvalidRequest(
                "work notes are required".to_string(),
            ));
        }
        if !final_cost.is_finite() || final_cost < 0.0 {
            return Err(DomainError::InvalidRequest(
                "final cost must be a non-negative amount".to_string(),
            ));
        }

        let completed = update_request(self.emergencies.as_ref(), request_id, |req| {
            if req.assigned_technician_id != Some(technician_id) {
                return Err(DomainError::NotFound(format!(
                    "emergency {request_id} for technician {technician_id}"
                )));
            }
            req.complete(work_notes, final_cost, Utc::now())?;
            Ok(true)
        })
        .await?
        .request;

        info!(
            emergency_id = %request_id,
            technician_id = %technician_id,
            final_cost,
            "Job completed"
        );

        self.release_slot(technician_id).await;
        self.tracking.hub().close(request_id).await;
        self.settle_sla(&completed).await;
        Ok(completed)
    }

    async fn settle_sla(&self, request: &EmergencyRequest) {
        let mut metrics = match self.sla.get(request.id).await {
            Ok(Some(metrics)) => metrics,
            Ok(None) => {
                warn!(emergency_id = %request.id, "No SLA ledger for request, rebuilding");
                SlaMetrics::for_request(request)
            }
            Err(e) => {
                error!(emergency_id = %request.id, error = %e, "SLA ledger read failed");
                return;
            }
        };

        let refund = sla::settle(&mut metrics, request, Utc::now());
        // The status must be stored before the refund, which is conditional on it.
        if let Err(e) = self.sla.update(&metrics).await {
            error!(emergency_id = %request.id, error = %e, "Failed to settle SLA");
            return;
        }

        if let Some(amount) = refund {
            match self.sla.record_refund(request.id, amount).await {
                Ok(true) => {
                    counter!("sla_refunds_recorded_total").increment(1);
                    info!(
                        emergency_id = %request.id,
                        refund_amount = amount,
                        refund_percentage = metrics.refund_percentage,
                        "SLA breached, refund recorded"
                    );
                }
                Ok(false) => info!(emergency_id = %request.id, "Refund already recorded"),
                Err(e) => {
                    error!(emergency_id = %request.id, error = %e, "Failed to record refund")
                }
            }
        }
    }

    pub async fn get_sla_metrics(&self, id: Uuid) -> Result<SlaMetrics, DomainError> {
        self.sla
            .get(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("SLA metrics for emergency {id}")))
    }

    pub async fn cancel_emergency(
        &self,
        id: Uuid,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<EmergencyRequest, DomainError> {
        let cancelled = update_request(self.emergencies.as_ref(), id, |req| {
            req.cancel(actor, reason.clone(), Utc::now())?;
            Ok(true)
        })
        .await?
        .request;

        info!(emergency_id = %id, actor = actor.as_str(), "Emergency cancelled");

        self.dispatch.registry().cancel(id).await;
        if let Some(tech) = cancelled.assigned_technician_id {
            self.release_slot(tech).await;
        }
        self.tracking.hub().close(id).await;

        match self.sla.get(id).await {
            Ok(Some(mut metrics)) if metrics.sla_status == SlaOutcome::Pending => {
                metrics.sla_status = SlaOutcome::Final;
                metrics.updated_at = Utc::now();
                if let Err(e) = self.sla.update(&metrics).await {
                    warn!(emergency_id = %id, error = %e, "Failed to finalise SLA ledger");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(emergency_id = %id, error = %e, "SLA ledger read failed"),
        }

        let result = self
            .notifier
            .notify_customer(
                cancelled.user_id,
                CustomerUpdatePayload {
                    notification_type: NotificationType::EmergencyCancelled,
                    request_id: id,
                    status: cancelled.status,
                    message: match &reason {
                        Some(reason) => format!("Your request was cancelled: {reason}"),
                        None => "Your request was cancelled.".to_string(),
                    },
                    technician_id: cancelled.assigned_technician_id,
                    technician_name: None,
                    technician_phone: None,
                    eta_minutes: None,
                    timestamp: Utc::now(),
                },
            )
            .await;
        log_failed_notification(&result, id, "emergency_cancelled");

        Ok(cancelled)
    }

    pub async fn calculate_final_price(
        &self,
        id: Uuid,
        input: FinalPriceRequest,
    ) -> Result<FinalPrice, DomainError> {
        input.validate()?;
        let request = load_request(self.emergencies.as_ref(), id).await?;
        let distance_km = input.distance_km.or_else(|| {
            request
                .technician_location
                .map(|p| haversine_km(p, request.customer_location()))
        });
        let input = FinalPriceRequest {
            distance_km,
            ..input
        };
        Ok(self
            .pricing
            .final_price(request.category, request.urgency, &input, Utc::now()))
    }

    pub async fn subscribe_tracking(
        &self,
        id: Uuid,
    ) -> Result<broadcast::Receiver<TrackingUpdate>, DomainError> {
        let request = load_request(self.emergencies.as_ref(), id).await?;
        if request.is_terminal() {
            return Err(DomainError::InvalidRequest(format!(
                "emergency {id} is {}",
                request.status
            )));
        }
        Ok(self.tracking.hub().subscribe(id).await)
    }

    async fn release_slot(&self, technician_id: Uuid) {
        if let Err(e) = self.technicians.release_job_slot(technician_id).await {
            warn!(technician_id = %technician_id, error = %e, "Failed to release job slot");
        }
    }
}
