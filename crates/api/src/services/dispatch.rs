//! Offer/accept/timeout dispatch protocol.
//!
//! One tokio task per request owns the retry loop: rank candidates within the
//! current radius, offer them one at a time, widen the radius when the list is
//! exhausted, and escalate to human support when the budget runs out.

use chrono::{DateTime, Utc};
use domain::models::{
    Actor, AssignmentResponse, EmergencyRequest, MatchCriteria, RequestStatus,
    TechnicianCandidate,
};
use domain::services::{
    CandidateMatcher, CustomerUpdatePayload, EmergencyStore, JobOfferPayload,
    NotificationResult, NotificationService, NotificationType, SupportAlertPayload,
};
use domain::DomainError;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::registry::{DispatchRegistry, OfferResponse};
use super::versioned::{load_request, update_request};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchPolicy {
    pub initial_radius_km: f64,
    pub radius_step_km: f64,
    pub max_radius_km: f64,
    pub max_attempts: u32,
    pub offer_timeout: Duration,
    /// Wall-clock budget before handing the request to support.
    pub escalate_after: Duration,
    pub retry_interval: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            initial_radius_km: 5.0,
            radius_step_km: 5.0,
            max_radius_km: 50.0,
            max_attempts: 10,
            offer_timeout: Duration::from_secs(120),
            escalate_after: Duration::from_secs(300),
            retry_interval: Duration::from_secs(30),
        }
    }
}

/// How a dispatch run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Accepted { technician_id: Uuid },
    Escalated { attempts: u32, radius_km: f64 },
    Cancelled,
    /// Another run already owns the request.
    AlreadyRunning,
    Failed(String),
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Accepted { .. } => "accepted",
            DispatchOutcome::Escalated { .. } => "escalated",
            DispatchOutcome::Cancelled => "cancelled",
            DispatchOutcome::AlreadyRunning => "already_running",
            DispatchOutcome::Failed(_) => "failed",
        }
    }
}

/// Result of a single offer.
enum OfferStep {
    Accepted(Uuid),
    Declined,
    TimedOut,
    /// The request left the dispatching states under us.
    Settled(DispatchOutcome),
}

/// Search state owned by one run.
#[derive(Debug, Clone, Copy)]
struct RunState {
    radius_km: f64,
    attempts: u32,
    started: Instant,
    /// When the escalation budget, counted from request creation, runs out.
    deadline: Instant,
}

impl RunState {
    fn budget_spent(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Escalation budget left for a request created at `created_at`.
fn remaining_budget(
    escalate_after: Duration,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Duration {
    let age = (now - created_at).to_std().unwrap_or(Duration::ZERO);
    escalate_after.saturating_sub(age)
}

#[derive(Clone)]
pub struct DispatchEngine {
    emergencies: Arc<dyn EmergencyStore>,
    matcher: CandidateMatcher,
    notifier: Arc<dyn NotificationService>,
    registry: DispatchRegistry,
    policy: DispatchPolicy,
}

impl DispatchEngine {
    pub fn new(
        emergencies: Arc<dyn EmergencyStore>,
        matcher: CandidateMatcher,
        notifier: Arc<dyn NotificationService>,
        registry: DispatchRegistry,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            emergencies,
            matcher,
            notifier,
            registry,
            policy,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &DispatchRegistry {
        &self.registry
    }

    /// Spawns the dispatch task for a request.
    pub fn start(&self, request_id: Uuid) -> JoinHandle<DispatchOutcome> {
        let engine = self.clone();
        let span = tracing::info_span!("dispatch", emergency_id = %request_id);
        tokio::spawn(engine.run(request_id).instrument(span))
    }

    async fn run(self, request_id: Uuid) -> DispatchOutcome {
        let Some(token) = self.registry.register(request_id).await else {
            debug!("Dispatch already running");
            return DispatchOutcome::AlreadyRunning;
        };

        let outcome = match self.drive(request_id, &token).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Dispatch run failed");
                DispatchOutcome::Failed(e.to_string())
            }
        };

        self.registry.finish(request_id).await;
        counter!("dispatch_runs_total", "outcome" => outcome.label()).increment(1);
        info!(outcome = outcome.label(), "Dispatch run finished");
        outcome
    }

    async fn drive(
        &self,
        request_id: Uuid,
        token: &CancellationToken,
    ) -> Result<DispatchOutcome, DomainError> {
        let begun = update_request(self.emergencies.as_ref(), request_id, |req| {
            let now = Utc::now();
            match req.status {
                RequestStatus::New => {
                    req.transition_to(RequestStatus::Searching, Actor::System, None, now)?;
                    Ok(true)
                }
                // Left behind by a previous process: the offer can no longer be answered.
                RequestStatus::Assigned => {
                    if let Some(tech) = req.pending_offer().map(|r| r.technician_id) {
                        req.resolve_offer(tech, AssignmentResponse::Timeout, now);
                    }
                    req.transition_to(RequestStatus::Searching, Actor::System, None, now)?;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
        .await?;

        let started = Instant::now();
        let mut state = RunState {
            radius_km: self.policy.initial_radius_km.min(self.policy.max_radius_km),
            attempts: 0,
            started,
            deadline: started
                + remaining_budget(
                    self.policy.escalate_after,
                    begun.request.created_at,
                    Utc::now(),
                ),
        };
        if let Some(outcome) = settled(&begun.request, state) {
            return Ok(outcome);
        }

        loop {
            if token.is_cancelled() {
                return Ok(DispatchOutcome::Cancelled);
            }
            if state.attempts >= self.policy.max_attempts || state.budget_spent() {
                return self.escalate(request_id, state).await;
            }
            state.attempts += 1;

            let request = load_request(self.emergencies.as_ref(), request_id).await?;
            if let Some(outcome) = settled(&request, state) {
                return Ok(outcome);
            }

            let candidates = self.find_candidates(&request, state.radius_km).await?;
            info!(
                attempt = state.attempts,
                radius_km = state.radius_km,
                candidates = candidates.len(),
                "Matching round"
            );

            for candidate in &candidates {
                if token.is_cancelled() {
                    return Ok(DispatchOutcome::Cancelled);
                }
                match self.offer(&request, candidate, state, token).await? {
                    OfferStep::Accepted(technician_id) => {
                        return Ok(DispatchOutcome::Accepted { technician_id })
                    }
                    OfferStep::Declined | OfferStep::TimedOut => continue,
                    OfferStep::Settled(outcome) => return Ok(outcome),
                }
            }

            let next_radius = state.radius_km + self.policy.radius_step_km;
            if next_radius > self.policy.max_radius_km
                || state.attempts >= self.policy.max_attempts
                || state.budget_spent()
            {
                return self.escalate(request_id, state).await;
            }
            state.radius_km = next_radius;

            tokio::select! {
                _ = tokio::time::sleep(self.policy.retry_interval) => {}
                _ = token.cancelled() => return Ok(DispatchOutcome::Cancelled),
            }
        }
    }

    async fn find_candidates(
        &self,
        request: &EmergencyRequest,
        radius_km: f64,
    ) -> Result<Vec<TechnicianCandidate>, DomainError> {
        let criteria = MatchCriteria {
            category: request.category,
            urgency: request.urgency,
            origin: request.customer_location(),
            radius_km,
        };
        match self.matcher.find_candidates(&criteria, Utc::now()).await {
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Transient matching failure, retrying once");
                Ok(self.matcher.find_candidates(&criteria, Utc::now()).await?)
            }
            other => Ok(other?),
        }
    }

    async fn offer(
        &self,
        request: &EmergencyRequest,
        candidate: &TechnicianCandidate,
        state: RunState,
        token: &CancellationToken,
    ) -> Result<OfferStep, DomainError> {
        let request_id = request.id;
        let technician_id = candidate.technician_id;

        // Open the slot before persisting so an immediate answer is never lost.
        let Some(response_rx) = self.registry.open_offer(request_id, technician_id).await else {
            return Ok(OfferStep::Settled(DispatchOutcome::Cancelled));
        };

        let offered = update_request(self.emergencies.as_ref(), request_id, |req| {
            if !req.status.is_dispatching() {
                return Ok(false);
            }
            req.offer_to(technician_id, Utc::now())?;
            Ok(true)
        })
        .await;
        let offered = match offered {
            Ok(offered) => offered,
            Err(e) => {
                self.registry.close_offer(request_id, technician_id).await;
                return Err(e);
            }
        };
        if !offered.saved {
            self.registry.close_offer(request_id, technician_id).await;
            if let Some(outcome) = settled(&offered.request, state) {
                return Ok(OfferStep::Settled(outcome));
            }
            return Ok(OfferStep::TimedOut);
        }

        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(self.policy.offer_timeout)
                .unwrap_or_else(|_| chrono::Duration::minutes(2));
        let result = self
            .notifier
            .notify_technician(
                technician_id,
                JobOfferPayload {
                    notification_type: NotificationType::JobOffer,
                    request_id,
                    category: request.category,
                    urgency: request.urgency,
                    title: request.title.clone(),
                    distance_km: candidate.distance_km,
                    eta_minutes: candidate.eta_minutes,
                    price_estimate: candidate.price_estimate,
                    expires_at,
                    timestamp: now,
                },
            )
            .await;
        log_failed_notification(&result, request_id, "job_offer");
        info!(
            technician_id = %technician_id,
            distance_km = candidate.distance_km,
            score = candidate.score,
            "Offer sent"
        );

        let response = tokio::select! {
            response = response_rx => response.ok(),
            _ = tokio::time::sleep(self.policy.offer_timeout) => None,
            _ = token.cancelled() => {
                self.registry.close_offer(request_id, technician_id).await;
                counter!("dispatch_offers_total", "outcome" => "cancelled").increment(1);
                return Ok(OfferStep::Settled(DispatchOutcome::Cancelled));
            }
        };

        match response {
            Some(OfferResponse::Accepted(accepted_by)) => {
                counter!("dispatch_offers_total", "outcome" => "accepted").increment(1);
                info!(technician_id = %accepted_by, "Offer accepted");
                Ok(OfferStep::Accepted(accepted_by))
            }
            Some(OfferResponse::Declined) => {
                counter!("dispatch_offers_total", "outcome" => "declined").increment(1);
                info!(technician_id = %technician_id, "Offer declined");
                self.close(request_id, technician_id, AssignmentResponse::Declined, state)
                    .await
                    .map(|settled| settled.unwrap_or(OfferStep::Declined))
            }
            None => {
                self.registry.close_offer(request_id, technician_id).await;
                counter!("dispatch_offers_total", "outcome" => "timeout").increment(1);
                info!(technician_id = %technician_id, "Offer timed out");
                self.close(request_id, technician_id, AssignmentResponse::Timeout, state)
                    .await
                    .map(|settled| settled.unwrap_or(OfferStep::TimedOut))
            }
        }
    }

    /// Records an unanswered or declined offer and goes back to searching.
    async fn close(
        &self,
        request_id: Uuid,
        technician_id: Uuid,
        response: AssignmentResponse,
        state: RunState,
    ) -> Result<Option<OfferStep>, DomainError> {
        let closed = update_request(self.emergencies.as_ref(), request_id, |req| {
            let now = Utc::now();
            let resolved = req.resolve_offer(technician_id, response, now);
            let reopened = if req.status == RequestStatus::Assigned && req.pending_offer().is_none()
            {
                req.transition_to(RequestStatus::Searching, Actor::System, None, now)?;
                true
            } else {
                false
            };
            Ok(resolved || reopened)
        })
        .await?;
        Ok(settled(&closed.request, state).map(OfferStep::Settled))
    }

    async fn escalate(
        &self,
        request_id: Uuid,
        state: RunState,
    ) -> Result<DispatchOutcome, DomainError> {
        let escalated = update_request(self.emergencies.as_ref(), request_id, |req| {
            if !req.status.is_dispatching() {
                return Ok(false);
            }
            let now = Utc::now();
            if let Some(tech) = req.pending_offer().map(|r| r.technician_id) {
                req.resolve_offer(tech, AssignmentResponse::Cancelled, now);
            }
            if req.status == RequestStatus::New {
                req.transition_to(RequestStatus::Searching, Actor::System, None, now)?;
            }
            req.transition_to(
                RequestStatus::Escalated,
                Actor::System,
                Some("no technician accepted".to_string()),
                now,
            )?;
            Ok(true)
        })
        .await?;

        if !escalated.saved {
            return Ok(settled(&escalated.request, state).unwrap_or(DispatchOutcome::Escalated {
                attempts: state.attempts,
                radius_km: state.radius_km,
            }));
        }

        let request = escalated.request;
        counter!("dispatch_escalations_total").increment(1);
        warn!(
            attempts = state.attempts,
            radius_km = state.radius_km,
            elapsed_secs = state.started.elapsed().as_secs(),
            "Escalating to support"
        );

        let now = Utc::now();
        let support = self
            .notifier
            .notify_support(SupportAlertPayload {
                notification_type: NotificationType::EscalationAlert,
                request_id,
                category: request.category,
                urgency: request.urgency,
                reason: "No technician accepted within the dispatch budget".to_string(),
                attempts: state.attempts,
                radius_km: state.radius_km,
                timestamp: now,
            })
            .await;
        log_failed_notification(&support, request_id, "escalation_alert");

        let customer = self
            .notifier
            .notify_customer(
                request.user_id,
                CustomerUpdatePayload {
                    notification_type: NotificationType::NoTechnicianAvailable,
                    request_id,
                    status: request.status,
                    message: "We are finding a technician for you. Our support team has been notified."
                        .to_string(),
                    technician_id: None,
                    technician_name: None,
                    technician_phone: None,
                    eta_minutes: None,
                    timestamp: now,
                },
            )
            .await;
        log_failed_notification(&customer, request_id, "no_technician_available");

        Ok(DispatchOutcome::Escalated {
            attempts: state.attempts,
            radius_km: state.radius_km,
        })
    }
}

/// The run's outcome once the request has left the dispatching states.
fn settled(request: &EmergencyRequest, state: RunState) -> Option<DispatchOutcome> {
    if request.status.is_dispatching() {
        return None;
    }
    Some(match (request.status, request.assigned_technician_id) {
        (RequestStatus::Cancelled, _) => DispatchOutcome::Cancelled,
        (_, Some(technician_id)) => DispatchOutcome::Accepted { technician_id },
        (RequestStatus::Escalated, None) => DispatchOutcome::Escalated {
            attempts: state.attempts,
            radius_km: state.radius_km,
        },
        (status, None) => DispatchOutcome::Failed(format!("request ended as {status}")),
    })
}

pub(crate) fn log_failed_notification(result: &NotificationResult, request_id: Uuid, kind: &str) {
    if let NotificationResult::Failed(reason) = result {
        warn!(emergency_id = %request_id, notification = kind, error = %reason, "Notification failed");
    }
}
