//! Emergency request domain model and lifecycle state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::GeoPoint;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use super::sla::SlaStatus;
use super::technician::Technician;
use crate::error::DomainError;

// ============================================================================
// Classification Enums
// ============================================================================

/// Trade a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyCategory {
    Plumbing,
    Electrical,
    Locksmith,
    Hvac,
    Glass,
    Roofing,
    Pest,
    Security,
    General,
}

impl EmergencyCategory {
    pub const ALL: [EmergencyCategory; 9] = [
        EmergencyCategory::Plumbing,
        EmergencyCategory::Electrical,
        EmergencyCategory::Locksmith,
        EmergencyCategory::Hvac,
        EmergencyCategory::Glass,
        EmergencyCategory::Roofing,
        EmergencyCategory::Pest,
        EmergencyCategory::Security,
        EmergencyCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyCategory::Plumbing => "plumbing",
            EmergencyCategory::Electrical => "electrical",
            EmergencyCategory::Locksmith => "locksmith",
            EmergencyCategory::Hvac => "hvac",
            EmergencyCategory::Glass => "glass",
            EmergencyCategory::Roofing => "roofing",
            EmergencyCategory::Pest => "pest",
            EmergencyCategory::Security => "security",
            EmergencyCategory::General => "general",
        }
    }
}

impl fmt::Display for EmergencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EmergencyCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmergencyCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Invalid emergency category: {}", s))
    }
}

/// Customer-declared severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Critical,
    Urgent,
    SameDay,
    Scheduled,
}

/// Fixed gap between the response and arrival deadlines.
pub const ARRIVAL_BUFFER_MINUTES: i64 = 30;

impl UrgencyLevel {
    pub const ALL: [UrgencyLevel; 4] = [
        UrgencyLevel::Critical,
        UrgencyLevel::Urgent,
        UrgencyLevel::SameDay,
        UrgencyLevel::Scheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Critical => "critical",
            UrgencyLevel::Urgent => "urgent",
            UrgencyLevel::SameDay => "same_day",
            UrgencyLevel::Scheduled => "scheduled",
        }
    }

    /// Minutes allowed between submission and a technician accepting.
    pub fn response_sla_minutes(&self) -> i64 {
        match self {
            UrgencyLevel::Critical => 30,
            UrgencyLevel::Urgent => 120,
            UrgencyLevel::SameDay => 360,
            UrgencyLevel::Scheduled => 1440,
        }
    }

    /// Minutes allowed between submission and the technician arriving.
    pub fn arrival_sla_minutes(&self) -> i64 {
        self.response_sla_minutes() + ARRIVAL_BUFFER_MINUTES
    }

    /// Share of the final cost refunded when the SLA is breached.
    pub fn refund_percentage(&self) -> f64 {
        match self {
            UrgencyLevel::Critical => 100.0,
            UrgencyLevel::Urgent => 50.0,
            UrgencyLevel::SameDay => 25.0,
            UrgencyLevel::Scheduled => 0.0,
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UrgencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UrgencyLevel::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid urgency: {}. Must be one of: critical, urgent, same_day, scheduled",
                    s
                )
            })
    }
}

// ============================================================================
// Lifecycle Enums
// ============================================================================

/// Lifecycle status of an emergency request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    New,
    Searching,
    Assigned,
    Accepted,
    EnRoute,
    Arrived,
    Diagnosing,
    Quoted,
    Approved,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Disputed,
    Escalated,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 15] = [
        RequestStatus::New,
        RequestStatus::Searching,
        RequestStatus::Assigned,
        RequestStatus::Accepted,
        RequestStatus::EnRoute,
        RequestStatus::Arrived,
        RequestStatus::Diagnosing,
        RequestStatus::Quoted,
        RequestStatus::Approved,
        RequestStatus::InProgress,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
        RequestStatus::NoShow,
        RequestStatus::Disputed,
        RequestStatus::Escalated,
    ];

    /// Statuses the automatic dispatch loop works in.
    pub const DISPATCHING: [RequestStatus; 3] = [
        RequestStatus::New,
        RequestStatus::Searching,
        RequestStatus::Assigned,
    ];

    pub const TERMINAL: [RequestStatus; 4] = [
        RequestStatus::Completed,
        RequestStatus::Cancelled,
        RequestStatus::NoShow,
        RequestStatus::Disputed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::New => "new",
            RequestStatus::Searching => "searching",
            RequestStatus::Assigned => "assigned",
            RequestStatus::Accepted => "accepted",
            RequestStatus::EnRoute => "en_route",
            RequestStatus::Arrived => "arrived",
            RequestStatus::Diagnosing => "diagnosing",
            RequestStatus::Quoted => "quoted",
            RequestStatus::Approved => "approved",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::NoShow => "no_show",
            RequestStatus::Disputed => "disputed",
            RequestStatus::Escalated => "escalated",
        }
    }

    /// Check if transition to target status is legal.
    pub fn can_transition_to(&self, target: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, target),
            (New, Searching | Accepted | Cancelled)
                | (Searching, Assigned | Accepted | Escalated | Cancelled)
                | (Assigned, Accepted | Searching | Escalated | Cancelled)
                | (Escalated, Accepted | Cancelled)
                | (Accepted, EnRoute | Arrived | Cancelled | NoShow)
                | (EnRoute, Arrived | Cancelled | NoShow)
                | (Arrived, Diagnosing | InProgress | Completed | Cancelled | Disputed)
                | (Diagnosing, Quoted | Completed | Cancelled | Disputed)
                | (Quoted, Approved | Cancelled | Disputed)
                | (Approved, InProgress | Cancelled | Disputed)
                | (InProgress, Completed | Disputed)
                | (Completed, Disputed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// Statuses in which a technician may still accept the job.
    pub fn accepts_offers(&self) -> bool {
        matches!(
            self,
            RequestStatus::New
                | RequestStatus::Searching
                | RequestStatus::Assigned
                | RequestStatus::Escalated
        )
    }

    pub fn is_dispatching(&self) -> bool {
        Self::DISPATCHING.contains(self)
    }

    /// A technician is bound to the request and travelling or on site.
    pub fn has_technician(&self) -> bool {
        !self.is_terminal() && !self.accepts_offers()
    }

    /// Statuses that receive location pings.
    pub fn is_trackable(&self) -> bool {
        matches!(self, RequestStatus::Accepted | RequestStatus::EnRoute)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("Invalid request status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Held,
    Charged,
    Refunded,
    Disputed,
}

/// Who caused a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Customer,
    Technician,
    Support,
    System,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Customer => "customer",
            Actor::Technician => "technician",
            Actor::Support => "support",
            Actor::System => "system",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a single offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentResponse {
    Pending,
    Accepted,
    Declined,
    Timeout,
    Cancelled,
}

impl AssignmentResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentResponse::Pending => "pending",
            AssignmentResponse::Accepted => "accepted",
            AssignmentResponse::Declined => "declined",
            AssignmentResponse::Timeout => "timeout",
            AssignmentResponse::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AssignmentResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Core Model
// ============================================================================

/// Customer site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyLocation {
    #[validate(
        length(min = 1, max = 255, message = "Address is required"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub address: String,

    #[validate(length(max = 50))]
    pub unit: Option<String>,

    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,

    #[validate(length(min = 1, max = 100, message = "State is required"))]
    pub state: String,

    #[validate(length(max = 20))]
    pub postal_code: Option<String>,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,
}

impl EmergencyLocation {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// One entry of the append-only status log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: RequestStatus,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

/// One offer made to a technician.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    pub technician_id: Uuid,
    pub offered_at: DateTime<Utc>,
    pub response: AssignmentResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

/// A customer's emergency service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    pub id: Uuid,
    pub user_id: Uuid,

    pub category: EmergencyCategory,
    pub subcategory: Option<String>,
    pub urgency: UrgencyLevel,
    pub title: String,
    pub description: String,

    pub location: EmergencyLocation,
    pub access_instructions: Option<String>,

    pub status: RequestStatus,
    pub status_history: Vec<StatusUpdate>,
    pub assignment_history: Vec<AssignmentRecord>,

    pub assigned_technician_id: Option<Uuid>,
    pub technician_location: Option<GeoPoint>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub actual_response_time: Option<DateTime<Utc>>,
    pub actual_arrival_time: Option<DateTime<Utc>>,

    pub response_deadline: DateTime<Utc>,
    pub arrival_deadline: DateTime<Utc>,

    pub estimated_cost: Option<f64>,
    pub final_cost: Option<f64>,
    pub payment_status: PaymentStatus,
    pub work_performed: Option<String>,

    /// Bumped by every successful store write.
    pub version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EmergencyRequest {
    /// Builds a `new` request with deadlines derived from its urgency.
    pub fn new(user_id: Uuid, input: CreateEmergencyRequest, now: DateTime<Utc>) -> Self {
        let urgency = input.urgency;
        Self {
            id: Uuid::new_v4(),
            user_id,
            category: input.category,
            subcategory: input.subcategory,
            urgency,
            title: input.title.trim().to_string(),
            description: input.description,
            location: input.location,
            access_instructions: input.access_instructions,
            status: RequestStatus::New,
            status_history: vec![StatusUpdate {
                status: RequestStatus::New,
                timestamp: now,
                actor: Actor::Customer,
                note: None,
                location: None,
            }],
            assignment_history: Vec::new(),
            assigned_technician_id: None,
            technician_location: None,
            estimated_arrival: None,
            actual_response_time: None,
            actual_arrival_time: None,
            response_deadline: now + Duration::minutes(urgency.response_sla_minutes()),
            arrival_deadline: now + Duration::minutes(urgency.arrival_sla_minutes()),
            estimated_cost: None,
            final_cost: None,
            payment_status: PaymentStatus::Pending,
            work_performed: None,
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn customer_location(&self) -> GeoPoint {
        self.location.point()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies one state-machine move. Nothing changes on an illegal move.
    pub fn transition_to(
        &mut self,
        to: RequestStatus,
        actor: Actor,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.status_history.push(StatusUpdate {
            status: to,
            timestamp: now,
            actor,
            note,
            location: None,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Moves to `assigned` and records a pending offer for the technician.
    pub fn offer_to(&mut self, technician_id: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.pending_offer().is_some() {
            return Err(DomainError::InvalidRequest(
                "an offer is already outstanding".to_string(),
            ));
        }
        self.transition_to(RequestStatus::Assigned, Actor::System, None, now)?;
        // Keep offered_at non-decreasing even if the clock steps back.
        let offered_at = self
            .assignment_history
            .last()
            .map_or(now, |last| last.offered_at.max(now));
        self.assignment_history.push(AssignmentRecord {
            technician_id,
            offered_at,
            response: AssignmentResponse::Pending,
            responded_at: None,
        });
        Ok(())
    }

    /// The single outstanding offer, if any.
    pub fn pending_offer(&self) -> Option<&AssignmentRecord> {
        self.assignment_history
            .iter()
            .rev()
            .find(|r| r.response == AssignmentResponse::Pending)
    }

    /// Closes the technician's pending offer. Returns false when there was none.
    pub fn resolve_offer(
        &mut self,
        technician_id: Uuid,
        response: AssignmentResponse,
        now: DateTime<Utc>,
    ) -> bool {
        match self.assignment_history.iter_mut().rev().find(|r| {
            r.technician_id == technician_id && r.response == AssignmentResponse::Pending
        }) {
            Some(record) => {
                record.response = response;
                record.responded_at = Some(now);
                true
            }
            None => false,
        }
    }

    fn close_pending_offers(&mut self, now: DateTime<Utc>) {
        for record in self
            .assignment_history
            .iter_mut()
            .filter(|r| r.response == AssignmentResponse::Pending)
        {
            record.response = AssignmentResponse::Cancelled;
            record.responded_at = Some(now);
        }
    }

    /// Binds the technician to the request.
    ///
    /// Fails with `AssignmentConflict` once any technician has accepted.
    pub fn accept(
        &mut self,
        technician_id: Uuid,
        estimated_arrival: DateTime<Utc>,
        estimated_cost: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.accepts_offers() {
            if self.status.is_terminal() && self.assigned_technician_id.is_none() {
                return Err(DomainError::InvalidTransition {
                    from: self.status,
                    to: RequestStatus::Accepted,
                });
            }
            return Err(DomainError::AssignmentConflict(format!(
                "emergency {} is already {}",
                self.id, self.status
            )));
        }
        self.transition_to(RequestStatus::Accepted, Actor::Technician, None, now)?;
        if !self.resolve_offer(technician_id, AssignmentResponse::Accepted, now) {
            self.assignment_history.push(AssignmentRecord {
                technician_id,
                offered_at: now,
                response: AssignmentResponse::Accepted,
                responded_at: Some(now),
            });
        }
        self.close_pending_offers(now);
        self.assigned_technician_id = Some(technician_id);
        self.actual_response_time = Some(now);
        self.estimated_arrival = Some(estimated_arrival);
        if estimated_cost.is_some() {
            self.estimated_cost = estimated_cost;
        }
        Ok(())
    }

    /// Customer or support cancellation.
    pub fn cancel(
        &mut self,
        actor: Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(RequestStatus::Cancelled, actor, reason, now)?;
        self.close_pending_offers(now);
        Ok(())
    }

    /// Records technician position; does not change status.
    pub fn record_technician_position(
        &mut self,
        position: GeoPoint,
        estimated_arrival: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.technician_location = Some(position);
        self.estimated_arrival = Some(estimated_arrival);
        self.updated_at = now;
    }

    /// Moves to `arrived` and stamps the arrival time.
    pub fn mark_arrived(&mut self, position: GeoPoint, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition_to(RequestStatus::Arrived, Actor::Technician, None, now)?;
        if let Some(last) = self.status_history.last_mut() {
            last.location = Some(position);
        }
        self.technician_location = Some(position);
        self.actual_arrival_time = Some(now);
        self.estimated_arrival = Some(now);
        Ok(())
    }

    /// Finishes the job with the technician's notes and final cost.
    pub fn complete(
        &mut self,
        work_notes: &str,
        final_cost: f64,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(
            RequestStatus::Completed,
            Actor::Technician,
            Some(work_notes.trim().to_string()),
            now,
        )?;
        self.work_performed = Some(work_notes.trim().to_string());
        self.final_cost = Some(final_cost);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Whole minutes from submission to acceptance.
    pub fn response_minutes(&self) -> Option<i64> {
        self.actual_response_time
            .map(|t| (t - self.created_at).num_minutes())
    }

    /// Whole minutes from submission to arrival.
    pub fn arrival_minutes(&self) -> Option<i64> {
        self.actual_arrival_time
            .map(|t| (t - self.created_at).num_minutes())
    }
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

/// Request payload for submitting an emergency.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmergencyRequest {
    pub category: EmergencyCategory,

    #[validate(length(max = 100, message = "Subcategory must be at most 100 characters"))]
    pub subcategory: Option<String>,

    pub urgency: UrgencyLevel,

    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub title: String,

    #[validate(length(max = 4000, message = "Description must be at most 4000 characters"))]
    #[serde(default)]
    pub description: String,

    #[validate(nested)]
    pub location: EmergencyLocation,

    #[validate(length(max = 1000))]
    pub access_instructions: Option<String>,
}

/// Status view returned by `get_status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyStatus {
    pub id: Uuid,
    pub status: RequestStatus,
    pub category: EmergencyCategory,
    pub urgency: UrgencyLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_technician_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_technician_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_technician_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub response_deadline: DateTime<Utc>,
    pub arrival_deadline: DateTime<Utc>,
    pub sla_status: SlaStatus,
    pub offers_made: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<StatusUpdate>,
    pub updated_at: DateTime<Utc>,
}

impl EmergencyStatus {
    pub fn new(
        request: &EmergencyRequest,
        technician: Option<&Technician>,
        sla_status: SlaStatus,
    ) -> Self {
        Self {
            id: request.id,
            status: request.status,
            category: request.category,
            urgency: request.urgency,
            assigned_technician_id: request.assigned_technician_id,
            assigned_technician_name: technician.map(|t| t.name.clone()),
            assigned_technician_phone: technician.and_then(|t| t.phone.clone()),
            estimated_arrival: request.estimated_arrival,
            response_deadline: request.response_deadline,
            arrival_deadline: request.arrival_deadline,
            sla_status,
            offers_made: request.assignment_history.len(),
            last_update: request.status_history.last().cloned(),
            updated_at: request.updated_at,
        }
    }
}

/// Body for a customer or support cancellation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelEmergencyRequest {
    #[serde(default = "default_cancel_actor")]
    pub actor: Actor,

    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

fn default_cancel_actor() -> Actor {
    Actor::Customer
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn lagos_location() -> EmergencyLocation {
        EmergencyLocation {
            address: "12 Marina Road".to_string(),
            unit: None,
            city: "Lagos".to_string(),
            state: "Lagos".to_string(),
            postal_code: Some("101001".to_string()),
            latitude: 6.5244,
            longitude: 3.3792,
        }
    }

    pub fn create_input(category: EmergencyCategory, urgency: UrgencyLevel) -> CreateEmergencyRequest {
        CreateEmergencyRequest {
            category,
            subcategory: Some("burst pipe".to_string()),
            urgency,
            title: "Kitchen pipe burst".to_string(),
            description: "Water everywhere".to_string(),
            location: lagos_location(),
            access_instructions: None,
        }
    }

    pub fn sample_request(urgency: UrgencyLevel, now: DateTime<Utc>) -> EmergencyRequest {
        EmergencyRequest::new(
            Uuid::new_v4(),
            create_input(EmergencyCategory::Plumbing, urgency),
            now,
        )
    }
}
