//! SLA compliance calculator.
//!
//! Live status is derived from the request on every read; the completion
//! outcome and refund are written once to [`SlaMetrics`].

use chrono::{DateTime, Utc};

use crate::models::{EmergencyRequest, SlaMetrics, SlaOutcome, SlaStatus};

/// A window with less than this share remaining reports `at_risk`.
pub const AT_RISK_FRACTION: f64 = 0.2;

fn window_at_risk(start: DateTime<Utc>, deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let total = (deadline - start).num_seconds();
    if total <= 0 {
        return false;
    }
    let remaining = (deadline - now).num_seconds();
    (remaining as f64) < (total as f64) * AT_RISK_FRACTION
}

fn late_response(request: &EmergencyRequest) -> bool {
    request
        .actual_response_time
        .is_some_and(|t| t > request.response_deadline)
}

/// Whether a recorded acceptance or arrival landed after its deadline.
///
/// Compares exact timestamps; the minute counts on [`SlaMetrics`] are for
/// display only.
pub fn missed_deadline(request: &EmergencyRequest) -> bool {
    late_response(request)
        || request
            .actual_arrival_time
            .is_some_and(|t| t > request.arrival_deadline)
}

/// Live SLA status of a request at `now`.
pub fn evaluate(request: &EmergencyRequest, now: DateTime<Utc>) -> SlaStatus {
    if request.is_terminal() {
        return SlaStatus::Final;
    }

    if request.actual_arrival_time.is_some() {
        return if missed_deadline(request) {
            SlaStatus::Breached
        } else {
            SlaStatus::Met
        };
    }

    let late_response = late_response(request);

    let unassigned = request.actual_response_time.is_none();
    if late_response
        || (unassigned && now > request.response_deadline)
        || now > request.arrival_deadline
    {
        return SlaStatus::Breached;
    }

    let at_risk = if unassigned {
        window_at_risk(request.created_at, request.response_deadline, now)
    } else {
        window_at_risk(request.created_at, request.arrival_deadline, now)
    };
    if at_risk {
        SlaStatus::AtRisk
    } else {
        SlaStatus::OnTrack
    }
}

/// Outcome recorded when the job completes.
pub fn completion_outcome(request: &EmergencyRequest) -> SlaOutcome {
    if missed_deadline(request) {
        SlaOutcome::Breached
    } else {
        SlaOutcome::Met
    }
}

/// Refund owed on a breached job.
pub fn refund_amount(final_cost: f64, refund_percentage: f64) -> f64 {
    final_cost * refund_percentage / 100.0
}

/// Stamps acceptance on the ledger.
pub fn record_response(metrics: &mut SlaMetrics, request: &EmergencyRequest) {
    if metrics.actual_response_minutes.is_none() {
        metrics.actual_response_minutes = request.response_minutes();
    }
    if let Some(t) = request.actual_response_time {
        metrics.updated_at = t;
    }
}

/// Stamps arrival on the ledger.
pub fn record_arrival(metrics: &mut SlaMetrics, request: &EmergencyRequest) {
    if metrics.actual_arrival_minutes.is_none() {
        metrics.actual_arrival_minutes = request.arrival_minutes();
    }
    if let Some(t) = request.actual_arrival_time {
        metrics.updated_at = t;
    }
}

/// Settles the ledger for a completed request and returns the refund owed, if any.
///
/// The caller persists the refund through `SlaStore::record_refund`, which
/// refuses a second write.
pub fn settle(
    metrics: &mut SlaMetrics,
    request: &EmergencyRequest,
    now: DateTime<Utc>,
) -> Option<f64> {
    record_response(metrics, request);
    record_arrival(metrics, request);
    metrics.sla_status = completion_outcome(request);
    metrics.updated_at = now;

    match (metrics.sla_status, request.final_cost) {
        (SlaOutcome::Breached, Some(cost)) if metrics.refund_amount.is_none() => {
            Some(refund_amount(cost, metrics.refund_percentage))
        }
        _ => None,
    }
}
