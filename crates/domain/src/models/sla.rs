//! SLA tracking model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::emergency::EmergencyRequest;

/// Live SLA position of a request, derived on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    OnTrack,
    AtRisk,
    Met,
    Breached,
    Final,
}

impl SlaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlaStatus::OnTrack => "on_track",
            SlaStatus::AtRisk => "at_risk",
            SlaStatus::Met => "met",
            SlaStatus::Breached => "breached",
            SlaStatus::Final => "final",
        }
    }
}

impl fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored SLA outcome on [`SlaMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaOutcome {
    Pending,
    Met,
    Breached,
    Final,
}

impl SlaOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlaOutcome::Pending => "pending",
            SlaOutcome::Met => "met",
            SlaOutcome::Breached => "breached",
            SlaOutcome::Final => "final",
        }
    }
}

impl fmt::Display for SlaOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SlaOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SlaOutcome::Pending),
            "met" => Ok(SlaOutcome::Met),
            "breached" => Ok(SlaOutcome::Breached),
            "final" => Ok(SlaOutcome::Final),
            _ => Err(format!("Invalid SLA status: {}", s)),
        }
    }
}

/// Per-request SLA ledger.
///
/// `refund_amount` is written at most once, after the final cost is known and
/// only when the outcome is `breached`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaMetrics {
    pub emergency_id: Uuid,
    pub response_sla_minutes: i64,
    pub actual_response_minutes: Option<i64>,
    pub arrival_sla_minutes: i64,
    pub actual_arrival_minutes: Option<i64>,
    pub sla_status: SlaOutcome,
    pub refund_percentage: f64,
    pub refund_amount: Option<f64>,
    pub refund_processed: bool,
    pub updated_at: DateTime<Utc>,
}

impl SlaMetrics {
    /// Initial ledger for a freshly created request.
    pub fn for_request(request: &EmergencyRequest) -> Self {
        Self {
            emergency_id: request.id,
            response_sla_minutes: request.urgency.response_sla_minutes(),
            actual_response_minutes: None,
            arrival_sla_minutes: request.urgency.arrival_sla_minutes(),
            actual_arrival_minutes: None,
            sla_status: SlaOutcome::Pending,
            refund_percentage: request.urgency.refund_percentage(),
            refund_amount: None,
            refund_processed: false,
            updated_at: request.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::emergency::test_support::sample_request;
    use crate::models::UrgencyLevel;

    #[test]
    fn test_for_request_copies_urgency_terms() {
        let req = sample_request(UrgencyLevel::SameDay, Utc::now());
        let m = SlaMetrics::for_request(&req);
        assert_eq!(m.response_sla_minutes, 360);
        assert_eq!(m.arrival_sla_minutes, 390);
        assert_eq!(m.refund_percentage, 25.0);
        assert_eq!(m.sla_status, SlaOutcome::Pending);
        assert!(m.refund_amount.is_none());
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(
            serde_json::to_string(&SlaOutcome::Breached).unwrap(),
            "\"breached\""
        );
        assert_eq!(serde_json::to_string(&SlaStatus::AtRisk).unwrap(), "\"at_risk\"");
        assert_eq!("final".parse::<SlaOutcome>().unwrap(), SlaOutcome::Final);
    }
}
