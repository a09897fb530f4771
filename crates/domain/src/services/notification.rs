//! Notification service for technician offers, customer updates and support alerts.
//!
//! Delivery is fire-and-forget: callers log a failed result and move on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::models::{EmergencyCategory, RequestStatus, UrgencyLevel};

/// Notification type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    JobOffer,
    TechnicianAssigned,
    TechnicianArrived,
    NoTechnicianAvailable,
    EmergencyCancelled,
    EscalationAlert,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::JobOffer => write!(f, "job_offer"),
            NotificationType::TechnicianAssigned => write!(f, "technician_assigned"),
            NotificationType::TechnicianArrived => write!(f, "technician_arrived"),
            NotificationType::NoTechnicianAvailable => write!(f, "no_technician_available"),
            NotificationType::EmergencyCancelled => write!(f, "emergency_cancelled"),
            NotificationType::EscalationAlert => write!(f, "escalation_alert"),
        }
    }
}

/// Time-bounded job offer pushed to one technician.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOfferPayload {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub request_id: Uuid,
    pub category: EmergencyCategory,
    pub urgency: UrgencyLevel,
    pub title: String,
    pub distance_km: f64,
    pub eta_minutes: f64,
    pub price_estimate: f64,
    pub expires_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

/// Status update for the customer who raised the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdatePayload {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub request_id: Uuid,
    pub status: RequestStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// Alert for human support when automatic dispatch gives up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportAlertPayload {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub request_id: Uuid,
    pub category: EmergencyCategory,
    pub urgency: UrgencyLevel,
    pub reason: String,
    pub attempts: u32,
    pub radius_km: f64,
    pub timestamp: DateTime<Utc>,
}

/// Generic notification payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotificationPayload {
    JobOffer(JobOfferPayload),
    CustomerUpdate(CustomerUpdatePayload),
    SupportAlert(SupportAlertPayload),
}

impl NotificationPayload {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            NotificationPayload::JobOffer(p) => p.notification_type,
            NotificationPayload::CustomerUpdate(p) => p.notification_type,
            NotificationPayload::SupportAlert(p) => p.notification_type,
        }
    }

    pub fn request_id(&self) -> Uuid {
        match self {
            NotificationPayload::JobOffer(p) => p.request_id,
            NotificationPayload::CustomerUpdate(p) => p.request_id,
            NotificationPayload::SupportAlert(p) => p.request_id,
        }
    }
}

/// Result of a notification send attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationResult {
    /// Notification was sent successfully.
    Sent,
    /// Recipient has no registered device.
    NoToken,
    /// Notification sending failed (but was non-blocking).
    Failed(String),
    /// Notification was skipped.
    Skipped,
}

/// Notification service trait for the dispatch engine's outbound messages.
#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    /// Push a job offer to a technician.
    async fn notify_technician(
        &self,
        technician_id: Uuid,
        payload: JobOfferPayload,
    ) -> NotificationResult;

    /// Send a status update to the customer.
    async fn notify_customer(
        &self,
        user_id: Uuid,
        payload: CustomerUpdatePayload,
    ) -> NotificationResult;

    /// Alert human support.
    async fn notify_support(&self, payload: SupportAlertPayload) -> NotificationResult;
}

/// A notification captured by [`MockNotificationService`].
#[derive(Debug, Clone)]
pub struct SentNotification {
    /// Technician or customer id; `None` for support alerts.
    pub recipient: Option<Uuid>,
    pub payload: NotificationPayload,
}

/// Mock notification service for development and testing.
///
/// Logs notifications and records them instead of delivering anything.
#[derive(Debug, Clone, Default)]
pub struct MockNotificationService {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    sent: Arc<Mutex<Vec<SentNotification>>>,
}

impl MockNotificationService {
    /// Create a new mock notification service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock service that simulates failures.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Everything recorded so far, oldest first.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn count(&self, notification_type: NotificationType) -> usize {
        self.sent()
            .iter()
            .filter(|n| n.payload.notification_type() == notification_type)
            .count()
    }

    /// Notifications of one type concerning one request.
    pub fn count_for(&self, request_id: Uuid, notification_type: NotificationType) -> usize {
        self.sent()
            .iter()
            .filter(|n| {
                n.payload.request_id() == request_id
                    && n.payload.notification_type() == notification_type
            })
            .count()
    }

    fn record(&self, recipient: Option<Uuid>, payload: NotificationPayload) -> NotificationResult {
        if self.simulate_failure {
            tracing::warn!(
                request_id = %payload.request_id(),
                notification_type = %payload.notification_type(),
                "Mock notification service simulating failure"
            );
            return NotificationResult::Failed("Simulated failure".to_string());
        }

        tracing::info!(
            request_id = %payload.request_id(),
            notification_type = %payload.notification_type(),
            recipient = ?recipient,
            "Mock: Would send notification"
        );

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentNotification { recipient, payload });
        }
        NotificationResult::Sent
    }
}

#[async_trait::async_trait]
impl NotificationService for MockNotificationService {
    async fn notify_technician(
        &self,
        technician_id: Uuid,
        payload: JobOfferPayload,
    ) -> NotificationResult {
        self.record(Some(technician_id), NotificationPayload::JobOffer(payload))
    }

    async fn notify_customer(
        &self,
        user_id: Uuid,
        payload: CustomerUpdatePayload,
    ) -> NotificationResult {
        self.record(Some(user_id), NotificationPayload::CustomerUpdate(payload))
    }

    async fn notify_support(&self, payload: SupportAlertPayload) -> NotificationResult {
        self.record(None, NotificationPayload::SupportAlert(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support_alert() -> SupportAlertPayload {
        SupportAlertPayload {
            notification_type: NotificationType::EscalationAlert,
            request_id: Uuid::nil(),
            category: EmergencyCategory::Plumbing,
            urgency: UrgencyLevel::Urgent,
            reason: "no technicians within 50 km".to_string(),
            attempts: 3,
            radius_km: 55.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_notification_type_display() {
        assert_eq!(NotificationType::JobOffer.to_string(), "job_offer");
        assert_eq!(
            NotificationType::EscalationAlert.to_string(),
            "escalation_alert"
        );
    }

    #[test]
    fn test_customer_update_serialization() {
        let payload = CustomerUpdatePayload {
            notification_type: NotificationType::TechnicianAssigned,
            request_id: Uuid::nil(),
            status: RequestStatus::Accepted,
            message: "Your technician is on the way".to_string(),
            technician_id: Some(Uuid::nil()),
            technician_name: Some("Ada".to_string()),
            technician_phone: None,
            eta_minutes: Some(12),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("technician_assigned"));
        assert!(json.contains("\"etaMinutes\":12"));
        assert!(!json.contains("technicianPhone"));
    }

    #[tokio::test]
    async fn test_mock_records_notifications() {
        let service = MockNotificationService::new();
        let result = service.notify_support(support_alert()).await;
        assert_eq!(result, NotificationResult::Sent);
        assert_eq!(service.count(NotificationType::EscalationAlert), 1);
        assert_eq!(
            service.count_for(Uuid::nil(), NotificationType::EscalationAlert),
            1
        );
        assert!(service.sent()[0].recipient.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_the_log() {
        let service = MockNotificationService::new();
        let clone = service.clone();
        clone.notify_support(support_alert()).await;
        assert_eq!(service.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_notification_service_failure() {
        let service = MockNotificationService::failing();
        let result = service.notify_support(support_alert()).await;
        assert!(matches!(result, NotificationResult::Failed(_)));
        assert!(service.sent().is_empty());
    }
}
