//! Live technician tracking: location ingestion and per-request fan-out.

use chrono::Utc;
use domain::models::{
    Actor, EmergencyRequest, ReportLocationRequest, RequestStatus, Technician,
    TechnicianLocation, TrackingStatus, TrackingUpdate,
};
use domain::services::{
    sla, CustomerUpdatePayload, EmergencyStore, LocationCache, NotificationService,
    NotificationType, SlaStore, TechnicianStore, TrackingPolicy,
};
use domain::DomainError;
use metrics::counter;
use shared::{haversine_km, GeoPoint};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use super::dispatch::log_failed_notification;
use super::versioned::update_request;

/// Per-request broadcast channels for tracking updates.
///
/// Publishing is fire-and-forget; a lagging subscriber skips ahead.
#[derive(Clone)]
pub struct TrackingHub {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<TrackingUpdate>>>>,
    capacity: usize,
}

impl TrackingHub {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Returns the number of receivers reached.
    pub async fn publish(&self, update: TrackingUpdate) -> usize {
        let channels = self.channels.read().await;
        match channels.get(&update.request_id) {
            Some(tx) => tx.send(update).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn subscribe(&self, request_id: Uuid) -> broadcast::Receiver<TrackingUpdate> {
        let mut channels = self.channels.write().await;
        channels
            .entry(request_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Drops the channel; subscribers see the stream close.
    pub async fn close(&self, request_id: Uuid) {
        self.channels.write().await.remove(&request_id);
    }

    /// Removes channels nobody listens to. Returns how many were dropped.
    pub async fn cleanup(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, tx| tx.receiver_count() > 0);
        before - channels.len()
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for TrackingHub {
    fn default() -> Self {
        Self::with_capacity(64)
    }
}

/// A technician holding several jobs is tracked toward the closest customer.
fn nearest_destination(
    requests: Vec<EmergencyRequest>,
    position: GeoPoint,
) -> Option<EmergencyRequest> {
    requests.into_iter().min_by(|a, b| {
        haversine_km(position, a.customer_location())
            .total_cmp(&haversine_km(position, b.customer_location()))
            .then_with(|| a.created_at.cmp(&b.created_at))
    })
}

#[derive(Clone)]
pub struct TrackingService {
    emergencies: Arc<dyn EmergencyStore>,
    technicians: Arc<dyn TechnicianStore>,
    sla: Arc<dyn SlaStore>,
    locations: Arc<dyn LocationCache>,
    notifier: Arc<dyn NotificationService>,
    hub: TrackingHub,
    policy: TrackingPolicy,
    location_ttl: Duration,
}

impl TrackingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        emergencies: Arc<dyn EmergencyStore>,
        technicians: Arc<dyn TechnicianStore>,
        sla: Arc<dyn SlaStore>,
        locations: Arc<dyn LocationCache>,
        notifier: Arc<dyn NotificationService>,
        hub: TrackingHub,
        policy: TrackingPolicy,
        location_ttl: Duration,
    ) -> Self {
        Self {
            emergencies,
            technicians,
            sla,
            locations,
            notifier,
            hub,
            policy,
            location_ttl,
        }
    }

    pub fn hub(&self) -> &TrackingHub {
        &self.hub
    }

    pub fn policy(&self) -> &TrackingPolicy {
        &self.policy
    }

    /// Latest cached position, if still fresh.
    pub async fn cached_location(&self, technician_id: Uuid) -> Option<TechnicianLocation> {
        match self.locations.get(technician_id).await {
            Ok(location) => location,
            Err(e) => {
                warn!(technician_id = %technician_id, error = %e, "Location cache read failed");
                None
            }
        }
    }

    /// Ingests one location ping from a technician's device.
    ///
    /// Only invalid coordinates are an error; store and cache trouble is
    /// logged and the ping is otherwise dropped.
    pub async fn report_location(
        &self,
        technician_id: Uuid,
        ping: ReportLocationRequest,
    ) -> Result<(), DomainError> {
        ping.validate()?;
        let now = Utc::now();
        let location = ping.into_location(technician_id, now);
        let position = location.point();

        if let Err(e) = self.locations.put(&location, self.location_ttl).await {
            warn!(technician_id = %technician_id, error = %e, "Failed to cache location");
        }
        if let Err(e) = self.technicians.update_location(technician_id, position).await {
            warn!(technician_id = %technician_id, error = %e, "Failed to store last known location");
        }

        let active = match self.emergencies.find_active_for_technician(technician_id).await {
            Ok(requests) => requests,
            Err(e) => {
                warn!(technician_id = %technician_id, error = %e, "Active job lookup failed");
                return Ok(());
            }
        };
        let Some(active) = nearest_destination(active, position) else {
            debug!(technician_id = %technician_id, "No active job for location ping");
            return Ok(());
        };

        if let Err(e) = self.advance(active, &location).await {
            warn!(technician_id = %technician_id, error = %e, "Tracking update dropped");
        }
        Ok(())
    }

    async fn advance(
        &self,
        request: EmergencyRequest,
        location: &TechnicianLocation,
    ) -> Result<(), DomainError> {
        let technician_id = location.technician_id;
        let position = location.point();
        let distance_km = haversine_km(position, request.customer_location());
        let arrived = self.policy.has_arrived(distance_km);
        let eta_minutes = if arrived {
            0
        } else {
            self.policy.eta_minutes(distance_km, location.speed)
        };

        let updated = update_request(self.emergencies.as_ref(), request.id, |req| {
            if !req.status.is_trackable() || req.assigned_technician_id != Some(technician_id) {
                return Ok(false);
            }
            let now = Utc::now();
            if req.status == RequestStatus::Accepted {
                req.transition_to(RequestStatus::EnRoute, Actor::Technician, None, now)?;
            }
            if arrived {
                req.mark_arrived(position, now)?;
            } else {
                req.record_technician_position(
                    position,
                    now + chrono::Duration::minutes(eta_minutes),
                    now,
                );
            }
            Ok(true)
        })
        .await?;

        if !updated.saved {
            return Ok(());
        }
        let request = updated.request;

        let technician = match self.technicians.get(technician_id).await {
            Ok(technician) => technician,
            Err(e) => {
                warn!(technician_id = %technician_id, error = %e, "Technician lookup failed");
                None
            }
        };

        let update = TrackingUpdate {
            request_id: request.id,
            technician_id,
            technician_name: technician
                .as_ref()
                .map(|t| t.name.clone())
                .unwrap_or_default(),
            technician_photo: technician.as_ref().and_then(|t| t.photo_url.clone()),
            current_location: position,
            distance_remaining_km: distance_km,
            eta_minutes,
            status: if arrived {
                TrackingStatus::Arrived
            } else {
                TrackingStatus::EnRoute
            },
            updated_at: request.updated_at,
        };
        let receivers = self.hub.publish(update).await;
        counter!("tracking_updates_published_total").increment(1);
        debug!(
            emergency_id = %request.id,
            distance_km,
            eta_minutes,
            receivers,
            "Tracking update published"
        );

        if arrived {
            self.on_arrival(&request, technician.as_ref()).await;
        }
        Ok(())
    }

    async fn on_arrival(&self, request: &EmergencyRequest, technician: Option<&Technician>) {
        info!(
            emergency_id = %request.id,
            arrival_minutes = request.arrival_minutes(),
            "Technician arrived"
        );

        match self.sla.get(request.id).await {
            Ok(Some(mut metrics)) => {
                sla::record_response(&mut metrics, request);
                sla::record_arrival(&mut metrics, request);
                if let Err(e) = self.sla.update(&metrics).await {
                    warn!(emergency_id = %request.id, error = %e, "Failed to record SLA arrival");
                }
            }
            Ok(None) => warn!(emergency_id = %request.id, "No SLA ledger for request"),
            Err(e) => warn!(emergency_id = %request.id, error = %e, "SLA ledger read failed"),
        }

        let result = self
            .notifier
            .notify_customer(
                request.user_id,
                CustomerUpdatePayload {
                    notification_type: NotificationType::TechnicianArrived,
                    request_id: request.id,
                    status: request.status,
                    message: "Your technician has arrived.".to_string(),
                    technician_id: request.assigned_technician_id,
                    technician_name: technician.map(|t| t.name.clone()),
                    technician_phone: technician.and_then(|t| t.phone.clone()),
                    eta_minutes: Some(0),
                    timestamp: Utc::now(),
                },
            )
            .await;
        log_failed_notification(&result, request.id, "technician_arrived");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(request_id: Uuid, eta_minutes: i64) -> TrackingUpdate {
        TrackingUpdate {
            request_id,
            technician_id: Uuid::new_v4(),
            technician_name: "Ada".to_string(),
            technician_photo: None,
            current_location: GeoPoint::new(6.45, 3.47),
            distance_remaining_km: 1.0,
            eta_minutes,
            status: TrackingStatus::EnRoute,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let hub = TrackingHub::default();
        assert_eq!(hub.publish(update(Uuid::new_v4(), 5)).await, 0);
        assert_eq!(hub.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_subscribers_only_see_their_request() {
        let hub = TrackingHub::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_a = hub.subscribe(a).await;
        let mut rx_b = hub.subscribe(b).await;

        hub.publish(update(a, 7)).await;
        assert_eq!(rx_a.recv().await.unwrap().eta_minutes, 7);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let hub = TrackingHub::with_capacity(2);
        let id = Uuid::new_v4();
        let mut rx = hub.subscribe(id).await;
        for eta in 1..=4 {
            hub.publish(update(id, eta)).await;
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(rx.recv().await.unwrap().eta_minutes, 3);
        assert_eq!(rx.recv().await.unwrap().eta_minutes, 4);
    }

    #[tokio::test]
    async fn test_close_ends_stream_and_cleanup_drops_idle() {
        let hub = TrackingHub::default();
        let id = Uuid::new_v4();
        let mut rx = hub.subscribe(id).await;
        hub.close(id).await;
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));

        let idle = hub.subscribe(Uuid::new_v4()).await;
        drop(idle);
        assert_eq!(hub.cleanup().await, 1);
        assert_eq!(hub.channel_count().await, 0);
    }
}
