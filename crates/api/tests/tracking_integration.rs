//! Tracking, arrival and completion scenarios.

mod common;

use chrono::{Duration, Utc};
use common::{north_of, TestHarness, CUSTOMER};
use domain::models::{
    EmergencyCategory, FinalPriceRequest, ReportLocationRequest, RequestStatus, SlaOutcome,
    SlaStatus, TrackingStatus, UrgencyLevel,
};
use domain::services::{NotificationType, TechnicianStore};
use domain::DomainError;
use shared::GeoPoint;
use uuid::Uuid;

fn ping(at: GeoPoint) -> ReportLocationRequest {
    ReportLocationRequest {
        latitude: at.latitude,
        longitude: at.longitude,
        speed: None,
        heading: None,
        timestamp: None,
    }
}

#[tokio::test]
async fn test_arrival_within_threshold_publishes_and_notifies() {
    let h = TestHarness::new();
    let tech = h
        .seed_technician(EmergencyCategory::Plumbing, north_of(CUSTOMER, 1.0), 4.8)
        .await;
    let request = h.insert_request(UrgencyLevel::Critical, Utc::now()).await;
    h.service.accept_offer(request.id, tech.id).await.unwrap();

    let mut updates = h.service.subscribe_tracking(request.id).await.unwrap();

    h.service
        .report_technician_location(tech.id, ping(north_of(CUSTOMER, 1.0)))
        .await
        .unwrap();
    let en_route = updates.recv().await.unwrap();
    assert_eq!(en_route.status, TrackingStatus::EnRoute);
    assert_eq!(en_route.technician_id, tech.id);
    assert_eq!(en_route.technician_name, tech.name);
    assert!(en_route.eta_minutes > 0);
    assert!((en_route.distance_remaining_km - 1.0).abs() < 0.01);
    assert_eq!(h.request(request.id).await.status, RequestStatus::EnRoute);

    let snapshot = h.service.get_tracking(request.id).await.unwrap();
    assert!(snapshot.technician_location.is_some());
    assert!(snapshot.distance_remaining_km.is_some());

    // 50 m from the door.
    h.service
        .report_technician_location(tech.id, ping(north_of(CUSTOMER, 0.05)))
        .await
        .unwrap();
    let arrived = updates.recv().await.unwrap();
    assert_eq!(arrived.status, TrackingStatus::Arrived);
    assert_eq!(arrived.eta_minutes, 0);

    let stored = h.request(request.id).await;
    assert_eq!(stored.status, RequestStatus::Arrived);
    assert!(stored.actual_arrival_time.is_some());
    assert_eq!(
        h.notifier
            .count_for(request.id, NotificationType::TechnicianArrived),
        1
    );
    let metrics = h.service.get_sla_metrics(request.id).await.unwrap();
    assert!(metrics.actual_arrival_minutes.is_some());

    // Pings after arrival no longer move the request.
    h.service
        .report_technician_location(tech.id, ping(CUSTOMER))
        .await
        .unwrap();
    assert!(updates.try_recv().is_err());
    assert_eq!(
        h.notifier
            .count_for(request.id, NotificationType::TechnicianArrived),
        1
    );
}

#[tokio::test]
async fn test_ping_without_active_job_is_cached_only() {
    let h = TestHarness::new();
    let tech = h
        .seed_technician(EmergencyCategory::Roofing, north_of(CUSTOMER, 8.0), 4.1)
        .await;

    let moved = north_of(CUSTOMER, 7.0);
    h.service
        .report_technician_location(tech.id, ping(moved))
        .await
        .unwrap();

    assert_eq!(h.locations.len().await, 1);
    assert_eq!(h.technician(tech.id).await.location, Some(moved));
}

#[tokio::test]
async fn test_ping_advances_nearest_of_several_jobs() {
    let h = TestHarness::new();
    let mut tech = common::technician(EmergencyCategory::Plumbing, north_of(CUSTOMER, 3.0), 4.6);
    tech.max_concurrent_jobs = 2;
    h.technicians.upsert(&tech).await.unwrap();

    let first = h
        .insert_request(UrgencyLevel::Urgent, Utc::now() - Duration::minutes(10))
        .await;
    let second_site = north_of(CUSTOMER, 12.0);
    let second = h
        .insert_request_at(UrgencyLevel::Urgent, Utc::now(), second_site)
        .await;
    h.service.accept_offer(first.id, tech.id).await.unwrap();
    h.service.accept_offer(second.id, tech.id).await.unwrap();

    // Heading for the newer job, 1 km out.
    h.service
        .report_technician_location(tech.id, ping(north_of(second_site, 1.0)))
        .await
        .unwrap();
    assert_eq!(h.request(second.id).await.status, RequestStatus::EnRoute);
    assert_eq!(h.request(first.id).await.status, RequestStatus::Accepted);

    h.service
        .report_technician_location(tech.id, ping(north_of(CUSTOMER, 0.02)))
        .await
        .unwrap();
    assert_eq!(h.request(first.id).await.status, RequestStatus::Arrived);
    assert_eq!(h.request(second.id).await.status, RequestStatus::EnRoute);
}

#[tokio::test]
async fn test_invalid_coordinates_rejected() {
    let h = TestHarness::new();
    let err = h
        .service
        .report_technician_location(Uuid::new_v4(), ping(GeoPoint::new(91.0, 3.4)))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidRequest(_)));
    assert_eq!(h.locations.len().await, 0);
}

#[tokio::test]
async fn test_late_job_completion_records_refund_once() {
    let h = TestHarness::new();
    let tech = h
        .seed_technician(EmergencyCategory::Plumbing, north_of(CUSTOMER, 1.0), 4.8)
        .await;
    let request = h
        .insert_request(UrgencyLevel::Urgent, Utc::now() - Duration::hours(3))
        .await;

    h.service.accept_offer(request.id, tech.id).await.unwrap();
    h.service
        .report_technician_location(tech.id, ping(CUSTOMER))
        .await
        .unwrap();

    let blank = h
        .service
        .complete_job(request.id, tech.id, "   ", 40_000.0)
        .await
        .unwrap_err();
    assert!(matches!(blank, DomainError::InvalidRequest(_)));

    let stranger = h
        .service
        .complete_job(request.id, Uuid::new_v4(), "Replaced valve", 40_000.0)
        .await
        .unwrap_err();
    assert!(matches!(stranger, DomainError::NotFound(_)));

    let completed = h
        .service
        .complete_job(request.id, tech.id, "Replaced valve", 40_000.0)
        .await
        .unwrap();
    assert_eq!(completed.status, RequestStatus::Completed);
    assert_eq!(completed.final_cost, Some(40_000.0));

    let metrics = h.service.get_sla_metrics(request.id).await.unwrap();
    assert_eq!(metrics.sla_status, SlaOutcome::Breached);
    assert_eq!(metrics.refund_amount, Some(20_000.0));
    assert_eq!(h.technician(tech.id).await.current_jobs, 0);

    let again = h
        .service
        .complete_job(request.id, tech.id, "Replaced valve", 40_000.0)
        .await
        .unwrap_err();
    assert!(matches!(again, DomainError::InvalidTransition { .. }));
    let metrics = h.service.get_sla_metrics(request.id).await.unwrap();
    assert_eq!(metrics.refund_amount, Some(20_000.0));

    let err = h.service.subscribe_tracking(request.id).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_prompt_job_meets_sla() {
    let h = TestHarness::new();
    let tech = h
        .seed_technician(EmergencyCategory::Plumbing, north_of(CUSTOMER, 1.0), 4.8)
        .await;
    let request = h.insert_request(UrgencyLevel::Critical, Utc::now()).await;

    h.service.accept_offer(request.id, tech.id).await.unwrap();
    h.service
        .report_technician_location(tech.id, ping(CUSTOMER))
        .await
        .unwrap();
    h.service
        .complete_job(request.id, tech.id, "Cleared blockage", 30_000.0)
        .await
        .unwrap();

    let metrics = h.service.get_sla_metrics(request.id).await.unwrap();
    assert_eq!(metrics.sla_status, SlaOutcome::Met);
    assert_eq!(metrics.refund_amount, None);
}

#[tokio::test]
async fn test_final_price_uses_technician_distance() {
    let h = TestHarness::new();
    let tech = h
        .seed_technician(EmergencyCategory::Plumbing, north_of(CUSTOMER, 6.0), 4.8)
        .await;
    let request = h.insert_request(UrgencyLevel::Urgent, Utc::now()).await;
    h.service.accept_offer(request.id, tech.id).await.unwrap();

    let explicit = h
        .service
        .calculate_final_price(
            request.id,
            FinalPriceRequest {
                labor_hours: 2.0,
                distance_km: Some(0.0),
                ..FinalPriceRequest::default()
            },
        )
        .await
        .unwrap();
    let derived = h
        .service
        .calculate_final_price(
            request.id,
            FinalPriceRequest {
                labor_hours: 2.0,
                ..FinalPriceRequest::default()
            },
        )
        .await
        .unwrap();

    assert!(explicit.total > 0.0);
    assert!(derived.distance_charge >= explicit.distance_charge);
    assert_eq!(derived.labor_hours, 2.0);
}

#[tokio::test]
async fn test_acceptance_seconds_late_is_breached_and_refunded() {
    let h = TestHarness::new();
    let tech = h
        .seed_technician(EmergencyCategory::Plumbing, north_of(CUSTOMER, 1.0), 4.8)
        .await;
    // 30-minute response window, accepted 40 s after it closed
    let request = h
        .insert_request(
            UrgencyLevel::Critical,
            Utc::now() - Duration::minutes(30) - Duration::seconds(40),
        )
        .await;

    h.service.accept_offer(request.id, tech.id).await.unwrap();
    h.service
        .report_technician_location(tech.id, ping(CUSTOMER))
        .await
        .unwrap();
    let status = h.service.get_status(request.id).await.unwrap();
    assert_eq!(status.sla_status, SlaStatus::Breached);

    h.service
        .complete_job(request.id, tech.id, "Replaced trap", 50_000.0)
        .await
        .unwrap();

    let metrics = h.service.get_sla_metrics(request.id).await.unwrap();
    assert_eq!(metrics.actual_response_minutes, Some(30));
    assert_eq!(metrics.sla_status, SlaOutcome::Breached);
    assert_eq!(metrics.refund_amount, Some(50_000.0));
}
