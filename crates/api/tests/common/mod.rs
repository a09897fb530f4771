//! Shared fixtures for integration tests.
//!
//! Everything runs on the in-memory stores with a recording notifier, so no
//! external services are needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::{DateTime, FixedOffset, Utc};
use domain::models::{
    CreateEmergencyRequest, EmergencyCategory, EmergencyLocation, EmergencyRequest,
    RequestStatus, SlaMetrics, Technician, TechnicianStatus, UrgencyLevel,
};
use domain::services::{EmergencyStore, MockNotificationService, PricingEngine, SlaStore, TechnicianStore};
use fake::faker::address::en::{CityName, StreetName};
use fake::faker::name::en::Name;
use fake::Fake;
use persistence::{
    InMemoryEmergencyStore, InMemoryLocationCache, InMemorySlaStore, InMemoryTechnicianStore,
};
use rescue_dispatch_api::{
    app::create_app,
    config::Config,
    services::{Collaborators, DispatchPolicy, EmergencyService, TrackingSettings},
};
use shared::GeoPoint;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Customer address used across scenarios (Lagos Island).
pub const CUSTOMER: GeoPoint = GeoPoint {
    latitude: 6.5244,
    longitude: 3.3792,
};

/// Roughly 0.009 degrees of latitude per kilometre.
pub fn north_of(origin: GeoPoint, km: f64) -> GeoPoint {
    GeoPoint::new(origin.latitude + km / 111.195, origin.longitude)
}

pub struct TestHarness {
    pub service: Arc<EmergencyService>,
    pub emergencies: Arc<InMemoryEmergencyStore>,
    pub technicians: Arc<InMemoryTechnicianStore>,
    pub sla: Arc<InMemorySlaStore>,
    pub locations: Arc<InMemoryLocationCache>,
    pub notifier: Arc<MockNotificationService>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_policy(DispatchPolicy::default())
    }

    pub fn with_policy(policy: DispatchPolicy) -> Self {
        let emergencies = Arc::new(InMemoryEmergencyStore::new());
        let technicians = Arc::new(InMemoryTechnicianStore::new());
        let sla = Arc::new(InMemorySlaStore::new());
        let locations = Arc::new(InMemoryLocationCache::new());
        let notifier = Arc::new(MockNotificationService::new());

        let pricing = PricingEngine::new(FixedOffset::east_opt(3600).unwrap());
        let service = Arc::new(EmergencyService::new(
            Collaborators {
                emergencies: emergencies.clone(),
                technicians: technicians.clone(),
                sla: sla.clone(),
                locations: locations.clone(),
                notifier: notifier.clone(),
            },
            pricing,
            policy,
            TrackingSettings::default(),
        ));

        Self {
            service,
            emergencies,
            technicians,
            sla,
            locations,
            notifier,
        }
    }

    pub fn router(&self) -> Router {
        let config = Config::load_for_test(&[]).expect("embedded defaults load");
        create_app(config, self.service.clone())
    }

    /// Adds an available, verified technician at `location`.
    pub async fn seed_technician(
        &self,
        category: EmergencyCategory,
        location: GeoPoint,
        rating: f64,
    ) -> Technician {
        let technician = technician(category, location, rating);
        self.technicians.upsert(&technician).await.unwrap();
        technician
    }

    /// Stores a request as if submitted at `created_at`, without dispatching it.
    pub async fn insert_request(
        &self,
        urgency: UrgencyLevel,
        created_at: DateTime<Utc>,
    ) -> EmergencyRequest {
        self.insert_request_at(urgency, created_at, CUSTOMER).await
    }

    /// Like [`TestHarness::insert_request`], for a customer at `site`.
    pub async fn insert_request_at(
        &self,
        urgency: UrgencyLevel,
        created_at: DateTime<Utc>,
        site: GeoPoint,
    ) -> EmergencyRequest {
        let mut input = emergency_input(EmergencyCategory::Plumbing, urgency);
        input.location.latitude = site.latitude;
        input.location.longitude = site.longitude;
        let request = EmergencyRequest::new(Uuid::new_v4(), input, created_at);
        self.emergencies.insert(&request).await.unwrap();
        self.sla
            .insert(&SlaMetrics::for_request(&request))
            .await
            .unwrap();
        request
    }

    pub async fn request(&self, id: Uuid) -> EmergencyRequest {
        self.emergencies.get(id).await.unwrap().unwrap()
    }

    pub async fn technician(&self, id: Uuid) -> Technician {
        self.technicians.get(id).await.unwrap().unwrap()
    }

    /// Polls until `pred` holds. Uses tokio time, so paused clocks auto-advance.
    pub async fn wait_for<F>(&self, id: Uuid, mut pred: F) -> EmergencyRequest
    where
        F: FnMut(&EmergencyRequest) -> bool,
    {
        for _ in 0..2_000 {
            let request = self.request(id).await;
            if pred(&request) {
                return request;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached for emergency {id}");
    }

    /// Waits for a pending offer to `technician_id`.
    pub async fn wait_for_offer(&self, id: Uuid, technician_id: Uuid) -> EmergencyRequest {
        self.wait_for(id, |r| {
            r.status == RequestStatus::Assigned
                && r.pending_offer().map(|o| o.technician_id) == Some(technician_id)
        })
        .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn technician(category: EmergencyCategory, location: GeoPoint, rating: f64) -> Technician {
    Technician {
        id: Uuid::new_v4(),
        name: Name().fake(),
        photo_url: None,
        phone: Some("+2348000000000".to_string()),
        categories: vec![category],
        is_online: true,
        status: TechnicianStatus::Available,
        is_verified: true,
        location: Some(location),
        location_updated_at: Some(Utc::now()),
        rating,
        avg_arrival_minutes: 0.0,
        current_jobs: 0,
        max_concurrent_jobs: 1,
        completed_jobs: 12,
    }
}

pub fn emergency_input(category: EmergencyCategory, urgency: UrgencyLevel) -> CreateEmergencyRequest {
    let street: String = StreetName().fake();
    CreateEmergencyRequest {
        category,
        subcategory: None,
        urgency,
        title: "Water pouring through the ceiling".to_string(),
        description: "Pipe burst in the upstairs bathroom".to_string(),
        location: EmergencyLocation {
            address: format!("{} {street}", (1..200).fake::<u32>()),
            unit: None,
            city: CityName().fake(),
            state: "Lagos".to_string(),
            postal_code: None,
            latitude: CUSTOMER.latitude,
            longitude: CUSTOMER.longitude,
        },
        access_instructions: Some("Gate code 4411".to_string()),
    }
}

/// Parse response body as JSON.
pub async fn parse_response_body(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn json_request_as_user(uri: &str, user_id: Uuid, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-User-Id", user_id.to_string())
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
