use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{emergencies, health, technicians};
use crate::services::EmergencyService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EmergencyService>,
    pub config: Arc<Config>,
}

pub fn create_app(config: Config, service: Arc<EmergencyService>) -> Router {
    let config = Arc::new(config);
    let request_timeout = Duration::from_secs(config.server.request_timeout_secs);

    let state = AppState { service, config };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let emergency_routes = Router::new()
        .route("/api/v1/emergencies", post(emergencies::create_emergency))
        .route("/api/v1/emergencies/:id", get(emergencies::get_status))
        .route(
            "/api/v1/emergencies/:id/tracking",
            get(emergencies::get_tracking),
        )
        .route("/api/v1/emergencies/:id/sla", get(emergencies::get_sla_metrics))
        .route(
            "/api/v1/emergencies/:id/cancel",
            post(emergencies::cancel_emergency),
        )
        .route(
            "/api/v1/emergencies/:id/final-price",
            post(emergencies::calculate_final_price),
        )
        .route("/api/v1/emergencies/:id/accept", post(emergencies::accept_offer))
        .route(
            "/api/v1/emergencies/:id/decline",
            post(emergencies::decline_offer),
        )
        .route(
            "/api/v1/emergencies/:id/complete",
            post(emergencies::complete_job),
        );

    let technician_routes = Router::new().route(
        "/api/v1/technicians/:id/location",
        post(technicians::report_location),
    );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(emergency_routes)
        .merge(technician_routes)
        // Bottom layers run first.
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
