//! Emergency request endpoints for customers, technicians and support.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use domain::models::{
    CancelEmergencyRequest, CreateEmergencyRequest, EmergencyRequest, EmergencyStatus,
    FinalPrice, FinalPriceRequest, SlaMetrics, TrackingSnapshot,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

/// Header carrying the authenticated customer id, set by the gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Body for technician actions on an offer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianActionRequest {
    pub technician_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteJobRequest {
    pub technician_id: Uuid,

    #[validate(length(min = 1, max = 4000, message = "Work notes must be 1-4000 characters"))]
    pub work_notes: String,

    #[validate(range(min = 0.0, message = "Final cost must not be negative"))]
    pub final_cost: f64,
}

/// Response after submitting an emergency.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmergencyResponse {
    pub id: Uuid,
    pub status: domain::models::RequestStatus,
    pub response_deadline: chrono::DateTime<chrono::Utc>,
    pub arrival_deadline: chrono::DateTime<chrono::Utc>,
}

impl From<&EmergencyRequest> for CreateEmergencyResponse {
    fn from(request: &EmergencyRequest) -> Self {
        Self {
            id: request.id,
            status: request.status,
            response_deadline: request.response_deadline,
            arrival_deadline: request.arrival_deadline,
        }
    }
}

fn user_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?;
    raw.to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or_else(|| ApiError::Validation("X-User-Id must be a UUID".to_string()))
}

/// POST /api/v1/emergencies
pub async fn create_emergency(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateEmergencyRequest>,
) -> Result<(StatusCode, Json<CreateEmergencyResponse>), ApiError> {
    let user_id = user_id(&headers)?;
    let request = state.service.create_emergency(user_id, input).await?;
    Ok((StatusCode::CREATED, Json((&request).into())))
}

/// GET /api/v1/emergencies/:id
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EmergencyStatus>, ApiError> {
    Ok(Json(state.service.get_status(id).await?))
}

/// GET /api/v1/emergencies/:id/tracking
pub async fn get_tracking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackingSnapshot>, ApiError> {
    Ok(Json(state.service.get_tracking(id).await?))
}

/// GET /api/v1/emergencies/:id/sla
pub async fn get_sla_metrics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlaMetrics>, ApiError> {
    Ok(Json(state.service.get_sla_metrics(id).await?))
}

/// POST /api/v1/emergencies/:id/cancel
pub async fn cancel_emergency(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelEmergencyRequest>,
) -> Result<Json<EmergencyStatus>, ApiError> {
    body.validate()?;
    state
        .service
        .cancel_emergency(id, body.actor, body.reason)
        .await?;
    Ok(Json(state.service.get_status(id).await?))
}

/// POST /api/v1/emergencies/:id/final-price
pub async fn calculate_final_price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<FinalPriceRequest>,
) -> Result<Json<FinalPrice>, ApiError> {
    Ok(Json(state.service.calculate_final_price(id, body).await?))
}

/// POST /api/v1/emergencies/:id/accept
pub async fn accept_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TechnicianActionRequest>,
) -> Result<Json<EmergencyStatus>, ApiError> {
    state.service.accept_offer(id, body.technician_id).await?;
    Ok(Json(state.service.get_status(id).await?))
}

/// POST /api/v1/emergencies/:id/decline
pub async fn decline_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TechnicianActionRequest>,
) -> Result<StatusCode, ApiError> {
    state.service.decline_offer(id, body.technician_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/emergencies/:id/complete
pub async fn complete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CompleteJobRequest>,
) -> Result<Json<EmergencyStatus>, ApiError> {
    body.validate()?;
    state
        .service
        .complete_job(id, body.technician_id, &body.work_notes, body.final_cost)
        .await?;
    Ok(Json(state.service.get_status(id).await?))
}
