//! Technician device endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::ReportLocationRequest;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Accepts a location ping from a technician's device.
///
/// POST /api/v1/technicians/:id/location
pub async fn report_location(
    State(state): State<AppState>,
    Path(technician_id): Path<Uuid>,
    Json(ping): Json<ReportLocationRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .report_technician_location(technician_id, ping)
        .await?;
    Ok(StatusCode::ACCEPTED)
}
