use axum::{Json, extract::State};
use std::sync::Arc;

use crate::AppState;
use crate::models::{RadarRequest, RadarResponse};
use crate::utils::ApiResult;

/// Run the full eight-panel radar analysis for a technology term.
#[utoipa::path(
    post,
    path = "/api/v1/radar",
    request_body = RadarRequest,
    responses(
        (status = 200, description = "Complete radar dashboard", body = RadarResponse),
        (status = 422, description = "Invalid request")
    ),
    tag = "Radar"
)]
pub async fn analyze_technology(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RadarRequest>,
) -> ApiResult<Json<RadarResponse>> {
    let response = state.radar_service.analyze(request).await?;
    Ok(Json(response))
}
