//! Health and metadata endpoints.

use axum::{Json, extract::State};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;

use crate::AppState;

fn store_status(path: &str) -> Value {
    let file = Path::new(path);
    let size_mb = file
        .metadata()
        .map(|m| (m.len() as f64 / 1_048_576.0 * 10.0).round() / 10.0)
        .unwrap_or(0.0);
    json!({
        "available": file.exists(),
        "path": path,
        "size_mb": size_mb,
    })
}

fn api_status(value: &str, public: bool) -> &'static str {
    if !value.is_empty() {
        "configured"
    } else if public {
        "public_access"
    } else {
        "not_configured"
    }
}

/// Service health: liveness, store presence, API configuration.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health with data source status")),
    tag = "Data"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "data_sources": {
            "patents_db": store_status(&config.data.patents_db_path),
            "cordis_db": store_status(&config.data.cordis_db_path),
            "epo_api": api_status(&config.apis.epo_ops_consumer_key, false),
            "cordis_api": api_status(&config.apis.cordis_api_key, false),
            "openaire_api": api_status(&config.apis.openaire_access_token, true),
            "semantic_scholar_api": api_status(&config.apis.semantic_scholar_api_key, true),
            "gleif_api": "public_access",
        }
    }))
}

/// Availability flags for the data sources.
#[utoipa::path(
    get,
    path = "/api/v1/data/metadata",
    responses((status = 200, description = "Data source availability flags")),
    tag = "Data"
)]
pub async fn data_metadata(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "patents_db_available": config.data.patents_db_available(),
        "cordis_db_available": config.data.cordis_db_available(),
        "epo_api_configured": !config.apis.epo_ops_consumer_key.is_empty(),
        "cordis_api_configured": !config.apis.cordis_api_key.is_empty(),
        "openaire_configured": !config.apis.openaire_access_token.is_empty(),
        "semantic_scholar_configured": !config.apis.semantic_scholar_api_key.is_empty(),
        "gleif_available": true,
    }))
}
