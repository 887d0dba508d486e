//! Health check endpoint handler

use axum::Json;

use crate::api::models::HealthResponse;
use crate::version::VERSION;

/// Handler for GET /health
///
/// Polled by the CLI after auto-starting the service.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
    })
}
