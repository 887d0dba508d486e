//! API route definitions

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;

use crate::api::handlers;
use crate::api::middleware::{cors_layer, logging_layer};
use crate::state::AppState;

/// Header carrying the caller identity used to key selection sessions
pub const CALLER_HEADER: &str = "x-devforge-caller";

/// Build the complete API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Actions
        .route("/api/v1/actions", post(handlers::dispatch_action))
        // Selection sessions
        .route(
            "/api/v1/sessions/:id",
            get(handlers::get_session).delete(handlers::cancel_session),
        )
        .route("/api/v1/sessions/:id/select", post(handlers::select_candidate))
        // Service
        .route("/api/v1/logs", get(handlers::get_logs))
        .route("/api/v1/system/info", get(handlers::system_info))
        // JSON-RPC
        .route("/mcp", post(handlers::handle_rpc))
        .route("/mcp/", post(handlers::handle_rpc))
        .layer(ServiceBuilder::new().layer(logging_layer()).layer(cors_layer()))
        .with_state(state)
}
