//! System information endpoint handler

use axum::extract::State;
use axum::response::IntoResponse;

use crate::api::models::SystemInfoResponse;
use crate::api::response;
use crate::state::AppState;

/// Get host information
///
/// GET /api/v1/system/info
pub async fn system_info(State(state): State<AppState>) -> impl IntoResponse {
    let info = collect_info(&state);
    response::ok(format!("DevForge on {}", info.platform), info)
}

pub(crate) fn collect_info(state: &AppState) -> SystemInfoResponse {
    SystemInfoResponse {
        platform: state.dispatcher.platform().to_string(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        version: crate::version::VERSION.to_string(),
        cwd: std::env::current_dir()
            .ok()
            .map(|p| p.display().to_string()),
        user: std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok(),
        uptime_secs: state.uptime().as_secs(),
        open_sessions: state.dispatcher.sessions().open_count(),
    }
}
