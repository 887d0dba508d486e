//! Service log handler

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;

use crate::api::error::ApiResult;
use crate::api::models::{LogsQuery, LogsResponse};
use crate::api::response;
use crate::state::AppState;

/// Get the tail of the service log
///
/// GET /api/v1/logs?lines=N&since=SEQ
pub async fn get_logs(
    State(state): State<AppState>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let entries = state.log.tail(query.lines, query.since);
    let message = format!("{} log entries", entries.len());
    Ok(response::ok(message, LogsResponse { entries }))
}
