//! Action dispatch handler

use super::{caller_id, record_outcome};
use crate::api::error::ApiResult;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use devforge_core::{ActionRequest, ResponseEnvelope};

/// POST /api/v1/actions
pub async fn dispatch_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> ApiResult<Json<ResponseEnvelope>> {
    let Json(request) = payload?;
    let caller = caller_id(&headers);
    let what = describe(&caller, &request);
    state.log.info(format!("Received {}", what));

    let envelope = state.dispatcher.dispatch(&caller, request).await;
    record_outcome(&state.log, &what, &envelope);
    Ok(Json(envelope))
}

pub(crate) fn describe(caller: &str, request: &ActionRequest) -> String {
    let mut line = format!("[{}] {}", caller, request.task);
    if let Some(action) = &request.action {
        line.push_str(&format!(" {}", action));
    }
    if let Some(tool) = &request.tool_name {
        line.push_str(&format!(" {}", tool));
    }
    if let Some(version) = &request.version {
        line.push_str(&format!("@{}", version));
    }
    line
}
