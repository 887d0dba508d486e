//! Selection session handlers

use super::record_outcome;
use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{SelectRequest, SessionView};
use crate::api::response;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use devforge_core::{ResponseEnvelope, SessionId};

/// GET /api/v1/sessions/:id
pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let session = state
        .dispatcher
        .sessions()
        .get(&SessionId::from(id.as_str()))
        .ok_or_else(|| ApiError::NotFound(format!("session {}", id)))?;

    let view = SessionView {
        session_id: session.id.to_string(),
        state: session.state,
        tool_name: session.originating_request.tool_name.clone(),
        task: session.originating_request.task.to_string(),
        candidates: session.candidates,
        created_at: session.created_at,
    };
    Ok(response::ok("Selection session", view))
}

/// POST /api/v1/sessions/:id/select
pub async fn select_candidate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SelectRequest>, JsonRejection>,
) -> ApiResult<Json<ResponseEnvelope>> {
    let Json(body) = payload?;
    let what = format!("select {} of session {}", body.index, id);
    state.log.info(format!("Received {}", what));

    let envelope = state
        .dispatcher
        .dispatch_selection(&SessionId::from(id), body.index)
        .await;
    record_outcome(&state.log, &what, &envelope);
    Ok(Json(envelope))
}

/// DELETE /api/v1/sessions/:id
pub async fn cancel_session(State(state): State<AppState>, Path(id): Path<String>) -> Json<ResponseEnvelope> {
    let envelope = state.dispatcher.cancel_selection(&SessionId::from(id.as_str()));
    record_outcome(&state.log, &format!("cancel session {}", id), &envelope);
    Json(envelope)
}
