//! JSON-RPC 2.0 endpoint
//!
//! Protocol clients call the same operations as the REST routes through a
//! single `POST /mcp/`. Results are the JSON form of the response envelope,
//! except `info://server` and `get_logs` which return their payload directly.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use devforge_core::{ActionRequest, SessionId};
use serde::Deserialize;
use serde_json::{json, Value};

use super::system::collect_info;
use super::{caller_id, record_outcome};
use crate::api::handlers::actions::describe;
use crate::api::models::{rpc_codes, JsonRpcRequest, JsonRpcResponse, LogsQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct SelectParams {
    session_id: String,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct CancelParams {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct GenerateParams {
    description: String,
    #[serde(default)]
    language: Option<String>,
}

/// POST /mcp/
pub async fn handle_rpc(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Json<JsonRpcResponse> {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return Json(JsonRpcResponse::error(
                Value::Null,
                rpc_codes::PARSE_ERROR,
                format!("Parse error: {}", e),
            ))
        }
    };

    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(request) => request,
        Err(e) => {
            return Json(JsonRpcResponse::error(
                id,
                rpc_codes::INVALID_REQUEST,
                format!("Invalid request: {}", e),
            ))
        }
    };

    let caller = caller_id(&headers);
    tracing::debug!(method = %request.method, caller = %caller, "JSON-RPC call");

    let response = match call(&state, &caller, &request.method, request.params).await {
        Ok(result) => JsonRpcResponse::result(request.id, result),
        Err((code, message)) => JsonRpcResponse::error(request.id, code, message),
    };
    Json(response)
}

type RpcResult = Result<Value, (i64, String)>;

async fn call(state: &AppState, caller: &str, method: &str, params: Value) -> RpcResult {
    match method {
        "tool_action_wrapper" => {
            let request: ActionRequest = params_as(params)?;
            dispatch(state, caller, request).await
        }
        "generate_code" => {
            let p: GenerateParams = params_as(params)?;
            let mut request = ActionRequest::new("generate_code").with_extra("description", p.description);
            if let Some(language) = p.language {
                request = request.with_extra("language", language);
            }
            dispatch(state, caller, request).await
        }
        "select_candidate" => {
            let p: SelectParams = params_as(params)?;
            let envelope = state
                .dispatcher
                .dispatch_selection(&SessionId::from(p.session_id.as_str()), p.index)
                .await;
            record_outcome(
                &state.log,
                &format!("select {} of session {}", p.index, p.session_id),
                &envelope,
            );
            to_value(&envelope)
        }
        "cancel_selection" => {
            let p: CancelParams = params_as(params)?;
            let envelope = state
                .dispatcher
                .cancel_selection(&SessionId::from(p.session_id.as_str()));
            record_outcome(&state.log, &format!("cancel session {}", p.session_id), &envelope);
            to_value(&envelope)
        }
        "info://server" => to_value(&collect_info(state)),
        "get_logs" => {
            let query: LogsQuery = if params.is_null() {
                LogsQuery::default()
            } else {
                params_as(params)?
            };
            let entries = state.log.tail(query.lines, query.since);
            Ok(json!({ "entries": entries }))
        }
        other => Err((rpc_codes::METHOD_NOT_FOUND, format!("Method not found: {}", other))),
    }
}

async fn dispatch(state: &AppState, caller: &str, request: ActionRequest) -> RpcResult {
    let what = describe(caller, &request);
    state.log.info(format!("Received {}", what));
    let envelope = state.dispatcher.dispatch(caller, request).await;
    record_outcome(&state.log, &what, &envelope);
    to_value(&envelope)
}

fn params_as<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, (i64, String)> {
    serde_json::from_value(params).map_err(invalid_params)
}

fn invalid_params(e: serde_json::Error) -> (i64, String) {
    (rpc_codes::INVALID_PARAMS, format!("Invalid params: {}", e))
}

fn to_value<T: serde::Serialize>(value: &T) -> RpcResult {
    serde_json::to_value(value).map_err(|e| (rpc_codes::INTERNAL_ERROR, e.to_string()))
}
