//! Request and response bodies

use crate::log_buffer::LogEntry;
use devforge_core::{ResolvedPackage, SessionState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/v1/sessions/:id/select`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRequest {
    pub index: usize,
}

/// Query of `GET /api/v1/logs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_lines")]
    pub lines: usize,
    /// Only entries with a larger sequence number
    pub since: Option<u64>,
}

fn default_lines() -> usize {
    50
}

impl Default for LogsQuery {
    fn default() -> Self {
        Self {
            lines: default_lines(),
            since: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfoResponse {
    pub platform: String,
    pub os: String,
    pub arch: String,
    pub version: String,
    pub cwd: Option<String>,
    pub user: Option<String>,
    pub uptime_secs: u64,
    pub open_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub state: SessionState,
    pub tool_name: Option<String>,
    pub task: String,
    pub candidates: Vec<ResolvedPackage>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// JSON-RPC error codes
pub mod rpc_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}
