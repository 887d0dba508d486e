//! API request handlers

pub mod actions;
pub mod health;
pub mod logs;
pub mod mcp;
pub mod sessions;
pub mod system;

pub use actions::dispatch_action;
pub use health::health;
pub use logs::get_logs;
pub use mcp::handle_rpc;
pub use sessions::{cancel_session, get_session, select_candidate};
pub use system::system_info;

use crate::api::routes::CALLER_HEADER;
use crate::log_buffer::ServerLog;
use axum::http::HeaderMap;
use devforge_core::{ResponseEnvelope, Status};

/// Default caller identity when the header is absent
pub const ANONYMOUS_CALLER: &str = "anonymous";

/// Caller identity from the `x-devforge-caller` header
pub fn caller_id(headers: &HeaderMap) -> String {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_CALLER)
        .to_string()
}

/// Append the outcome of a request to the service log
pub(crate) fn record_outcome(log: &ServerLog, what: &str, envelope: &ResponseEnvelope) {
    let line = format!("{} -> {}: {}", what, envelope.status, envelope.message);
    match envelope.status {
        Status::Success | Status::Ambiguous => log.info(line),
        Status::NotFound => log.warn(line),
        Status::Error => log.error(line),
    }
}
