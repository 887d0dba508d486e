//! API response helpers

use axum::{http::StatusCode, response::IntoResponse, Json};
use devforge_core::ResponseEnvelope;
use serde::Serialize;
use serde_json::Value;

/// 200 OK with a success envelope carrying `data`
pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> impl IntoResponse {
    let data = serde_json::to_value(data).unwrap_or(Value::Null);
    envelope(ResponseEnvelope::success(message).with_data(data))
}

/// 200 OK with an envelope produced by the dispatcher.
///
/// The envelope's own `status` carries the outcome; transport status stays 200.
pub fn envelope(envelope: ResponseEnvelope) -> impl IntoResponse {
    (StatusCode::OK, Json(envelope))
}
