//! API error types and HTTP response conversion
//!
//! Transport-level failures such as malformed JSON are rendered as
//! `error` envelopes, the same shape the dispatcher returns.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use devforge_core::ResponseEnvelope;
use serde_json::json;
use thiserror::Error;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request data
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_envelope(&self) -> ResponseEnvelope {
        ResponseEnvelope::error(self.to_string()).with_data(json!({ "code": self.code() }))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "API error: {}", self);
        } else {
            tracing::debug!(code = self.code(), "API error: {}", self);
        }
        (status, Json(self.to_envelope())).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devforge_core::Status;

    #[test]
    fn test_bad_request_envelope() {
        let err = ApiError::BadRequest("expected value at line 1".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let envelope = err.to_envelope();
        assert_eq!(envelope.status, Status::Error);
        assert_eq!(envelope.data.unwrap()["code"], "BAD_REQUEST");
    }

    #[test]
    fn test_internal_error() {
        let err = ApiError::InternalError("boom".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
