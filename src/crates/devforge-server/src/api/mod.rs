//! HTTP API
//!
//! Every action endpoint answers with a [`devforge_core::ResponseEnvelope`].
//! Malformed requests are answered with an `error` envelope too.
//!
//! - `POST /api/v1/actions` - dispatch an action request
//! - `GET|DELETE /api/v1/sessions/:id`, `POST /api/v1/sessions/:id/select`
//! - `GET /api/v1/logs` - recent service log
//! - `GET /api/v1/system/info`, `GET /health`
//! - `POST /mcp/` - JSON-RPC 2.0 endpoint for protocol clients

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::{create_router, CALLER_HEADER};
