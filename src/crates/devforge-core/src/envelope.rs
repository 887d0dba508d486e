//! Response envelope and normalization
//!
//! Every dispatcher path ends in [`normalize`], which maps one [`Outcome`]
//! to the single `{status, message, data}` shape callers see. The match is
//! exhaustive on purpose: a new outcome kind does not compile until it has
//! an envelope mapping.

use crate::error::{ExecutionError, SelectionError, ValidationError};
use crate::executor::ExecutionResult;
use crate::platform::PlatformTarget;
use crate::resolver::ResolvedPackage;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Envelope status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
    NotFound,
    Ambiguous,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
            Status::NotFound => "not_found",
            Status::Ambiguous => "ambiguous",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only response shape returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseEnvelope {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Session id carried by an ambiguous envelope
    pub fn session_id(&self) -> Option<&str> {
        self.data.as_ref()?.get("session_id")?.as_str()
    }

    /// Candidate list carried by an ambiguous envelope
    pub fn candidates(&self) -> Vec<ResolvedPackage> {
        self.data
            .as_ref()
            .and_then(|d| d.get("candidates"))
            .and_then(|c| serde_json::from_value(c.clone()).ok())
            .unwrap_or_default()
    }
}

/// Terminal outcome of one dispatcher pass
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The executor ran and reported a result
    Executed(ExecutionResult),
    /// The request was rejected before resolution
    Validation(ValidationError),
    /// A selection could not be applied
    Selection(SelectionError),
    /// The name resolved to nothing on this platform
    NotFound {
        tool_name: String,
        platform: PlatformTarget,
    },
    /// Several candidates; the caller must select one
    Ambiguous {
        session_id: SessionId,
        tool_name: String,
        candidates: Vec<ResolvedPackage>,
    },
    /// The executor failed
    Execution(ExecutionError),
    /// The caller cancelled a pending selection
    Cancelled { session_id: SessionId },
}

impl From<ValidationError> for Outcome {
    fn from(err: ValidationError) -> Self {
        Outcome::Validation(err)
    }
}

impl From<SelectionError> for Outcome {
    fn from(err: SelectionError) -> Self {
        Outcome::Selection(err)
    }
}

impl From<ExecutionError> for Outcome {
    fn from(err: ExecutionError) -> Self {
        Outcome::Execution(err)
    }
}

impl From<ExecutionResult> for Outcome {
    fn from(result: ExecutionResult) -> Self {
        Outcome::Executed(result)
    }
}

/// Map an outcome to its envelope
pub fn normalize(outcome: Outcome) -> ResponseEnvelope {
    match outcome {
        Outcome::Executed(result) => {
            let message = if result.message.trim().is_empty() {
                default_message(result.status).to_string()
            } else {
                result.message
            };
            ResponseEnvelope {
                status: result.status,
                message,
                data: result.data,
            }
        }
        Outcome::Validation(err) => ResponseEnvelope::error(format!("{}. {}", err, err.hint()))
            .with_data(json!({ "code": err.error_code() })),
        Outcome::Selection(err) => ResponseEnvelope::error(format!("{}. {}", err, err.hint()))
            .with_data(json!({ "code": err.error_code() })),
        Outcome::NotFound { tool_name, platform } => ResponseEnvelope {
            status: Status::NotFound,
            message: format!("No package named '{}' is available for {}", tool_name, platform),
            data: Some(json!({
                "reason": "unknown_tool",
                "tool_name": tool_name,
                "platform": platform,
            })),
        },
        Outcome::Ambiguous {
            session_id,
            tool_name,
            candidates,
        } => ResponseEnvelope {
            status: Status::Ambiguous,
            message: format!(
                "'{}' matches {} packages. Select one by index to continue",
                tool_name,
                candidates.len()
            ),
            data: Some(json!({
                "session_id": session_id,
                "tool_name": tool_name,
                "candidates": candidates,
            })),
        },
        Outcome::Execution(err) => ResponseEnvelope::error(format!("{}. {}", err, err.hint()))
            .with_data(json!({
                "code": err.error_code(),
                "retryable": err.is_retryable(),
            })),
        Outcome::Cancelled { session_id } => ResponseEnvelope::success("Selection cancelled")
            .with_data(json!({ "session_id": session_id, "state": "cancelled" })),
    }
}

fn default_message(status: Status) -> &'static str {
    match status {
        Status::Success => "Action completed",
        Status::Error => "Action failed",
        Status::NotFound => "Requested item was not found",
        Status::Ambiguous => "Multiple candidates match the request",
    }
}
