//! Error types for the DevForge core
//!
//! Each stage of the dispatch pipeline has its own error enum so callers can
//! tell a rejected request from a failed side effect:
//!
//! - [`ValidationError`] - the request never reached resolution
//! - [`SelectionError`] - an ambiguity session could not accept a selection
//! - [`ExecutionError`] - the platform executor failed to perform the action
//!
//! [`CoreError`] covers ambient failures (configuration, I/O) outside the
//! dispatch pipeline.

use thiserror::Error;

/// Result type alias for ambient core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Ambient error type for configuration and I/O
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("Failed to parse config: {}", err))
    }
}

/// A request failed schema validation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Task is missing or outside the closed task set
    #[error("Unknown task '{0}'")]
    UnknownTask(String),

    /// `system_config`/`git_setup` without a recognised sub-action
    #[error("Task '{task}' requires an 'action' (one of: {})", .allowed.join(", "))]
    MissingSubAction {
        task: String,
        provided: Option<String>,
        allowed: &'static [&'static str],
    },

    /// A package or extension task without a tool name
    #[error("Task '{task}' requires a non-empty 'tool_name'")]
    MissingToolName { task: String },

    /// A task-specific field is absent
    #[error("Task '{task}' requires the '{field}' field")]
    MissingField { task: String, field: &'static str },
}

impl ValidationError {
    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownTask(_) => "UNKNOWN_TASK",
            Self::MissingSubAction { .. } => "MISSING_SUB_ACTION",
            Self::MissingToolName { .. } => "MISSING_TOOL_NAME",
            Self::MissingField { .. } => "MISSING_FIELD",
        }
    }

    /// What the caller can do about it
    pub fn hint(&self) -> String {
        match self {
            Self::UnknownTask(_) => format!(
                "Use one of: {}",
                crate::action::Task::ALL
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::MissingSubAction { provided, .. } => match provided {
                Some(p) => format!("'{}' is not a supported action for this task", p),
                None => "Add an 'action' field to the request".to_string(),
            },
            Self::MissingToolName { .. } => "Name the tool, e.g. 'install docker'".to_string(),
            Self::MissingField { field, .. } => format!("Add a '{}' field to the request", field),
        }
    }
}

/// A selection could not be applied to an ambiguity session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// Index outside `[0, len)`; the session stays open
    #[error("Selection {index} is out of range (choose 0 to {})", .len.saturating_sub(1))]
    OutOfRange { index: usize, len: usize },

    /// Session expired or was cancelled before a selection arrived
    #[error("Selection session {session_id} has expired")]
    SessionExpired { session_id: String },

    /// A selection was already applied to this session
    #[error("Selection session {session_id} was already resolved")]
    SessionAlreadyResolved { session_id: String },

    /// No session with this id exists
    #[error("Selection session {session_id} not found")]
    SessionNotFound { session_id: String },
}

impl SelectionError {
    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::SessionExpired { .. } => "SESSION_EXPIRED",
            Self::SessionAlreadyResolved { .. } => "SESSION_ALREADY_RESOLVED",
            Self::SessionNotFound { .. } => "SESSION_NOT_FOUND",
        }
    }

    /// What the caller can do about it
    pub fn hint(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "Retry with an index from the candidate list",
            Self::SessionExpired { .. } | Self::SessionNotFound { .. } => {
                "Re-run the original command to get a fresh candidate list"
            }
            Self::SessionAlreadyResolved { .. } => "No action needed, the selection was applied",
        }
    }
}

/// The platform executor failed to perform an action
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// The task or sub-action has no implementation on this platform
    #[error("'{operation}' is not supported on {platform}")]
    PlatformUnsupported { operation: String, platform: String },

    /// A required program (package manager, git, code) is not on PATH
    #[error("Required program '{program}' was not found")]
    ProgramNotFound { program: String },

    /// A subprocess exited unsuccessfully
    #[error("Command '{command}' failed{}: {stderr}", .code.map(|c| format!(" with exit code {}", c)).unwrap_or_default())]
    SubprocessFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The OS refused the operation
    #[error("Permission denied running '{command}': {detail}")]
    PermissionDenied { command: String, detail: String },

    /// Package index or remote host was unreachable
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// A field carried a value the executor cannot use
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A credential needed for this action is not set
    #[error("Credential not set: {variable}")]
    CredentialMissing { variable: String },

    /// A subprocess exceeded its time budget
    #[error("Command '{command}' timed out after {secs}s")]
    Timeout { command: String, secs: u64 },
}

impl ExecutionError {
    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::PlatformUnsupported { .. } => "PLATFORM_UNSUPPORTED",
            Self::ProgramNotFound { .. } => "PROGRAM_NOT_FOUND",
            Self::SubprocessFailed { .. } => "SUBPROCESS_FAILED",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::NetworkUnavailable(_) => "NETWORK_UNAVAILABLE",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::CredentialMissing { .. } => "CREDENTIAL_MISSING",
            Self::Timeout { .. } => "TIMEOUT",
        }
    }

    /// Whether an explicit retry by the caller may succeed.
    /// The dispatcher never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_) | Self::Timeout { .. })
    }

    /// What the caller can do about it
    pub fn hint(&self) -> String {
        match self {
            Self::PlatformUnsupported { .. } => {
                "Perform this step manually on this platform".to_string()
            }
            Self::ProgramNotFound { program } => format!("Install '{}' and retry", program),
            Self::SubprocessFailed { .. } => "Check the command output above and retry".to_string(),
            Self::PermissionDenied { .. } => {
                "Re-run with administrator privileges or configure passwordless sudo".to_string()
            }
            Self::NetworkUnavailable(_) => "Check your network connection and retry".to_string(),
            Self::InvalidArgument(_) => "Correct the request and retry".to_string(),
            Self::CredentialMissing { variable } => {
                format!("Set the {} environment variable and retry", variable)
            }
            Self::Timeout { .. } => "Retry, or raise executor.command_timeout_secs".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_not_empty() {
        let errors: Vec<String> = vec![
            ValidationError::UnknownTask("fly".into()).to_string(),
            ValidationError::MissingToolName { task: "install".into() }.to_string(),
            SelectionError::OutOfRange { index: 5, len: 2 }.to_string(),
            ExecutionError::NetworkUnavailable("apt".into()).to_string(),
        ];
        assert!(errors.iter().all(|m| !m.is_empty()));
    }

    #[test]
    fn test_out_of_range_message_names_bounds() {
        let err = SelectionError::OutOfRange { index: 7, len: 3 };
        assert_eq!(err.to_string(), "Selection 7 is out of range (choose 0 to 2)");
    }

    #[test]
    fn test_subprocess_failed_message_with_code() {
        let err = ExecutionError::SubprocessFailed {
            command: "apt-get install foo".into(),
            code: Some(100),
            stderr: "E: Unable to locate package foo".into(),
        };
        assert!(err.to_string().contains("exit code 100"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_credential_hint_names_variable() {
        let err = ExecutionError::CredentialMissing {
            variable: "OPENAI_API_KEY".into(),
        };
        assert!(err.hint().contains("OPENAI_API_KEY"));
        assert_eq!(err.error_code(), "CREDENTIAL_MISSING");
    }
}
