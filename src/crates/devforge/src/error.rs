//! CLI errors and process exit codes

use devforge_core::{CoreError, Status};
use llm::LlmError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// A required secret is not configured
    #[error("{0}")]
    MissingCredential(String),

    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),

    #[error("DevForge service is not reachable at {url}: {reason}")]
    ServiceUnavailable { url: String, reason: String },

    #[error("DevForge service at {url} did not become ready within {secs}s")]
    StartupTimeout { url: String, secs: u64 },

    #[error("Service stopped with an error: {0}")]
    Serve(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response from service: {0}")]
    Protocol(String),

    #[error("Could not understand the command: {0}")]
    Parse(LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LlmError> for CliError {
    fn from(err: LlmError) -> Self {
        if err.is_auth_error() {
            CliError::MissingCredential(err.to_string())
        } else {
            CliError::Parse(err)
        }
    }
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::MissingCredential(_) | CliError::Config(_) => ExitCode::Config,
            _ => ExitCode::Error,
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CliError::MissingCredential(_) => Some("Export the key in your shell, e.g. `export OPENAI_API_KEY=sk-...`"),
            CliError::ServiceUnavailable { .. } => Some("Start the service with `devforge serve` or pass --server"),
            CliError::StartupTimeout { .. } => Some("Check `devforge serve` output for startup errors"),
            CliError::Parse(_) => Some("Rephrase the request, e.g. \"install docker\" or \"check port 8080\""),
            _ => None,
        }
    }
}

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    NotFound = 2,
    /// Ambiguous result left without a selection
    Unresolved = 3,
    /// Configuration or credential problem
    Config = 4,
}

impl ExitCode {
    /// Exit code for a final envelope status
    pub fn for_status(status: Status) -> Self {
        match status {
            Status::Success => ExitCode::Success,
            Status::Error => ExitCode::Error,
            Status::NotFound => ExitCode::NotFound,
            Status::Ambiguous => ExitCode::Unresolved,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}
