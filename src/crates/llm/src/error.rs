//! Error types for the LLM client, parser and code generator.

use devforge_core::ExecutionError;
use thiserror::Error;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Message used when the OpenAI key is absent.
pub const MISSING_OPENAI_KEY: &str = "OpenAI API key not set. Please set OPENAI_API_KEY environment variable.";

/// Errors that can occur when talking to an LLM provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize/deserialize data.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// API authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// API key not found in environment.
    #[error("{0}")]
    ApiKeyNotFound(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid response from provider.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The reply parsed but does not describe a known command.
    #[error("Unrecognized command: {0}")]
    UnrecognizedCommand(String),

    /// Request exceeded the client timeout, in seconds.
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// General provider error.
    #[error("Provider error: {0}")]
    ProviderError(String),
}

impl LlmError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::HttpError(_) | LlmError::Timeout(_) | LlmError::RateLimitExceeded(_)
        )
    }

    /// Check if this error is due to authentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            LlmError::AuthenticationError(_) | LlmError::ApiKeyNotFound(_)
        )
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

impl From<LlmError> for ExecutionError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ApiKeyNotFound(_) | LlmError::AuthenticationError(_) => ExecutionError::CredentialMissing {
                variable: "OPENAI_API_KEY".to_string(),
            },
            LlmError::Timeout(secs) => ExecutionError::Timeout {
                command: "code generation".to_string(),
                secs,
            },
            LlmError::HttpError(e) => ExecutionError::NetworkUnavailable(e.to_string()),
            LlmError::RateLimitExceeded(detail) => ExecutionError::NetworkUnavailable(format!("rate limited: {}", detail)),
            other => ExecutionError::InvalidArgument(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_message() {
        let err = LlmError::ApiKeyNotFound(MISSING_OPENAI_KEY.to_string());
        assert_eq!(err.to_string(), MISSING_OPENAI_KEY);
        assert!(err.is_auth_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_auth_maps_to_credential_missing() {
        let err: ExecutionError = LlmError::AuthenticationError("bad key".into()).into();
        assert_eq!(err.error_code(), "CREDENTIAL_MISSING");
    }

    #[test]
    fn test_rate_limit_is_retryable_network_error() {
        let llm = LlmError::RateLimitExceeded("slow down".into());
        assert!(llm.is_retryable());
        let err: ExecutionError = llm.into();
        assert!(err.is_retryable());
    }
}
