//! Client configuration for OpenAI-compatible providers.

use crate::error::{LlmError, Result, MISSING_OPENAI_KEY};
use devforge_core::config::LlmConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a remote, OpenAI-compatible provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API, e.g. "https://api.openai.com/v1".
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Organization ID (optional).
    pub organization: Option<String>,
}

impl std::fmt::Debug for RemoteLlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLlmConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("organization", &self.organization)
            .finish()
    }
}

impl RemoteLlmConfig {
    /// Create a new remote LLM configuration.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout: default_timeout(),
            organization: None,
        }
    }

    /// Create configuration from environment variable.
    ///
    /// A missing or blank variable is reported before any request is made.
    pub fn from_env(env_var: &str, base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| LlmError::ApiKeyNotFound(missing_key_message(env_var)))?;

        Ok(Self::new(api_key, base_url, model))
    }

    /// Build from the `[llm]` section of the DevForge config, using `model`.
    pub fn from_settings(settings: &LlmConfig, model: &str) -> Result<Self> {
        Ok(Self::from_env(&settings.api_key_env, &settings.base_url, model)?
            .with_timeout(Duration::from_secs(settings.timeout_secs)))
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the organization ID.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }
}

fn missing_key_message(env_var: &str) -> String {
    if env_var == "OPENAI_API_KEY" {
        MISSING_OPENAI_KEY.to_string()
    } else {
        format!("API key not set. Please set {} environment variable.", env_var)
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_config_builder() {
        let config = RemoteLlmConfig::new("test-key", "https://api.openai.com/v1/", "gpt-4o-mini")
            .with_timeout(Duration::from_secs(120))
            .with_organization("org-123");

        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.organization, Some("org-123".to_string()));
    }

    #[test]
    fn test_debug_hides_key() {
        let config = RemoteLlmConfig::new("sk-secret", "https://api.openai.com/v1", "gpt-4o");
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }

    #[test]
    fn test_missing_env_var() {
        let err = RemoteLlmConfig::from_env("DEVFORGE_TEST_UNSET_KEY_1F4A", "http://x", "m").unwrap_err();
        assert!(matches!(err, LlmError::ApiKeyNotFound(_)));
        assert!(err.to_string().contains("DEVFORGE_TEST_UNSET_KEY_1F4A"));
    }
}
