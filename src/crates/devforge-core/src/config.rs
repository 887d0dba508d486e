//! Configuration with dual-location support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.devforge/devforge.toml
//! 3. Project-level config: ./.devforge/devforge.toml
//! 4. `DEVFORGE_*` environment variables
//!
//! Later sources override earlier ones key by key.

use crate::error::{CoreError, Result};
use crate::executor::ExecutorSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevforgeConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub sessions: SessionConfig,
    pub executor: ExecutorConfig,
    pub llm: LlmConfig,
    pub github: GithubConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service base URL; derived from `[server]` when unset
    pub server_url: Option<String>,
    /// Start a local service when none answers
    pub auto_start: bool,
    pub request_timeout_secs: u64,
    pub startup_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            auto_start: true,
            request_timeout_secs: 900,
            startup_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub max_sessions: usize,
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: crate::session::DEFAULT_SESSION_TTL.as_secs(),
            max_sessions: crate::session::DEFAULT_MAX_SESSIONS,
            sweep_interval_secs: 30,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub use_sudo: bool,
    pub command_timeout_secs: u64,
    /// Ask the package manager about names missing from the catalog
    pub package_index: bool,
    /// Overrides the detected platform (e.g. "linux-arch")
    pub platform: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            use_sudo: true,
            command_timeout_secs: 600,
            package_index: true,
            platform: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// Model used to parse commands
    pub model: String,
    /// Model used for code generation
    pub code_model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            code_model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    pub token_env: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Entries kept in the service's in-memory log
    pub buffer_size: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

impl DevforgeConfig {
    /// Base URL clients use to reach the service
    pub fn server_url(&self) -> String {
        self.client
            .server_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.server.host, self.server.port))
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            use_sudo: self.executor.use_sudo,
            command_timeout: Duration::from_secs(self.executor.command_timeout_secs),
            github_api_url: self.github.api_url.clone(),
            github_token_env: self.github.token_env.clone(),
            home_dir: None,
        }
    }

    /// Apply `DEVFORGE_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(host) = env::get_env("DEVFORGE_HOST")? {
            self.server.host = host;
        }
        if let Some(port) = env::get_env_parse("DEVFORGE_PORT")? {
            self.server.port = port;
        }
        if let Some(url) = env::get_env("DEVFORGE_SERVER_URL")? {
            self.client.server_url = Some(url);
        }
        if let Some(ttl) = env::get_env_parse("DEVFORGE_SESSION_TTL_SECS")? {
            self.sessions.ttl_secs = ttl;
        }
        if let Some(sudo) = env::get_env_bool("DEVFORGE_USE_SUDO")? {
            self.executor.use_sudo = sudo;
        }
        if let Some(platform) = env::get_env("DEVFORGE_PLATFORM")? {
            self.executor.platform = Some(platform);
        }
        if let Some(model) = env::get_env("DEVFORGE_LLM_MODEL")? {
            self.llm.model = model;
        }
        Ok(())
    }
}

/// Environment variable helpers
pub mod env {
    use super::*;

    /// `Ok(None)` when unset or empty
    pub fn get_env(key: &str) -> Result<Option<String>> {
        match std::env::var(key) {
            Ok(val) if val.trim().is_empty() => Ok(None),
            Ok(val) => Ok(Some(val)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(CoreError::Config(format!(
                "Environment variable {} contains invalid UTF-8",
                key
            ))),
        }
    }

    pub fn get_env_parse<T>(key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match get_env(key)? {
            Some(val) => val
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| CoreError::Config(format!("Failed to parse {}='{}': {}", key, val, e))),
            None => Ok(None),
        }
    }

    /// Accepts true/false, 1/0, yes/no, on/off
    pub fn get_env_bool(key: &str) -> Result<Option<bool>> {
        match get_env(key)? {
            Some(val) => match val.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(CoreError::Config(format!("{} must be a boolean, got '{}'", key, val))),
            },
            None => Ok(None),
        }
    }
}

/// Configuration loader that handles both user and project configs
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|h| h.join(".devforge").join("devforge.toml")),
            project_config_path: std::env::current_dir()
                .ok()
                .map(|d| d.join(".devforge").join("devforge.toml")),
        }
    }

    pub fn with_paths(user: impl Into<PathBuf>, project: impl Into<PathBuf>) -> Self {
        Self {
            user_config_path: Some(user.into()),
            project_config_path: Some(project.into()),
        }
    }

    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    pub fn project_config_path(&self) -> Option<&Path> {
        self.project_config_path.as_deref()
    }

    /// Load all layers, then environment overrides
    pub async fn load(&self) -> Result<DevforgeConfig> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        for path in [&self.user_config_path, &self.project_config_path].into_iter().flatten() {
            match Self::read_layer(path).await? {
                Some(layer) => {
                    debug!(path = %path.display(), "Loaded config layer");
                    merge_values(&mut merged, layer);
                }
                None => debug!(path = %path.display(), "Config layer not present"),
            }
        }

        let mut config: DevforgeConfig = merged.try_into()?;
        config.apply_env()?;
        info!(server = %config.server.bind_address(), "Configuration loaded");
        Ok(config)
    }

    async fn read_layer(path: &Path) -> Result<Option<toml::Value>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CoreError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let value: toml::Value = toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(Some(value))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `overlay` into `base`; tables merge, everything else replaces
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
