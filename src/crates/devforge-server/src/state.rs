//! Shared application state and its construction from config

use crate::log_buffer::ServerLog;
use devforge_core::executor::{SystemPackageIndex, TokioCommandRunner};
use devforge_core::{
    CodeGenerator, DevforgeConfig, Dispatcher, NameResolver, PlatformExecutor, PlatformTarget, SessionStore,
    SystemExecutor,
};
use llm::LlmCodeGenerator;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Configuration error: {0}")]
    Config(#[from] devforge_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub log: Arc<ServerLog>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, log: Arc<ServerLog>) -> Self {
        Self {
            dispatcher,
            log,
            started_at: Instant::now(),
        }
    }

    /// Wire the system executor, resolver and session store from config
    pub fn from_config(config: &DevforgeConfig) -> Result<Self, ServerError> {
        let platform = match &config.executor.platform {
            Some(name) => PlatformTarget::from_str(name).map_err(ServerError::UnsupportedPlatform)?,
            None => PlatformTarget::detect()
                .ok_or_else(|| ServerError::UnsupportedPlatform(std::env::consts::OS.to_string()))?,
        };

        let settings = config.executor_settings();
        let runner = Arc::new(TokioCommandRunner::new(settings.command_timeout));
        let mut executor = SystemExecutor::new(platform, settings).with_runner(runner.clone());
        match LlmCodeGenerator::from_settings(&config.llm) {
            Ok(generator) => {
                let generator: Arc<dyn CodeGenerator> = Arc::new(generator);
                executor = executor.with_code_generator(generator);
            }
            Err(e) => warn!(error = %e, "Code generation disabled"),
        }
        let executor: Arc<dyn PlatformExecutor> = Arc::new(executor);

        let mut resolver = NameResolver::new();
        if config.executor.package_index {
            resolver = resolver.with_index(Arc::new(SystemPackageIndex::new(runner)));
        }

        let sessions = Arc::new(SessionStore::new(config.sessions.ttl(), config.sessions.max_sessions));
        let dispatcher = Arc::new(Dispatcher::new(executor, sessions).with_resolver(resolver));

        info!(%platform, ttl_secs = config.sessions.ttl_secs, "Dispatcher ready");
        Ok(Self::new(dispatcher, Arc::new(ServerLog::new(config.logging.buffer_size))))
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
