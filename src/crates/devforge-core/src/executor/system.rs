use super::process::{CommandRunner, CommandSpec, TokioCommandRunner};
use super::{CodeGenerator, ExecutionResult, PlatformExecutor, ResolvedAction};
use crate::action::{SubAction, Task};
use crate::error::ExecutionError;
use crate::platform::PlatformTarget;
use crate::resolver::ResolvedPackage;
use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Knobs of the system executor
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Prefix mutating package commands with `sudo -n` when not root
    pub use_sudo: bool,
    pub command_timeout: Duration,
    /// Base URL of the Git host REST API
    pub github_api_url: String,
    /// Environment variable holding the optional Git host token
    pub github_token_env: String,
    /// Overrides the home directory (SSH keys, shell profile)
    pub home_dir: Option<PathBuf>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            use_sudo: true,
            command_timeout: Duration::from_secs(600),
            github_api_url: "https://api.github.com".to_string(),
            github_token_env: "GITHUB_TOKEN".to_string(),
            home_dir: None,
        }
    }
}

/// Executor that performs actions on the local machine
pub struct SystemExecutor {
    pub(super) platform: PlatformTarget,
    pub(super) runner: Arc<dyn CommandRunner>,
    pub(super) settings: ExecutorSettings,
    pub(super) code_generator: Option<Arc<dyn CodeGenerator>>,
    pub(super) http: reqwest::Client,
}

impl SystemExecutor {
    pub fn new(platform: PlatformTarget, settings: ExecutorSettings) -> Self {
        let runner = Arc::new(TokioCommandRunner::new(settings.command_timeout));
        Self {
            platform,
            runner,
            settings,
            code_generator: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_code_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.code_generator = Some(generator);
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Apply the sudo policy to a mutating command
    pub(super) fn privileged(&self, spec: CommandSpec) -> CommandSpec {
        let needed = self.platform.is_linux()
            && self.platform.package_manager().needs_root()
            && self.settings.use_sudo
            && !running_as_root();
        spec.with_sudo(needed)
    }

    pub(super) fn home(&self) -> Result<PathBuf, ExecutionError> {
        self.settings
            .home_dir
            .clone()
            .or_else(dirs::home_dir)
            .ok_or_else(|| ExecutionError::InvalidArgument("home directory could not be determined".into()))
    }

    pub(super) fn unsupported(&self, operation: &str) -> ExecutionError {
        ExecutionError::PlatformUnsupported {
            operation: operation.to_string(),
            platform: self.platform.to_string(),
        }
    }

    async fn generate_code(&self, action: &ResolvedAction) -> Result<ExecutionResult, ExecutionError> {
        let generator = self
            .code_generator
            .as_ref()
            .ok_or_else(|| ExecutionError::CredentialMissing {
                variable: "OPENAI_API_KEY".to_string(),
            })?;
        let description = action
            .request
            .extra("description")
            .ok_or_else(|| ExecutionError::InvalidArgument("description is required".into()))?;
        let language = action.request.extra("language");

        let code = generator.generate(description, language).await?;
        Ok(ExecutionResult::success("Code generated").with_data(json!({
            "code": code,
            "language": language.unwrap_or("python"),
        })))
    }
}

fn require_package<'a>(action: &'a ResolvedAction) -> Result<&'a ResolvedPackage, ExecutionError> {
    action
        .package
        .as_ref()
        .ok_or_else(|| ExecutionError::InvalidArgument(format!("'{}' needs a resolved package", action.request.task)))
}

#[async_trait]
impl PlatformExecutor for SystemExecutor {
    fn platform(&self) -> PlatformTarget {
        self.platform
    }

    #[instrument(skip(self, action), fields(task = %action.request.task, platform = %self.platform))]
    async fn execute(&self, action: &ResolvedAction) -> Result<ExecutionResult, ExecutionError> {
        let request = &action.request;
        let result = match (request.task, request.sub_action) {
            (Task::Install | Task::Uninstall | Task::Update, _) => {
                self.package_task(request.task, require_package(action)?).await
            }
            (Task::Version, _) => self.version_check(require_package(action)?).await,
            (Task::SystemConfig, Some(SubAction::SystemConfig(sub))) => {
                self.system_config(sub, request).await
            }
            (Task::GitSetup, Some(SubAction::Git(sub))) => self.git(sub, request).await,
            (Task::VscodeExtensionInstall, _) => self.extension(true, request).await,
            (Task::VscodeExtensionUninstall, _) => self.extension(false, request).await,
            (Task::GenerateCode, _) => self.generate_code(action).await,
            (task, _) => Err(ExecutionError::InvalidArgument(format!(
                "'{}' is missing its sub-action",
                task
            ))),
        };

        match &result {
            Ok(r) => info!(status = %r.status, "Action executed"),
            Err(e) => info!(error = %e, code = e.error_code(), "Action failed"),
        }
        result
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status
                .lines()
                .find(|l| l.starts_with("Uid:"))
                .and_then(|l| l.split_whitespace().nth(1).map(|uid| uid == "0"))
        })
        .unwrap_or_else(|| std::env::var("USER").map(|u| u == "root").unwrap_or(false))
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}
