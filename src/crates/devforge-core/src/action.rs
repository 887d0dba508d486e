//! Action schema
//!
//! [`ActionRequest`] is the untrusted wire shape produced by the natural
//! language parser or a direct protocol call. It only becomes actionable
//! after [`crate::validator::validate`] turns it into a [`ValidatedRequest`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Closed set of task kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Install,
    Uninstall,
    #[serde(alias = "upgrade")]
    Update,
    Version,
    SystemConfig,
    GitSetup,
    VscodeExtensionInstall,
    VscodeExtensionUninstall,
    GenerateCode,
}

impl Task {
    pub const ALL: [Task; 9] = [
        Task::Install,
        Task::Uninstall,
        Task::Update,
        Task::Version,
        Task::SystemConfig,
        Task::GitSetup,
        Task::VscodeExtensionInstall,
        Task::VscodeExtensionUninstall,
        Task::GenerateCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Install => "install",
            Task::Uninstall => "uninstall",
            Task::Update => "update",
            Task::Version => "version",
            Task::SystemConfig => "system_config",
            Task::GitSetup => "git_setup",
            Task::VscodeExtensionInstall => "vscode_extension_install",
            Task::VscodeExtensionUninstall => "vscode_extension_uninstall",
            Task::GenerateCode => "generate_code",
        }
    }

    /// Tasks whose `tool_name` goes through the name resolver
    pub fn resolves_package(&self) -> bool {
        matches!(
            self,
            Task::Install | Task::Uninstall | Task::Update | Task::Version
        )
    }

    /// Tasks that cannot run without a `tool_name`
    pub fn requires_tool_name(&self) -> bool {
        self.resolves_package()
            || matches!(
                self,
                Task::VscodeExtensionInstall | Task::VscodeExtensionUninstall
            )
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        if normalized == "upgrade" {
            return Ok(Task::Update);
        }
        Task::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or(())
    }
}

/// Sub-actions of `system_config`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemConfigAction {
    Check,
    Set,
    RemoveEnv,
    ListEnv,
    IsPortOpen,
    IsServiceRunning,
}

impl SystemConfigAction {
    pub const NAMES: &'static [&'static str] = &[
        "check",
        "set",
        "remove_env",
        "list_env",
        "is_port_open",
        "is_service_running",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Set => "set",
            Self::RemoveEnv => "remove_env",
            Self::ListEnv => "list_env",
            Self::IsPortOpen => "is_port_open",
            Self::IsServiceRunning => "is_service_running",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "check" => Some(Self::Check),
            "set" => Some(Self::Set),
            "remove_env" => Some(Self::RemoveEnv),
            "list_env" => Some(Self::ListEnv),
            "is_port_open" => Some(Self::IsPortOpen),
            "is_service_running" => Some(Self::IsServiceRunning),
            _ => None,
        }
    }
}

/// Sub-actions of `git_setup`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitAction {
    GenerateSshKey,
    GetPublicKey,
    CheckSsh,
    Clone,
    AddSshKey,
}

impl GitAction {
    pub const NAMES: &'static [&'static str] = &[
        "generate_ssh_key",
        "get_public_key",
        "check_ssh",
        "clone",
        "add_ssh_key",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateSshKey => "generate_ssh_key",
            Self::GetPublicKey => "get_public_key",
            Self::CheckSsh => "check_ssh",
            Self::Clone => "clone",
            Self::AddSshKey => "add_ssh_key",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generate_ssh_key" => Some(Self::GenerateSshKey),
            "get_public_key" => Some(Self::GetPublicKey),
            "check_ssh" => Some(Self::CheckSsh),
            "clone" => Some(Self::Clone),
            "add_ssh_key" => Some(Self::AddSshKey),
            _ => None,
        }
    }
}

/// Validated sub-action for tasks that carry one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubAction {
    SystemConfig(SystemConfigAction),
    Git(GitAction),
}

impl SubAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubAction::SystemConfig(a) => a.as_str(),
            SubAction::Git(a) => a.as_str(),
        }
    }
}

/// Untrusted request as received over the wire
///
/// Task-specific fields (`port`, `repo_url`, `description`, ...) sit at the
/// top level of the JSON object and land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub task: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ActionRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A request that passed schema validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedRequest {
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_action: Option<SubAction>,
    pub extra: BTreeMap<String, String>,
}

impl ValidatedRequest {
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// The requested version, or `None` for "latest"
    pub fn requested_version(&self) -> Option<&str> {
        if self.version.eq_ignore_ascii_case(crate::validator::DEFAULT_VERSION) {
            None
        } else {
            Some(&self.version)
        }
    }

    /// Short description used in log lines and messages
    pub fn summary(&self) -> String {
        match (&self.tool_name, &self.sub_action) {
            (Some(tool), _) => format!("{} {}", self.task, tool),
            (None, Some(action)) => format!("{} {}", self.task, action.as_str()),
            (None, None) => self.task.to_string(),
        }
    }
}
