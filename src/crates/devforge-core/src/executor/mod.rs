//! Platform executor
//!
//! The executor performs the OS-level effect of a resolved action. The
//! dispatcher only depends on the [`PlatformExecutor`] trait; [`SystemExecutor`]
//! is the implementation that shells out to the platform's tooling.
//!
//! # Components
//!
//! - `process` - [`CommandRunner`] seam and failure classification
//! - `packages` - install / uninstall / update through the package manager
//! - `version` - installed-version probes
//! - `system_config` - environment variables, ports, services
//! - `git` - SSH keys, clone, key upload to the Git host
//! - `vscode` - editor extensions
//! - `index` - [`SystemPackageIndex`] used by the name resolver

mod git;
mod index;
mod packages;
pub mod process;
mod system;
mod system_config;
mod version;
mod vscode;

#[cfg(test)]
pub(crate) mod fake;

pub use index::{parse_winget_ids, SystemPackageIndex};
pub use process::{CommandOutput, CommandRunner, CommandSpec, TokioCommandRunner};
pub use system::{ExecutorSettings, SystemExecutor};
pub use system_config::{remove_export, upsert_export};
pub use version::extract_version;

use crate::action::ValidatedRequest;
use crate::envelope::Status;
use crate::error::ExecutionError;
use crate::platform::PlatformTarget;
use crate::resolver::ResolvedPackage;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// An action ready for execution
#[derive(Debug, Clone)]
pub struct ResolvedAction {
    pub request: ValidatedRequest,
    /// Set for tasks that went through name resolution
    pub package: Option<ResolvedPackage>,
}

impl ResolvedAction {
    pub fn new(request: ValidatedRequest) -> Self {
        Self {
            request,
            package: None,
        }
    }

    pub fn with_package(mut self, package: ResolvedPackage) -> Self {
        self.package = Some(package);
        self
    }
}

/// Structured result reported by an executor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Only set with `Status::Ambiguous`, when the executor itself found
    /// several matches
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<ResolvedPackage>,
}

impl ExecutionResult {
    fn with_status(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
            candidates: Vec::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_status(Status::Success, message)
    }

    /// The action ran but did not achieve its goal (e.g. SSH auth rejected)
    pub fn failure(message: impl Into<String>) -> Self {
        Self::with_status(Status::Error, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(Status::NotFound, message)
    }

    pub fn ambiguous(message: impl Into<String>, candidates: Vec<ResolvedPackage>) -> Self {
        Self {
            candidates,
            ..Self::with_status(Status::Ambiguous, message)
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Performs the OS-level effect of an action
#[async_trait]
pub trait PlatformExecutor: Send + Sync {
    /// Platform this executor targets
    fn platform(&self) -> PlatformTarget;

    /// Execute one action. Never retried by the caller.
    async fn execute(&self, action: &ResolvedAction) -> Result<ExecutionResult, ExecutionError>;
}

/// Produces source code from a description
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(&self, description: &str, language: Option<&str>) -> Result<String, ExecutionError>;
}
