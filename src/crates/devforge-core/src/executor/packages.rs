//! Package manager install / uninstall / update

use super::process::{classify_failure, CommandOutput, CommandSpec};
use super::{ExecutionResult, SystemExecutor};
use crate::action::Task;
use crate::error::ExecutionError;
use crate::platform::PackageManager;
use crate::resolver::ResolvedPackage;
use crate::validator::DEFAULT_VERSION;
use serde_json::json;
use tracing::debug;

const ALREADY_DONE_MARKERS: &[&str] = &[
    "is already the newest version",
    "is already installed",
    "already installed",
    "is up to date -- skipping",
    "nothing to do",
    "no available upgrade found",
    "no newer package versions are available",
    "found an existing package already installed",
    "is not installed, so not removed",
];

const MISSING_PACKAGE_MARKERS: &[&str] = &[
    "unable to locate package",
    "has no installation candidate",
    "no match for argument",
    "target not found",
    "no such package",
    "no available formula",
    "no formulae or casks found",
    "no package found matching",
    "no installed package found matching",
];

/// Verb used in messages
fn verb(task: Task) -> (&'static str, &'static str) {
    match task {
        Task::Uninstall => ("uninstall", "Uninstalled"),
        Task::Update => ("update", "Updated"),
        _ => ("install", "Installed"),
    }
}

/// Build the package manager command for `task`
pub(super) fn package_command(manager: PackageManager, task: Task, package: &ResolvedPackage) -> CommandSpec {
    let id = package.platform_identifier.as_str();
    let spec = CommandSpec::new(manager.program());
    match (manager, task) {
        (PackageManager::Apt, Task::Uninstall) => spec.args(["remove", "-y", id]),
        (PackageManager::Apt, Task::Update) => spec.args(["install", "-y", "--only-upgrade", id]),
        (PackageManager::Apt, _) => spec.args(["install", "-y", id]),
        (PackageManager::Dnf, Task::Uninstall) => spec.args(["remove", "-y", id]),
        (PackageManager::Dnf, Task::Update) => spec.args(["upgrade", "-y", id]),
        (PackageManager::Dnf, _) => spec.args(["install", "-y", id]),
        (PackageManager::Pacman, Task::Uninstall) => spec.args(["-R", "--noconfirm", id]),
        (PackageManager::Pacman, Task::Update) => spec.args(["-S", "--noconfirm", id]),
        (PackageManager::Pacman, _) => spec.args(["-S", "--noconfirm", "--needed", id]),
        (PackageManager::Apk, Task::Uninstall) => spec.args(["del", id]),
        (PackageManager::Apk, Task::Update) => spec.args(["add", "--upgrade", id]),
        (PackageManager::Apk, _) => spec.args(["add", id]),
        (PackageManager::Brew, Task::Uninstall) => spec.args(["uninstall", id]),
        (PackageManager::Brew, Task::Update) => spec.args(["upgrade", id]),
        (PackageManager::Brew, _) => spec.args(["install", id]),
        (PackageManager::Winget, task) => {
            let verb = match task {
                Task::Uninstall => "uninstall",
                Task::Update => "upgrade",
                _ => "install",
            };
            let mut spec = spec.args([verb, "--id", id, "--exact"]);
            if task != Task::Uninstall {
                spec = spec.args(["--accept-package-agreements", "--accept-source-agreements"]);
                if package.resolved_version != DEFAULT_VERSION {
                    spec = spec.args(["--version", package.resolved_version.as_str()]);
                }
            }
            spec
        }
    }
}

fn contains_any(output: &CommandOutput, markers: &[&str]) -> bool {
    let text = output.combined().to_ascii_lowercase();
    markers.iter().any(|m| text.contains(m))
}

impl SystemExecutor {
    pub(super) async fn package_task(
        &self,
        task: Task,
        package: &ResolvedPackage,
    ) -> Result<ExecutionResult, ExecutionError> {
        let manager = self.platform.package_manager();
        if !self.runner.exists(manager.program()) {
            return Err(ExecutionError::ProgramNotFound {
                program: manager.program().to_string(),
            });
        }

        let spec = self.privileged(package_command(manager, task, package));
        let output = self.runner.run(&spec).await?;
        let (infinitive, past) = verb(task);
        let id = &package.platform_identifier;
        debug!(command = %spec, code = ?output.code, "Package command finished");

        let data = || {
            json!({
                "package": package,
                "package_manager": manager,
                "platform": self.platform,
            })
        };

        if contains_any(&output, MISSING_PACKAGE_MARKERS) {
            return Ok(ExecutionResult::not_found(format!(
                "Package '{}' was not found by {}",
                id,
                manager.program()
            ))
            .with_data(json!({
                "reason": "package_unavailable",
                "package": package,
            })));
        }

        if contains_any(&output, ALREADY_DONE_MARKERS) {
            let message = match task {
                Task::Uninstall => format!("{} is not installed", id),
                Task::Update => format!("{} is already up to date", id),
                _ => format!("{} is already installed", id),
            };
            let mut data = data();
            data["changed"] = json!(false);
            return Ok(ExecutionResult::success(message).with_data(data));
        }

        if !output.success() {
            return Err(classify_failure(&spec, &output));
        }

        let mut message = format!("{} {} via {}", past, id, manager.program());
        if let Some(note) = &package.substitution {
            message.push_str(&format!(" ({})", note));
        }
        let mut data = data();
        data["changed"] = json!(true);
        debug!(action = infinitive, package = %id, "Package task succeeded");
        Ok(ExecutionResult::success(message).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Status;
    use crate::executor::fake::ScriptedRunner;
    use crate::executor::ExecutorSettings;
    use crate::platform::PlatformTarget;
    use std::sync::Arc;

    fn package(id: &str, version: &str) -> ResolvedPackage {
        ResolvedPackage {
            canonical_name: "tool".into(),
            platform_identifier: id.into(),
            resolved_version: version.into(),
            substitution: None,
        }
    }

    fn executor(platform: PlatformTarget, runner: ScriptedRunner) -> (SystemExecutor, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let settings = ExecutorSettings {
            use_sudo: false,
            ..Default::default()
        };
        (SystemExecutor::new(platform, settings).with_runner(runner.clone()), runner)
    }

    #[test]
    fn test_commands_per_manager() {
        let pkg = package("git", "latest");
        assert_eq!(
            package_command(PackageManager::Apt, Task::Install, &pkg).to_string(),
            "apt-get install -y git"
        );
        assert_eq!(
            package_command(PackageManager::Pacman, Task::Uninstall, &pkg).to_string(),
            "pacman -R --noconfirm git"
        );
        assert_eq!(
            package_command(PackageManager::Brew, Task::Update, &pkg).to_string(),
            "brew upgrade git"
        );
    }

    #[test]
    fn test_winget_pins_version() {
        let cmd = package_command(PackageManager::Winget, Task::Install, &package("Git.Git", "2.44.0"));
        assert!(cmd.to_string().ends_with("--version 2.44.0"));
        let uninstall = package_command(PackageManager::Winget, Task::Uninstall, &package("Git.Git", "2.44.0"));
        assert_eq!(uninstall.to_string(), "winget uninstall --id Git.Git --exact");
    }

    #[tokio::test]
    async fn test_install_success() {
        let (exec, runner) = executor(
            PlatformTarget::LinuxDebian,
            ScriptedRunner::new()
                .with_programs(&["apt-get"])
                .on("apt-get install", 0, "Setting up git (1:2.43.0)", ""),
        );
        let result = exec.package_task(Task::Install, &package("git", "latest")).await.unwrap();
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.message, "Installed git via apt-get");
        assert_eq!(runner.calls(), vec!["apt-get install -y git"]);
    }

    #[tokio::test]
    async fn test_already_installed_is_success() {
        let (exec, _) = executor(
            PlatformTarget::LinuxDebian,
            ScriptedRunner::new()
                .with_programs(&["apt-get"])
                .on("apt-get", 0, "git is already the newest version (1:2.43.0).", ""),
        );
        let result = exec.package_task(Task::Install, &package("git", "latest")).await.unwrap();
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.data.unwrap()["changed"], false);
    }

    #[tokio::test]
    async fn test_unknown_package_is_not_found() {
        let (exec, _) = executor(
            PlatformTarget::LinuxRhel,
            ScriptedRunner::new()
                .with_programs(&["dnf"])
                .on("dnf", 1, "", "No match for argument: nosuch\nError: Unable to find a match"),
        );
        let result = exec.package_task(Task::Install, &package("nosuch", "latest")).await.unwrap();
        assert_eq!(result.status, Status::NotFound);
    }

    #[tokio::test]
    async fn test_permission_failure_is_classified() {
        let (exec, _) = executor(
            PlatformTarget::LinuxDebian,
            ScriptedRunner::new()
                .with_programs(&["apt-get"])
                .on("apt-get", 100, "", "E: Could not open lock file (13: Permission denied)"),
        );
        let err = exec.package_task(Task::Install, &package("git", "latest")).await.unwrap_err();
        assert!(matches!(err, ExecutionError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_missing_package_manager() {
        let (exec, _) = executor(PlatformTarget::LinuxAlpine, ScriptedRunner::new());
        let err = exec.package_task(Task::Install, &package("git", "latest")).await.unwrap_err();
        assert_eq!(err, ExecutionError::ProgramNotFound { program: "apk".into() });
    }
}
