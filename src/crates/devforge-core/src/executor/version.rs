//! Installed-version checks
//!
//! A tool that is not installed is reported as `not_found` with
//! `data.reason = "not_installed"`, never as a success with a negative
//! payload.

use super::process::CommandSpec;
use super::{ExecutionResult, SystemExecutor};
use crate::error::ExecutionError;
use crate::platform::{PackageManager, PlatformTarget};
use crate::resolver::ResolvedPackage;
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use tracing::debug;

fn java_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"version "([^"]+)""#).expect("valid regex"))
}

fn semver_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|\D)(\d+\.\d+\.\d+(?:[-+._][0-9A-Za-z.-]+)?)\b").expect("valid regex")
    })
}

fn loose_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?:^|\D)(\d{1,4}(?:\.\d+){0,2})\b").expect("valid regex"))
}

/// Pull a version number out of tool output
pub fn extract_version(output: &str) -> Option<String> {
    [java_pattern(), semver_pattern(), loose_pattern()]
        .into_iter()
        .find_map(|re| re.captures(output))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Command that prints the version of an installed tool
fn probe_command(canonical: &str, identifier: &str, platform: PlatformTarget) -> CommandSpec {
    let (program, arg) = match canonical {
        "java" => ("java", "-version"),
        "python" if platform == PlatformTarget::Windows => ("python", "--version"),
        "python" => ("python3", "--version"),
        "nodejs" => ("node", "--version"),
        "vscode" => ("code", "--version"),
        "neovim" => ("nvim", "--version"),
        "go" => ("go", "version"),
        "rust" => ("rustc", "--version"),
        "maven" => ("mvn", "-v"),
        "gradle" => ("gradle", "-v"),
        "postgres" => ("psql", "--version"),
        "docker" | "git" | "gcc" | "curl" => (canonical, "--version"),
        _ => (identifier, "--version"),
    };
    CommandSpec::new(program).arg(arg)
}

/// Package manager query for an installed package
fn query_command(manager: PackageManager, identifier: &str) -> CommandSpec {
    match manager {
        PackageManager::Apt => CommandSpec::new("dpkg-query").args(["-W", "-f=${Version}", identifier]),
        PackageManager::Dnf => CommandSpec::new("rpm").args(["-q", "--qf", "%{VERSION}", identifier]),
        PackageManager::Pacman => CommandSpec::new("pacman").args(["-Q", identifier]),
        PackageManager::Apk => CommandSpec::new("apk").args(["info", "-v", identifier]),
        PackageManager::Brew => CommandSpec::new("brew").args(["list", "--versions", identifier]),
        PackageManager::Winget => {
            CommandSpec::new("winget").args(["list", "--id", identifier, "--exact"])
        }
    }
}

impl SystemExecutor {
    pub(super) async fn version_check(&self, package: &ResolvedPackage) -> Result<ExecutionResult, ExecutionError> {
        let tool = package.canonical_name.as_str();
        let probe = probe_command(tool, &package.platform_identifier, self.platform);

        if self.runner.exists(&probe.program) {
            let output = self.runner.run(&probe).await?;
            if let Some(version) = extract_version(&output.combined()) {
                return Ok(ExecutionResult::success(format!("{} version {}", tool, version)).with_data(json!({
                    "tool": tool,
                    "installed": true,
                    "version": version,
                    "source": "probe",
                })));
            }
            debug!(command = %probe, "Probe produced no version");
        }

        let manager = self.platform.package_manager();
        let query = query_command(manager, &package.platform_identifier);
        if self.runner.exists(&query.program) {
            let output = self.runner.run(&query).await?;
            if output.success() {
                if let Some(version) = extract_version(&output.stdout) {
                    return Ok(ExecutionResult::success(format!(
                        "{} ({}) version {}",
                        tool, package.platform_identifier, version
                    ))
                    .with_data(json!({
                        "tool": tool,
                        "installed": true,
                        "version": version,
                        "source": "package_manager",
                    })));
                }
            }
        }

        Ok(ExecutionResult::not_found(format!("{} is not installed", tool)).with_data(json!({
            "tool": tool,
            "installed": false,
            "reason": "not_installed",
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Status;
    use crate::executor::fake::ScriptedRunner;
    use crate::executor::ExecutorSettings;
    use std::sync::Arc;

    #[test]
    fn test_extract_java_quoted_version() {
        let out = "openjdk version \"17.0.9\" 2023-10-17\nOpenJDK Runtime Environment";
        assert_eq!(extract_version(out).as_deref(), Some("17.0.9"));
    }

    #[test]
    fn test_extract_semver_and_loose() {
        assert_eq!(extract_version("git version 2.43.0").as_deref(), Some("2.43.0"));
        assert_eq!(extract_version("v20.11.1").as_deref(), Some("20.11.1"));
        assert_eq!(extract_version("go version go1.22 linux/amd64").as_deref(), Some("1.22"));
        assert_eq!(extract_version("no digits here"), None);
    }

    fn package(canonical: &str, id: &str) -> ResolvedPackage {
        ResolvedPackage {
            canonical_name: canonical.into(),
            platform_identifier: id.into(),
            resolved_version: "latest".into(),
            substitution: None,
        }
    }

    #[tokio::test]
    async fn test_probe_reports_version() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .with_programs(&["node"])
                .on("node --version", 0, "v20.11.1\n", ""),
        );
        let exec = SystemExecutor::new(PlatformTarget::LinuxDebian, ExecutorSettings::default())
            .with_runner(runner);
        let result = exec.version_check(&package("nodejs", "nodejs")).await.unwrap();
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.data.unwrap()["version"], "20.11.1");
    }

    #[tokio::test]
    async fn test_package_manager_fallback() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .with_programs(&["brew"])
                .on("brew list --versions", 0, "neovim 0.9.5\n", ""),
        );
        let exec = SystemExecutor::new(PlatformTarget::MacOs, ExecutorSettings::default()).with_runner(runner);
        let result = exec.version_check(&package("neovim", "neovim")).await.unwrap();
        assert_eq!(result.data.unwrap()["source"], "package_manager");
    }

    #[tokio::test]
    async fn test_not_installed_is_not_found() {
        let exec = SystemExecutor::new(PlatformTarget::LinuxArch, ExecutorSettings::default())
            .with_runner(Arc::new(ScriptedRunner::new()));
        let result = exec.version_check(&package("docker", "docker")).await.unwrap();
        assert_eq!(result.status, Status::NotFound);
        assert_eq!(result.data.unwrap()["reason"], "not_installed");
    }
}
