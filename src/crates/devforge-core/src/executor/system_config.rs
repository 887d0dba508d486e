//! Environment variables, ports and services

use super::process::{classify_failure, CommandSpec};
use super::{ExecutionResult, SystemExecutor};
use crate::action::{SystemConfigAction, ValidatedRequest};
use crate::error::ExecutionError;
use crate::logging::is_secret_key;
use crate::platform::PlatformTarget;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

const PORT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Replace or append `export NAME='value'` in a shell profile
///
/// The value is single-quoted so the shell reads it literally.
pub fn upsert_export(content: &str, name: &str, value: &str) -> String {
    let line = format!("export {}={}", name, shell_quote(value));
    let (mut kept, _) = strip_exports(content, name);
    if !kept.is_empty() && !kept.ends_with('\n') {
        kept.push('\n');
    }
    kept.push_str(&line);
    kept.push('\n');
    kept
}

/// Remove every `export NAME=` line. Returns the new content and whether
/// anything was removed.
pub fn remove_export(content: &str, name: &str) -> (String, bool) {
    strip_exports(content, name)
}

/// Single-quote `value` for POSIX shells; each `'` becomes `'\''`
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn strip_exports(content: &str, name: &str) -> (String, bool) {
    let prefix = format!("export {}=", name);
    let mut removed = false;
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        if line.trim_start().starts_with(&prefix) {
            removed = true;
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    (out, removed)
}

fn variable_name(request: &ValidatedRequest) -> Result<String, ExecutionError> {
    let name = ["variable", "name", "key"]
        .iter()
        .find_map(|k| request.extra(k))
        .or(request.tool_name.as_deref())
        .map(str::to_string)
        .ok_or_else(|| ExecutionError::InvalidArgument("an environment variable name is required".into()))?;
    if !is_valid_variable_name(&name) {
        return Err(ExecutionError::InvalidArgument(format!(
            "'{}' is not a valid environment variable name",
            name
        )));
    }
    Ok(name)
}

impl SystemExecutor {
    fn profile_path(&self) -> Result<PathBuf, ExecutionError> {
        let file = match self.platform {
            PlatformTarget::MacOs => ".zshrc",
            PlatformTarget::LinuxAlpine => ".profile",
            _ => ".bashrc",
        };
        Ok(self.home()?.join(file))
    }

    pub(super) async fn system_config(
        &self,
        action: SystemConfigAction,
        request: &ValidatedRequest,
    ) -> Result<ExecutionResult, ExecutionError> {
        match action {
            SystemConfigAction::Check => self.check_env(request),
            SystemConfigAction::Set => self.set_env(request).await,
            SystemConfigAction::RemoveEnv => self.remove_env(request).await,
            SystemConfigAction::ListEnv => Ok(list_env()),
            SystemConfigAction::IsPortOpen => is_port_open(request).await,
            SystemConfigAction::IsServiceRunning => self.is_service_running(request).await,
        }
    }

    fn check_env(&self, request: &ValidatedRequest) -> Result<ExecutionResult, ExecutionError> {
        let name = variable_name(request)?;
        match std::env::var(&name) {
            Ok(value) => {
                let shown = if is_secret_key(&name) { "[REDACTED]".to_string() } else { value };
                Ok(ExecutionResult::success(format!("{} is set", name)).with_data(json!({
                    "variable": name,
                    "set": true,
                    "value": shown,
                })))
            }
            Err(_) => Ok(ExecutionResult::not_found(format!("{} is not set", name)).with_data(json!({
                "variable": name,
                "set": false,
                "reason": "not_set",
            }))),
        }
    }

    async fn set_env(&self, request: &ValidatedRequest) -> Result<ExecutionResult, ExecutionError> {
        let name = variable_name(request)?;
        let value = request
            .extra("value")
            .ok_or_else(|| ExecutionError::InvalidArgument(format!("a value for {} is required", name)))?;

        if self.platform == PlatformTarget::Windows {
            let spec = CommandSpec::new("setx").args([name.as_str(), value]);
            let output = self.runner.run(&spec).await?;
            if !output.success() {
                return Err(classify_failure(&spec, &output));
            }
            return Ok(ExecutionResult::success(format!(
                "{} set for the current user. Open a new terminal to use it",
                name
            ))
            .with_data(json!({ "variable": name, "scope": "user" })));
        }

        let path = self.profile_path()?;
        let content = read_profile(&path).await?;
        let updated = upsert_export(&content, &name, value);
        write_profile(&path, &updated).await?;
        debug!(variable = %name, path = %path.display(), "Persisted environment variable");
        Ok(ExecutionResult::success(format!(
            "{} written to {}. Run 'source {}' or open a new shell",
            name,
            path.display(),
            path.display()
        ))
        .with_data(json!({ "variable": name, "profile": path })))
    }

    async fn remove_env(&self, request: &ValidatedRequest) -> Result<ExecutionResult, ExecutionError> {
        let name = variable_name(request)?;

        if self.platform == PlatformTarget::Windows {
            let spec = CommandSpec::new("reg").args(["delete", r"HKCU\Environment", "/F", "/V", name.as_str()]);
            let output = self.runner.run(&spec).await?;
            if !output.success() {
                return Ok(ExecutionResult::not_found(format!("{} is not set for the current user", name))
                    .with_data(json!({ "variable": name, "reason": "not_set" })));
            }
            return Ok(ExecutionResult::success(format!("{} removed", name)).with_data(json!({ "variable": name })));
        }

        let path = self.profile_path()?;
        let content = read_profile(&path).await?;
        let (updated, removed) = remove_export(&content, &name);
        if !removed {
            return Ok(ExecutionResult::not_found(format!("{} is not defined in {}", name, path.display()))
                .with_data(json!({ "variable": name, "reason": "not_set" })));
        }
        write_profile(&path, &updated).await?;
        Ok(ExecutionResult::success(format!("{} removed from {}", name, path.display()))
            .with_data(json!({ "variable": name, "profile": path })))
    }

    async fn is_service_running(&self, request: &ValidatedRequest) -> Result<ExecutionResult, ExecutionError> {
        let service = request
            .extra("service")
            .or(request.tool_name.as_deref())
            .ok_or_else(|| ExecutionError::InvalidArgument("a service name is required".into()))?
            .to_string();

        let spec = match self.platform {
            PlatformTarget::Windows => CommandSpec::new("sc").args(["query", service.as_str()]),
            PlatformTarget::MacOs => CommandSpec::new("launchctl").arg("list"),
            PlatformTarget::LinuxAlpine => CommandSpec::new("rc-service").args([service.as_str(), "status"]),
            _ => CommandSpec::new("systemctl").args(["is-active", service.as_str()]),
        };
        let output = self.runner.run(&spec).await?;
        let text = output.combined();

        let running = match self.platform {
            PlatformTarget::Windows => text.contains("RUNNING"),
            PlatformTarget::MacOs => output.success() && launchctl_running(&output.stdout, &service),
            PlatformTarget::LinuxAlpine => output.success() && text.contains("started"),
            _ => output.success() && text.trim() == "active",
        };

        let message = if running {
            format!("Service '{}' is running", service)
        } else {
            format!("Service '{}' is not running", service)
        };
        Ok(ExecutionResult::success(message).with_data(json!({
            "service": service,
            "running": running,
        })))
    }
}

/// `launchctl list` prints `PID<TAB>Status<TAB>Label`; a running job has a PID
fn launchctl_running(listing: &str, label: &str) -> bool {
    listing.lines().any(|line| {
        let columns: Vec<&str> = line.split_whitespace().collect();
        match columns.as_slice() {
            [pid, _, name] => *name == label && pid.parse::<u32>().is_ok(),
            _ => false,
        }
    })
}

fn list_env() -> ExecutionResult {
    let variables: BTreeMap<String, String> = std::env::vars()
        .map(|(k, v)| {
            let shown = if is_secret_key(&k) { "[REDACTED]".to_string() } else { v };
            (k, shown)
        })
        .collect();
    ExecutionResult::success(format!("{} environment variables", variables.len()))
        .with_data(json!({ "variables": variables }))
}

async fn is_port_open(request: &ValidatedRequest) -> Result<ExecutionResult, ExecutionError> {
    let raw = request
        .extra("port")
        .or(request.tool_name.as_deref())
        .ok_or_else(|| ExecutionError::InvalidArgument("a port number is required".into()))?;
    let port: u16 = raw
        .trim()
        .parse()
        .map_err(|_| ExecutionError::InvalidArgument(format!("'{}' is not a valid port", raw)))?;

    let in_use = matches!(
        tokio::time::timeout(PORT_PROBE_TIMEOUT, TcpStream::connect(("127.0.0.1", port))).await,
        Ok(Ok(_))
    );
    let message = if in_use {
        format!("Port {} is in use", port)
    } else {
        format!("Port {} is free", port)
    };
    Ok(ExecutionResult::success(message).with_data(json!({
        "port": port,
        "open": in_use,
        "status": if in_use { "in_use" } else { "free" },
    })))
}

async fn read_profile(path: &PathBuf) -> Result<String, ExecutionError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(io_error(path, e)),
    }
}

async fn write_profile(path: &PathBuf, content: &str) -> Result<(), ExecutionError> {
    tokio::fs::write(path, content).await.map_err(|e| io_error(path, e))
}

fn io_error(path: &PathBuf, err: std::io::Error) -> ExecutionError {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        ExecutionError::PermissionDenied {
            command: format!("write {}", path.display()),
            detail: err.to_string(),
        }
    } else {
        ExecutionError::InvalidArgument(format!("{}: {}", path.display(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionRequest;
    use crate::envelope::Status;
    use crate::executor::fake::ScriptedRunner;
    use crate::executor::ExecutorSettings;
    use crate::validator::validate;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    fn request(action: &str) -> ActionRequest {
        ActionRequest::new("system_config").with_action(action)
    }

    fn executor(platform: PlatformTarget, home: &TempDir, runner: ScriptedRunner) -> SystemExecutor {
        SystemExecutor::new(
            platform,
            ExecutorSettings {
                home_dir: Some(home.path().to_path_buf()),
                ..Default::default()
            },
        )
        .with_runner(Arc::new(runner))
    }

    #[test]
    fn test_upsert_replaces_existing_export() {
        let content = "alias ll='ls -l'\nexport JAVA_HOME=\"/old\"\n";
        let updated = upsert_export(content, "JAVA_HOME", "/usr/lib/jvm/java-17");
        assert_eq!(updated, "alias ll='ls -l'\nexport JAVA_HOME='/usr/lib/jvm/java-17'\n");
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("$(id)"), "'$(id)'");
    }

    #[test]
    fn test_variable_name_rules() {
        assert!(is_valid_variable_name("JAVA_HOME"));
        assert!(is_valid_variable_name("_x1"));
        assert!(!is_valid_variable_name("1ABC"));
        assert!(!is_valid_variable_name("A B"));
        assert!(!is_valid_variable_name("X;rm"));
        assert!(!is_valid_variable_name(""));
    }

    #[cfg(unix)]
    #[test]
    fn test_exported_value_is_literal_when_sourced() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        let value = format!("$(touch {}) `id` \\n it's \"quoted\"", marker.display());
        let profile = dir.path().join("profile");
        std::fs::write(&profile, upsert_export("", "DEVFORGE_LITERAL", &value)).unwrap();

        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(format!(". '{}'; printf %s \"$DEVFORGE_LITERAL\"", profile.display()))
            .output()
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), value);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_set_env_rejects_bad_name() {
        let home = TempDir::new().unwrap();
        let exec = executor(PlatformTarget::LinuxDebian, &home, ScriptedRunner::new());
        let req = validate(&request("set").with_extra("variable", "X;touch y").with_extra("value", "1")).unwrap();
        assert!(matches!(
            exec.system_config(SystemConfigAction::Set, &req).await,
            Err(ExecutionError::InvalidArgument(_))
        ));
        assert!(!home.path().join(".bashrc").exists());
    }

    #[test]
    fn test_remove_export_reports_change() {
        let (updated, removed) = remove_export("export A=\"1\"\nexport AB=\"2\"\n", "A");
        assert!(removed);
        assert_eq!(updated, "export AB=\"2\"\n");
        assert!(!remove_export(&updated, "A").1);
    }

    #[tokio::test]
    async fn test_set_then_remove_env_in_profile() {
        let home = TempDir::new().unwrap();
        let exec = executor(PlatformTarget::LinuxDebian, &home, ScriptedRunner::new());

        let set = validate(&request("set").with_extra("variable", "DEVFORGE_TEST").with_extra("value", "on")).unwrap();
        let result = exec.system_config(SystemConfigAction::Set, &set).await.unwrap();
        assert_eq!(result.status, Status::Success);
        let profile = std::fs::read_to_string(home.path().join(".bashrc")).unwrap();
        assert!(profile.contains("export DEVFORGE_TEST='on'"));

        let remove = validate(&request("remove_env").with_extra("variable", "DEVFORGE_TEST")).unwrap();
        let result = exec.system_config(SystemConfigAction::RemoveEnv, &remove).await.unwrap();
        assert_eq!(result.status, Status::Success);
        let again = exec.system_config(SystemConfigAction::RemoveEnv, &remove).await.unwrap();
        assert_eq!(again.status, Status::NotFound);
    }

    #[tokio::test]
    async fn test_port_in_use_and_free() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let busy = validate(&request("is_port_open").with_extra("port", port)).unwrap();
        let result = is_port_open(&busy).await.unwrap();
        assert_eq!(result.data.unwrap()["open"], true);

        drop(listener);
        let result = is_port_open(&busy).await.unwrap();
        assert_eq!(result.data.unwrap()["status"], "free");
    }

    #[tokio::test]
    async fn test_invalid_port_is_invalid_argument() {
        let bad = validate(&request("is_port_open").with_extra("port", "http")).unwrap();
        assert!(matches!(is_port_open(&bad).await, Err(ExecutionError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_service_running_via_systemctl() {
        let home = TempDir::new().unwrap();
        let exec = executor(
            PlatformTarget::LinuxRhel,
            &home,
            ScriptedRunner::new().on("systemctl is-active docker", 0, "active\n", ""),
        );
        let req = validate(&request("is_service_running").with_extra("service", "docker")).unwrap();
        let result = exec.system_config(SystemConfigAction::IsServiceRunning, &req).await.unwrap();
        assert_eq!(result.data.unwrap()["running"], true);
    }

    #[test]
    fn test_launchctl_matches_whole_label() {
        let listing = "PID\tStatus\tLabel\n412\t0\thomebrew.mxcl.postgresql\n-\t0\tcom.example.idle\n88\t0\tsql\n";
        assert!(launchctl_running(listing, "homebrew.mxcl.postgresql"));
        assert!(!launchctl_running(listing, "postgresql"));
        assert!(!launchctl_running(listing, "com.example.idle"));
        assert!(!launchctl_running("412\t0\thomebrew.mxcl.postgresql\n", "sql"));
        assert!(launchctl_running(listing, "sql"));
    }

    #[tokio::test]
    async fn test_service_check_on_macos_uses_exact_label() {
        let home = TempDir::new().unwrap();
        let exec = executor(
            PlatformTarget::MacOs,
            &home,
            ScriptedRunner::new().on("launchctl list", 0, "PID\tStatus\tLabel\n412\t0\thomebrew.mxcl.postgresql\n", ""),
        );
        let req = validate(&request("is_service_running").with_extra("service", "sql")).unwrap();
        let result = exec.system_config(SystemConfigAction::IsServiceRunning, &req).await.unwrap();
        assert_eq!(result.data.unwrap()["running"], false);
    }

    #[tokio::test]
    async fn test_check_env_missing_is_not_found() {
        let home = TempDir::new().unwrap();
        let exec = executor(PlatformTarget::MacOs, &home, ScriptedRunner::new());
        let req = validate(&request("check").with_extra("variable", "DEVFORGE_SURELY_UNSET_VAR")).unwrap();
        let result = exec.system_config(SystemConfigAction::Check, &req).await.unwrap();
        assert_eq!(result.status, Status::NotFound);
    }
}
