//! Subprocess execution
//!
//! All OS-level effects go through a [`CommandRunner`] so executors can be
//! tested against scripted output.

use crate::error::ExecutionError;
use async_trait::async_trait;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// One program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Prefix with `sudo -n` so a missing password fails fast instead of prompting
    pub fn with_sudo(self, enabled: bool) -> Self {
        if !enabled {
            return self;
        }
        let mut args = vec!["-n".to_string(), self.program];
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout and stderr joined, trimmed
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (_, true) => stdout.to_string(),
            _ => format!("{}\n{}", stdout, stderr),
        }
    }
}

/// Runs programs on behalf of an executor
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. A non-zero exit is `Ok`; only spawn failures and
    /// timeouts are errors.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecutionError>;

    /// Whether `program` can be found on PATH
    fn exists(&self, program: &str) -> bool {
        find_on_path(program).is_some()
    }
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone)]
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecutionError> {
        let started = Instant::now();
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                warn!(command = %spec, secs = self.timeout.as_secs(), "Command timed out");
                return Err(ExecutionError::Timeout {
                    command: spec.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
            Ok(Err(err)) => {
                return Err(match err.kind() {
                    ErrorKind::NotFound => ExecutionError::ProgramNotFound {
                        program: spec.program.clone(),
                    },
                    ErrorKind::PermissionDenied => ExecutionError::PermissionDenied {
                        command: spec.to_string(),
                        detail: err.to_string(),
                    },
                    _ => ExecutionError::SubprocessFailed {
                        command: spec.to_string(),
                        code: None,
                        stderr: err.to_string(),
                    },
                })
            }
            Ok(Ok(output)) => output,
        };

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!(
            command = %spec,
            code = ?result.code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        Ok(result)
    }
}

/// Locate an executable on PATH
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    let extensions: &[&str] = if cfg!(windows) {
        &["", ".exe", ".cmd", ".bat"]
    } else {
        &[""]
    };
    std::env::split_paths(&path).find_map(|dir| {
        extensions
            .iter()
            .map(|ext| dir.join(format!("{}{}", program, ext)))
            .find(|candidate| candidate.is_file())
    })
}

const PERMISSION_MARKERS: &[&str] = &[
    "permission denied",
    "are you root",
    "must be run as root",
    "a password is required",
    "access is denied",
    "operation not permitted",
    "requires elevation",
];

const NETWORK_MARKERS: &[&str] = &[
    "temporary failure in name resolution",
    "could not resolve",
    "failed to fetch",
    "network is unreachable",
    "connection timed out",
    "failed to download",
    "no internet",
];

/// Turn a failed process into the most specific execution error
pub fn classify_failure(spec: &CommandSpec, output: &CommandOutput) -> ExecutionError {
    let text = output.combined();
    let lower = text.to_ascii_lowercase();
    if PERMISSION_MARKERS.iter().any(|m| lower.contains(m)) {
        ExecutionError::PermissionDenied {
            command: spec.to_string(),
            detail: last_line(&text),
        }
    } else if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        ExecutionError::NetworkUnavailable(last_line(&text))
    } else {
        ExecutionError::SubprocessFailed {
            command: spec.to_string(),
            code: output.code,
            stderr: last_line(&text),
        }
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            code: Some(100),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_sudo_prefix() {
        let spec = CommandSpec::new("apt-get").args(["install", "-y", "git"]).with_sudo(true);
        assert_eq!(spec.to_string(), "sudo -n apt-get install -y git");
        let plain = CommandSpec::new("brew").arg("install").with_sudo(false);
        assert_eq!(plain.to_string(), "brew install");
    }

    #[test]
    fn test_classify_permission_denied() {
        let spec = CommandSpec::new("apt-get");
        let err = classify_failure(
            &spec,
            &failed("E: Could not open lock file - open (13: Permission denied)\nE: are you root?"),
        );
        assert!(matches!(err, ExecutionError::PermissionDenied { .. }));
    }

    #[test]
    fn test_classify_network() {
        let spec = CommandSpec::new("apt-get");
        let err = classify_failure(
            &spec,
            &failed("W: Failed to fetch http://archive.ubuntu.com  Temporary failure in name resolution"),
        );
        assert!(matches!(err, ExecutionError::NetworkUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_generic_failure_keeps_last_line() {
        let spec = CommandSpec::new("dnf");
        let err = classify_failure(&spec, &failed("line one\nError: something broke\n"));
        assert_eq!(
            err,
            ExecutionError::SubprocessFailed {
                command: "dnf".into(),
                code: Some(100),
                stderr: "Error: something broke".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_program_not_found() {
        let runner = TokioCommandRunner::default();
        let err = runner
            .run(&CommandSpec::new("devforge-definitely-missing-binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::ProgramNotFound { .. }));
    }
}
