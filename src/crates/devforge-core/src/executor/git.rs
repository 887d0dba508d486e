//! SSH key and Git operations

use super::process::{classify_failure, CommandSpec};
use super::{ExecutionResult, SystemExecutor};
use crate::action::{GitAction, ValidatedRequest};
use crate::error::ExecutionError;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const DEFAULT_KEY_TITLE: &str = "DevForge CLI Key";
const DEFAULT_GIT_HOST: &str = "github.com";

#[derive(Serialize)]
struct NewSshKey<'a> {
    title: &'a str,
    key: &'a str,
}

/// Values that git would parse as options are refused
fn reject_option_like(field: &str, value: &str) -> Result<(), ExecutionError> {
    if value.trim_start().starts_with('-') {
        return Err(ExecutionError::InvalidArgument(format!(
            "{} must not start with '-': {}",
            field, value
        )));
    }
    Ok(())
}

impl SystemExecutor {
    fn key_path(&self) -> Result<PathBuf, ExecutionError> {
        Ok(self.home()?.join(".ssh").join("id_ed25519"))
    }

    pub(super) async fn git(
        &self,
        action: GitAction,
        request: &ValidatedRequest,
    ) -> Result<ExecutionResult, ExecutionError> {
        match action {
            GitAction::GenerateSshKey => self.generate_ssh_key(request).await,
            GitAction::GetPublicKey => self.get_public_key().await,
            GitAction::CheckSsh => self.check_ssh(request).await,
            GitAction::Clone => self.clone_repo(request).await,
            GitAction::AddSshKey => self.add_ssh_key(request).await,
        }
    }

    async fn configure_identity(&self, request: &ValidatedRequest) -> Result<(), ExecutionError> {
        for (key, field) in [("user.name", "username"), ("user.email", "email")] {
            if let Some(value) = request.extra(field) {
                let spec = CommandSpec::new("git").args(["config", "--global", key, value]);
                let output = self.runner.run(&spec).await?;
                if !output.success() {
                    return Err(classify_failure(&spec, &output));
                }
                debug!(key, "Configured git identity");
            }
        }
        Ok(())
    }

    async fn generate_ssh_key(&self, request: &ValidatedRequest) -> Result<ExecutionResult, ExecutionError> {
        self.configure_identity(request).await?;

        let path = self.key_path()?;
        let public = path.with_extension("pub");
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let public_key = tokio::fs::read_to_string(&public).await.unwrap_or_default();
            return Ok(ExecutionResult::success(format!("SSH key already exists at {}", path.display()))
                .with_data(json!({
                    "path": path,
                    "created": false,
                    "public_key": public_key.trim(),
                })));
        }

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ExecutionError::InvalidArgument(format!("{}: {}", dir.display(), e)))?;
        }

        let comment = request.extra("email").unwrap_or("devforge");
        let path_arg = path.to_string_lossy().to_string();
        let spec = CommandSpec::new("ssh-keygen").args(["-t", "ed25519", "-C", comment, "-f", path_arg.as_str(), "-N", ""]);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(classify_failure(&spec, &output));
        }

        let public_key = tokio::fs::read_to_string(&public).await.unwrap_or_default();
        info!(path = %path.display(), "Generated SSH key");
        Ok(ExecutionResult::success(format!("SSH key generated at {}", path.display())).with_data(json!({
            "path": path,
            "created": true,
            "public_key": public_key.trim(),
        })))
    }

    async fn read_public_key(&self) -> Result<Option<(PathBuf, String)>, ExecutionError> {
        let public = self.key_path()?.with_extension("pub");
        match tokio::fs::read_to_string(&public).await {
            Ok(key) => Ok(Some((public, key.trim().to_string()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ExecutionError::InvalidArgument(format!("{}: {}", public.display(), e))),
        }
    }

    fn no_key_result() -> ExecutionResult {
        ExecutionResult::not_found("No SSH public key found. Run git_setup with action 'generate_ssh_key' first")
            .with_data(json!({ "reason": "no_key" }))
    }

    async fn get_public_key(&self) -> Result<ExecutionResult, ExecutionError> {
        match self.read_public_key().await? {
            Some((path, key)) => Ok(ExecutionResult::success(key.clone()).with_data(json!({
                "path": path,
                "public_key": key,
            }))),
            None => Ok(Self::no_key_result()),
        }
    }

    async fn check_ssh(&self, request: &ValidatedRequest) -> Result<ExecutionResult, ExecutionError> {
        let host = request.extra("host").unwrap_or(DEFAULT_GIT_HOST);
        let target = format!("git@{}", host);
        let spec = CommandSpec::new("ssh").args([
            "-T",
            "-o",
            "BatchMode=yes",
            "-o",
            "StrictHostKeyChecking=accept-new",
            target.as_str(),
        ]);
        let output = self.runner.run(&spec).await?;
        let text = output.combined();
        let lower = text.to_ascii_lowercase();

        // GitHub exits 1 even on success
        if lower.contains("successfully authenticated") || lower.contains("welcome to") {
            return Ok(ExecutionResult::success(format!("SSH authentication to {} works", host))
                .with_data(json!({ "host": host, "authenticated": true, "output": text })));
        }
        if lower.contains("permission denied") {
            return Ok(ExecutionResult::failure(format!(
                "SSH authentication to {} was rejected. Add your public key with git_setup action 'add_ssh_key'",
                host
            ))
            .with_data(json!({ "host": host, "authenticated": false, "output": text })));
        }
        Err(classify_failure(&spec, &output))
    }

    async fn clone_repo(&self, request: &ValidatedRequest) -> Result<ExecutionResult, ExecutionError> {
        let repo_url = request
            .extra("repo_url")
            .ok_or_else(|| ExecutionError::InvalidArgument("repo_url is required to clone".into()))?;
        reject_option_like("repo_url", repo_url)?;

        let mut spec = CommandSpec::new("git").arg("clone");
        if let Some(branch) = request.extra("branch") {
            reject_option_like("branch", branch)?;
            spec = spec.args(["--branch", branch]);
        }
        // Everything after `--` is positional for git
        spec = spec.args(["--", repo_url]);
        if let Some(dest) = request.extra("dest_dir") {
            spec = spec.arg(dest);
        }

        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(classify_failure(&spec, &output));
        }
        Ok(ExecutionResult::success(format!("Cloned {}", repo_url)).with_data(json!({
            "repo_url": repo_url,
            "branch": request.extra("branch"),
            "dest_dir": request.extra("dest_dir"),
        })))
    }

    async fn add_ssh_key(&self, request: &ValidatedRequest) -> Result<ExecutionResult, ExecutionError> {
        let Some((_, public_key)) = self.read_public_key().await? else {
            return Ok(Self::no_key_result());
        };

        let token = request
            .extra("pat")
            .map(str::to_string)
            .or_else(|| std::env::var(&self.settings.github_token_env).ok().filter(|t| !t.is_empty()));

        let Some(token) = token else {
            return Ok(ExecutionResult::success(format!(
                "{} is not set, add the key manually",
                self.settings.github_token_env
            ))
            .with_data(json!({
                "uploaded": false,
                "public_key": public_key,
                "manual_steps": [
                    "Open https://github.com/settings/keys",
                    "Click 'New SSH key'",
                    "Paste the public key and save",
                ],
            })));
        };

        let title = request.extra("title").unwrap_or(DEFAULT_KEY_TITLE);
        let url = format!("{}/user/keys", self.settings.github_api_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "devforge")
            .json(&NewSshKey {
                title,
                key: &public_key,
            })
            .send()
            .await
            .map_err(|e| ExecutionError::NetworkUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            200 | 201 => {
                info!(title, "Uploaded SSH key");
                Ok(ExecutionResult::success("SSH key added to your GitHub account")
                    .with_data(json!({ "uploaded": true, "title": title })))
            }
            422 if body.contains("already in use") => Ok(ExecutionResult::success(
                "SSH key is already registered on GitHub",
            )
            .with_data(json!({ "uploaded": false, "already_exists": true }))),
            401 | 403 => Err(ExecutionError::PermissionDenied {
                command: format!("POST {}", url),
                detail: "token rejected, it needs the 'admin:public_key' scope".to_string(),
            }),
            code => {
                warn!(code, "Key upload failed");
                Err(ExecutionError::SubprocessFailed {
                    command: format!("POST {}", url),
                    code: Some(code as i32),
                    stderr: body,
                })
            }
        }
    }
}
