//! VS Code extension management

use super::process::{classify_failure, find_on_path, CommandSpec};
use super::{ExecutionResult, SystemExecutor};
use crate::action::ValidatedRequest;
use crate::error::ExecutionError;
use crate::platform::PlatformTarget;
use serde_json::json;
use std::path::PathBuf;

/// Well-known install locations of the `code` launcher
fn code_locations(platform: PlatformTarget) -> Vec<PathBuf> {
    match platform {
        PlatformTarget::MacOs => vec![PathBuf::from(
            "/Applications/Visual Studio Code.app/Contents/Resources/app/bin/code",
        )],
        PlatformTarget::Windows => std::env::var_os("LOCALAPPDATA")
            .map(|local| {
                vec![PathBuf::from(local)
                    .join("Programs")
                    .join("Microsoft VS Code")
                    .join("bin")
                    .join("code.cmd")]
            })
            .unwrap_or_default(),
        _ => vec![
            PathBuf::from("/usr/bin/code"),
            PathBuf::from("/snap/bin/code"),
            PathBuf::from("/usr/share/code/bin/code"),
        ],
    }
}

impl SystemExecutor {
    fn code_program(&self) -> Result<String, ExecutionError> {
        if self.runner.exists("code") {
            return Ok("code".to_string());
        }
        find_on_path("code")
            .into_iter()
            .chain(code_locations(self.platform))
            .find(|p| p.is_file())
            .map(|p| p.to_string_lossy().to_string())
            .ok_or_else(|| ExecutionError::ProgramNotFound {
                program: "code".to_string(),
            })
    }

    async fn installed_extensions(&self, program: &str) -> Result<Vec<String>, ExecutionError> {
        let spec = CommandSpec::new(program).arg("--list-extensions");
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(classify_failure(&spec, &output));
        }
        Ok(output
            .stdout
            .lines()
            .map(|l| l.trim().to_ascii_lowercase())
            .filter(|l| !l.is_empty())
            .collect())
    }

    pub(super) async fn extension(
        &self,
        install: bool,
        request: &ValidatedRequest,
    ) -> Result<ExecutionResult, ExecutionError> {
        let id = request
            .tool_name
            .as_deref()
            .ok_or_else(|| ExecutionError::InvalidArgument("an extension id is required".into()))?;
        let program = self.code_program()?;
        let present = self
            .installed_extensions(&program)
            .await?
            .contains(&id.to_ascii_lowercase());

        if install && present {
            return Ok(ExecutionResult::success(format!("Extension {} is already installed", id))
                .with_data(json!({ "extension": id, "changed": false })));
        }
        if !install && !present {
            return Ok(ExecutionResult::success(format!("Extension {} is not installed", id))
                .with_data(json!({ "extension": id, "changed": false })));
        }

        let spec = if install {
            CommandSpec::new(&program).args(["--install-extension", id, "--force"])
        } else {
            CommandSpec::new(&program).args(["--uninstall-extension", id])
        };
        let output = self.runner.run(&spec).await?;
        let text = output.combined().to_ascii_lowercase();
        if text.contains("not found") && install {
            return Ok(ExecutionResult::not_found(format!("Extension {} was not found in the marketplace", id))
                .with_data(json!({ "extension": id, "reason": "unknown_extension" })));
        }
        if !output.success() {
            return Err(classify_failure(&spec, &output));
        }

        let verb = if install { "installed" } else { "uninstalled" };
        Ok(ExecutionResult::success(format!("Extension {} {}", id, verb))
            .with_data(json!({ "extension": id, "changed": true })))
    }
}
