//! Action schema validation
//!
//! [`validate`] is a pure function: no I/O, no side effects. It enforces the
//! closed task set and the required fields of each task.
//!
//! | task | required |
//! |------|----------|
//! | `install`, `uninstall`, `update`, `version` | `tool_name` |
//! | `system_config` | `action` in [`SystemConfigAction::NAMES`] |
//! | `git_setup` | `action` in [`GitAction::NAMES`] |
//! | `vscode_extension_*` | `tool_name` (extension id) |
//! | `generate_code` | `description` |

use crate::action::{ActionRequest, GitAction, SubAction, SystemConfigAction, Task, ValidatedRequest};
use crate::error::ValidationError;
use serde_json::Value;
use std::collections::BTreeMap;

/// Version assumed when none is given
pub const DEFAULT_VERSION: &str = "latest";

/// Validate an untrusted request
pub fn validate(request: &ActionRequest) -> Result<ValidatedRequest, ValidationError> {
    let task: Task = request
        .task
        .parse()
        .map_err(|_| ValidationError::UnknownTask(request.task.trim().to_string()))?;

    let tool_name = non_blank(request.tool_name.as_deref());
    if task.requires_tool_name() && tool_name.is_none() {
        return Err(ValidationError::MissingToolName {
            task: task.to_string(),
        });
    }

    let sub_action = match task {
        Task::SystemConfig => Some(SubAction::SystemConfig(parse_sub_action(
            task,
            request.action.as_deref(),
            SystemConfigAction::NAMES,
            SystemConfigAction::parse,
        )?)),
        Task::GitSetup => Some(SubAction::Git(parse_sub_action(
            task,
            request.action.as_deref(),
            GitAction::NAMES,
            GitAction::parse,
        )?)),
        _ => None,
    };

    let version = non_blank(request.version.as_deref()).unwrap_or_else(|| DEFAULT_VERSION.to_string());
    let extra = flatten_extra(&request.extra);

    if task == Task::GenerateCode && !extra.get("description").is_some_and(|d| !d.trim().is_empty()) {
        return Err(ValidationError::MissingField {
            task: task.to_string(),
            field: "description",
        });
    }

    Ok(ValidatedRequest {
        task,
        tool_name,
        version,
        sub_action,
        extra,
    })
}

fn parse_sub_action<A>(
    task: Task,
    provided: Option<&str>,
    allowed: &'static [&'static str],
    parse: fn(&str) -> Option<A>,
) -> Result<A, ValidationError> {
    let provided = non_blank(provided);
    provided
        .as_deref()
        .and_then(parse)
        .ok_or(ValidationError::MissingSubAction {
            task: task.to_string(),
            provided,
            allowed,
        })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Stringify task-specific fields.
///
/// A nested `extra` object is merged in as well; top-level keys win.
fn flatten_extra(raw: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(Value::Object(nested)) = raw.get("extra") {
        for (key, value) in nested {
            if let Some(s) = stringify(value) {
                out.insert(key.clone(), s);
            }
        }
    }
    for (key, value) in raw {
        if key == "extra" {
            continue;
        }
        if let Some(s) = stringify(value) {
            out.insert(key.clone(), s);
        }
    }
    out
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> ActionRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unknown_task_rejected() {
        let err = validate(&request(json!({"task": "deploy", "tool_name": "x"}))).unwrap_err();
        assert_eq!(err, ValidationError::UnknownTask("deploy".into()));
    }

    #[test]
    fn test_missing_task_rejected() {
        let err = validate(&request(json!({"tool_name": "docker"}))).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownTask(ref t) if t.is_empty()));
    }

    #[test]
    fn test_package_tasks_require_tool_name() {
        for task in ["install", "uninstall", "update", "version"] {
            let err = validate(&request(json!({"task": task, "tool_name": "  "}))).unwrap_err();
            assert_eq!(err.error_code(), "MISSING_TOOL_NAME", "task {}", task);
        }
    }

    #[test]
    fn test_system_config_requires_known_action() {
        let err = validate(&request(json!({"task": "system_config"}))).unwrap_err();
        assert!(matches!(err, ValidationError::MissingSubAction { provided: None, .. }));

        let err = validate(&request(json!({"task": "system_config", "action": "reboot"}))).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingSubAction { provided: Some(ref p), .. } if p == "reboot"
        ));
    }

    #[test]
    fn test_git_setup_sub_action_parsed() {
        let validated = validate(&request(json!({
            "task": "git_setup",
            "action": "clone",
            "repo_url": "git@github.com:octo/demo.git"
        })))
        .unwrap();
        assert_eq!(validated.sub_action, Some(SubAction::Git(GitAction::Clone)));
        assert_eq!(validated.extra("repo_url"), Some("git@github.com:octo/demo.git"));
    }

    #[test]
    fn test_port_check_needs_no_tool_name() {
        let validated = validate(&request(json!({
            "task": "system_config",
            "action": "is_port_open",
            "extra": {"port": 54321}
        })))
        .unwrap();
        assert!(validated.tool_name.is_none());
        assert_eq!(validated.extra("port"), Some("54321"));
    }

    #[test]
    fn test_version_defaults_to_latest() {
        let validated = validate(&request(json!({"task": "install", "tool_name": " docker ", "version": ""}))).unwrap();
        assert_eq!(validated.version, DEFAULT_VERSION);
        assert_eq!(validated.tool_name.as_deref(), Some("docker"));
        assert_eq!(validated.requested_version(), None);
    }

    #[test]
    fn test_upgrade_alias_validates_as_update() {
        let validated = validate(&request(json!({"task": "upgrade", "tool_name": "git"}))).unwrap();
        assert_eq!(validated.task, Task::Update);
    }

    #[test]
    fn test_generate_code_requires_description() {
        let err = validate(&request(json!({"task": "generate_code"}))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                task: "generate_code".into(),
                field: "description"
            }
        );
        assert!(validate(&request(json!({"task": "generate_code", "description": "fizzbuzz"}))).is_ok());
    }

    #[test]
    fn test_extension_tasks_require_id() {
        let err = validate(&request(json!({"task": "vscode_extension_install"}))).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_TOOL_NAME");
    }
}
