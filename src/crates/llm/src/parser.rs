//! Natural-language command parser
//!
//! Turns "install java 17" into an [`ActionRequest`] by asking a chat model
//! for a JSON-RPC style `{"method", "params"}` object. The model's reply is
//! untrusted: it is only shaped here, validation happens in the core.

use crate::chat::{ChatMessage, ChatModel, ChatRequest};
use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use crate::remote::OpenAiClient;
use devforge_core::action::{GitAction, SystemConfigAction};
use devforge_core::config::LlmConfig;
use devforge_core::{ActionRequest, Task};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are an AI command parser. Return only valid JSON.";
const PARSE_TEMPERATURE: f32 = 0.0;
const PARSE_MAX_TOKENS: usize = 200;

/// What the user asked for
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCommand {
    /// A tool action to send to the service
    Action(ActionRequest),
    /// Host information (`info://server`)
    ServerInfo,
}

/// Parses free text into a [`ParsedCommand`] using a chat model
pub struct CommandParser {
    model: Arc<dyn ChatModel>,
}

impl CommandParser {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// OpenAI-backed parser. Fails fast when the API key is not set.
    pub fn from_settings(settings: &LlmConfig) -> Result<Self> {
        let config = RemoteLlmConfig::from_settings(settings, &settings.model)?;
        Ok(Self::new(Arc::new(OpenAiClient::new(config)?)))
    }

    pub async fn parse(&self, input: &str) -> Result<ParsedCommand> {
        let input = input.trim();
        if input.is_empty() {
            return Err(LlmError::UnrecognizedCommand("empty input".to_string()));
        }

        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(input)),
        ])
        .with_temperature(PARSE_TEMPERATURE)
        .with_max_tokens(PARSE_MAX_TOKENS);

        debug!(model = %self.model.model(), "Parsing command");
        let response = self.model.chat(request).await?;
        debug!(raw = %response.content, "Parser reply");

        parse_reply(&response.content)
    }
}

/// Prompt listing the available methods and how to fill their params
pub fn build_prompt(user_input: &str) -> String {
    let tasks: Vec<&str> = Task::ALL
        .iter()
        .filter(|t| **t != Task::GenerateCode)
        .map(|t| t.as_str())
        .collect();

    format!(
        r#"Convert the developer request below into one JSON-RPC 2.0 call.

Methods:
- "tool_action_wrapper": params {{"task", "tool_name"?, "version"?, "action"?, ...extra}}
  task is one of: {tasks}
  system_config actions: {system_actions}
    extra fields: "variable" and "value" for environment variables, "port", "service"
  git_setup actions: {git_actions}
    extra fields: "username", "email", "repo_url", "branch", "dest_dir", "title", "pat"
  vscode_extension_install / vscode_extension_uninstall take the extension id as tool_name.
- "info://server": params {{}}
- "generate_code": params {{"description", "language"?}}

Guidelines:
- Use the plain tool name the user said ("java", "node", "python", "docker"). Do not translate it into a package name.
- Put a version in "version" only when the user gave one; otherwise omit it.
- "upgrade" means task "update".

Examples:
- {{"method": "tool_action_wrapper", "params": {{"task": "install", "tool_name": "docker"}}}}
- {{"method": "tool_action_wrapper", "params": {{"task": "version", "tool_name": "python"}}}}
- {{"method": "tool_action_wrapper", "params": {{"task": "install", "tool_name": "java", "version": "17"}}}}
- {{"method": "tool_action_wrapper", "params": {{"task": "system_config", "action": "is_port_open", "port": "8080"}}}}
- {{"method": "tool_action_wrapper", "params": {{"task": "git_setup", "action": "clone", "repo_url": "https://github.com/rust-lang/log"}}}}
- {{"method": "info://server", "params": {{}}}}
- {{"method": "generate_code", "params": {{"description": "hello world function", "language": "rust"}}}}

Return a single JSON object with keys "method" and "params". No markdown, no explanation.

User input: "{input}""#,
        tasks = tasks.join(", "),
        system_actions = SystemConfigAction::NAMES.join(", "),
        git_actions = GitAction::NAMES.join(", "),
        input = user_input.replace('"', "'"),
    )
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Shape a model reply into a [`ParsedCommand`]
pub fn parse_reply(raw: &str) -> Result<ParsedCommand> {
    let text = strip_fences(raw);
    let value: Value = serde_json::from_str(text).map_err(|e| {
        warn!(error = %e, "Parser reply is not JSON");
        LlmError::InvalidResponse(format!("{} (raw reply: {})", e, text))
    })?;

    let Value::Object(mut object) = value else {
        return Err(LlmError::UnrecognizedCommand(text.to_string()));
    };

    if object.contains_key("task") {
        return action_from_params(object, None);
    }

    let method = match object.remove("method") {
        Some(Value::String(method)) => method,
        _ => return Err(LlmError::UnrecognizedCommand(text.to_string())),
    };
    let params = match object.remove("params") {
        Some(Value::Object(params)) => params,
        _ => Map::new(),
    };

    match method.trim() {
        "tool_action_wrapper" => action_from_params(params, None),
        "info://server" => Ok(ParsedCommand::ServerInfo),
        other => match Task::from_str(other) {
            Ok(task) => action_from_params(params, Some(task)),
            Err(()) => Err(LlmError::UnrecognizedCommand(other.to_string())),
        },
    }
}

fn action_from_params(mut params: Map<String, Value>, task: Option<Task>) -> Result<ParsedCommand> {
    // Echo of the user's words; not part of the action
    params.remove("user_request");
    if let Some(task) = task {
        params.insert("task".to_string(), Value::String(task.as_str().to_string()));
    }
    let request: ActionRequest = serde_json::from_value(Value::Object(params))?;
    Ok(ParsedCommand::Action(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedModel {
        reply: String,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl CannedModel {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(ChatResponse {
                content: self.reply.clone(),
                model: "canned".into(),
                finish_reason: Some("stop".into()),
            })
        }

        fn model(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_tool_action_wrapper() {
        let parsed = parse_reply(
            r#"{"method": "tool_action_wrapper", "params": {"task": "install", "tool_name": "java", "version": "17", "user_request": "java 17"}}"#,
        )
        .unwrap();
        let ParsedCommand::Action(request) = parsed else {
            panic!("expected an action");
        };
        assert_eq!(request.task, "install");
        assert_eq!(request.tool_name.as_deref(), Some("java"));
        assert_eq!(request.version.as_deref(), Some("17"));
        assert!(!request.extra.contains_key("user_request"));
    }

    #[test]
    fn test_server_info() {
        assert_eq!(
            parse_reply("```json\n{\"method\": \"info://server\", \"params\": {}}\n```").unwrap(),
            ParsedCommand::ServerInfo
        );
    }

    #[test]
    fn test_generate_code_becomes_task() {
        let ParsedCommand::Action(request) =
            parse_reply(r#"{"method": "generate_code", "params": {"description": "fizzbuzz"}}"#).unwrap()
        else {
            panic!("expected an action");
        };
        assert_eq!(request.task, "generate_code");
        assert_eq!(request.extra["description"], "fizzbuzz");
    }

    #[test]
    fn test_flat_reply_accepted() {
        let ParsedCommand::Action(request) =
            parse_reply(r#"{"task": "system_config", "action": "is_port_open", "port": 8080}"#).unwrap()
        else {
            panic!("expected an action");
        };
        assert_eq!(request.action.as_deref(), Some("is_port_open"));
        assert_eq!(request.extra["port"], 8080);
    }

    #[test]
    fn test_garbage_is_invalid_response() {
        let err = parse_reply("Sure! Here is your command").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
        assert!(err.to_string().contains("Sure! Here is your command"));
    }

    #[test]
    fn test_unknown_method() {
        assert!(matches!(
            parse_reply(r#"{"method": "reboot", "params": {}}"#),
            Err(LlmError::UnrecognizedCommand(_))
        ));
    }

    #[test]
    fn test_prompt_mentions_every_task_and_input() {
        let prompt = build_prompt("install \"java\"");
        for task in ["install", "uninstall", "update", "version", "system_config", "git_setup"] {
            assert!(prompt.contains(task), "missing {}", task);
        }
        assert!(prompt.contains("is_port_open"));
        assert!(prompt.contains("User input: \"install 'java'\""));
    }

    #[tokio::test]
    async fn test_parse_uses_parser_settings() {
        let model = CannedModel::new(r#"{"method": "tool_action_wrapper", "params": {"task": "version", "tool_name": "node"}}"#);
        let parser = CommandParser::new(model.clone());

        let parsed = parser.parse("what node do I have").await.unwrap();
        assert!(matches!(parsed, ParsedCommand::Action(_)));

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].temperature, Some(0.0));
        assert_eq!(seen[0].max_tokens, Some(200));
        assert_eq!(seen[0].messages[0].content, SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_empty_input_skips_model() {
        let model = CannedModel::new("{}");
        let parser = CommandParser::new(model.clone());
        assert!(parser.parse("   ").await.is_err());
        assert!(model.seen.lock().unwrap().is_empty());
    }
}
