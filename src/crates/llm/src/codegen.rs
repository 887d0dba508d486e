//! LLM-backed [`CodeGenerator`]

use crate::chat::{ChatMessage, ChatModel, ChatRequest};
use crate::config::RemoteLlmConfig;
use crate::error::Result;
use crate::parser::strip_fences;
use crate::remote::OpenAiClient;
use async_trait::async_trait;
use devforge_core::config::LlmConfig;
use devforge_core::{CodeGenerator, ExecutionError};
use std::sync::Arc;
use tracing::info;

const SYSTEM_PROMPT: &str = "You are a helpful coding assistant. Generate only code, no explanation.";
const CODE_TEMPERATURE: f32 = 0.2;
const CODE_MAX_TOKENS: usize = 512;

/// Generates code with a chat model
pub struct LlmCodeGenerator {
    model: Arc<dyn ChatModel>,
}

impl LlmCodeGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// OpenAI-backed generator using the configured code model
    pub fn from_settings(settings: &LlmConfig) -> Result<Self> {
        let config = RemoteLlmConfig::from_settings(settings, &settings.code_model)?;
        Ok(Self::new(Arc::new(OpenAiClient::new(config)?)))
    }
}

fn user_prompt(description: &str, language: Option<&str>) -> String {
    match language {
        Some(language) => format!("Write {} code for: {}", language, description),
        None => format!("Write code for: {}", description),
    }
}

#[async_trait]
impl CodeGenerator for LlmCodeGenerator {
    async fn generate(&self, description: &str, language: Option<&str>) -> std::result::Result<String, ExecutionError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt(description, language)),
        ])
        .with_temperature(CODE_TEMPERATURE)
        .with_max_tokens(CODE_MAX_TOKENS);

        let response = self.model.chat(request).await?;
        info!(model = %response.model, chars = response.content.len(), "Code generated");
        Ok(strip_code_fence(&response.content))
    }
}

/// Models often wrap code in a language-tagged fence; keep only the body
fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = match rest.split_once('\n') {
        Some((_tag, body)) => body,
        None => strip_fences(trimmed),
    };
    body.trim_end().trim_end_matches("```").trim_end().to_string()
}
