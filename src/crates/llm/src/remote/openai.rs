//! OpenAI client implementation.
//!
//! Speaks the `/chat/completions` API, so any OpenAI-compatible endpoint
//! works by changing `base_url`.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::remote::OpenAiClient;
//! use llm::{ChatMessage, ChatModel, ChatRequest, RemoteLlmConfig};
//!
//! let config = RemoteLlmConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4o-mini")?;
//! let client = OpenAiClient::new(config)?;
//!
//! let request = ChatRequest::new(vec![ChatMessage::user("Hello!")]);
//! let response = client.chat(request).await?;
//! ```

use crate::chat::{ChatMessage, ChatModel, ChatRequest, ChatResponse};
use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl OpenAiClient {
    /// Create a new OpenAI client with the given configuration.
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RemoteLlmConfig {
        &self.config
    }

    fn build_body(&self, request: &ChatRequest) -> OpenAiRequest {
        OpenAiRequest {
            model: self.config.model.clone(),
            messages: request.messages.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }

    fn convert_response(openai_resp: OpenAiResponse) -> Result<ChatResponse> {
        let choice = openai_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            model: openai_resp.model,
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = self.build_body(&request);

        let mut req = self
            .client
            .post(&url)
            .json(&body)
            .header("Authorization", format!("Bearer {}", self.config.api_key));
        if let Some(org) = &self.config.organization {
            req = req.header("OpenAI-Organization", org);
        }

        debug!(model = %self.config.model, messages = body.messages.len(), "Sending chat completion");
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.config.timeout.as_secs())
            } else {
                LlmError::HttpError(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED => LlmError::AuthenticationError(error_text),
                StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded(error_text),
                _ => LlmError::ProviderError(format!("OpenAI API error {}: {}", status, error_text)),
            });
        }

        let openai_resp: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Self::convert_response(openai_resp)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> OpenAiClient {
        OpenAiClient::new(RemoteLlmConfig::new("test-key", "https://api.openai.com/v1", "gpt-4o-mini")).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest::new(vec![ChatMessage::system("sys"), ChatMessage::user("hi")])
            .with_temperature(0.0)
            .with_max_tokens(200);
        let body = serde_json::to_value(client().build_body(&request)).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_optional_fields_omitted() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        let body = serde_json::to_value(client().build_body(&request)).unwrap();
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_response_conversion() {
        let raw: OpenAiResponse = serde_json::from_value(json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "{\"method\": \"info://server\"}"},
                "finish_reason": "stop"
            }]
        }))
        .unwrap();

        let response = OpenAiClient::convert_response(raw).unwrap();
        assert_eq!(response.content, "{\"method\": \"info://server\"}");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_empty_choices_is_invalid() {
        let raw: OpenAiResponse = serde_json::from_value(json!({"model": "m", "choices": []})).unwrap();
        assert!(matches!(
            OpenAiClient::convert_response(raw),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
