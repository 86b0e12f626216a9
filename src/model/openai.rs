//! OpenAI-compatible `chat/completions` client.

use super::{
    http_client, join_endpoint, send_for_body, with_vendor_headers, ChatMessage,
    CompletionOptions, Conversation, ModelClient,
};
use crate::config::{GraderConfig, ModelProvider};
use crate::error::GradeError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Client for OpenAI and any host speaking the same protocol.
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    vendor_headers: Vec<(String, String)>,
}

impl OpenAiClient {
    /// Creates a client from the grading configuration.
    pub fn from_config(config: &GraderConfig) -> Result<Self, GradeError> {
        let provider = ModelProvider::OpenAi;
        let base = config
            .base_url
            .as_deref()
            .unwrap_or(provider.default_base_url());
        let path = config
            .completion_path
            .as_deref()
            .unwrap_or(provider.default_completion_path());

        Ok(Self {
            client: http_client(config.api_timeout_secs)?,
            endpoint: join_endpoint(base, path),
            api_key: config.api_key.clone(),
            vendor_headers: config.vendor_headers.clone(),
        })
    }

    /// Fully resolved completion URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(
        &self,
        conversation: &Conversation,
        options: &CompletionOptions,
    ) -> Result<String, GradeError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GradeError::MissingCredential {
                provider: self.provider().to_string(),
            })?;

        let request = ChatRequest {
            model: &options.model,
            messages: &conversation.messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        debug!(endpoint = %self.endpoint, model = %options.model, "Sending chat completion");

        let builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(&request);
        let body = send_for_body(with_vendor_headers(builder, &self.vendor_headers), &self.endpoint)
            .await?;

        reply_text(&body)
    }

    fn provider(&self) -> &'static str {
        ModelProvider::OpenAi.name()
    }
}

/// Pull `choices[0].message.content` out of a success body.
fn reply_text(body: &str) -> Result<String, GradeError> {
    let resp: ChatResponse = serde_json::from_str(body).map_err(|e| {
        GradeError::InvalidModelResponse(format!("unexpected completion body: {e}"))
    })?;

    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(GradeError::NoContent)
}
