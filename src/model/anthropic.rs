//! Anthropic Messages API client.

use super::{
    http_client, join_endpoint, send_for_body, with_vendor_headers, CompletionOptions,
    Conversation, ModelClient, Role,
};
use crate::config::{GraderConfig, ModelProvider};
use crate::error::GradeError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

/// Client for Anthropic's Claude API.
pub struct AnthropicClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    vendor_headers: Vec<(String, String)>,
}

impl AnthropicClient {
    /// Creates a client from the grading configuration.
    pub fn from_config(config: &GraderConfig) -> Result<Self, GradeError> {
        let provider = ModelProvider::Anthropic;
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

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
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

        // System prompts are a top-level field here, not a message.
        let messages = conversation
            .messages
            .iter()
            .filter_map(|m| match m.role {
                Role::System => None,
                Role::User => Some(AnthropicMessage {
                    role: "user",
                    content: &m.content,
                }),
                Role::Assistant => Some(AnthropicMessage {
                    role: "assistant",
                    content: &m.content,
                }),
            })
            .collect();

        let request = AnthropicRequest {
            model: &options.model,
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: options.temperature.min(1.0),
            system: conversation.system_text(),
            messages,
        };

        debug!(endpoint = %self.endpoint, model = %options.model, "Sending messages request");

        let builder = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request);
        let body = send_for_body(with_vendor_headers(builder, &self.vendor_headers), &self.endpoint)
            .await?;

        reply_text(&body)
    }

    fn provider(&self) -> &'static str {
        ModelProvider::Anthropic.name()
    }
}

fn reply_text(body: &str) -> Result<String, GradeError> {
    let resp: AnthropicResponse = serde_json::from_str(body).map_err(|e| {
        GradeError::InvalidModelResponse(format!("unexpected messages body: {e}"))
    })?;

    let content: String = resp.content.into_iter().filter_map(|c| c.text).collect();
    if content.trim().is_empty() {
        Err(GradeError::NoContent)
    } else {
        Ok(content)
    }
}
