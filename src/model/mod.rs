//! Model clients: send a conversation to a chat-completion endpoint and get
//! the reply text back.
//!
//! All vendors sit behind one narrow trait, [`ModelClient`]. There is one
//! concrete implementation per wire protocol, chosen once from
//! [`GraderConfig::provider`] by [`client_from_config`]:
//!
//! | Provider    | Client              | Auth                   | Default path       |
//! |-------------|---------------------|------------------------|--------------------|
//! | `openai`    | [`OpenAiClient`]    | `Authorization: Bearer`| `chat/completions` |
//! | `anthropic` | [`AnthropicClient`] | `x-api-key`            | `messages`         |

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

use crate::config::{GraderConfig, ModelProvider};
use crate::error::GradeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// ── Conversation types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Ordered messages sent to the model in one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    /// Concatenated content of all system messages, if any.
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

/// Per-call sampling options. They never affect the prompt text.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn from_config(config: &GraderConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

// ── Client trait ─────────────────────────────────────────────────────────

/// A chat-completion backend.
///
/// Implementations perform exactly one request per call and never retry.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send `conversation` and return the raw reply text.
    async fn complete(
        &self,
        conversation: &Conversation,
        options: &CompletionOptions,
    ) -> Result<String, GradeError>;

    /// Provider name, for logs.
    fn provider(&self) -> &'static str;
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn complete(
        &self,
        conversation: &Conversation,
        options: &CompletionOptions,
    ) -> Result<String, GradeError> {
        (**self).complete(conversation, options).await
    }

    fn provider(&self) -> &'static str {
        (**self).provider()
    }
}

/// Build the client matching `config.provider`.
pub fn client_from_config(config: &GraderConfig) -> Result<Arc<dyn ModelClient>, GradeError> {
    let client: Arc<dyn ModelClient> = match config.provider {
        ModelProvider::OpenAi => Arc::new(OpenAiClient::from_config(config)?),
        ModelProvider::Anthropic => Arc::new(AnthropicClient::from_config(config)?),
    };
    debug!(provider = client.provider(), "Model client ready");
    Ok(client)
}

// ── Shared HTTP plumbing ─────────────────────────────────────────────────

/// Join a base URL and a completion path without duplicating segments.
///
/// Trailing slashes on the base and surrounding slashes on the path are
/// ignored. If the base already ends with the whole path, or with a leading
/// run of its segments, only the missing tail is appended:
///
/// ```rust
/// use docgrade::model::join_endpoint;
///
/// let url = "https://api.openai.com/v1/chat/completions";
/// assert_eq!(join_endpoint("https://api.openai.com/v1", "chat/completions"), url);
/// assert_eq!(join_endpoint("https://api.openai.com/v1/", "/chat/completions"), url);
/// assert_eq!(join_endpoint("https://api.openai.com/v1/chat/completions", "chat/completions"), url);
/// assert_eq!(join_endpoint("https://api.openai.com/v1/chat", "chat/completions"), url);
/// ```
pub fn join_endpoint(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim().trim_matches('/');
    if path.is_empty() {
        return base.to_string();
    }

    // Only the path part of the base may overlap, never the host.
    let after_scheme = base.find("://").map_or(0, |i| i + 3);
    let path_start = base[after_scheme..]
        .find('/')
        .map_or(base.len(), |j| after_scheme + j);
    let base_path = &base[path_start..];

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    // Longest prefix of the path's segments that the base already ends with.
    let overlap = (1..=segments.len())
        .rev()
        .find(|&n| {
            let prefix = segments[..n].join("/");
            base_path.ends_with(&format!("/{prefix}"))
        })
        .unwrap_or(0);

    let rest = segments[overlap..].join("/");
    if rest.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{rest}")
    }
}

/// Build the shared `reqwest` client, honouring the optional timeout.
pub(crate) fn http_client(timeout_secs: Option<u64>) -> Result<reqwest::Client, GradeError> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| GradeError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Send a prepared request and return the body of a successful response.
///
/// Non-2xx statuses become [`GradeError::UpstreamError`] with the body text
/// embedded; transport failures become [`GradeError::UpstreamUnreachable`].
pub(crate) async fn send_for_body(
    request: reqwest::RequestBuilder,
    url: &str,
) -> Result<String, GradeError> {
    let response = request
        .send()
        .await
        .map_err(|e| GradeError::UpstreamUnreachable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GradeError::UpstreamUnreachable {
            url: url.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;

    if !status.is_success() {
        return Err(GradeError::UpstreamError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Apply configured vendor headers to a request.
pub(crate) fn with_vendor_headers(
    mut request: reqwest::RequestBuilder,
    headers: &[(String, String)],
) -> reqwest::RequestBuilder {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_plain() {
        assert_eq!(
            join_endpoint("https://host/v1", "chat/completions"),
            "https://host/v1/chat/completions"
        );
    }

    #[test]
    fn join_normalises_slashes() {
        assert_eq!(
            join_endpoint("https://host/v1///", "//chat/completions/"),
            "https://host/v1/chat/completions"
        );
    }

    #[test]
    fn join_detects_full_path_already_present() {
        assert_eq!(
            join_endpoint("https://host/v1/chat/completions/", "chat/completions"),
            "https://host/v1/chat/completions"
        );
    }

    #[test]
    fn join_detects_partial_overlap() {
        assert_eq!(
            join_endpoint("https://host/api/chat", "chat/completions"),
            "https://host/api/chat/completions"
        );
    }

    #[test]
    fn join_does_not_match_partial_segment_names() {
        // "mychat" is not the "chat" segment
        assert_eq!(
            join_endpoint("https://host/mychat", "chat/completions"),
            "https://host/mychat/chat/completions"
        );
    }

    #[test]
    fn join_ignores_host_named_like_a_segment() {
        assert_eq!(
            join_endpoint("https://chat", "chat/completions"),
            "https://chat/chat/completions"
        );
    }

    #[test]
    fn join_host_only_base() {
        assert_eq!(
            join_endpoint("http://localhost:11434", "v1/chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn system_text_joins_system_messages() {
        let conv = Conversation::new(vec![
            ChatMessage::system("a"),
            ChatMessage::user("u"),
            ChatMessage::system("b"),
        ]);
        assert_eq!(conv.system_text().as_deref(), Some("a\n\nb"));
        assert_eq!(Conversation::default().system_text(), None);
    }

    #[test]
    fn client_from_config_selects_provider() {
        let c = GraderConfig::builder()
            .provider(ModelProvider::Anthropic)
            .build()
            .unwrap();
        assert_eq!(client_from_config(&c).unwrap().provider(), "anthropic");
        let c = GraderConfig::default();
        assert_eq!(client_from_config(&c).unwrap().provider(), "openai");
    }
}
