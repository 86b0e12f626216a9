//! Configuration types for the grading service.
//!
//! All behaviour is controlled through [`GraderConfig`], built via its
//! [`GraderConfigBuilder`]. The binary maps CLI flags and environment
//! variables onto the builder; library users set only what they need and
//! rely on the defaults for the rest.

use crate::error::GradeError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default OpenAI-compatible model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default Anthropic model.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";

/// Minimum number of characters extracted text must have after trimming.
pub const MIN_EXTRACTED_CHARS: usize = 10;

/// Configuration for the grading pipeline and the HTTP service.
///
/// # Example
/// ```rust
/// use docgrade::{GraderConfig, ModelProvider};
///
/// let config = GraderConfig::builder()
///     .provider(ModelProvider::OpenAi)
///     .api_key("sk-test")
///     .model("gpt-4o-mini")
///     .strict_field_validation(true)
///     .build()
///     .unwrap();
/// assert!(config.strict_field_validation);
/// ```
#[derive(Clone)]
pub struct GraderConfig {
    /// Which vendor protocol the model client speaks. Default: OpenAI-compatible.
    pub provider: ModelProvider,

    /// Bearer token (or `x-api-key` for Anthropic). `None` fails every model
    /// call with [`GradeError::MissingCredential`].
    pub api_key: Option<String>,

    /// Base URL of the model host. `None` uses the provider default.
    ///
    /// May be given with or without a trailing path segment such as `/v1` or
    /// even the full completion path; see [`crate::model::join_endpoint`].
    pub base_url: Option<String>,

    /// Completion path appended to the base URL. `None` uses the provider
    /// default (`chat/completions` or `messages`).
    pub completion_path: Option<String>,

    /// Model identifier sent with every request.
    pub model: String,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Optional cap on generated tokens. Anthropic requires one, so its
    /// client falls back to 4096 when this is `None`.
    pub max_tokens: Option<u32>,

    /// Extra headers sent with every model call (e.g. `HTTP-Referer` for
    /// OpenRouter).
    pub vendor_headers: Vec<(String, String)>,

    /// Per-call timeout for the model request. `None` keeps the HTTP
    /// client's default (no timeout).
    pub api_timeout_secs: Option<u64>,

    /// Directory holding in-flight scratch files.
    pub scratch_dir: PathBuf,

    /// Require non-blank `instructions` and `criteria`. Default: false.
    pub strict_field_validation: bool,

    /// Largest accepted request body in bytes. Default: 20 MiB.
    pub max_upload_bytes: usize,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            api_key: None,
            base_url: None,
            completion_path: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: None,
            vendor_headers: Vec::new(),
            api_timeout_secs: None,
            scratch_dir: std::env::temp_dir().join("docgrade-uploads"),
            strict_field_validation: false,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl fmt::Debug for GraderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraderConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("completion_path", &self.completion_path)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field(
                "vendor_headers",
                &self.vendor_headers.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("scratch_dir", &self.scratch_dir)
            .field("strict_field_validation", &self.strict_field_validation)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl GraderConfig {
    /// Create a new builder for `GraderConfig`.
    pub fn builder() -> GraderConfigBuilder {
        GraderConfigBuilder {
            config: Self::default(),
            model_set: false,
        }
    }
}

/// Builder for [`GraderConfig`].
#[derive(Debug)]
pub struct GraderConfigBuilder {
    config: GraderConfig,
    model_set: bool,
}

impl GraderConfigBuilder {
    pub fn provider(mut self, provider: ModelProvider) -> Self {
        self.config.provider = provider;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn completion_path(mut self, path: impl Into<String>) -> Self {
        self.config.completion_path = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self.model_set = true;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn vendor_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.vendor_headers.push((name.into(), value.into()));
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn strict_field_validation(mut self, v: bool) -> Self {
        self.config.strict_field_validation = v;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// When no model was set explicitly the provider's default model is used.
    pub fn build(mut self) -> Result<GraderConfig, GradeError> {
        if !self.model_set {
            self.config.model = self.config.provider.default_model().to_string();
        }
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(GradeError::InvalidConfig("Model name must not be empty".into()));
        }
        if let Some(path) = &c.completion_path {
            if path.trim_matches('/').is_empty() {
                return Err(GradeError::InvalidConfig(
                    "Completion path must not be empty".into(),
                ));
            }
        }
        if c.max_upload_bytes < 1024 {
            return Err(GradeError::InvalidConfig(format!(
                "Upload limit must be at least 1024 bytes, got {}",
                c.max_upload_bytes
            )));
        }
        for (name, _) in &c.vendor_headers {
            if name.trim().is_empty() {
                return Err(GradeError::InvalidConfig("Vendor header name is empty".into()));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Wire protocol of the configured model endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelProvider {
    /// OpenAI `chat/completions` and every compatible host (OpenRouter,
    /// Groq, Ollama, vLLM, ...). (default)
    #[default]
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

impl ModelProvider {
    pub fn name(self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "openai",
            ModelProvider::Anthropic => "anthropic",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "https://api.openai.com/v1",
            ModelProvider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn default_completion_path(self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "chat/completions",
            ModelProvider::Anthropic => "messages",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ModelProvider::OpenAi => DEFAULT_MODEL,
            ModelProvider::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelProvider {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai-compatible" | "openrouter" | "ollama" => Ok(ModelProvider::OpenAi),
            "anthropic" | "claude" => Ok(ModelProvider::Anthropic),
            other => Err(GradeError::InvalidConfig(format!(
                "Unknown model provider '{other}' (expected openai or anthropic)"
            ))),
        }
    }
}
