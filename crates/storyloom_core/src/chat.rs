//! Per-call configuration and response types for model clients.

use crate::TokenUsage;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A named JSON Schema the provider may use to constrain its output.
///
/// Providers that cannot honour structured output are free to ignore it; the
/// pipeline validates every response regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Schema name (e.g. `"keyframe_group"`)
    pub name: String,
    /// Whether the provider should enforce the schema strictly
    pub strict: bool,
    /// The JSON Schema document
    pub schema: serde_json::Value,
}

/// Configuration passed with every chat call.
///
/// # Examples
///
/// ```
/// use storyloom_core::ChatConfig;
///
/// let config = ChatConfig::default()
///     .with_model("deepseek-chat".to_string())
///     .with_temperature(0.4);
///
/// assert_eq!(config.model.as_deref(), Some("deepseek-chat"));
/// assert!(!config.cancellation.is_cancelled());
/// ```
#[derive(Debug, Clone, Default, derive_setters::Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct ChatConfig {
    /// Model identifier override
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Structured output hint
    pub response_format: Option<ResponseFormat>,
    /// Cancellation signal forwarded to the transport
    #[setters(skip)]
    pub cancellation: CancellationToken,
}

impl ChatConfig {
    /// Replace the cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// The text a model returned plus its token accounting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Raw response text, possibly wrapped in prose or code fences
    pub content: String,
    /// Token usage reported by the provider, if any
    pub token_usage: Option<TokenUsage>,
}

impl ChatResponse {
    /// Create a response with the given text and usage.
    pub fn new(content: impl Into<String>, token_usage: Option<TokenUsage>) -> Self {
        Self {
            content: content.into(),
            token_usage,
        }
    }
}
