//! The model client seam.

use async_trait::async_trait;
use storyloom_core::{ChatConfig, ChatMessage, ChatResponse};
use storyloom_error::StoryloomResult;
use std::sync::Arc;

/// A chat-completion model the pipeline can call.
///
/// Provider selection, authentication and transport-level retry belong to
/// the implementation. Implementations should watch
/// `config.cancellation` and abandon in-flight requests when it fires.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a conversation and return the model's reply.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        config: &ChatConfig,
    ) -> StoryloomResult<ChatResponse>;

    /// Provider name (e.g., "openai", "deepseek").
    fn provider_name(&self) -> &'static str;

    /// Model identifier.
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        config: &ChatConfig,
    ) -> StoryloomResult<ChatResponse> {
        (**self).chat(messages, config).await
    }

    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}
