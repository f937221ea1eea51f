//! Scripted model client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use storyloom_core::{ChatConfig, ChatMessage, ChatResponse, TokenUsage};
use storyloom_error::{BackendError, StoryloomResult};
use storyloom_interface::ModelClient;
use tokio_util::sync::CancellationToken;

/// A single scripted reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Reply with the text, reporting the given usage
    Text(String, TokenUsage),
    /// Fail with a backend error
    Error(String),
}

impl MockResponse {
    /// A reply costing 10 prompt and 5 completion tokens.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into(), TokenUsage::new(10, 5))
    }

    /// A reply carrying a JSON value.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::text(value.to_string())
    }
}

/// Mock model client that replays a queue of responses.
///
/// Every call is counted and its messages recorded. Running past the end
/// of the script is a backend error.
#[derive(Clone, Default)]
pub struct MockModelClient {
    script: Arc<Mutex<VecDeque<MockResponse>>>,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    configs: Arc<Mutex<Vec<ChatConfig>>>,
    cancel_after: Arc<Mutex<Option<(usize, CancellationToken)>>>,
}

impl MockModelClient {
    /// Create a mock client with a sequence of responses.
    pub fn new_sequence(responses: Vec<MockResponse>) -> Self {
        Self {
            script: Arc::new(Mutex::new(responses.into())),
            ..Self::default()
        }
    }

    /// Fire `token` once `calls` calls have completed.
    #[allow(dead_code)]
    pub fn cancel_after(self, calls: usize, token: CancellationToken) -> Self {
        *self.cancel_after.lock().unwrap() = Some((calls, token));
        self
    }

    /// Get the number of times chat() was called.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Messages of every call, in order.
    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    /// Chat configurations of every call, in order.
    #[allow(dead_code)]
    pub fn configs(&self) -> Vec<ChatConfig> {
        self.configs.lock().unwrap().clone()
    }

    /// Responses not yet consumed.
    #[allow(dead_code)]
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        config: &ChatConfig,
    ) -> StoryloomResult<ChatResponse> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(messages.to_vec());
            calls.len()
        };
        self.configs.lock().unwrap().push(config.clone());

        if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if count >= *after {
                token.cancel();
            }
        }

        match self.script.lock().unwrap().pop_front() {
            Some(MockResponse::Text(text, usage)) => Ok(ChatResponse::new(text, Some(usage))),
            Some(MockResponse::Error(message)) => Err(BackendError::new(message).into()),
            None => Err(BackendError::new(format!("mock script exhausted at call {}", count)).into()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
