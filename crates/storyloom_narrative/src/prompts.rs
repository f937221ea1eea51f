//! Prompt template storage and unit prompt rendering.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use storyloom_core::StepState;
use storyloom_error::{ConfigError, StoryloomResult};
use storyloom_interface::PromptStore;

/// In-memory prompt template store.
///
/// # Example
/// ```
/// use storyloom_interface::PromptStore;
/// use storyloom_narrative::InMemoryPromptStore;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryPromptStore::new().with("storyboard.system", "You draw storyboards.");
///     assert_eq!(store.load("storyboard.system").await.unwrap(), "You draw storyboards.");
///     assert!(store.load("missing").await.is_err());
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryPromptStore {
    templates: HashMap<String, String>,
}

impl InMemoryPromptStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template, builder style.
    pub fn with(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(key.into(), template.into());
        self
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True when no templates are stored.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[async_trait]
impl PromptStore for InMemoryPromptStore {
    async fn load(&self, key: &str) -> StoryloomResult<String> {
        self.templates
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::new(format!("No prompt template for key '{}'", key)).into())
    }
}

/// Render the shared context sections of a unit prompt.
///
/// Sections: the brief as JSON, the previous unit's end state (or a note
/// that this is the first unit), and the running summary when present.
pub fn render_unit_context<B: Serialize>(
    brief: &B,
    prev_end: Option<&StepState>,
    running_summary: Option<&str>,
) -> String {
    let brief = serde_json::to_string_pretty(brief).unwrap_or_else(|_| "{}".to_string());
    let prev_end = match prev_end {
        Some(state) => format!(
            "The previous unit ends in this state. Your start state must match it exactly, \
             character by character and prop by prop, unless you list the change in \
             declared_changes:\n{}",
            serde_json::to_string_pretty(state).unwrap_or_else(|_| "{}".to_string())
        ),
        None => "This is the first unit of the sequence.".to_string(),
    };
    let mut prompt = format!("Unit brief:\n{}\n\n{}", brief, prev_end);
    if let Some(summary) = running_summary.filter(|s| !s.trim().is_empty()) {
        prompt.push_str("\n\nStory so far:\n");
        prompt.push_str(summary);
    }
    prompt
}
