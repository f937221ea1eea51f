//! The prompt template seam.

use async_trait::async_trait;
use storyloom_error::StoryloomResult;

/// Keyed lookup of system prompt templates.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Load the template stored under `key`.
    async fn load(&self, key: &str) -> StoryloomResult<String>;
}
