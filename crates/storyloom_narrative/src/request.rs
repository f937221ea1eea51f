//! Generation requests and results.

use serde_json::Value;
use storyloom_core::TokenUsage;
use storyloom_validation::{Extracted, JsonKind, Shape};
use tokio_util::sync::CancellationToken;

/// Everything the orchestrator needs for one unit of generation.
///
/// # Examples
///
/// ```
/// use storyloom_narrative::GenerationRequestBuilder;
/// use storyloom_validation::Shape;
///
/// let request = GenerationRequestBuilder::default()
///     .system_prompt("You write storyboards.")
///     .user_prompt("Group g1: the harbor at dawn.")
///     .expected_shape(Shape::any())
///     .build()
///     .unwrap();
///
/// assert_eq!(*request.max_attempts(), 2);
/// assert!(GenerationRequestBuilder::default()
///     .system_prompt("s")
///     .user_prompt("u")
///     .expected_shape(Shape::any())
///     .max_attempts(0u32)
///     .build()
///     .is_err());
/// ```
#[derive(Debug, Clone, derive_builder::Builder, derive_getters::Getters)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct GenerationRequest {
    /// Instructions for the model
    system_prompt: String,
    /// The unit's goal and context
    user_prompt: String,
    /// Structural descriptor for the reply
    expected_shape: Shape,
    /// Top-level JSON kind of the reply
    #[builder(default = "JsonKind::Object")]
    expected_kind: JsonKind,
    /// Total model calls allowed, generation included
    #[builder(default = "2")]
    max_attempts: u32,
    /// Name attached to the structured-output hint
    #[builder(default = "\"artifact\".to_string()")]
    schema_name: String,
    /// Cancellation signal forwarded to the model client
    #[builder(default)]
    cancellation: CancellationToken,
}

impl GenerationRequestBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_attempts == Some(0) {
            return Err("max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// An accepted value and what it cost.
#[derive(Debug, Clone)]
pub struct Generated<T> {
    /// The typed, validated value
    pub value: T,
    /// The extracted JSON the value was decoded from
    pub extracted: Extracted,
    /// Token usage summed over every call
    pub token_usage: TokenUsage,
    /// Model calls made
    pub attempts: u32,
}

impl<T> Generated<T> {
    /// The raw JSON value.
    pub fn json(&self) -> &Value {
        &self.extracted.value
    }
}
