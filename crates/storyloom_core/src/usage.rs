//! Token accounting.

use serde::{Deserialize, Serialize};

/// Token usage for one or more model calls.
///
/// Usage is merged additively across every call made on behalf of a unit,
/// including repair calls.
///
/// # Examples
///
/// ```
/// use storyloom_core::TokenUsage;
///
/// let mut total = TokenUsage::new(100, 20);
/// total += TokenUsage::new(50, 10);
/// assert_eq!(total, TokenUsage { prompt: 150, completion: 30, total: 180 });
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::AddAssign,
)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt: u64,
    /// Tokens in the completion
    pub completion: u64,
    /// Total tokens as reported by the provider
    pub total: u64,
}

impl TokenUsage {
    /// Create a usage record whose total is prompt + completion.
    pub fn new(prompt: u64, completion: u64) -> Self {
        Self {
            prompt,
            completion,
            total: prompt + completion,
        }
    }

    /// Add an optional usage record, treating `None` as zero.
    pub fn absorb(&mut self, other: Option<TokenUsage>) {
        if let Some(other) = other {
            *self += other;
        }
    }
}
