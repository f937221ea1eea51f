//! Chat message type sent to model clients.

use crate::Role;
use serde::{Deserialize, Serialize};

/// A single message in a model conversation.
///
/// # Examples
///
/// ```
/// use storyloom_core::{ChatMessage, ChatMessageBuilder, Role};
///
/// let message = ChatMessageBuilder::default()
///     .role(Role::User)
///     .content("Describe the opening beat.")
///     .build()
///     .unwrap();
///
/// assert_eq!(message, ChatMessage::user("Describe the opening beat."));
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct ChatMessage {
    /// The role of the message author
    pub role: Role,
    /// Plain text content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
