//! Core data types for the Storyloom structured-generation pipeline.
//!
//! This crate holds the plain data shared by every other Storyloom crate:
//! chat messages, token accounting, validation issues, continuity state and
//! the persisted progress document. It has no knowledge of model providers,
//! validation rules or persistence engines.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod chat;
mod issue;
mod message;
mod progress;
mod role;
mod state;
mod status;
mod text;
mod usage;

pub use chat::{ChatConfig, ChatResponse, ResponseFormat};
pub use issue::{IssueList, ValidationIssue, format_issues};
pub use message::{ChatMessage, ChatMessageBuilder};
pub use progress::{ProgressDocument, UnitRecord};
pub use role::Role;
pub use state::{CharacterState, HandContents, PropState, StepState};
pub use status::{SequenceStatus, UnitStatus};
pub use text::normalize_text;
pub use usage::TokenUsage;
