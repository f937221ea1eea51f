//! Repair prompt builders.
//!
//! A repair prompt quotes the previous reply and the itemized issues back to
//! the model, so it never has to guess what was wrong.

use crate::GenerationRequest;
use storyloom_core::{ChatMessage, StepState, ValidationIssue, format_issues};

/// Builds the conversation for a repair call.
pub trait RepairPromptBuilder: Send + Sync {
    /// Messages asking the model to fix `previous` so `issues` go away.
    fn build(
        &self,
        request: &GenerationRequest,
        previous: &str,
        issues: &[ValidationIssue],
    ) -> Vec<ChatMessage>;
}

/// Repeats the original request, then lists the issues and the previous JSON.
///
/// # Examples
///
/// ```
/// use storyloom_core::ValidationIssue;
/// use storyloom_narrative::{GenerationRequestBuilder, RepairPromptBuilder, StandardRepairPrompt};
/// use storyloom_validation::Shape;
///
/// let request = GenerationRequestBuilder::default()
///     .system_prompt("system")
///     .user_prompt("make a beat")
///     .expected_shape(Shape::any())
///     .build()
///     .unwrap();
/// let issues = vec![ValidationIssue::new("beat_id", "is required")];
///
/// let messages = StandardRepairPrompt::default().build(&request, "{}", &issues);
/// assert_eq!(messages.len(), 2);
/// assert!(messages[1].content.contains("- beat_id: is required"));
/// assert!(messages[1].content.contains("{}"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StandardRepairPrompt {
    system_prompt: Option<String>,
}

impl StandardRepairPrompt {
    /// Use `system_prompt` for repair calls instead of the request's.
    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
        }
    }
}

impl RepairPromptBuilder for StandardRepairPrompt {
    fn build(
        &self,
        request: &GenerationRequest,
        previous: &str,
        issues: &[ValidationIssue],
    ) -> Vec<ChatMessage> {
        let system = self
            .system_prompt
            .clone()
            .unwrap_or_else(|| request.system_prompt().clone());
        let user = format!(
            "{}\n\nYour previous reply failed validation. Fix every issue listed below and \
             return the complete corrected JSON only. Leave everything the issues do not \
             mention unchanged.\n\nIssues:\n{}\n\nPrevious JSON:\n{}",
            request.user_prompt(),
            format_issues(issues),
            previous
        );
        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }
}

/// The narrow continuity repair prompt.
///
/// Only the previous unit's end state, the offending start fragment and the
/// continuity issues are sent; the rest of the unit is never shown.
#[derive(Debug, Clone)]
pub struct ContinuityRepairPrompt {
    system_prompt: String,
    prev_end: String,
}

impl ContinuityRepairPrompt {
    /// Create a prompt builder for a boundary.
    pub fn new(system_prompt: impl Into<String>, prev_end: &StepState) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            prev_end: serde_json::to_string_pretty(prev_end).unwrap_or_else(|_| "{}".to_string()),
        }
    }

    /// The system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The user message for a fragment and its issues.
    pub fn render(&self, fragment: &str, issues: &[ValidationIssue]) -> String {
        format!(
            "The previous unit ends in this state:\n{}\n\n\
             The next unit currently starts with this fragment:\n{}\n\n\
             Continuity issues:\n{}\n\n\
             Return only the corrected fragment as JSON, with the same structure. \
             Change nothing except what the issues require.",
            self.prev_end,
            fragment,
            format_issues(issues)
        )
    }
}

impl RepairPromptBuilder for ContinuityRepairPrompt {
    fn build(
        &self,
        _request: &GenerationRequest,
        previous: &str,
        issues: &[ValidationIssue],
    ) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(self.render(previous, issues)),
        ]
    }
}
