//! Typed artifacts and the units a sequence is made of.

use crate::evaluate;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use storyloom_core::{StepState, ValidationIssue};
use storyloom_error::GenerationError;
use storyloom_validation::{
    AttributeSet, ChangeAllowance, PhraseMatcher, Shape, ValidatorSet, check_carry_over,
};

/// What semantic validators may consult besides the value itself.
#[derive(Debug, Clone)]
pub struct ArtifactContext {
    /// The brief the unit was generated from
    pub brief: Value,
    /// Sequence-wide settings (e.g. `camera_mode`)
    pub settings: Value,
    /// Minimum differentiation score between adjacent frames
    pub min_frame_difference: u32,
    /// Forbidden-phrase matcher
    pub phrases: Arc<PhraseMatcher>,
}

impl ArtifactContext {
    /// Create a context with an empty brief and settings.
    pub fn new(phrases: Arc<PhraseMatcher>, min_frame_difference: u32) -> Self {
        Self {
            brief: Value::Null,
            settings: Value::Null,
            min_frame_difference,
            phrases,
        }
    }

    /// Replace the brief.
    pub fn with_brief(mut self, brief: Value) -> Self {
        self.brief = brief;
        self
    }

    /// Replace the settings.
    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    /// A string field of the brief.
    pub fn brief_str(&self, key: &str) -> Option<&str> {
        self.brief.get(key).and_then(Value::as_str)
    }

    /// Storyboard camera mode from the settings, `B` unless set to `A`.
    pub fn camera_mode(&self) -> &str {
        match self.settings.get("camera_mode").and_then(Value::as_str) {
            Some(mode) if mode.eq_ignore_ascii_case("a") => "A",
            _ => "B",
        }
    }
}

/// A JSON artifact with a declared shape and semantic checks.
pub trait Artifact: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name used for the structured-output hint and logs.
    const NAME: &'static str;

    /// Structural descriptor.
    fn shape() -> Shape;

    /// Semantic validators for this artifact in `ctx`.
    fn validators(ctx: &ArtifactContext) -> ValidatorSet<Self>;

    /// Check a parsed value the same way the orchestrator does.
    ///
    /// Re-checking an accepted value yields the same value again.
    fn check(value: &Value, ctx: &ArtifactContext) -> Result<Self, GenerationError> {
        evaluate(&Self::shape(), &Self::validators(ctx), value)
    }
}

/// An artifact generated as one step of a sequence.
///
/// Besides its own checks, a unit exposes the state at its first and last
/// moment, the narrow *fragment* that carries its start state, and the
/// secondary attributes it should keep stable from its predecessor.
pub trait SequenceUnit: Artifact {
    /// Per-unit input the prompt is rendered from.
    type Brief: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// The part of the unit a continuity repair may rewrite.
    type Fragment: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Prompt store key of the generation system prompt.
    const SYSTEM_PROMPT_KEY: &'static str;

    /// Prompt store key of the repair system prompt.
    const REPAIR_PROMPT_KEY: &'static str;

    /// Prompt store key of the continuity repair system prompt.
    const CONTINUITY_PROMPT_KEY: &'static str;

    /// Path prefix under which continuity issues are reported.
    const FRAGMENT_SCOPE: &'static str;

    /// User prompt for a unit: its brief plus the previous end state.
    fn render_prompt(
        brief: &Self::Brief,
        prev_end: Option<&StepState>,
        running_summary: Option<&str>,
    ) -> String;

    /// State at the unit's first moment.
    fn start_state(&self) -> StepState;

    /// State at the unit's last moment.
    fn end_state(&self) -> StepState;

    /// Changes the unit's content explains (`entity.field` / `entity.*`).
    fn declared_changes(&self) -> Vec<String> {
        Vec::new()
    }

    /// The start fragment.
    fn start_fragment(&self) -> Self::Fragment;

    /// A copy of the unit with its start fragment replaced.
    fn with_start_fragment(&self, fragment: Self::Fragment) -> Self;

    /// Structural descriptor of the fragment.
    fn fragment_shape() -> Shape;

    /// Secondary attributes to keep stable across units.
    fn secondary_attributes(&self) -> AttributeSet {
        AttributeSet::new()
    }

    /// A line for the running summary once the unit is accepted.
    fn summary_line(&self) -> Option<String> {
        None
    }

    /// Continuity issues between `prev_end` and this unit's start.
    fn continuity_issues(&self, prev_end: &StepState) -> Vec<ValidationIssue> {
        check_carry_over(
            prev_end,
            &self.start_state(),
            &ChangeAllowance::from_declared(&self.declared_changes()),
            Self::FRAGMENT_SCOPE,
        )
    }
}
