//! Storyloom - self-correcting structured generation.
//!
//! Storyloom asks a language model for JSON artifacts (action plans, keyframe
//! groups, storyboard groups), validates every reply against a structural
//! shape and a set of semantic rules, and repairs failures with a bounded
//! number of follow-up calls. Artifacts are chained into sequences whose
//! units must agree with each other at every boundary.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storyloom::{
//!     InMemoryPromptStore, SceneBrief, SequenceDriver, StoryloomConfig, TracingFormat,
//!     init_tracing,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(client: impl storyloom::ModelClient) -> storyloom::StoryloomResult<()> {
//! init_tracing(TracingFormat::Pretty).ok();
//! let config = StoryloomConfig::load()?;
//! let prompts = Arc::new(InMemoryPromptStore::new()
//!     .with("action_plan.system", "You plan scenes.")
//!     .with("action_plan.repair", "You fix scene plans."));
//! let driver = SequenceDriver::new(client, prompts, &config)?;
//!
//! let brief = SceneBrief {
//!     scene_id: "scene-1".to_string(),
//!     synopsis: "Mira finds the lighthouse key.".to_string(),
//! };
//! let plan = driver.plan_scene(&brief, &CancellationToken::new()).await?;
//! println!("{} beats", plan.value.beats.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `storyloom_error` - Error types
//! - `storyloom_core` - Plain data: messages, usage, issues, step states, progress
//! - `storyloom_interface` - `ModelClient`, `PromptStore` and `ProgressRepository` traits
//! - `storyloom_validation` - Text extraction, shapes and semantic validators
//! - `storyloom_narrative` - Orchestrator, sequence driver, artifacts, repositories
//!
//! This crate re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod telemetry;

pub use telemetry::{TracingFormat, TryInitError, init_tracing};

pub use storyloom_error::{
    BackendError, BuilderError, BuilderErrorKind, ConfigError, ExtractionError,
    ExtractionErrorKind, GenerationError, GenerationErrorKind, JsonError, ProgressError,
    ProgressErrorKind, SequenceError, SequenceErrorKind, StoryloomError, StoryloomErrorKind,
    StoryloomResult,
};

pub use storyloom_core::{
    CharacterState, ChatConfig, ChatMessage, ChatMessageBuilder, ChatResponse, HandContents,
    IssueList, ProgressDocument, PropState, ResponseFormat, Role, SequenceStatus, StepState,
    TokenUsage, UnitRecord, UnitStatus, ValidationIssue, format_issues, normalize_text,
};

pub use storyloom_interface::{ModelClient, ProgressRepository, PromptStore};

pub use storyloom_validation::{
    AttributeSet, ChangeAllowance, Extracted, Field, FnValidator, FrameSubject, JsonKind,
    ObjectShape, PhraseMatch, PhraseMatcher, PhraseSet, SemanticValidator, Shape, Strictness,
    ValidatorSet, check_carry_over, check_duplicates, check_secondary, check_transition,
    default_phrase_sets, diff_score, extract_json, repair_json, validate_typed,
};

pub use storyloom_narrative::{
    ACTION_PLAN_REPAIR_KEY, ACTION_PLAN_SYSTEM_KEY, ActionPlan, Artifact, ArtifactContext,
    CameraSpec, ContinuityRepairPrompt, FileProgressRepository, FrameSpec, Generated,
    GenerationOrchestrator, GenerationRequest, GenerationRequestBuilder, GenerationSettings,
    GroupContinuity, IgnorePhases, InMemoryProgressRepository, InMemoryPromptStore, Keyframe,
    KeyframeBrief,
    KeyframeFrames, KeyframeGroup, Panel, PanelCamera, PhaseObserver, PlanBeat, PropSnapshot,
    RepairPromptBuilder,
    RunReport, SceneBrief, Sequence, SequenceDriver, SequenceUnit, StandardRepairPrompt,
    StoryboardBrief, StoryboardGroup, StoryloomConfig, SubjectSpec, Unit, evaluate,
    render_unit_context, step_state_shape,
};
