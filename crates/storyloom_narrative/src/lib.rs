//! Generation orchestration and sequence driving for Storyloom.
//!
//! This crate turns free-form model output into typed, validated artifacts
//! and chains them into sequences whose units agree at every boundary.
//!
//! # Features
//!
//! - **Generation orchestrator**: bounded generate, validate, repair loop
//! - **Sequence driver**: ordered units with continuity carry-over and narrow repair
//! - **Typed artifacts**: action plans, keyframe groups, storyboard groups
//! - **Progress repositories**: versioned in-memory and file-backed persistence
//! - **Layered configuration**: bundled defaults, home directory, working directory
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storyloom_narrative::{
//!     InMemoryPromptStore, Sequence, SequenceDriver, StoryboardGroup, StoryloomConfig,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(client: impl storyloom_interface::ModelClient, briefs: Vec<(String, storyloom_narrative::StoryboardBrief)>) -> storyloom_error::StoryloomResult<()> {
//! let config = StoryloomConfig::load()?;
//! let prompts = Arc::new(InMemoryPromptStore::new()
//!     .with("storyboard_group.system", "You draw storyboards.")
//!     .with("storyboard_group.repair", "You fix storyboards.")
//!     .with("storyboard_group.continuity", "You fix continuity."));
//! let driver = SequenceDriver::new(client, prompts, &config)?;
//!
//! let mut sequence = Sequence::<StoryboardGroup>::new(briefs)?;
//! let report = driver.run(&mut sequence, None, &CancellationToken::new()).await?;
//! println!("{} units generated, status {}", report.units_generated, report.status);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod artifact;
mod artifacts;
mod config;
mod driver;
mod orchestrator;
mod progress;
mod prompts;
mod repair;
mod request;
mod sequence;

pub use artifact::{Artifact, ArtifactContext, SequenceUnit};
pub use artifacts::{
    ACTION_PLAN_REPAIR_KEY, ACTION_PLAN_SYSTEM_KEY, ActionPlan, CameraSpec, FrameSpec,
    GroupContinuity, Keyframe, KeyframeBrief, KeyframeFrames, KeyframeGroup, Panel, PanelCamera,
    PlanBeat, PropSnapshot, SceneBrief, StoryboardBrief, StoryboardGroup, SubjectSpec,
    step_state_shape,
};
pub use config::{GenerationSettings, StoryloomConfig};
pub use driver::{RunReport, SequenceDriver};
pub use orchestrator::{GenerationOrchestrator, IgnorePhases, PhaseObserver, evaluate};
pub use progress::{FileProgressRepository, InMemoryProgressRepository};
pub use prompts::{InMemoryPromptStore, render_unit_context};
pub use repair::{ContinuityRepairPrompt, RepairPromptBuilder, StandardRepairPrompt};
pub use request::{Generated, GenerationRequest, GenerationRequestBuilder};
pub use sequence::{Sequence, Unit};
