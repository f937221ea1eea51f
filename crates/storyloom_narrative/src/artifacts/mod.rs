//! The artifact types Storyloom generates.

mod action_plan;
mod keyframe;
mod state_shape;
mod storyboard;

pub use action_plan::{
    ACTION_PLAN_REPAIR_KEY, ACTION_PLAN_SYSTEM_KEY, ActionPlan, PlanBeat, SceneBrief,
};
pub use keyframe::{
    CameraSpec, FrameSpec, Keyframe, KeyframeBrief, KeyframeFrames, KeyframeGroup, PropSnapshot,
    SubjectSpec,
};
pub use state_shape::step_state_shape;
pub use storyboard::{GroupContinuity, Panel, PanelCamera, StoryboardBrief, StoryboardGroup};
