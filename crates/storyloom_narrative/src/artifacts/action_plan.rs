//! Scene action plans: the ordered beats a scene is broken into.

use crate::artifacts::{KeyframeBrief, step_state_shape};
use crate::{Artifact, ArtifactContext};
use serde::{Deserialize, Serialize};
use storyloom_core::{CharacterState, StepState, ValidationIssue};
use storyloom_validation::{
    ChangeAllowance, ObjectShape, Shape, ValidatorSet, check_carry_over, check_duplicates,
};

/// Prompt store key of the planning system prompt.
pub const ACTION_PLAN_SYSTEM_KEY: &str = "action_plan.system";

/// Prompt store key of the planning repair prompt.
pub const ACTION_PLAN_REPAIR_KEY: &str = "action_plan.repair";

/// What a scene is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneBrief {
    /// Scene identifier the plan must echo
    pub scene_id: String,
    /// Free-form synopsis
    pub synopsis: String,
}

impl SceneBrief {
    /// User prompt asking for an action plan.
    pub fn render_prompt(&self) -> String {
        format!(
            "Scene {}:\n{}\n\nBreak the scene into ordered beats. Give every beat a unique \
             beat_id and its start, mid and end states. Each beat's start_state must match the \
             previous beat's end_state.",
            self.scene_id, self.synopsis
        )
    }
}

/// One beat of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanBeat {
    /// Beat identifier, unique within the plan
    pub beat_id: String,
    /// One-line summary
    pub beat_summary: String,
    /// Dramatic intent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beat_intent: Option<String>,
    /// State at the first moment
    pub start_state: StepState,
    /// State midway
    pub mid_state: StepState,
    /// State at the last moment
    pub end_state: StepState,
    /// Extra continuity rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub continuity_rules: Vec<String>,
    /// How keyframes should be produced for this beat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyframe_mode: Option<String>,
    /// Number of keyframes requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyframe_count: Option<u32>,
}

impl PlanBeat {
    /// The brief a keyframe group for this beat is generated from.
    pub fn keyframe_brief(&self) -> KeyframeBrief {
        KeyframeBrief {
            beat_id: self.beat_id.clone(),
            beat_summary: self.beat_summary.clone(),
            beat_intent: self.beat_intent.clone(),
            start_state: self.start_state.clone(),
            mid_state: self.mid_state.clone(),
            end_state: self.end_state.clone(),
            continuity_rules: self.continuity_rules.clone(),
        }
    }
}

/// A scene broken into beats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// Scene identifier
    pub scene_id: String,
    /// Summary of the whole scene
    pub scene_summary: String,
    /// Ordered beats
    pub beats: Vec<PlanBeat>,
}

impl ActionPlan {
    /// `(unit id, brief)` pairs for a keyframe sequence, one per beat.
    pub fn unit_briefs(&self) -> Vec<(String, KeyframeBrief)> {
        self.beats
            .iter()
            .map(|beat| (beat.beat_id.clone(), beat.keyframe_brief()))
            .collect()
    }
}

/// Characters present on both sides, reduced to the fields a plan must carry.
fn shared_characters(from: &StepState, to: &StepState) -> (StepState, StepState) {
    let reduce = |c: &CharacterState| {
        CharacterState::new(c.name.clone())
            .location(c.location.clone())
            .stance(c.stance.clone())
            .facing(c.facing.clone())
            .props_in_hand(c.props_in_hand.clone())
    };
    let (mut before, mut after) = (StepState::default(), StepState::default());
    for character in &from.characters {
        if let Some(counterpart) = to.character(&character.name) {
            before.characters.push(reduce(character));
            after.characters.push(reduce(counterpart));
        }
    }
    (before, after)
}

fn beat_continuity_issues(plan: &ActionPlan) -> Vec<ValidationIssue> {
    plan.beats
        .windows(2)
        .enumerate()
        .flat_map(|(i, pair)| {
            let (before, after) = shared_characters(&pair[0].end_state, &pair[1].start_state);
            check_carry_over(
                &before,
                &after,
                &ChangeAllowance::none(),
                &format!("beats.{}.start_state", i + 1),
            )
        })
        .collect()
}

impl Artifact for ActionPlan {
    const NAME: &'static str = "action_plan";

    fn shape() -> Shape {
        let beat = ObjectShape::permissive()
            .required("beat_id", Shape::non_empty_string())
            .required("beat_summary", Shape::non_empty_string())
            .optional("beat_intent", Shape::string())
            .required("start_state", step_state_shape())
            .required("mid_state", step_state_shape())
            .required("end_state", step_state_shape())
            .optional("continuity_rules", Shape::array(Shape::string(), 0, None))
            .optional("keyframe_mode", Shape::string())
            .optional("keyframe_count", Shape::integer_range(Some(1), None));
        ObjectShape::strict()
            .required("scene_id", Shape::non_empty_string())
            .required("scene_summary", Shape::non_empty_string())
            .required("beats", Shape::array(beat, 1, None))
            .into()
    }

    fn validators(ctx: &ArtifactContext) -> ValidatorSet<Self> {
        let scene_id = ctx.brief_str("scene_id").map(str::to_string);
        ValidatorSet::new()
            .with_fn("scene_id", move |plan: &ActionPlan| match &scene_id {
                Some(expected) if *expected != plan.scene_id => vec![ValidationIssue::new(
                    "scene_id",
                    format!("must be \"{}\" (found \"{}\")", expected, plan.scene_id),
                )],
                _ => Vec::new(),
            })
            .with_fn("duplicate_beats", |plan: &ActionPlan| {
                let items: Vec<(String, &str)> = plan
                    .beats
                    .iter()
                    .enumerate()
                    .map(|(i, beat)| (format!("beats.{}.beat_id", i), beat.beat_id.as_str()))
                    .collect();
                check_duplicates(&items)
            })
            .with_fn("beat_continuity", beat_continuity_issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use storyloom_validation::{PhraseMatcher, default_phrase_sets};

    fn ctx() -> ArtifactContext {
        let phrases = Arc::new(PhraseMatcher::new(&default_phrase_sets()).unwrap());
        ArtifactContext::new(phrases, 3).with_brief(json!({ "scene_id": "s1", "synopsis": "x" }))
    }

    fn state(location: &str) -> Value {
        json!({ "characters": [{ "name": "Mira", "location": location, "emotion": "calm" }] })
    }

    fn beat(id: &str, start: &str, end: &str) -> Value {
        json!({
            "beat_id": id,
            "beat_summary": format!("beat {}", id),
            "start_state": state(start),
            "mid_state": state(start),
            "end_state": state(end)
        })
    }

    fn plan(beats: Vec<Value>) -> Value {
        json!({ "scene_id": "s1", "scene_summary": "Mira leaves the harbor", "beats": beats })
    }

    #[test]
    fn test_valid_plan_yields_briefs() {
        let value = plan(vec![beat("b1", "pier", "boat"), beat("b2", "boat", "open sea")]);
        let plan = ActionPlan::check(&value, &ctx()).unwrap();
        let briefs = plan.unit_briefs();
        assert_eq!(briefs.len(), 2);
        assert_eq!(briefs[1].0, "b2");
        assert_eq!(briefs[1].1.start_state.characters[0].location, "boat");
    }

    #[test]
    fn test_beat_boundary_mismatch() {
        let value = plan(vec![beat("b1", "pier", "boat"), beat("b2", "pier", "open sea")]);
        let err = ActionPlan::check(&value, &ctx()).unwrap_err();
        assert_eq!(err.issues().len(), 1);
        assert_eq!(err.issues()[0].path(), "beats.1.start_state.characters.Mira.location");
    }

    #[test]
    fn test_emotion_and_new_characters_may_change() {
        let mut second = beat("b2", "boat", "open sea");
        second["start_state"]["characters"][0]["emotion"] = json!("afraid");
        second["start_state"]["characters"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "name": "Owen", "location": "boat" }));
        let value = plan(vec![beat("b1", "pier", "boat"), second]);
        assert!(ActionPlan::check(&value, &ctx()).is_ok());
    }

    #[test]
    fn test_duplicate_beat_ids() {
        let value = plan(vec![beat("b1", "pier", "pier"), beat("B1", "pier", "pier")]);
        let err = ActionPlan::check(&value, &ctx()).unwrap_err();
        assert_eq!(err.issues()[0].path(), "beats.1.beat_id");
    }

    #[test]
    fn test_top_level_is_strict() {
        let mut value = plan(vec![beat("b1", "pier", "boat")]);
        value["notes"] = json!("extra");
        let err = ActionPlan::check(&value, &ctx()).unwrap_err();
        assert_eq!(err.issues()[0].path(), "notes");
    }

    #[test]
    fn test_empty_plan_is_rejected() {
        let err = ActionPlan::check(&plan(vec![]), &ctx()).unwrap_err();
        assert_eq!(err.issues()[0].path(), "beats");
    }
}
