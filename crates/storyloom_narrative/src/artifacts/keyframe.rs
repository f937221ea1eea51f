//! Keyframe groups: start, mid and end frames of one beat.
//!
//! Each frame is a still image. Subjects must be described as frozen
//! instants, the three frames must share their background anchors, and
//! adjacent frames must differ enough to read as distinct moments.

use crate::{Artifact, ArtifactContext, SequenceUnit, render_unit_context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use storyloom_core::{CharacterState, HandContents, PropState, StepState, ValidationIssue, normalize_text};
use storyloom_validation::{
    AttributeSet, FrameSubject, ObjectShape, Shape, ValidatorSet, check_transition,
};

/// What the driver asks a keyframe group to depict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyframeBrief {
    /// Beat identifier the reply must echo
    pub beat_id: String,
    /// One-line summary of the beat
    pub beat_summary: String,
    /// Dramatic intent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beat_intent: Option<String>,
    /// Planned state at the start of the beat
    #[serde(default)]
    pub start_state: StepState,
    /// Planned state midway
    #[serde(default)]
    pub mid_state: StepState,
    /// Planned state at the end
    #[serde(default)]
    pub end_state: StepState,
    /// Extra continuity rules from the plan
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub continuity_rules: Vec<String>,
}

/// Camera parameters shared by the three frames.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CameraSpec {
    /// Shot size
    #[serde(default)]
    pub shot_size: String,
    /// Camera angle
    #[serde(default)]
    pub angle: String,
    /// Lens hint
    #[serde(default)]
    pub lens_hint: String,
    /// Aspect ratio
    #[serde(default)]
    pub aspect_ratio: String,
}

/// A prop as it appears in a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropSnapshot {
    /// Prop name
    pub name: String,
    /// Visible state
    #[serde(default)]
    pub state: String,
}

/// One subject in a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSpec {
    /// Character identifier
    pub character_id: String,
    /// Where in the frame
    #[serde(default)]
    pub position_in_frame: String,
    /// Body orientation
    #[serde(default)]
    pub body_orientation: String,
    /// Pose
    #[serde(default)]
    pub pose: String,
    /// The frozen action
    pub action_snapshot: String,
    /// Facial expression
    #[serde(default)]
    pub expression: String,
    /// Gaze direction
    #[serde(default)]
    pub gaze: String,
    /// Hand contents
    #[serde(default)]
    pub hands: HandContents,
    /// Props on or near the subject
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<PropSnapshot>,
}

impl FrameSubject for SubjectSpec {
    fn subject_key(&self) -> String {
        self.character_id.clone()
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut props: Vec<String> = self
            .props
            .iter()
            .map(|p| format!("{}:{}", normalize_text(&p.name), normalize_text(&p.state)))
            .collect();
        props.sort();
        vec![
            ("position_in_frame", self.position_in_frame.clone()),
            ("body_orientation", self.body_orientation.clone()),
            ("pose", self.pose.clone()),
            ("action_snapshot", self.action_snapshot.clone()),
            ("expression", self.expression.clone()),
            ("gaze", self.gaze.clone()),
            ("hands.left", self.hands.left.clone().unwrap_or_default()),
            ("hands.right", self.hands.right.clone().unwrap_or_default()),
            ("props", props.join(", ")),
        ]
    }
}

/// The content of one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSpec {
    /// Background anchors visible in the frame
    pub used_anchors: Vec<String>,
    /// Subjects in the frame
    pub subjects: Vec<SubjectSpec>,
    /// Composition notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<String>,
    /// Where speech bubbles may go
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bubble_space: Option<String>,
}

impl FrameSpec {
    /// The frame read as a continuity state.
    ///
    /// Each subject becomes a character whose location is its position in
    /// frame, stance its pose, facing its body orientation and emotion its
    /// expression. Props are held by the subject carrying them.
    pub fn to_step_state(&self) -> StepState {
        let characters = self
            .subjects
            .iter()
            .map(|s| {
                CharacterState::new(s.character_id.clone())
                    .location(s.position_in_frame.clone())
                    .stance(s.pose.clone())
                    .facing(s.body_orientation.clone())
                    .emotion(s.expression.clone())
                    .props_in_hand(s.hands.clone())
            })
            .collect();
        let props = self
            .subjects
            .iter()
            .flat_map(|s| {
                s.props
                    .iter()
                    .map(|p| PropState::new(p.name.clone(), p.state.clone(), Some(s.character_id.as_str())))
            })
            .collect();
        StepState {
            characters,
            props,
            next_intent_hint: String::new(),
        }
    }

    fn anchor_set(&self) -> BTreeSet<String> {
        self.used_anchors
            .iter()
            .map(|a| normalize_text(a))
            .filter(|a| !a.is_empty())
            .collect()
    }
}

/// A frame wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Frame content
    pub frame_spec: FrameSpec,
}

/// The three frames of a beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyframeFrames {
    /// First moment
    pub start: Keyframe,
    /// Middle moment
    pub mid: Keyframe,
    /// Last moment
    pub end: Keyframe,
}

impl KeyframeFrames {
    fn labelled(&self) -> [(&'static str, &FrameSpec); 3] {
        [
            ("start", &self.start.frame_spec),
            ("mid", &self.mid.frame_spec),
            ("end", &self.end.frame_spec),
        ]
    }
}

/// Keyframes for one beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyframeGroup {
    /// Beat identifier
    pub beat_id: String,
    /// Shared camera
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraSpec>,
    /// The frames
    pub frames: KeyframeFrames,
    /// Negative prompt for the renderer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<String>,
    /// Changes explained relative to the previous beat
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declared_changes: Vec<String>,
}

fn frame_spec_shape() -> Shape {
    let hands = ObjectShape::permissive()
        .optional("left", Shape::nullable(Shape::string()))
        .optional("right", Shape::nullable(Shape::string()));
    let prop = ObjectShape::permissive()
        .required("name", Shape::non_empty_string())
        .optional("state", Shape::string());
    let subject = ObjectShape::permissive()
        .required("character_id", Shape::non_empty_string())
        .optional("position_in_frame", Shape::string())
        .optional("body_orientation", Shape::string())
        .optional("pose", Shape::string())
        .required("action_snapshot", Shape::non_empty_string())
        .optional("expression", Shape::string())
        .optional("gaze", Shape::string())
        .optional("hands", hands)
        .optional("props", Shape::array(prop, 0, None));
    ObjectShape::permissive()
        .required("used_anchors", Shape::array(Shape::non_empty_string(), 1, None))
        .required("subjects", Shape::array(subject, 1, None))
        .optional("composition", Shape::string())
        .optional("bubble_space", Shape::string())
        .into()
}

fn phrase_issues(group: &KeyframeGroup, ctx: &ArtifactContext) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (label, frame) in group.frames.labelled() {
        for (index, subject) in frame.subjects.iter().enumerate() {
            let path = format!("frames.{}.frame_spec.subjects.{}.action_snapshot", label, index);
            issues.extend(ctx.phrases.check(&path, &subject.action_snapshot));
        }
    }
    issues
}

fn anchor_issues(group: &KeyframeGroup) -> Vec<ValidationIssue> {
    let frames = group.frames.labelled();
    let reference = frames[0].1.anchor_set();
    let differing: Vec<&str> = frames[1..]
        .iter()
        .filter(|(_, frame)| frame.anchor_set() != reference)
        .map(|(label, _)| *label)
        .collect();
    if differing.is_empty() {
        return Vec::new();
    }
    vec![ValidationIssue::new(
        "frames.*.frame_spec.used_anchors",
        format!(
            "must be the same set in start, mid and end (differs in: {})",
            differing.join(", ")
        ),
    )]
}

fn differentiation_issues(group: &KeyframeGroup, threshold: u32) -> Vec<ValidationIssue> {
    let frames = &group.frames;
    [
        ("frames.start->mid", &frames.start.frame_spec, &frames.mid.frame_spec),
        ("frames.mid->end", &frames.mid.frame_spec, &frames.end.frame_spec),
    ]
    .into_iter()
    .filter_map(|(path, from, to)| check_transition(path, &from.subjects, &to.subjects, threshold))
    .collect()
}

impl Artifact for KeyframeGroup {
    const NAME: &'static str = "keyframe_group";

    fn shape() -> Shape {
        let frame = ObjectShape::permissive().required("frame_spec", frame_spec_shape());
        let frames = ObjectShape::strict()
            .required("start", frame.clone())
            .required("mid", frame.clone())
            .required("end", frame);
        let camera = ObjectShape::permissive()
            .optional("shot_size", Shape::string())
            .optional("angle", Shape::string())
            .optional("lens_hint", Shape::string())
            .optional("aspect_ratio", Shape::string());
        ObjectShape::permissive()
            .required("beat_id", Shape::non_empty_string())
            .optional("camera", camera)
            .required("frames", frames)
            .optional("negative", Shape::string())
            .optional("declared_changes", Shape::array(Shape::string(), 0, None))
            .into()
    }

    fn validators(ctx: &ArtifactContext) -> ValidatorSet<Self> {
        let phrase_ctx = ctx.clone();
        let threshold = ctx.min_frame_difference;
        let beat_id = ctx.brief_str("beat_id").map(str::to_string);
        ValidatorSet::new()
            .with_fn("beat_id", move |group: &KeyframeGroup| match &beat_id {
                Some(expected) if *expected != group.beat_id => vec![ValidationIssue::new(
                    "beat_id",
                    format!("must be \"{}\" (found \"{}\")", expected, group.beat_id),
                )],
                _ => Vec::new(),
            })
            .with_fn("forbidden_phrases", move |group: &KeyframeGroup| {
                phrase_issues(group, &phrase_ctx)
            })
            .with_fn("anchors", anchor_issues)
            .with_fn("differentiation", move |group: &KeyframeGroup| {
                differentiation_issues(group, threshold)
            })
    }
}

impl SequenceUnit for KeyframeGroup {
    type Brief = KeyframeBrief;
    type Fragment = FrameSpec;

    const SYSTEM_PROMPT_KEY: &'static str = "keyframe_group.system";
    const REPAIR_PROMPT_KEY: &'static str = "keyframe_group.repair";
    const CONTINUITY_PROMPT_KEY: &'static str = "keyframe_group.continuity";
    const FRAGMENT_SCOPE: &'static str = "frames.start.frame_spec";

    fn render_prompt(
        brief: &KeyframeBrief,
        prev_end: Option<&StepState>,
        running_summary: Option<&str>,
    ) -> String {
        format!(
            "{}\n\nDescribe beat {} as three keyframes (start, mid, end). Every \
             action_snapshot is one frozen instant. Keep the same background anchors in \
             all three frames and make each frame visibly different from the last.",
            render_unit_context(brief, prev_end, running_summary),
            brief.beat_id
        )
    }

    fn start_state(&self) -> StepState {
        self.frames.start.frame_spec.to_step_state()
    }

    fn end_state(&self) -> StepState {
        self.frames.end.frame_spec.to_step_state()
    }

    fn declared_changes(&self) -> Vec<String> {
        self.declared_changes.clone()
    }

    fn start_fragment(&self) -> FrameSpec {
        self.frames.start.frame_spec.clone()
    }

    fn with_start_fragment(&self, fragment: FrameSpec) -> Self {
        let mut group = self.clone();
        group.frames.start.frame_spec = fragment;
        group
    }

    fn fragment_shape() -> Shape {
        frame_spec_shape()
    }

    fn secondary_attributes(&self) -> AttributeSet {
        let camera = self.camera.clone().unwrap_or_default();
        AttributeSet::new()
            .with("camera.shot_size", camera.shot_size)
            .with("camera.angle", camera.angle)
            .with("camera.lens_hint", camera.lens_hint)
            .with("camera.aspect_ratio", camera.aspect_ratio)
            .with_set("background_anchors", &self.frames.start.frame_spec.used_anchors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use storyloom_validation::{PhraseMatcher, check_secondary, default_phrase_sets};

    fn ctx() -> ArtifactContext {
        let phrases = Arc::new(PhraseMatcher::new(&default_phrase_sets()).unwrap());
        ArtifactContext::new(phrases, 3).with_brief(json!({ "beat_id": "b1" }))
    }

    fn subject(pose: &str, action: &str, gaze: &str, expression: &str) -> Value {
        json!({
            "character_id": "mira",
            "position_in_frame": "left third",
            "body_orientation": "three-quarter left",
            "pose": pose,
            "action_snapshot": action,
            "expression": expression,
            "gaze": gaze,
            "hands": { "left": "lantern", "right": null }
        })
    }

    fn group(start: Value, mid: Value, end: Value) -> Value {
        let frame = |s: Value| json!({ "frame_spec": { "used_anchors": ["pier", "lighthouse"], "subjects": [s] } });
        json!({
            "beat_id": "b1",
            "camera": { "shot_size": "MS", "angle": "eye", "lens_hint": "35mm", "aspect_ratio": "16:9" },
            "frames": { "start": frame(start), "mid": frame(mid), "end": frame(end) }
        })
    }

    fn valid() -> Value {
        group(
            subject("standing", "hand on the rail", "sea", "calm"),
            subject("leaning", "lantern raised high", "horizon", "alert"),
            subject("crouching", "lantern set on planks", "deck", "tired"),
        )
    }

    #[test]
    fn test_valid_group() {
        let group = KeyframeGroup::check(&valid(), &ctx()).unwrap();
        assert_eq!(group.beat_id, "b1");
        assert_eq!(group.start_state().characters[0].stance, "standing");
        assert_eq!(group.end_state().characters[0].stance, "crouching");
    }

    #[test]
    fn test_identical_frames_fail_differentiation() {
        let s = subject("standing", "hand on the rail", "sea", "calm");
        let value = group(s.clone(), s.clone(), s);
        let err = KeyframeGroup::check(&value, &ctx()).unwrap_err();
        let paths: Vec<&str> = err.issues().iter().map(|i| i.path().as_str()).collect();
        assert_eq!(paths, vec!["frames.start->mid", "frames.mid->end"]);
    }

    #[test]
    fn test_forbidden_phrase_path() {
        let value = group(
            subject("standing", "hand on the rail", "sea", "calm"),
            subject("leaning", "slowly raises the lantern", "horizon", "alert"),
            subject("crouching", "lantern set on planks", "deck", "tired"),
        );
        let err = KeyframeGroup::check(&value, &ctx()).unwrap_err();
        assert_eq!(err.issues().len(), 1);
        assert_eq!(
            err.issues()[0].path(),
            "frames.mid.frame_spec.subjects.0.action_snapshot"
        );
    }

    #[test]
    fn test_anchor_sets_must_match() {
        let mut value = valid();
        value["frames"]["end"]["frame_spec"]["used_anchors"] = json!(["pier"]);
        let err = KeyframeGroup::check(&value, &ctx()).unwrap_err();
        assert_eq!(err.issues()[0].path(), "frames.*.frame_spec.used_anchors");
        assert!(err.issues()[0].message().contains("end"));
    }

    #[test]
    fn test_anchor_order_does_not_matter() {
        let mut value = valid();
        value["frames"]["mid"]["frame_spec"]["used_anchors"] = json!(["Lighthouse", "pier"]);
        assert!(KeyframeGroup::check(&value, &ctx()).is_ok());
    }

    #[test]
    fn test_frames_are_strict() {
        let mut value = valid();
        value["frames"]["extra"] = value["frames"]["mid"].clone();
        let err = KeyframeGroup::check(&value, &ctx()).unwrap_err();
        assert_eq!(err.issues()[0].path(), "frames.extra");
    }

    #[test]
    fn test_secondary_attributes_compare_camera() {
        let a = KeyframeGroup::check(&valid(), &ctx()).unwrap();
        let mut b = a.clone();
        b.camera = Some(CameraSpec {
            shot_size: "CU".to_string(),
            ..a.camera.clone().unwrap_or_default()
        });
        let issues = check_secondary(&a.secondary_attributes(), &b.secondary_attributes(), "$");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path(), "camera.shot_size");
    }

    #[test]
    fn test_frame_reads_as_step_state() {
        let group = KeyframeGroup::check(&valid(), &ctx()).unwrap();
        let state = group.start_state();
        let mira = state.character("Mira").unwrap();
        assert_eq!(mira.location, "left third");
        assert_eq!(mira.props_in_hand.left.as_deref(), Some("lantern"));
    }
}
