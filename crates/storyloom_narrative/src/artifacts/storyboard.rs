//! Storyboard groups: nine panels with continuity states.

use crate::artifacts::step_state_shape;
use crate::{Artifact, ArtifactContext, SequenceUnit, render_unit_context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use storyloom_core::{StepState, ValidationIssue};
use storyloom_validation::{ObjectShape, PhraseMatcher, Shape, ValidatorSet, check_duplicates};

/// Number of panels in every group.
const PANEL_COUNT: usize = 9;

/// What the driver asks a storyboard group to cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryboardBrief {
    /// Group identifier the reply must echo
    pub group_id: String,
    /// Shot range the reply must echo (e.g. `"10-18"`)
    pub shot_range: String,
    /// What happens in this group
    pub goal: String,
}

/// Structured camera description of one panel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PanelCamera {
    /// Shot size (LS, MS, CU, ...)
    #[serde(default)]
    pub shot_size: String,
    /// Camera angle
    #[serde(default)]
    pub angle: String,
    /// Lens
    #[serde(default)]
    pub lens: String,
    /// Camera motion
    #[serde(default)]
    pub motion: String,
}

/// One storyboard panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    /// Position 1..=9
    pub index: u32,
    /// English panel text
    pub en: String,
    /// Chinese panel text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zh: Option<String>,
    /// Structured camera (camera mode B)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<PanelCamera>,
}

/// The boundary states of a group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupContinuity {
    /// State at panel 1
    pub start_state: StepState,
    /// State at panel 9
    pub end_state: StepState,
}

/// A group of nine storyboard panels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryboardGroup {
    /// Group identifier
    pub group_id: String,
    /// Shot range
    pub shot_range: String,
    /// Exactly nine panels
    pub panels: Vec<Panel>,
    /// Boundary states
    pub continuity: GroupContinuity,
    /// Changes the group explains relative to the previous group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declared_changes: Vec<String>,
}

/// Whether `text` opens with a bracketed camera prefix followed by content,
/// as in `[LS|eye|35mm|pan→] Mira at the rail`.
fn has_camera_prefix(text: &str) -> bool {
    let Some(rest) = text.strip_prefix('[') else {
        return false;
    };
    let Some(close) = rest.find(']') else {
        return false;
    };
    if close == 0 {
        return false;
    }
    let after = &rest[close + 1..];
    after.starts_with(char::is_whitespace) && !after.trim().is_empty()
}

fn brief_issues(group: &StoryboardGroup, ctx: &ArtifactContext) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (field, actual) in [("group_id", &group.group_id), ("shot_range", &group.shot_range)] {
        if let Some(expected) = ctx.brief_str(field).filter(|expected| *expected != actual.as_str()) {
            issues.push(ValidationIssue::new(
                field,
                format!("must be \"{}\" (found \"{}\")", expected, actual),
            ));
        }
    }
    issues
}

fn panel_index_issues(group: &StoryboardGroup) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen = BTreeSet::new();
    for (position, panel) in group.panels.iter().enumerate() {
        if !seen.insert(panel.index) {
            issues.push(ValidationIssue::new(
                format!("panels.{}.index", position),
                format!("duplicates panel index {}", panel.index),
            ));
        }
    }
    let missing: Vec<String> = (1..=PANEL_COUNT as u32)
        .filter(|i| !seen.contains(i))
        .map(|i| i.to_string())
        .collect();
    if !missing.is_empty() {
        issues.push(ValidationIssue::new(
            "panels",
            format!("missing panel indices: {}", missing.join(", ")),
        ));
    }
    issues
}

fn camera_issues(group: &StoryboardGroup, mode: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for panel in &group.panels {
        if mode == "A" {
            if !has_camera_prefix(&panel.en) {
                issues.push(ValidationIssue::new(
                    format!("panels.{}.en", panel.index),
                    "must start with a bracketed camera prefix such as [LS|eye|35mm|pan→]",
                ));
            }
            continue;
        }
        let camera = panel.camera.clone().unwrap_or_default();
        for (field, value) in [
            ("shot_size", &camera.shot_size),
            ("angle", &camera.angle),
            ("lens", &camera.lens),
            ("motion", &camera.motion),
        ] {
            if value.trim().is_empty() {
                issues.push(ValidationIssue::new(
                    format!("panels.{}.camera.{}", panel.index, field),
                    "is required in camera mode B",
                ));
            }
        }
    }
    issues
}

fn panel_phrase_issues(group: &StoryboardGroup, phrases: &PhraseMatcher) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for panel in &group.panels {
        issues.extend(phrases.check(&format!("panels.{}.en", panel.index), &panel.en));
        if let Some(zh) = &panel.zh {
            issues.extend(phrases.check(&format!("panels.{}.zh", panel.index), zh));
        }
    }
    issues
}

impl Artifact for StoryboardGroup {
    const NAME: &'static str = "storyboard_group";

    fn shape() -> Shape {
        let camera = ObjectShape::permissive()
            .optional("shot_size", Shape::string())
            .optional("angle", Shape::string())
            .optional("lens", Shape::string())
            .optional("motion", Shape::string());
        let panel = ObjectShape::permissive()
            .required("index", Shape::integer_range(Some(1), Some(PANEL_COUNT as i64)))
            .required("en", Shape::non_empty_string())
            .optional("zh", Shape::string())
            .optional("camera", camera);
        let continuity = ObjectShape::permissive()
            .required("start_state", step_state_shape())
            .required("end_state", step_state_shape());
        ObjectShape::permissive()
            .required("group_id", Shape::non_empty_string())
            .required("shot_range", Shape::non_empty_string())
            .required("panels", Shape::array(panel, PANEL_COUNT, Some(PANEL_COUNT)))
            .required("continuity", continuity)
            .optional("declared_changes", Shape::array(Shape::string(), 0, None))
            .into()
    }

    fn validators(ctx: &ArtifactContext) -> ValidatorSet<Self> {
        let brief_ctx = ctx.clone();
        let mode = ctx.camera_mode().to_string();
        let phrases = ctx.phrases.clone();
        ValidatorSet::new()
            .with_fn("brief_match", move |group: &StoryboardGroup| {
                brief_issues(group, &brief_ctx)
            })
            .with_fn("panel_indices", panel_index_issues)
            .with_fn("duplicate_panels", |group: &StoryboardGroup| {
                let items: Vec<(String, &str)> = group
                    .panels
                    .iter()
                    .map(|p| (format!("panels.{}.en", p.index), p.en.as_str()))
                    .collect();
                check_duplicates(&items)
            })
            .with_fn("camera_mode", move |group: &StoryboardGroup| {
                camera_issues(group, &mode)
            })
            .with_fn("forbidden_phrases", move |group: &StoryboardGroup| {
                panel_phrase_issues(group, &phrases)
            })
    }
}

impl SequenceUnit for StoryboardGroup {
    type Brief = StoryboardBrief;
    type Fragment = StepState;

    const SYSTEM_PROMPT_KEY: &'static str = "storyboard_group.system";
    const REPAIR_PROMPT_KEY: &'static str = "storyboard_group.repair";
    const CONTINUITY_PROMPT_KEY: &'static str = "storyboard_group.continuity";
    const FRAGMENT_SCOPE: &'static str = "continuity.start_state";

    fn render_prompt(
        brief: &StoryboardBrief,
        prev_end: Option<&StepState>,
        running_summary: Option<&str>,
    ) -> String {
        format!(
            "{}\n\nWrite storyboard group {} covering shots {}: nine panels, each a single \
             frozen moment, plus continuity.start_state and continuity.end_state.",
            render_unit_context(brief, prev_end, running_summary),
            brief.group_id,
            brief.shot_range
        )
    }

    fn start_state(&self) -> StepState {
        self.continuity.start_state.clone()
    }

    fn end_state(&self) -> StepState {
        self.continuity.end_state.clone()
    }

    fn declared_changes(&self) -> Vec<String> {
        self.declared_changes.clone()
    }

    fn start_fragment(&self) -> StepState {
        self.continuity.start_state.clone()
    }

    fn with_start_fragment(&self, fragment: StepState) -> Self {
        let mut group = self.clone();
        group.continuity.start_state = fragment;
        group
    }

    fn fragment_shape() -> Shape {
        step_state_shape()
    }

    fn summary_line(&self) -> Option<String> {
        let hint = self.continuity.end_state.next_intent_hint.trim();
        (!hint.is_empty()).then(|| format!("{}: {}", self.group_id, hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use storyloom_validation::{PhraseMatcher, default_phrase_sets};

    fn ctx(mode: &str) -> ArtifactContext {
        let phrases = Arc::new(PhraseMatcher::new(&default_phrase_sets()).unwrap());
        ArtifactContext::new(phrases, 3)
            .with_brief(json!({ "group_id": "g1", "shot_range": "1-9", "goal": "dawn" }))
            .with_settings(json!({ "camera_mode": mode }))
    }

    fn group_json(texts: &[&str]) -> serde_json::Value {
        let panels: Vec<_> = texts
            .iter()
            .enumerate()
            .map(|(i, en)| {
                json!({
                    "index": i + 1,
                    "en": en,
                    "camera": { "shot_size": "MS", "angle": "eye", "lens": "35mm", "motion": "static" }
                })
            })
            .collect();
        json!({
            "group_id": "g1",
            "shot_range": "1-9",
            "panels": panels,
            "continuity": {
                "start_state": { "characters": [{ "name": "Mira", "location": "pier" }] },
                "end_state": { "characters": [{ "name": "Mira", "location": "boat" }], "next_intent_hint": "Mira casts off" }
            }
        })
    }

    const TEXTS: [&str; 9] = [
        "[LS|eye|24mm|static] Harbor at dawn",
        "[MS|eye|35mm|static] Mira on the pier",
        "[CU|high|50mm|static] A rope coiled on wood",
        "[MS|low|35mm|pan→] Owen waving",
        "[LS|eye|24mm|static] Gulls scattering",
        "[CU|eye|85mm|static] Mira's hands on the knot",
        "[MS|eye|35mm|static] Mira stepping aboard",
        "[LS|high|24mm|tilt↓] The boat rocking",
        "[LS|eye|24mm|static] Sun breaking through",
    ];

    #[test]
    fn test_valid_group_in_both_modes() {
        let value = group_json(&TEXTS);
        let group = StoryboardGroup::check(&value, &ctx("A")).unwrap();
        assert_eq!(group.panels.len(), 9);
        assert!(StoryboardGroup::check(&value, &ctx("B")).is_ok());
    }

    #[test]
    fn test_null_optional_state_fields_decode() {
        let mut value = group_json(&TEXTS);
        value["continuity"]["start_state"]["characters"][0]["location"] = json!(null);
        value["continuity"]["start_state"]["props"] = json!(null);
        value["panels"][0]["camera"]["lens"] = json!(null);

        assert!(StoryboardGroup::shape().validate(&value).is_empty());
        let group = StoryboardGroup::check(&value, &ctx("A")).unwrap();
        assert_eq!(group.continuity.start_state.characters[0].location, "");
        assert!(group.continuity.start_state.props.is_empty());
    }

    #[test]
    fn test_process_narration_in_panel_is_rejected() {
        let mut texts = TEXTS;
        texts[4] = "[LS|eye|24mm|static] Gulls slowly scattering";
        let err = StoryboardGroup::check(&group_json(&texts), &ctx("A")).unwrap_err();
        let issues = err.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path(), "panels.5.en");
    }

    #[test]
    fn test_recheck_is_idempotent() {
        let context = ctx("B");
        let group = StoryboardGroup::check(&group_json(&TEXTS), &context).unwrap();
        let again = serde_json::to_value(&group).unwrap();
        assert_eq!(StoryboardGroup::check(&again, &context).unwrap(), group);
    }

    #[test]
    fn test_duplicate_panels_named_by_index() {
        let mut texts = TEXTS;
        texts[6] = "  [cu|HIGH|50mm|static]   a rope coiled on wood ";
        let group: StoryboardGroup = serde_json::from_value(group_json(&texts)).unwrap();
        let issues = StoryboardGroup::validators(&ctx("B")).run(&group);
        assert_eq!(issues, vec![ValidationIssue::new("panels.7.en", "duplicates panels.3.en")]);
    }

    #[test]
    fn test_wrong_panel_count_is_a_schema_issue() {
        let value = group_json(&TEXTS[..8]);
        let err = StoryboardGroup::check(&value, &ctx("B")).unwrap_err();
        assert_eq!(err.issues()[0].path(), "panels");
    }

    #[test]
    fn test_camera_mode_a_requires_prefix() {
        let mut texts = TEXTS;
        texts[1] = "Mira on the pier";
        let group: StoryboardGroup = serde_json::from_value(group_json(&texts)).unwrap();
        let issues = StoryboardGroup::validators(&ctx("A")).run(&group);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path(), "panels.2.en");
    }

    #[test]
    fn test_camera_mode_b_requires_camera_fields() {
        let mut value = group_json(&TEXTS);
        value["panels"][4]["camera"]["lens"] = json!("");
        let group: StoryboardGroup = serde_json::from_value(value).unwrap();
        let issues = StoryboardGroup::validators(&ctx("B")).run(&group);
        assert_eq!(issues, vec![ValidationIssue::new("panels.5.camera.lens", "is required in camera mode B")]);
    }

    #[test]
    fn test_brief_mismatch_and_index_gaps() {
        let mut value = group_json(&TEXTS);
        value["group_id"] = json!("g2");
        value["panels"][8]["index"] = json!(1);
        let group: StoryboardGroup = serde_json::from_value(value).unwrap();
        let issues = StoryboardGroup::validators(&ctx("B")).run(&group);
        let paths: Vec<&str> = issues.iter().map(|i| i.path().as_str()).collect();
        assert_eq!(paths, vec!["group_id", "panels.8.index", "panels"]);
    }

    #[test]
    fn test_camera_prefix() {
        assert!(has_camera_prefix("[LS|eye|35mm|pan→] Mira"));
        assert!(!has_camera_prefix("[LS]Mira"));
        assert!(!has_camera_prefix("[] Mira"));
        assert!(!has_camera_prefix("[LS]   "));
        assert!(!has_camera_prefix("LS Mira"));
    }

    #[test]
    fn test_summary_line_and_fragment_splice() {
        let group: StoryboardGroup = serde_json::from_value(group_json(&TEXTS)).unwrap();
        assert_eq!(group.summary_line().as_deref(), Some("g1: Mira casts off"));

        let spliced = group.with_start_fragment(StepState::default());
        assert!(spliced.start_state().characters.is_empty());
        assert_eq!(spliced.panels, group.panels);
        assert_eq!(spliced.end_state(), group.end_state());
    }
}
