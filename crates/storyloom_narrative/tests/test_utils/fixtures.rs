//! Artifact fixtures shared by the narrative tests.

use serde_json::{Value, json};
use storyloom_narrative::{InMemoryPromptStore, StoryboardBrief};

/// A prompt store holding every template the driver asks for.
#[allow(dead_code)]
pub fn prompts() -> InMemoryPromptStore {
    let mut store = InMemoryPromptStore::new()
        .with("action_plan.system", "You plan scenes as ordered beats.")
        .with("action_plan.repair", "You fix action plans.");
    for kind in ["storyboard_group", "keyframe_group"] {
        store = store
            .with(format!("{}.system", kind), format!("You write {} JSON.", kind))
            .with(format!("{}.repair", kind), format!("You repair {} JSON.", kind))
            .with(
                format!("{}.continuity", kind),
                "You fix start states so they match the previous end state.",
            );
    }
    store
}

#[allow(dead_code)]
fn shot_range(group: usize) -> String {
    format!("{}-{}", group * 9 - 8, group * 9)
}

/// Briefs `g1..=gN` with consecutive shot ranges.
#[allow(dead_code)]
pub fn storyboard_briefs(count: usize) -> Vec<(String, StoryboardBrief)> {
    (1..=count)
        .map(|n| {
            let id = format!("g{}", n);
            let brief = StoryboardBrief {
                group_id: id.clone(),
                shot_range: shot_range(n),
                goal: format!("group {} of the harbor scene", n),
            };
            (id, brief)
        })
        .collect()
}

/// A state with the given `(name, location)` characters, all standing and
/// facing the camera.
#[allow(dead_code)]
pub fn state(characters: &[(&str, &str)], hint: &str) -> Value {
    let characters: Vec<Value> = characters
        .iter()
        .map(|(name, location)| {
            json!({
                "name": name,
                "location": location,
                "stance": "standing",
                "facing": "camera",
                "props_in_hand": { "left": null, "right": null }
            })
        })
        .collect();
    json!({ "characters": characters, "props": [], "next_intent_hint": hint })
}

/// A valid storyboard group `g{n}` in camera mode B.
#[allow(dead_code)]
pub fn storyboard_json(n: usize, start: Value, end: Value) -> Value {
    let panels: Vec<Value> = (1..=9)
        .map(|index| {
            json!({
                "index": index,
                "en": format!("[MS|eye|35mm|static] g{} panel {}", n, index),
                "camera": { "shot_size": "MS", "angle": "eye", "lens": "35mm", "motion": "static" }
            })
        })
        .collect();
    json!({
        "group_id": format!("g{}", n),
        "shot_range": shot_range(n),
        "panels": panels,
        "continuity": { "start_state": start, "end_state": end }
    })
}

#[allow(dead_code)]
const ACTIONS: [&str; 3] = ["hand on the rail", "lantern raised high", "lantern set on planks"];
#[allow(dead_code)]
const EXPRESSIONS: [&str; 3] = ["calm", "alert", "tired"];
#[allow(dead_code)]
const GAZES: [&str; 3] = ["sea", "horizon", "deck"];

/// A keyframe group whose frames use `poses` for start, mid and end.
#[allow(dead_code)]
pub fn keyframe_json(beat_id: &str, poses: [&str; 3], shot_size: &str) -> Value {
    let frame = |i: usize| {
        json!({
            "frame_spec": {
                "used_anchors": ["pier", "lighthouse"],
                "subjects": [{
                    "character_id": "Mira",
                    "position_in_frame": "left third",
                    "body_orientation": "three-quarter left",
                    "pose": poses[i],
                    "action_snapshot": ACTIONS[i],
                    "expression": EXPRESSIONS[i],
                    "gaze": GAZES[i],
                    "hands": { "left": "lantern", "right": null }
                }]
            }
        })
    };
    json!({
        "beat_id": beat_id,
        "camera": { "shot_size": shot_size, "angle": "eye", "lens_hint": "35mm", "aspect_ratio": "16:9" },
        "frames": { "start": frame(0), "mid": frame(1), "end": frame(2) }
    })
}
