//! Extraction, shape and semantic checks composed the way the orchestrator
//! runs them.

use serde::Deserialize;
use storyloom_core::ValidationIssue;
use storyloom_validation::{
    FrameSubject, JsonKind, ObjectShape, PhraseMatcher, Shape, ValidatorSet, check_transition,
    default_phrase_sets, extract_json, validate_typed,
};

#[derive(Debug, Deserialize)]
struct Frame {
    subjects: Vec<Subject>,
}

#[derive(Debug, Deserialize)]
struct Subject {
    character_id: String,
    pose: String,
    action_snapshot: String,
}

impl FrameSubject for Subject {
    fn subject_key(&self) -> String {
        self.character_id.clone()
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pose", self.pose.clone()),
            ("action_snapshot", self.action_snapshot.clone()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct Pair {
    start: Frame,
    end: Frame,
}

fn shape() -> Shape {
    let subject = ObjectShape::permissive()
        .required("character_id", Shape::non_empty_string())
        .required("pose", Shape::string())
        .required("action_snapshot", Shape::non_empty_string());
    let frame = ObjectShape::permissive().required("subjects", Shape::array(subject, 1, None));
    ObjectShape::strict()
        .required("start", frame.clone())
        .required("end", frame)
        .into()
}

fn validators() -> ValidatorSet<Pair> {
    let matcher = PhraseMatcher::new(&default_phrase_sets()).unwrap();
    ValidatorSet::new()
        .with_fn("forbidden_phrases", move |pair: &Pair| {
            let mut issues = Vec::new();
            for (label, frame) in [("start", &pair.start), ("end", &pair.end)] {
                for (i, subject) in frame.subjects.iter().enumerate() {
                    let path = format!("{}.subjects.{}.action_snapshot", label, i);
                    issues.extend(matcher.check(&path, &subject.action_snapshot));
                }
            }
            issues
        })
        .with_fn("differentiation", |pair: &Pair| {
            check_transition("start->end", &pair.start.subjects, &pair.end.subjects, 2)
                .into_iter()
                .collect()
        })
}

fn run(text: &str) -> Vec<ValidationIssue> {
    let extracted = match extract_json(text, Some(JsonKind::Object)) {
        Ok(extracted) => extracted,
        Err(err) => return vec![ValidationIssue::root(err.reason())],
    };
    match validate_typed::<Pair>(&shape(), &extracted.value) {
        Ok(pair) => validators().run(&pair),
        Err(issues) => issues,
    }
}

#[test]
fn test_clean_reply_has_no_issues() {
    let reply = r#"Here is the pair:
```json
{"start": {"subjects": [{"character_id": "mira", "pose": "standing", "action_snapshot": "hand on the latch"}]},
 "end": {"subjects": [{"character_id": "mira", "pose": "kneeling", "action_snapshot": "palm flat on the floor"}]}}
```"#;
    assert_eq!(run(reply), vec![]);
}

#[test]
fn test_unparseable_reply_is_a_root_issue() {
    let issues = run("I'm sorry, I can't do that.");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].path(), "$");
}

#[test]
fn test_shape_issues_skip_semantic_checks() {
    let issues = run(r#"{"start": {"subjects": []}, "end": {"subjects": []}, "mid": 1}"#);
    let paths: Vec<&str> = issues.iter().map(|i| i.path().as_str()).collect();
    assert_eq!(paths, vec!["start.subjects", "end.subjects", "mid"]);
}

#[test]
fn test_semantic_issues_accumulate_in_order() {
    let reply = r#"{"start": {"subjects": [{"character_id": "mira", "pose": "standing", "action_snapshot": "then turns"}]},
                    "end": {"subjects": [{"character_id": "mira", "pose": "standing", "action_snapshot": "then turns"}]}}"#;
    let issues = run(reply);
    let paths: Vec<&str> = issues.iter().map(|i| i.path().as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "start.subjects.0.action_snapshot",
            "end.subjects.0.action_snapshot",
            "start->end"
        ]
    );
}
