//! Tests for the generate, validate, repair loop.

mod test_utils;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;
use storyloom_core::{Role, UnitStatus, ValidationIssue};
use storyloom_error::{GenerationErrorKind, StoryloomErrorKind, StoryloomResult};
use storyloom_narrative::{
    GenerationOrchestrator, GenerationRequest, GenerationRequestBuilder, PhaseObserver,
    StandardRepairPrompt,
};
use storyloom_validation::{ObjectShape, Shape, ValidatorSet};
use test_utils::{MockModelClient, MockResponse};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Logline {
    title: String,
    #[serde(default)]
    tags: Vec<String>,
}

fn shape() -> Shape {
    ObjectShape::permissive()
        .required("title", Shape::non_empty_string())
        .optional("tags", Shape::array(Shape::string(), 0, None))
        .into()
}

fn validators() -> ValidatorSet<Logline> {
    ValidatorSet::new().with_fn("no_draft", |l: &Logline| {
        if l.title.to_lowercase().contains("draft") {
            vec![ValidationIssue::new("title", "must not be a draft title")]
        } else {
            vec![]
        }
    })
}

fn request(cancel: CancellationToken) -> GenerationRequest {
    GenerationRequestBuilder::default()
        .system_prompt("You write loglines as JSON.")
        .user_prompt("A logline for the harbor scene.")
        .expected_shape(shape())
        .schema_name("logline")
        .cancellation(cancel)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_budget_is_exactly_max_attempts() {
    let mock = MockModelClient::new_sequence(vec![
        MockResponse::text("I cannot do that."),
        MockResponse::json(&json!({ "title": 3 })),
        MockResponse::json(&json!({ "title": "never reached" })),
    ]);
    let orchestrator = GenerationOrchestrator::new(mock.clone());

    let err = orchestrator
        .generate(&request(CancellationToken::new()), &validators(), &StandardRepairPrompt::default())
        .await
        .unwrap_err();

    assert_eq!(mock.call_count(), 2);
    let generation = err.as_generation().unwrap();
    match &generation.kind {
        GenerationErrorKind::BudgetExceeded { attempts, issues } => {
            assert_eq!(*attempts, 2);
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].path(), "title");
        }
        other => panic!("expected BudgetExceeded, got {:?}", other),
    }
    assert_eq!(generation.token_usage.total, 30);
}

#[tokio::test]
async fn test_repair_quotes_issues_and_previous_json() {
    let mock = MockModelClient::new_sequence(vec![
        MockResponse::json(&json!({ "title": "Draft: harbor", "tags": ["dawn"] })),
        MockResponse::json(&json!({ "title": "Harbor at dawn", "tags": ["dawn"] })),
    ]);
    let orchestrator = GenerationOrchestrator::new(mock.clone());

    let generated = orchestrator
        .generate(
            &request(CancellationToken::new()),
            &validators(),
            &StandardRepairPrompt::with_system_prompt("You repair loglines."),
        )
        .await
        .unwrap();

    assert_eq!(generated.value.title, "Harbor at dawn");
    assert_eq!(generated.attempts, 2);
    assert_eq!(generated.token_usage.total, 30);

    let calls = mock.calls();
    let repair = &calls[1];
    assert_eq!(repair[0].role, Role::System);
    assert_eq!(repair[0].content, "You repair loglines.");
    assert!(repair[1].content.contains("A logline for the harbor scene."));
    assert!(repair[1].content.contains("- title: must not be a draft title"));
    assert!(repair[1].content.contains("Draft: harbor"));
}

#[tokio::test]
async fn test_fenced_reply_accepted_first_time() {
    let mock = MockModelClient::new_sequence(vec![MockResponse::text(
        "Here you go:\n```json\n{ \"title\": \"Harbor at dawn\", }\n```\nEnjoy!",
    )]);
    let orchestrator = GenerationOrchestrator::new(mock.clone());

    let generated = orchestrator
        .generate(&request(CancellationToken::new()), &validators(), &StandardRepairPrompt::default())
        .await
        .unwrap();

    assert_eq!(mock.call_count(), 1);
    assert_eq!(generated.value.title, "Harbor at dawn");
    assert_eq!(generated.json()["title"], "Harbor at dawn");
}

#[tokio::test]
async fn test_unparseable_reply_is_a_root_issue() {
    let mock = MockModelClient::new_sequence(vec![
        MockResponse::text("no json here"),
        MockResponse::text("still none"),
    ]);
    let orchestrator = GenerationOrchestrator::new(mock.clone());

    let err = orchestrator
        .generate(&request(CancellationToken::new()), &validators(), &StandardRepairPrompt::default())
        .await
        .unwrap_err();

    let issues = err.as_generation().unwrap().issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].path(), "$");
    assert!(issues[0].message().starts_with("reply is not valid JSON"));
    assert!(mock.calls()[1][1].content.contains("no json here"));
}

#[tokio::test]
async fn test_cancelled_request_makes_no_call() {
    let mock = MockModelClient::new_sequence(vec![MockResponse::json(&json!({ "title": "x" }))]);
    let orchestrator = GenerationOrchestrator::new(mock.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator
        .generate(&request(cancel), &validators(), &StandardRepairPrompt::default())
        .await
        .unwrap_err();

    assert_eq!(mock.call_count(), 0);
    assert_eq!(err.as_generation().unwrap().kind, GenerationErrorKind::Cancelled);
}

#[tokio::test]
async fn test_response_format_and_cancellation_forwarded() {
    let mock = MockModelClient::new_sequence(vec![MockResponse::json(&json!({ "title": "x" }))]);
    let orchestrator = GenerationOrchestrator::new(mock.clone());
    let cancel = CancellationToken::new();

    orchestrator
        .generate(&request(cancel.clone()), &validators(), &StandardRepairPrompt::default())
        .await
        .unwrap();

    let config = &mock.configs()[0];
    let format = config.response_format.as_ref().unwrap();
    assert_eq!(format.name, "logline");
    assert!(format.strict);
    assert_eq!(format.schema["required"], json!(["title"]));
    cancel.cancel();
    assert!(config.cancellation.is_cancelled());
}

#[tokio::test]
async fn test_transport_error_propagates() {
    let mock = MockModelClient::new_sequence(vec![MockResponse::Error("connection reset".to_string())]);
    let orchestrator = GenerationOrchestrator::new(mock.clone());

    let err = orchestrator
        .generate(&request(CancellationToken::new()), &validators(), &StandardRepairPrompt::default())
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), StoryloomErrorKind::Backend(_)));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_repair_entry_point_counts_only_repairs() {
    let mock = MockModelClient::new_sequence(vec![
        MockResponse::json(&json!({ "title": "Draft again" })),
        MockResponse::json(&json!({ "title": "Harbor at dawn" })),
    ]);
    let orchestrator = GenerationOrchestrator::new(mock.clone());
    let issues = vec![ValidationIssue::new("title", "must not be a draft title")];

    let generated = orchestrator
        .repair(
            &request(CancellationToken::new()),
            "{\"title\": \"Draft\"}",
            &issues,
            &validators(),
            &StandardRepairPrompt::default(),
        )
        .await
        .unwrap();

    assert_eq!(generated.attempts, 2);
    assert!(mock.calls()[0][1].content.contains("{\"title\": \"Draft\"}"));
}

#[derive(Default)]
struct PhaseLog(Mutex<Vec<(UnitStatus, u32)>>);

#[async_trait]
impl PhaseObserver for PhaseLog {
    async fn phase(&self, status: UnitStatus, attempt: u32) -> StoryloomResult<()> {
        self.0.lock().unwrap().push((status, attempt));
        Ok(())
    }
}

#[tokio::test]
async fn test_transport_error_in_repair_carries_earlier_usage() {
    let mock = MockModelClient::new_sequence(vec![
        MockResponse::text("I cannot do that."),
        MockResponse::Error("connection reset".to_string()),
    ]);
    let orchestrator = GenerationOrchestrator::new(mock.clone());
    let phases = PhaseLog::default();

    let err = orchestrator
        .generate_observed(
            &request(CancellationToken::new()),
            &validators(),
            &StandardRepairPrompt::default(),
            &phases,
        )
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), StoryloomErrorKind::Backend(_)));
    assert_eq!(err.token_usage().total, 15);
    assert_eq!(
        *phases.0.lock().unwrap(),
        vec![
            (UnitStatus::Generating, 1),
            (UnitStatus::Validating, 1),
            (UnitStatus::NeedsRepair, 1),
            (UnitStatus::Repairing, 2),
        ]
    );
}
