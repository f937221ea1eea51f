//! End-to-end runs through the public facade.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use storyloom::{
    BackendError, ChatConfig, ChatMessage, ChatResponse, InMemoryProgressRepository,
    InMemoryPromptStore, JsonKind, ModelClient, ProgressRepository, Sequence, SequenceDriver,
    SequenceStatus, StoryboardBrief, StoryboardGroup, StoryloomConfig, StoryloomResult,
    TokenUsage, UnitStatus, extract_json,
};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct ReplayClient {
    replies: Arc<Mutex<VecDeque<String>>>,
}

impl ReplayClient {
    fn new(replies: Vec<Value>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.iter().map(Value::to_string).collect())),
        }
    }
}

#[async_trait]
impl ModelClient for ReplayClient {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _config: &ChatConfig,
    ) -> StoryloomResult<ChatResponse> {
        match self.replies.lock().unwrap().pop_front() {
            Some(text) => Ok(ChatResponse::new(text, Some(TokenUsage::new(20, 10)))),
            None => Err(BackendError::new("no reply scripted").into()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "replay"
    }

    fn model_name(&self) -> &str {
        "replay-1"
    }
}

fn state(location: &str) -> Value {
    json!({
        "characters": [{
            "name": "Ada",
            "location": location,
            "stance": "standing",
            "facing": "camera",
            "props_in_hand": { "left": null, "right": "map" }
        }],
        "props": []
    })
}

fn group(n: usize, start: &str, end: &str) -> Value {
    let panels: Vec<Value> = (1..=9)
        .map(|index| {
            json!({
                "index": index,
                "en": format!("[WS|high|24mm|pan] Ada crosses the market, panel {}", index),
                "camera": { "shot_size": "WS", "angle": "high", "lens": "24mm", "motion": "pan" }
            })
        })
        .collect();
    json!({
        "group_id": format!("g{}", n),
        "shot_range": format!("{}-{}", n * 9 - 8, n * 9),
        "panels": panels,
        "continuity": { "start_state": state(start), "end_state": state(end) }
    })
}

fn briefs() -> Vec<(String, StoryboardBrief)> {
    (1..=2)
        .map(|n| {
            let brief = StoryboardBrief {
                group_id: format!("g{}", n),
                shot_range: format!("{}-{}", n * 9 - 8, n * 9),
                goal: format!("market chase, part {}", n),
            };
            (brief.group_id.clone(), brief)
        })
        .collect()
}

fn prompts() -> InMemoryPromptStore {
    InMemoryPromptStore::new()
        .with("storyboard_group.system", "You write storyboard groups.")
        .with("storyboard_group.repair", "You repair storyboard groups.")
        .with("storyboard_group.continuity", "You repair start states.")
}

#[test]
fn test_extracts_object_from_chatty_reply() {
    let extracted = extract_json(
        "Sure! Here it is:\n```json\n{\"group_id\": \"g1\",}\n```",
        Some(JsonKind::Object),
    )
    .unwrap();
    assert_eq!(extracted.value["group_id"], "g1");
}

#[tokio::test]
async fn test_two_groups_chain_and_persist() {
    let client = ReplayClient::new(vec![
        group(1, "gate", "fruit stall"),
        group(2, "fruit stall", "harbor steps"),
    ]);
    let repository = Arc::new(InMemoryProgressRepository::new());
    let driver = SequenceDriver::new(client, Arc::new(prompts()), &StoryloomConfig::default())
        .unwrap()
        .with_repository(repository.clone());
    let mut sequence = Sequence::<StoryboardGroup>::new(briefs()).unwrap();

    let report = driver
        .start("market", &mut sequence, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, SequenceStatus::Ready);
    assert_eq!(report.units_generated, 2);
    assert_eq!(report.continuity_repairs, 0);
    assert_eq!(report.token_usage.total, 60);

    let stored = repository.load("market").await.unwrap().unwrap();
    assert!(stored.units.iter().all(|u| u.status == UnitStatus::Ready));
    assert_eq!(
        sequence.running_end_state().unwrap().characters[0].location,
        "harbor steps"
    );
}
