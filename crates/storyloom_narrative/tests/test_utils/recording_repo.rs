//! Progress repository that remembers every unit status it was given.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use storyloom_core::{ProgressDocument, UnitStatus};
use storyloom_error::StoryloomResult;
use storyloom_interface::ProgressRepository;
use storyloom_narrative::InMemoryProgressRepository;

/// Wraps an in-memory repository and logs each unit's status per save.
#[derive(Clone, Default)]
pub struct RecordingProgressRepository {
    inner: InMemoryProgressRepository,
    saved: Arc<Mutex<Vec<Vec<(String, UnitStatus)>>>>,
}

impl RecordingProgressRepository {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses `unit` was saved with, consecutive repeats collapsed.
    #[allow(dead_code)]
    pub fn statuses_of(&self, unit: &str) -> Vec<UnitStatus> {
        let mut statuses: Vec<UnitStatus> = Vec::new();
        for save in self.saved.lock().unwrap().iter() {
            let found = save.iter().find(|(id, _)| id == unit).map(|(_, s)| *s);
            if let Some(status) = found {
                if statuses.last() != Some(&status) {
                    statuses.push(status);
                }
            }
        }
        statuses
    }
}

#[async_trait]
impl ProgressRepository for RecordingProgressRepository {
    async fn load(&self, parent_id: &str) -> StoryloomResult<Option<ProgressDocument>> {
        self.inner.load(parent_id).await
    }

    async fn save(&self, parent_id: &str, doc: &ProgressDocument) -> StoryloomResult<u64> {
        self.saved
            .lock()
            .unwrap()
            .push(doc.units.iter().map(|u| (u.id.clone(), u.status)).collect());
        self.inner.save(parent_id, doc).await
    }

    async fn delete(&self, parent_id: &str) -> StoryloomResult<bool> {
        self.inner.delete(parent_id).await
    }
}
