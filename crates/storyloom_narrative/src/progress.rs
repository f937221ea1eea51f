//! Progress repositories: in-memory and one JSON file per parent.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use storyloom_core::ProgressDocument;
use storyloom_error::{ProgressError, ProgressErrorKind, StoryloomResult};
use storyloom_interface::ProgressRepository;
use tokio::sync::{Mutex, RwLock};

fn check_version(parent_id: &str, stored: u64, doc: &ProgressDocument) -> Result<(), ProgressError> {
    if stored != doc.version {
        return Err(ProgressError::new(ProgressErrorKind::VersionConflict {
            parent: parent_id.to_string(),
            expected: doc.version,
            found: stored,
        }));
    }
    Ok(())
}

/// In-memory progress repository.
///
/// Documents live in a HashMap behind an RwLock and are lost when the last
/// clone is dropped.
///
/// # Example
/// ```
/// use storyloom_core::{ProgressDocument, UnitRecord};
/// use storyloom_interface::ProgressRepository;
/// use storyloom_narrative::InMemoryProgressRepository;
///
/// #[tokio::main]
/// async fn main() {
///     let repo = InMemoryProgressRepository::new();
///     let mut doc = ProgressDocument::new(vec![UnitRecord::pending("g1", serde_json::json!({}))]);
///     doc.version = repo.save("scene-1", &doc).await.unwrap();
///     assert_eq!(doc.version, 1);
///     assert_eq!(repo.load("scene-1").await.unwrap(), Some(doc));
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryProgressRepository {
    documents: Arc<RwLock<HashMap<String, ProgressDocument>>>,
}

impl InMemoryProgressRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Check if the repository is empty.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryProgressRepository {
    async fn load(&self, parent_id: &str) -> StoryloomResult<Option<ProgressDocument>> {
        Ok(self.documents.read().await.get(parent_id).cloned())
    }

    async fn save(&self, parent_id: &str, doc: &ProgressDocument) -> StoryloomResult<u64> {
        let mut documents = self.documents.write().await;
        let stored = documents.get(parent_id).map(|d| d.version).unwrap_or(0);
        check_version(parent_id, stored, doc)?;

        let mut saved = doc.clone();
        saved.version = stored + 1;
        let version = saved.version;
        documents.insert(parent_id.to_string(), saved);
        tracing::debug!(parent_id, version, "Saved progress");
        Ok(version)
    }

    async fn delete(&self, parent_id: &str) -> StoryloomResult<bool> {
        Ok(self.documents.write().await.remove(parent_id).is_some())
    }
}

/// File-backed progress repository.
///
/// Each parent gets `{dir}/{parent_id}.json`, pretty-printed. Writes go to a
/// temporary file that is renamed into place.
#[derive(Debug, Clone)]
pub struct FileProgressRepository {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileProgressRepository {
    /// Create a repository rooted at `dir`, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns `ProgressErrorKind::Io` if the directory cannot be created.
    #[tracing::instrument(skip(dir))]
    pub fn new(dir: impl Into<PathBuf>) -> StoryloomResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            ProgressError::new(ProgressErrorKind::Io(format!("{}: {}", dir.display(), e)))
        })?;
        tracing::info!(path = %dir.display(), "Opened progress directory");
        Ok(Self {
            dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Path of the file holding a parent's document.
    ///
    /// Lowercase ASCII letters, digits and `-` are kept. Every other byte of
    /// the id becomes `_` and two lowercase hex digits, so distinct ids get
    /// distinct files, even on case-insensitive file systems.
    pub fn path_for(&self, parent_id: &str) -> PathBuf {
        let mut name = String::with_capacity(parent_id.len());
        for byte in parent_id.bytes() {
            if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' {
                name.push(char::from(byte));
            } else {
                name.push('_');
                name.push_str(&hex::encode([byte]));
            }
        }
        self.dir.join(format!("{}.json", name))
    }

    async fn read(&self, parent_id: &str) -> Result<Option<ProgressDocument>, ProgressError> {
        let path = self.path_for(parent_id);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ProgressError::new(ProgressErrorKind::Io(format!(
                    "{}: {}",
                    path.display(),
                    e
                ))));
            }
        };
        serde_json::from_str(&text).map(Some).map_err(|e| {
            ProgressError::new(ProgressErrorKind::Corrupt(format!("{}: {}", path.display(), e)))
        })
    }
}

#[async_trait]
impl ProgressRepository for FileProgressRepository {
    #[tracing::instrument(skip(self))]
    async fn load(&self, parent_id: &str) -> StoryloomResult<Option<ProgressDocument>> {
        Ok(self.read(parent_id).await?)
    }

    #[tracing::instrument(skip(self, doc), fields(version = doc.version))]
    async fn save(&self, parent_id: &str, doc: &ProgressDocument) -> StoryloomResult<u64> {
        let _guard = self.write_lock.lock().await;
        let stored = self.read(parent_id).await?.map(|d| d.version).unwrap_or(0);
        check_version(parent_id, stored, doc)?;

        let mut saved = doc.clone();
        saved.version = stored + 1;
        let json = serde_json::to_string_pretty(&saved).map_err(storyloom_error::JsonError::from)?;

        let path = self.path_for(parent_id);
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await.map_err(|e| {
            ProgressError::new(ProgressErrorKind::Io(format!("{}: {}", temp_path.display(), e)))
        })?;
        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            ProgressError::new(ProgressErrorKind::Io(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        tracing::debug!(path = %path.display(), version = saved.version, "Saved progress");
        Ok(saved.version)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, parent_id: &str) -> StoryloomResult<bool> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(parent_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ProgressError::new(ProgressErrorKind::Io(format!(
                "{}: {}",
                path.display(),
                e
            )))
            .into()),
        }
    }
}
