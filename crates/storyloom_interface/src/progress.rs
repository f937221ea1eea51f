//! The progress persistence seam.

use async_trait::async_trait;
use storyloom_core::ProgressDocument;
use storyloom_error::StoryloomResult;

/// Stores one progress document per parent entity (scene, episode, ...).
///
/// The document is a versioned aggregate. `save` must fail with
/// `ProgressErrorKind::VersionConflict` when the stored version differs from
/// `doc.version`, and otherwise return the new version. A document that was
/// never saved has version 0.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Load the document for a parent, or `None` if none was saved.
    async fn load(&self, parent_id: &str) -> StoryloomResult<Option<ProgressDocument>>;

    /// Save the document, returning its new version.
    async fn save(&self, parent_id: &str, doc: &ProgressDocument) -> StoryloomResult<u64>;

    /// Delete the document for a parent, returning whether one existed.
    async fn delete(&self, parent_id: &str) -> StoryloomResult<bool>;
}
