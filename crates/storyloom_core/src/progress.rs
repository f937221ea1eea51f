//! The persisted progress document for a sequence.

use crate::{TokenUsage, UnitStatus, ValidationIssue};
use serde::{Deserialize, Serialize};

/// Stored record for one unit of a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Unit identifier, unique within the sequence
    pub id: String,
    /// Current status
    #[serde(default)]
    pub status: UnitStatus,
    /// Brief the unit is generated from
    #[serde(default)]
    pub brief: serde_json::Value,
    /// Accepted payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Last error message, if the unit failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Outstanding issues, if the unit failed validation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
    /// Tokens consumed producing the unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl UnitRecord {
    /// Create a pending record for a brief.
    pub fn pending(id: impl Into<String>, brief: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            status: UnitStatus::Pending,
            brief,
            payload: None,
            last_error: None,
            issues: Vec::new(),
            token_usage: None,
        }
    }
}

/// Versioned snapshot of a sequence's progress.
///
/// Repositories reject a save whose `version` does not match the stored
/// version, then bump it on success.
///
/// # Examples
///
/// ```
/// use storyloom_core::{ProgressDocument, UnitRecord};
///
/// let doc = ProgressDocument::new(vec![UnitRecord::pending("g1", serde_json::json!({}))]);
/// let text = serde_json::to_string(&doc).unwrap();
/// let back: ProgressDocument = serde_json::from_str(&text).unwrap();
/// assert_eq!(doc, back);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressDocument {
    /// Optimistic concurrency version
    #[serde(default)]
    pub version: u64,
    /// Sequence-wide settings (camera mode, locale, ...)
    #[serde(default)]
    pub settings: serde_json::Value,
    /// Units in order
    #[serde(default)]
    pub units: Vec<UnitRecord>,
    /// Running narrative summary of accepted units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_summary: Option<String>,
}

impl ProgressDocument {
    /// Create a version-zero document with the given units.
    pub fn new(units: Vec<UnitRecord>) -> Self {
        Self {
            version: 0,
            settings: serde_json::Value::Object(serde_json::Map::new()),
            units,
            running_summary: None,
        }
    }

    /// Look up a unit record by id.
    pub fn unit(&self, id: &str) -> Option<&UnitRecord> {
        self.units.iter().find(|u| u.id == id)
    }
}
