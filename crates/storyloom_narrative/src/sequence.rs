//! The ordered units of a sequence and their lifecycle.

use crate::SequenceUnit;
use serde_json::Value;
use std::collections::HashSet;
use storyloom_core::{
    ProgressDocument, SequenceStatus, StepState, TokenUsage, UnitRecord, UnitStatus,
    ValidationIssue,
};
use storyloom_error::{JsonError, SequenceError, SequenceErrorKind, StoryloomResult};

/// One unit of a sequence: its brief, status and accepted output.
#[derive(Clone)]
pub struct Unit<U: SequenceUnit> {
    /// Identifier, unique within the sequence
    pub id: String,
    /// Input the unit is generated from
    pub brief: U::Brief,
    /// Lifecycle status
    pub status: UnitStatus,
    /// Accepted output, present once `Ready`
    pub output: Option<U>,
    /// Why the unit last failed
    pub last_error: Option<String>,
    /// Outstanding issues of a `NeedsFix` unit
    pub issues: Vec<ValidationIssue>,
    /// Tokens spent on the unit
    pub token_usage: Option<TokenUsage>,
}

impl<U: SequenceUnit> Unit<U> {
    fn pending(id: String, brief: U::Brief) -> Self {
        Self {
            id,
            brief,
            status: UnitStatus::Pending,
            output: None,
            last_error: None,
            issues: Vec::new(),
            token_usage: None,
        }
    }

    /// Whether the unit holds an accepted output.
    pub fn is_ready(&self) -> bool {
        self.status == UnitStatus::Ready && self.output.is_some()
    }

    pub(crate) fn reset(&mut self) {
        self.status = UnitStatus::Pending;
        self.output = None;
        self.last_error = None;
        self.issues.clear();
        self.token_usage = None;
    }

    fn to_record(&self) -> Result<UnitRecord, JsonError> {
        Ok(UnitRecord {
            id: self.id.clone(),
            status: self.status,
            brief: serde_json::to_value(&self.brief)?,
            payload: self.output.as_ref().map(serde_json::to_value).transpose()?,
            last_error: self.last_error.clone(),
            issues: self.issues.clone(),
            token_usage: self.token_usage,
        })
    }

    fn from_record(record: UnitRecord) -> Result<Self, SequenceError> {
        let mismatch = |message: String| {
            SequenceError::new(SequenceErrorKind::UnitKindMismatch {
                unit: record.id.clone(),
                message,
            })
        };
        let brief = serde_json::from_value(record.brief.clone()).map_err(|e| mismatch(e.to_string()))?;
        let output: Option<U> = record
            .payload
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| mismatch(e.to_string()))?;

        // A unit interrupted mid-flight is retried from scratch.
        let status = match record.status {
            UnitStatus::Ready if output.is_none() => {
                return Err(mismatch("ready unit has no payload".to_string()));
            }
            status if status.is_terminal() => status,
            _ => UnitStatus::Pending,
        };

        Ok(Self {
            id: record.id,
            brief,
            status,
            output,
            last_error: record.last_error,
            issues: record.issues,
            token_usage: record.token_usage,
        })
    }
}

/// An ordered sequence of units of one artifact type.
///
/// # Examples
///
/// ```
/// use storyloom_core::SequenceStatus;
/// use storyloom_narrative::{Sequence, StoryboardBrief, StoryboardGroup};
///
/// let brief = |id: &str| StoryboardBrief {
///     group_id: id.to_string(),
///     shot_range: "1-9".to_string(),
///     goal: "the harbor at dawn".to_string(),
/// };
/// let sequence = Sequence::<StoryboardGroup>::new(vec![
///     ("g1".to_string(), brief("g1")),
///     ("g2".to_string(), brief("g2")),
/// ])
/// .unwrap();
///
/// assert_eq!(sequence.len(), 2);
/// assert_eq!(sequence.status(), SequenceStatus::Pending);
/// assert!(Sequence::<StoryboardGroup>::new(vec![]).is_err());
/// ```
#[derive(Clone)]
pub struct Sequence<U: SequenceUnit> {
    units: Vec<Unit<U>>,
    settings: Value,
    running_summary: Option<String>,
    version: u64,
}

impl<U: SequenceUnit> std::fmt::Debug for Sequence<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("kind", &U::NAME)
            .field(
                "units",
                &self
                    .units
                    .iter()
                    .map(|u| format!("{}={}", u.id, u.status))
                    .collect::<Vec<_>>(),
            )
            .field("version", &self.version)
            .finish()
    }
}

impl<U: SequenceUnit> Sequence<U> {
    /// Create a pending sequence from `(id, brief)` pairs in order.
    ///
    /// # Errors
    ///
    /// `EmptySequence` for no units, `DuplicateUnit` when two ids collide.
    pub fn new(briefs: Vec<(String, U::Brief)>) -> Result<Self, SequenceError> {
        if briefs.is_empty() {
            return Err(SequenceError::new(SequenceErrorKind::EmptySequence));
        }
        let mut seen = HashSet::new();
        for (id, _) in &briefs {
            if !seen.insert(id.as_str()) {
                return Err(SequenceError::new(SequenceErrorKind::DuplicateUnit(id.clone())));
            }
        }
        Ok(Self {
            units: briefs
                .into_iter()
                .map(|(id, brief)| Unit::pending(id, brief))
                .collect(),
            settings: Value::Object(serde_json::Map::new()),
            running_summary: None,
            version: 0,
        })
    }

    /// Attach sequence-wide settings (e.g. `{"camera_mode": "A"}`).
    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    /// Rebuild a sequence from a stored progress document.
    pub fn from_document(doc: ProgressDocument) -> Result<Self, SequenceError> {
        if doc.units.is_empty() {
            return Err(SequenceError::new(SequenceErrorKind::EmptySequence));
        }
        let units = doc
            .units
            .into_iter()
            .map(Unit::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            units,
            settings: doc.settings,
            running_summary: doc.running_summary,
            version: doc.version,
        })
    }

    /// Snapshot the sequence as a progress document at its current version.
    pub fn to_document(&self) -> StoryloomResult<ProgressDocument> {
        let units = self
            .units
            .iter()
            .map(Unit::to_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProgressDocument {
            version: self.version,
            settings: self.settings.clone(),
            units,
            running_summary: self.running_summary.clone(),
        })
    }

    /// Units in order.
    pub fn units(&self) -> &[Unit<U>] {
        &self.units
    }

    /// Look up a unit by id.
    pub fn unit(&self, id: &str) -> Option<&Unit<U>> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Always false for a constructed sequence.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sequence-wide settings.
    pub fn settings(&self) -> &Value {
        &self.settings
    }

    /// Summary lines of accepted units.
    pub fn running_summary(&self) -> Option<&str> {
        self.running_summary.as_deref()
    }

    /// Version of the document this sequence was last saved as.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Status derived from the units.
    pub fn status(&self) -> SequenceStatus {
        if self.units.iter().all(|u| u.status == UnitStatus::Ready) {
            SequenceStatus::Ready
        } else if self.units.iter().any(|u| u.status == UnitStatus::NeedsFix) {
            SequenceStatus::NeedsFix
        } else if self.units.iter().all(|u| u.status == UnitStatus::Pending) {
            SequenceStatus::Pending
        } else {
            SequenceStatus::InProgress
        }
    }

    /// End state of the last unit in the leading run of ready units.
    pub fn running_end_state(&self) -> Option<StepState> {
        self.units
            .iter()
            .take_while(|u| u.is_ready())
            .last()
            .and_then(|u| u.output.as_ref())
            .map(U::end_state)
    }

    /// Return `id` and every later unit to `Pending` so the next run
    /// regenerates them.
    ///
    /// # Errors
    ///
    /// `UnknownUnit` if no unit has that id.
    pub fn reset_from(&mut self, id: &str) -> Result<(), SequenceError> {
        let index = self
            .units
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| SequenceError::new(SequenceErrorKind::UnknownUnit(id.to_string())))?;
        for unit in &mut self.units[index..] {
            unit.reset();
        }
        Ok(())
    }

    pub(crate) fn unit_mut(&mut self, index: usize) -> &mut Unit<U> {
        &mut self.units[index]
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub(crate) fn push_summary(&mut self, line: String) {
        match &mut self.running_summary {
            Some(summary) => {
                summary.push('\n');
                summary.push_str(&line);
            }
            None => self.running_summary = Some(line),
        }
    }
}
