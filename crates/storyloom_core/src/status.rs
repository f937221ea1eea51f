//! Lifecycle states for units and sequences.

use serde::{Deserialize, Serialize};

/// Lifecycle of a single unit.
///
/// `Ready` and `NeedsFix` are terminal for a run; a later run regenerates
/// units that are not `Ready`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnitStatus {
    /// Not yet attempted
    #[default]
    Pending,
    /// Model call in flight
    Generating,
    /// Response received, checks running
    Validating,
    /// Checks failed and a repair is due
    NeedsRepair,
    /// Repair call in flight
    Repairing,
    /// Accepted
    Ready,
    /// Gave up; requires human attention
    NeedsFix,
}

impl UnitStatus {
    /// Whether the unit finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::NeedsFix)
    }
}

/// Lifecycle of a whole sequence.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SequenceStatus {
    /// No unit attempted yet
    #[default]
    Pending,
    /// Some units are done, others remain
    InProgress,
    /// Every unit is ready
    Ready,
    /// A unit could not be repaired and the run halted
    NeedsFix,
}
