//! Continuity state exchanged between consecutive units of a sequence.
//!
//! Every unit declares the world at its first moment (start state) and at
//! its last moment (end state). The end state of unit *n* becomes the
//! `prevEnd` context for unit *n+1*, whose start state must agree with it.

use crate::normalize_text;
use serde::{Deserialize, Serialize};

/// What a character holds in each hand.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HandContents {
    /// Item in the left hand
    #[serde(default)]
    pub left: Option<String>,
    /// Item in the right hand
    #[serde(default)]
    pub right: Option<String>,
}

impl HandContents {
    /// Create hand contents from optional item names.
    pub fn new(left: Option<&str>, right: Option<&str>) -> Self {
        Self {
            left: left.map(str::to_string),
            right: right.map(str::to_string),
        }
    }
}

/// Snapshot of one character at a single moment.
///
/// # Examples
///
/// ```
/// use storyloom_core::CharacterState;
///
/// let mira = CharacterState::new("Mira")
///     .location("doorway")
///     .facing("camera");
///
/// assert_eq!(mira.location, "doorway");
/// assert!(mira.stance.is_empty());
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, derive_setters::Setters,
)]
#[setters(into)]
pub struct CharacterState {
    /// Character name, matched case-insensitively
    #[setters(skip)]
    pub name: String,
    /// Where the character is
    #[serde(default)]
    pub location: String,
    /// Body stance (standing, kneeling, ...)
    #[serde(default)]
    pub stance: String,
    /// Facing direction
    #[serde(default)]
    pub facing: String,
    /// Emotional state
    #[serde(default)]
    pub emotion: String,
    /// Items in hand
    #[serde(default)]
    pub props_in_hand: HandContents,
}

impl CharacterState {
    /// Create a character with only a name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Snapshot of one prop at a single moment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropState {
    /// Prop name, matched case-insensitively
    pub name: String,
    /// Free-form state description (lit, broken, open, ...)
    #[serde(default)]
    pub state: String,
    /// Character currently holding the prop
    #[serde(default)]
    pub holder: Option<String>,
}

impl PropState {
    /// Create a prop snapshot.
    pub fn new(name: impl Into<String>, state: impl Into<String>, holder: Option<&str>) -> Self {
        Self {
            name: name.into(),
            state: state.into(),
            holder: holder.map(str::to_string),
        }
    }
}

/// The world at the first or last moment of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepState {
    /// Characters on screen or in play
    #[serde(default)]
    pub characters: Vec<CharacterState>,
    /// Props in play
    #[serde(default)]
    pub props: Vec<PropState>,
    /// Hint about where the story goes next
    #[serde(default)]
    pub next_intent_hint: String,
}

impl StepState {
    /// Look up a character by normalized name.
    pub fn character(&self, name: &str) -> Option<&CharacterState> {
        let wanted = normalize_text(name);
        self.characters
            .iter()
            .find(|c| normalize_text(&c.name) == wanted)
    }

    /// Look up a prop by normalized name.
    pub fn prop(&self, name: &str) -> Option<&PropState> {
        let wanted = normalize_text(name);
        self.props.iter().find(|p| normalize_text(&p.name) == wanted)
    }

    /// True when no characters or props are recorded.
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty() && self.props.is_empty()
    }
}
