//! Continuity carry-over across a unit boundary.
//!
//! Every entity in the previous unit's end state must still exist in the
//! next unit's start state. Entities present in both must agree on their
//! compared fields unless the next unit declares the change.

use storyloom_core::{CharacterState, HandContents, PropState, StepState, ValidationIssue, normalize_text};

/// Changes a unit declares, as `entity.field` or `entity.*` entries.
///
/// A bare `entity` is treated like `entity.*`. Declaring a change never
/// excuses an entity that vanishes.
///
/// # Examples
///
/// ```
/// use storyloom_validation::ChangeAllowance;
///
/// let allowance = ChangeAllowance::from_declared(&["Mira.location", "lamp.*"]);
/// assert!(allowance.allows("mira", "location"));
/// assert!(!allowance.allows("Mira", "stance"));
/// assert!(allowance.allows("Lamp", "state"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeAllowance {
    entries: Vec<(String, Option<String>)>,
}

impl ChangeAllowance {
    /// No declared changes.
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse declared change strings.
    pub fn from_declared<S: AsRef<str>>(declared: &[S]) -> Self {
        let entries = declared
            .iter()
            .filter_map(|entry| {
                let entry = entry.as_ref().trim();
                if entry.is_empty() {
                    return None;
                }
                let (entity, field) = match entry.rsplit_once('.') {
                    Some((entity, "*")) => (entity, None),
                    Some((entity, field)) => (entity, Some(normalize_text(field))),
                    None => (entry, None),
                };
                Some((normalize_text(entity), field))
            })
            .collect();
        Self { entries }
    }

    /// Whether a change to `entity.field` is declared.
    pub fn allows(&self, entity: &str, field: &str) -> bool {
        let entity = normalize_text(entity);
        let field = normalize_text(field);
        self.entries.iter().any(|(declared_entity, declared_field)| {
            *declared_entity == entity
                && declared_field
                    .as_ref()
                    .is_none_or(|declared| *declared == field || field.starts_with(&format!("{}.", declared)))
        })
    }
}

/// Compare `prev_end` with `next_start`.
///
/// Issues are scoped under `scope` (for example `continuity.start_state`)
/// as `characters.<name>.<field>` and `props.<name>.<field>`. String fields
/// are compared after normalization and only when both sides are non-empty;
/// hand contents and prop holders are compared exactly.
///
/// # Examples
///
/// ```
/// use storyloom_core::{CharacterState, StepState};
/// use storyloom_validation::{ChangeAllowance, check_carry_over};
///
/// let prev = StepState {
///     characters: vec![CharacterState::new("Mira").location("kitchen")],
///     ..StepState::default()
/// };
/// let next = StepState::default();
///
/// let issues = check_carry_over(&prev, &next, &ChangeAllowance::none(), "start_state");
/// assert_eq!(issues.len(), 1);
/// assert_eq!(issues[0].path(), "start_state.characters.Mira");
/// ```
pub fn check_carry_over(
    prev_end: &StepState,
    next_start: &StepState,
    allowance: &ChangeAllowance,
    scope: &str,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for prev in &prev_end.characters {
        let path = format!("{}.characters.{}", scope, prev.name);
        match next_start.character(&prev.name) {
            None => issues.push(ValidationIssue::new(
                path,
                format!(
                    "character '{}' from the previous unit's end state is missing",
                    prev.name
                ),
            )),
            Some(next) => compare_character(prev, next, allowance, &path, &mut issues),
        }
    }

    for prev in &prev_end.props {
        let path = format!("{}.props.{}", scope, prev.name);
        match next_start.prop(&prev.name) {
            None => issues.push(ValidationIssue::new(
                path,
                format!(
                    "prop '{}' from the previous unit's end state is missing",
                    prev.name
                ),
            )),
            Some(next) => compare_prop(prev, next, allowance, &path, &mut issues),
        }
    }

    issues
}

fn compare_character(
    prev: &CharacterState,
    next: &CharacterState,
    allowance: &ChangeAllowance,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let fields = [
        ("location", &prev.location, &next.location),
        ("stance", &prev.stance, &next.stance),
        ("facing", &prev.facing, &next.facing),
    ];
    for (field, before, after) in fields {
        if allowance.allows(&prev.name, field) {
            continue;
        }
        compare_text(path, field, before, after, issues);
    }
    if !allowance.allows(&prev.name, "props_in_hand") {
        compare_hands(path, &prev.props_in_hand, &next.props_in_hand, &prev.name, allowance, issues);
    }
}

fn compare_hands(
    path: &str,
    before: &HandContents,
    after: &HandContents,
    name: &str,
    allowance: &ChangeAllowance,
    issues: &mut Vec<ValidationIssue>,
) {
    let hands = [
        ("left", &before.left, &after.left),
        ("right", &before.right, &after.right),
    ];
    for (hand, before, after) in hands {
        let field = format!("props_in_hand.{}", hand);
        if allowance.allows(name, &field) {
            continue;
        }
        compare_optional(path, &field, before, after, issues);
    }
}

fn compare_prop(
    prev: &PropState,
    next: &PropState,
    allowance: &ChangeAllowance,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    if !allowance.allows(&prev.name, "state") {
        compare_text(path, "state", &prev.state, &next.state, issues);
    }
    if !allowance.allows(&prev.name, "holder") {
        compare_optional(path, "holder", &prev.holder, &next.holder, issues);
    }
}

fn compare_text(path: &str, field: &str, before: &str, after: &str, issues: &mut Vec<ValidationIssue>) {
    let (b, a) = (normalize_text(before), normalize_text(after));
    if b.is_empty() || a.is_empty() || a == b {
        return;
    }
    issues.push(ValidationIssue::new(
        format!("{}.{}", path, field),
        format!(
            "{} changed from '{}' to '{}' across the boundary without a declared change",
            field,
            before.trim(),
            after.trim()
        ),
    ));
}

fn compare_optional(
    path: &str,
    field: &str,
    before: &Option<String>,
    after: &Option<String>,
    issues: &mut Vec<ValidationIssue>,
) {
    let normalize = |v: &Option<String>| v.as_deref().map(normalize_text).filter(|s| !s.is_empty());
    if normalize(before) == normalize(after) {
        return;
    }
    let show = |v: &Option<String>| v.as_deref().unwrap_or("nothing").to_string();
    issues.push(ValidationIssue::new(
        format!("{}.{}", path, field),
        format!(
            "{} changed from '{}' to '{}' across the boundary without a declared change",
            field,
            show(before),
            show(after)
        ),
    ));
}
