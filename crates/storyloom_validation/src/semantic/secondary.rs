//! Consistency of secondary attributes shared between consecutive units.
//!
//! Secondary attributes are values a unit should keep stable from its
//! predecessor unless told otherwise, such as camera parameters or the
//! background anchor set.

use std::collections::{BTreeMap, BTreeSet};
use storyloom_core::{ValidationIssue, normalize_text};

/// Named secondary attribute values of one unit.
///
/// # Examples
///
/// ```
/// use storyloom_validation::{AttributeSet, check_secondary};
///
/// let prev = AttributeSet::new().with("camera.shot_size", "MS").with("camera.angle", "eye");
/// let next = AttributeSet::new().with("camera.shot_size", "CU").with("camera.angle", "");
///
/// let issues = check_secondary(&prev, &next, "$");
/// assert_eq!(issues.len(), 1);
/// assert_eq!(issues[0].path(), "camera.shot_size");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    values: BTreeMap<String, String>,
}

impl AttributeSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scalar attribute.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Add an unordered, set-valued attribute.
    pub fn with_set<I, S>(self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let members: BTreeSet<String> = members
            .into_iter()
            .map(|m| normalize_text(m.as_ref()))
            .filter(|m| !m.is_empty())
            .collect();
        let joined = members.into_iter().collect::<Vec<_>>().join(", ");
        self.with(name, joined)
    }

    /// Value of an attribute.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// True when no attributes are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Issues for attributes that both units set to different non-empty values.
///
/// Paths are the attribute names, prefixed by `scope` unless it is `"$"`.
pub fn check_secondary(prev: &AttributeSet, next: &AttributeSet, scope: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (name, before) in &prev.values {
        let Some(after) = next.values.get(name) else {
            continue;
        };
        let (b, a) = (normalize_text(before), normalize_text(after));
        if b.is_empty() || a.is_empty() || a == b {
            continue;
        }
        let path = if scope == "$" {
            name.clone()
        } else {
            format!("{}.{}", scope, name)
        };
        issues.push(ValidationIssue::new(
            path,
            format!(
                "changed from '{}' to '{}'; keep it consistent with the previous unit",
                before, after
            ),
        ));
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sets_compare_unordered() {
        let prev = AttributeSet::new().with_set("background_anchors", ["Pier", "lighthouse"]);
        let next = AttributeSet::new().with_set("background_anchors", ["lighthouse", "pier "]);
        assert!(check_secondary(&prev, &next, "$").is_empty());
    }

    #[test]
    fn test_missing_attribute_is_not_compared() {
        let prev = AttributeSet::new().with("camera.lens_hint", "35mm");
        assert!(check_secondary(&prev, &AttributeSet::new(), "$").is_empty());
    }

    #[test]
    fn test_scope_prefix() {
        let prev = AttributeSet::new().with("aspect_ratio", "16:9");
        let next = AttributeSet::new().with("aspect_ratio", "9:16");
        let issues = check_secondary(&prev, &next, "camera");
        assert_eq!(issues[0].path(), "camera.aspect_ratio");
    }
}
