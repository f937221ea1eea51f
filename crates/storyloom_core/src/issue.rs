//! Validation issues reported by schema and semantic checks.

use serde::{Deserialize, Serialize};

/// A single located complaint about a generated artifact.
///
/// Paths are dot-separated (`frames.start.frame_spec.subjects.0.pose`);
/// `"$"` refers to the whole document.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_more::Display,
)]
#[display("{}: {}", path, message)]
pub struct ValidationIssue {
    /// Location of the problem
    path: String,
    /// Human readable description
    message: String,
}

impl ValidationIssue {
    /// Create an issue at the given path.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an issue that refers to the whole document.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new("$", message)
    }

    /// Return a copy of this issue with `prefix` prepended to its path.
    pub fn prefixed(&self, prefix: &str) -> Self {
        let path = if self.path == "$" {
            prefix.to_string()
        } else {
            format!("{}.{}", prefix, self.path)
        };
        Self::new(path, self.message.clone())
    }
}

/// Render issues the way repair prompts present them.
///
/// Each issue becomes a `- path: message` line; an empty list renders as
/// `- (none)`.
///
/// # Examples
///
/// ```
/// use storyloom_core::{ValidationIssue, format_issues};
///
/// let issues = vec![ValidationIssue::new("panels.3.en", "must not be empty")];
/// assert_eq!(format_issues(&issues), "- panels.3.en: must not be empty");
/// assert_eq!(format_issues(&[]), "- (none)");
/// ```
pub fn format_issues(issues: &[ValidationIssue]) -> String {
    if issues.is_empty() {
        return "- (none)".to_string();
    }
    issues
        .iter()
        .map(|issue| format!("- {}", issue))
        .collect::<Vec<_>>()
        .join("\n")
}

/// An owned list of issues, carried by error variants.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    derive_more::From,
    derive_more::Deref,
)]
pub struct IssueList(Vec<ValidationIssue>);

impl IssueList {
    /// Consume the list and return the inner vector.
    pub fn into_inner(self) -> Vec<ValidationIssue> {
        self.0
    }
}

impl std::fmt::Display for IssueList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_issues(&self.0))
    }
}

impl IntoIterator for IssueList {
    type Item = ValidationIssue;
    type IntoIter = std::vec::IntoIter<ValidationIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<ValidationIssue> for IssueList {
    fn from_iter<I: IntoIterator<Item = ValidationIssue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
