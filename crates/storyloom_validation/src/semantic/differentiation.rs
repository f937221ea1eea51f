//! Differentiation scoring between adjacent frames.
//!
//! Adjacent frames inside one unit must differ visibly. The score counts
//! attribute-level differences per subject: one point per differing
//! attribute for a subject present in both frames, two points for a subject
//! present in only one.

use std::collections::BTreeMap;
use storyloom_core::{ValidationIssue, normalize_text};

/// A subject that can be compared across frames.
pub trait FrameSubject {
    /// Identity used to pair the subject across frames.
    fn subject_key(&self) -> String;

    /// Comparable attributes as `(name, value)` pairs, in a fixed order.
    ///
    /// Multi-valued attributes (hand contents, prop states) should be
    /// flattened into a canonical string so that ordering does not count as a
    /// difference.
    fn attributes(&self) -> Vec<(&'static str, String)>;
}

/// Count attribute-level differences between two frames.
///
/// # Examples
///
/// ```
/// use storyloom_validation::{FrameSubject, diff_score};
///
/// struct Pose(&'static str, &'static str);
///
/// impl FrameSubject for Pose {
///     fn subject_key(&self) -> String {
///         self.0.to_string()
///     }
///     fn attributes(&self) -> Vec<(&'static str, String)> {
///         vec![("pose", self.1.to_string())]
///     }
/// }
///
/// assert_eq!(diff_score(&[Pose("mira", "standing")], &[Pose("mira", "standing")]), 0);
/// assert_eq!(diff_score(&[Pose("mira", "standing")], &[Pose("mira", "kneeling")]), 1);
/// assert_eq!(diff_score(&[Pose("mira", "standing")], &[]), 2);
/// ```
pub fn diff_score<S: FrameSubject>(from: &[S], to: &[S]) -> u32 {
    let from = by_key(from);
    let to = by_key(to);

    let mut score = 0;
    for (key, attributes) in &from {
        match to.get(key) {
            None => score += 2,
            Some(other) => {
                score += attributes
                    .iter()
                    .filter(|(name, value)| {
                        let counterpart = other
                            .iter()
                            .find(|(other_name, _)| other_name == name)
                            .map(|(_, v)| v.as_str())
                            .unwrap_or_default();
                        normalize_text(value) != normalize_text(counterpart)
                    })
                    .count() as u32;
            }
        }
    }
    score += to.keys().filter(|key| !from.contains_key(*key)).count() as u32 * 2;
    score
}

/// An issue at `path` when the transition scores below `threshold`.
pub fn check_transition<S: FrameSubject>(
    path: &str,
    from: &[S],
    to: &[S],
    threshold: u32,
) -> Option<ValidationIssue> {
    let score = diff_score(from, to);
    (score < threshold).then(|| {
        ValidationIssue::new(
            path,
            format!(
                "differentiation score {} is below the minimum of {}; change pose, gaze, expression, hands or props",
                score, threshold
            ),
        )
    })
}

fn by_key<S: FrameSubject>(subjects: &[S]) -> BTreeMap<String, Vec<(&'static str, String)>> {
    subjects
        .iter()
        .map(|s| (normalize_text(&s.subject_key()), s.attributes()))
        .collect()
}
