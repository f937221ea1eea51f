//! Text normalization shared by name matching and duplicate detection.

/// Trim, collapse internal whitespace to single spaces, and case-fold.
///
/// # Examples
///
/// ```
/// use storyloom_core::normalize_text;
///
/// assert_eq!(normalize_text("  Mira   walks\tIN "), "mira walks in");
/// ```
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
