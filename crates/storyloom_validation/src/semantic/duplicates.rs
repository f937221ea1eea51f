//! Duplicate text detection.

use std::collections::HashMap;
use storyloom_core::{ValidationIssue, normalize_text};

/// Flag items whose normalized text repeats an earlier item.
///
/// `items` are `(path, text)` pairs. Each repeat yields one issue at its own
/// path naming the first occurrence. Blank texts are skipped.
///
/// # Examples
///
/// ```
/// use storyloom_validation::check_duplicates;
///
/// let issues = check_duplicates(&[
///     ("panels.1.en".to_string(), "Mira waves"),
///     ("panels.2.en".to_string(), "  mira   WAVES "),
/// ]);
/// assert_eq!(issues.len(), 1);
/// assert_eq!(issues[0].message(), "duplicates panels.1.en");
/// ```
pub fn check_duplicates(items: &[(String, &str)]) -> Vec<ValidationIssue> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut issues = Vec::new();
    for (path, text) in items {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            continue;
        }
        match seen.get(&normalized) {
            Some(first) => {
                issues.push(ValidationIssue::new(path, format!("duplicates {}", first)));
            }
            None => {
                seen.insert(normalized, path.as_str());
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nine_panels_with_one_duplicate_pair() {
        let texts = [
            "[LS] Harbor at dawn",
            "[MS] Mira on the pier",
            "[CU] A rope coils",
            "[MS] Owen waves",
            "[LS] Gulls scatter",
            "[CU] Mira's hands",
            "[cu]   a ROPE coils ",
            "[MS] The boat rocks",
            "[LS] Sun breaks through",
        ];
        let items: Vec<(String, &str)> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| (format!("panels.{}.en", i + 1), *t))
            .collect();

        let issues = check_duplicates(&items);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path(), "panels.7.en");
        assert_eq!(issues[0].message(), "duplicates panels.3.en");
    }

    #[test]
    fn test_blank_texts_are_not_duplicates() {
        let items = vec![("a".to_string(), " "), ("b".to_string(), "")];
        assert!(check_duplicates(&items).is_empty());
    }

    #[test]
    fn test_triple_reports_against_first() {
        let items = vec![
            ("a".to_string(), "x"),
            ("b".to_string(), "x"),
            ("c".to_string(), "X"),
        ];
        let issues = check_duplicates(&items);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.message() == "duplicates a"));
    }
}
