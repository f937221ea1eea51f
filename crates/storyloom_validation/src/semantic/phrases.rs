//! Forbidden-phrase detection for fields describing a frozen instant.
//!
//! Each unit is rendered as a still image, so narration of a process
//! ("then", "gradually", "begins to") cannot be drawn. Phrase sets are
//! locale-tagged data, loaded from configuration.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use storyloom_core::ValidationIssue;
use storyloom_error::ConfigError;

/// Regular expressions for one written language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseSet {
    /// Locale tag (e.g. `en`, `zh`)
    pub locale: String,
    /// Case-insensitive regular expressions
    pub patterns: Vec<String>,
}

/// The phrase sets shipped by default: English and Chinese.
pub fn default_phrase_sets() -> Vec<PhraseSet> {
    vec![
        PhraseSet {
            locale: "en".to_string(),
            patterns: vec![
                r"\b(then|after|before|while|when)\b".to_string(),
                r"\b(starts?\s+to|begin(s)?\s+to)\b".to_string(),
                r"\b(slowly|gradually|progressively)\b".to_string(),
            ],
        },
        PhraseSet {
            locale: "zh".to_string(),
            patterns: vec!["(然后|之后|随后|接着|同时|一边|开始|逐渐|慢慢|渐渐|正在)".to_string()],
        },
    ]
}

/// A match of a forbidden phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseMatch {
    /// Locale of the matching set
    pub locale: String,
    /// The matched text
    pub matched: String,
}

/// Compiled phrase sets.
///
/// # Examples
///
/// ```
/// use storyloom_validation::{PhraseMatcher, default_phrase_sets};
///
/// let matcher = PhraseMatcher::new(&default_phrase_sets()).unwrap();
/// assert!(matcher.find("She slowly raises the lamp").is_some());
/// assert!(matcher.find("She holds the lamp aloft").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    sets: Vec<(String, Vec<Regex>)>,
}

impl PhraseMatcher {
    /// Compile the given phrase sets.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the locale and pattern that failed to
    /// compile.
    pub fn new(sets: &[PhraseSet]) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(sets.len());
        for set in sets {
            let mut regexes = Vec::with_capacity(set.patterns.len());
            for pattern in &set.patterns {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        ConfigError::new(format!(
                            "Invalid phrase pattern '{}' for locale '{}': {}",
                            pattern, set.locale, e
                        ))
                    })?;
                regexes.push(regex);
            }
            compiled.push((set.locale.clone(), regexes));
        }
        Ok(Self { sets: compiled })
    }

    /// The first forbidden phrase in `text`, if any.
    pub fn find(&self, text: &str) -> Option<PhraseMatch> {
        self.sets.iter().find_map(|(locale, regexes)| {
            regexes.iter().find_map(|regex| {
                regex.find(text).map(|m| PhraseMatch {
                    locale: locale.clone(),
                    matched: m.as_str().to_string(),
                })
            })
        })
    }

    /// An issue at `path` if `text` contains a forbidden phrase.
    pub fn check(&self, path: &str, text: &str) -> Option<ValidationIssue> {
        self.find(text).map(|found| {
            ValidationIssue::new(
                path,
                format!(
                    "contains continuous-action phrase \"{}\" ({}); describe a single frozen instant",
                    found.matched, found.locale
                ),
            )
        })
    }

    /// Locales with at least one pattern.
    pub fn locales(&self) -> Vec<&str> {
        self.sets.iter().map(|(locale, _)| locale.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> PhraseMatcher {
        PhraseMatcher::new(&default_phrase_sets()).unwrap()
    }

    #[test]
    fn test_english_phrases() {
        let m = matcher();
        assert_eq!(m.find("Mira THEN turns").unwrap().matched, "THEN");
        assert_eq!(m.find("he begins to run").unwrap().matched, "begins to");
        assert_eq!(m.find("the fog starts  to lift").unwrap().locale, "en");
    }

    #[test]
    fn test_word_boundaries() {
        assert!(matcher().find("Athena whenceforth").is_none());
    }

    #[test]
    fn test_chinese_phrases() {
        let found = matcher().find("她慢慢抬起头").unwrap();
        assert_eq!(found.locale, "zh");
        assert_eq!(found.matched, "慢慢");
    }

    #[test]
    fn test_check_reports_path() {
        let issue = matcher()
            .check("frames.mid.frame_spec.subjects.0.action_snapshot", "gradually kneels")
            .unwrap();
        assert_eq!(issue.path(), "frames.mid.frame_spec.subjects.0.action_snapshot");
        assert!(issue.message().contains("gradually"));
    }

    #[test]
    fn test_new_locale_is_configuration_only() {
        let sets = vec![PhraseSet {
            locale: "fr".to_string(),
            patterns: vec![r"\bpuis\b".to_string()],
        }];
        let m = PhraseMatcher::new(&sets).unwrap();
        assert_eq!(m.locales(), vec!["fr"]);
        assert!(m.find("elle se lève puis sourit").is_some());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let sets = vec![PhraseSet {
            locale: "en".to_string(),
            patterns: vec!["(unclosed".to_string()],
        }];
        let err = PhraseMatcher::new(&sets).unwrap_err();
        assert!(err.message.contains("(unclosed"));
    }
}
