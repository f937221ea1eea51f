//! Tolerant extraction of a single JSON value from model text.
//!
//! Model replies often wrap JSON in prose or markdown fences, leave trailing
//! commas, put raw newlines inside strings, or use typographic quotes. The
//! extractor tries progressively looser strategies and reports the most
//! specific failure when all of them fail.

use serde_json::Value;
use storyloom_error::{ExtractionError, ExtractionErrorKind};
use tracing::debug;

/// The top-level kind of a JSON document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, serde::Serialize, serde::Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JsonKind {
    /// `{ ... }`
    Object,
    /// `[ ... ]`
    Array,
}

impl JsonKind {
    /// Kind of a parsed value, if it is a container.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Object(_) => Some(Self::Object),
            Value::Array(_) => Some(Self::Array),
            _ => None,
        }
    }
}

/// A successfully extracted JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    /// The parsed value
    pub value: Value,
    /// The JSON text that parsed, after any repairs
    pub text: String,
    /// Top-level kind of `value`
    pub kind: JsonKind,
}

/// Extract the first JSON value of the expected kind from `text`.
///
/// Strategies, in order:
/// 1. the whole text, as is and after [`repair_json`],
/// 2. the contents of each markdown code fence,
/// 3. each balanced `{...}`/`[...]` span, scanning left to right.
///
/// # Errors
///
/// Returns the most specific [`ExtractionErrorKind`] observed: `Empty` for
/// blank input, `NoJsonStart` when no bracket appears, `KindMismatch` when
/// only JSON of the other kind parsed, otherwise the first span failure
/// (`Unterminated`, `Mismatched` or `Invalid`).
///
/// # Examples
///
/// ```
/// use storyloom_validation::{JsonKind, extract_json};
///
/// let reply = "Sure! Here it is:\n```json\n{\"beat_id\": \"b1\",}\n```";
/// let extracted = extract_json(reply, Some(JsonKind::Object)).unwrap();
/// assert_eq!(extracted.value["beat_id"], "b1");
/// ```
pub fn extract_json(text: &str, expected: Option<JsonKind>) -> Result<Extracted, ExtractionError> {
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::new(ExtractionErrorKind::Empty));
    }

    let mut found_other: Option<JsonKind> = None;

    if let Some(extracted) = parse_candidate(trimmed, expected, &mut found_other) {
        debug!(kind = %extracted.kind, "Parsed whole response as JSON");
        return Ok(extracted);
    }

    for block in code_blocks(trimmed) {
        if let Some(extracted) = parse_candidate(block, expected, &mut found_other) {
            debug!(kind = %extracted.kind, "Parsed JSON from code fence");
            return Ok(extracted);
        }
    }

    let mut first_failure: Option<ExtractionErrorKind> = None;
    let mut saw_start = false;

    for (start, ch) in trimmed.char_indices() {
        let kind = match ch {
            '{' => JsonKind::Object,
            '[' => JsonKind::Array,
            _ => continue,
        };
        saw_start = true;
        if expected.is_some_and(|wanted| wanted != kind) {
            continue;
        }
        match balanced_end(trimmed, start) {
            Ok(end) => {
                let span = &trimmed[start..end];
                match parse_span(span) {
                    Ok((value, repaired)) => {
                        if let Some(extracted) = accept(value, repaired, expected, &mut found_other)
                        {
                            debug!(kind = %extracted.kind, start, "Parsed JSON from balanced span");
                            return Ok(extracted);
                        }
                    }
                    Err(kind) => {
                        first_failure.get_or_insert(kind);
                    }
                }
            }
            Err(kind) => {
                first_failure.get_or_insert(kind);
            }
        }
    }

    if !saw_start {
        return Err(ExtractionError::new(ExtractionErrorKind::NoJsonStart));
    }
    if let (Some(wanted), Some(found)) = (expected, found_other) {
        return Err(ExtractionError::new(ExtractionErrorKind::KindMismatch {
            expected: wanted.to_string(),
            found: found.to_string(),
        }));
    }
    let kind = match first_failure {
        Some(kind) => kind,
        None => match expected {
            Some(wanted) => ExtractionErrorKind::KindMismatch {
                expected: wanted.to_string(),
                found: "none".to_string(),
            },
            None => ExtractionErrorKind::NoJsonStart,
        },
    };
    debug!(error = %kind, "No JSON value could be extracted");
    Err(ExtractionError::new(kind))
}

/// Apply lightweight repairs that commonly make model JSON parse.
///
/// Outside string literals, trailing commas before `}` or `]` are removed.
/// Inside string literals, raw newlines and tabs are escaped and carriage
/// returns dropped. When the text has no ASCII double quote but does contain
/// typographic quotes, those are treated as string delimiters.
///
/// # Examples
///
/// ```
/// use storyloom_validation::repair_json;
///
/// assert_eq!(repair_json("{\"a\": [1, 2,],}"), "{\"a\": [1, 2]}");
/// assert_eq!(repair_json("{“a”: “b”}"), "{\"a\": \"b\"}");
/// ```
pub fn repair_json(text: &str) -> String {
    let normalized;
    let text = if !text.contains('"') && (text.contains('\u{201c}') || text.contains('\u{201d}')) {
        normalized = text.replace(['\u{201c}', '\u{201d}'], "\"");
        normalized.as_str()
    } else {
        text
    };

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => {}
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

fn parse_candidate(
    text: &str,
    expected: Option<JsonKind>,
    found_other: &mut Option<JsonKind>,
) -> Option<Extracted> {
    let (value, text) = parse_span(text).ok()?;
    accept(value, text, expected, found_other)
}

fn accept(
    value: Value,
    text: String,
    expected: Option<JsonKind>,
    found_other: &mut Option<JsonKind>,
) -> Option<Extracted> {
    let kind = JsonKind::of(&value)?;
    match expected {
        Some(wanted) if wanted != kind => {
            found_other.get_or_insert(kind);
            None
        }
        _ => Some(Extracted { value, text, kind }),
    }
}

/// Parse raw, then repaired. Returns the value and the text that parsed.
fn parse_span(span: &str) -> Result<(Value, String), ExtractionErrorKind> {
    match serde_json::from_str::<Value>(span) {
        Ok(value) => Ok((value, span.to_string())),
        Err(_) => {
            let repaired = repair_json(span);
            serde_json::from_str::<Value>(&repaired)
                .map(|value| (value, repaired.clone()))
                .map_err(|err| ExtractionErrorKind::Invalid {
                    message: err.to_string(),
                    context: error_context(&repaired, err.line(), err.column()),
                })
        }
    }
}

/// Find the byte offset one past the bracket closing the one at `start`.
fn balanced_end(text: &str, start: usize) -> Result<usize, ExtractionErrorKind> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        let position = start + offset;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                let expected = stack.pop().unwrap_or(ch);
                if expected != ch {
                    return Err(ExtractionErrorKind::Mismatched {
                        position,
                        expected,
                        found: ch,
                    });
                }
                if stack.is_empty() {
                    return Ok(position + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    Err(ExtractionErrorKind::Unterminated(start))
}

/// Contents of every markdown code fence, in order.
fn code_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        match body.find("```") {
            Some(close) => {
                blocks.push(body[..close].trim());
                rest = &body[close + 3..];
            }
            None => {
                // Truncated reply: take everything after the opening fence.
                blocks.push(body.trim());
                break;
            }
        }
    }
    blocks
}

/// One line of text around a parse failure, with a caret under the column.
fn error_context(text: &str, line: usize, column: usize) -> String {
    const WINDOW: usize = 40;

    let source_line = text.lines().nth(line.saturating_sub(1)).unwrap_or_default();
    let chars: Vec<char> = source_line.chars().collect();
    let column = column.saturating_sub(1).min(chars.len());
    let from = column.saturating_sub(WINDOW);
    let to = (column + WINDOW).min(chars.len());
    let snippet: String = chars[from..to].iter().collect();
    let caret = " ".repeat(column - from);
    format!("{}\n{}^", snippet, caret)
}
