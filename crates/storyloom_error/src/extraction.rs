//! Errors raised while pulling JSON out of model text.

/// Why no JSON value could be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ExtractionErrorKind {
    /// The text was empty or whitespace
    #[display("Response text is empty")]
    Empty,
    /// No `{` or `[` appears in the text
    #[display("No JSON object or array start found")]
    NoJsonStart,
    /// A bracketed span never closed
    #[display("JSON span starting at byte {} is unterminated", _0)]
    Unterminated(usize),
    /// A closing bracket did not match the open one
    #[display("Mismatched bracket at byte {}: expected '{}', found '{}'", position, expected, found)]
    Mismatched {
        /// Byte offset of the offending closer
        position: usize,
        /// Closer the stack expected
        expected: char,
        /// Closer actually found
        found: char,
    },
    /// Valid JSON was found but of the wrong kind
    #[display("Expected a JSON {}, found a JSON {}", expected, found)]
    KindMismatch {
        /// Kind requested by the caller
        expected: String,
        /// Kind actually parsed
        found: String,
    },
    /// A candidate span failed to parse
    #[display("Invalid JSON: {}\n{}", message, context)]
    Invalid {
        /// Parser message
        message: String,
        /// Snippet around the failure with a caret marker
        context: String,
    },
}

/// Extraction error with location tracking.
///
/// # Examples
///
/// ```
/// use storyloom_error::{ExtractionError, ExtractionErrorKind};
///
/// let err = ExtractionError::new(ExtractionErrorKind::NoJsonStart);
/// assert!(format!("{}", err).contains("No JSON"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Extraction Error: {} at line {} in {}", kind, line, file)]
pub struct ExtractionError {
    /// The kind of error that occurred
    pub kind: ExtractionErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ExtractionError {
    /// Create a new extraction error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ExtractionErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// The error message without location, suitable for repair prompts.
    pub fn reason(&self) -> String {
        self.kind.to_string()
    }
}
