//! Progress persistence errors.

/// Specific progress repository failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ProgressErrorKind {
    /// No document stored for the parent
    #[display("No progress document for '{}'", _0)]
    NotFound(String),
    /// Another writer saved since this document was loaded
    #[display(
        "Version conflict for '{}': expected version {}, stored version is {}",
        parent,
        expected,
        found
    )]
    VersionConflict {
        /// Parent entity id
        parent: String,
        /// Version the caller loaded
        expected: u64,
        /// Version currently stored
        found: u64,
    },
    /// The stored document could not be decoded
    #[display("Corrupt progress document: {}", _0)]
    Corrupt(String),
    /// Filesystem failure
    #[display("Progress I/O failure: {}", _0)]
    Io(String),
}

/// Progress error with location tracking.
///
/// # Examples
///
/// ```
/// use storyloom_error::{ProgressError, ProgressErrorKind};
///
/// let err = ProgressError::new(ProgressErrorKind::NotFound("scene-1".to_string()));
/// assert!(format!("{}", err).contains("scene-1"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Progress Error: {} at line {} in {}", kind, line, file)]
pub struct ProgressError {
    /// The kind of error that occurred
    pub kind: ProgressErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ProgressError {
    /// Create a new progress error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ProgressErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
