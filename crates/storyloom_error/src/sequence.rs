//! Sequence construction errors.

/// Specific sequence failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SequenceErrorKind {
    /// The sequence has no units
    #[display("Sequence has no units")]
    EmptySequence,
    /// Two units share an id
    #[display("Duplicate unit id '{}'", _0)]
    DuplicateUnit(String),
    /// A unit id was referenced that is not in the sequence
    #[display("Unknown unit '{}'", _0)]
    UnknownUnit(String),
    /// A stored unit could not be decoded as the expected unit type
    #[display("Unit '{}' does not decode as the expected type: {}", unit, message)]
    UnitKindMismatch {
        /// Unit id
        unit: String,
        /// Decoder message
        message: String,
    },
}

/// Sequence error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Sequence Error: {} at line {} in {}", kind, line, file)]
pub struct SequenceError {
    /// The kind of error that occurred
    pub kind: SequenceErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl SequenceError {
    /// Create a new sequence error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SequenceErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
