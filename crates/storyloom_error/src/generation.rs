//! Errors raised by the generate, validate, repair loop.

use storyloom_core::{IssueList, TokenUsage, ValidationIssue};

/// Why a generation did not produce an accepted value.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum GenerationErrorKind {
    /// The value did not match the declared shape
    #[display("Schema violation:\n{}", _0)]
    SchemaViolation(IssueList),
    /// The value matched the shape but failed a semantic check
    #[display("Semantic violation:\n{}", _0)]
    SemanticViolation(IssueList),
    /// A unit's start disagrees with the previous unit's end
    #[display("Continuity violation in unit '{}':\n{}", unit, issues)]
    ContinuityViolation {
        /// Offending unit id
        unit: String,
        /// Outstanding issues
        issues: IssueList,
    },
    /// Every allowed model call was spent
    #[display("Budget exceeded after {} attempts:\n{}", attempts, issues)]
    BudgetExceeded {
        /// Model calls made
        attempts: u32,
        /// Issues reported for the final attempt
        issues: IssueList,
    },
    /// The caller cancelled the run
    #[display("Generation cancelled")]
    Cancelled,
}

/// Generation error with token accounting and location tracking.
///
/// # Examples
///
/// ```
/// use storyloom_core::{TokenUsage, ValidationIssue};
/// use storyloom_error::{GenerationError, GenerationErrorKind};
///
/// let err = GenerationError::new(GenerationErrorKind::BudgetExceeded {
///     attempts: 2,
///     issues: vec![ValidationIssue::root("not JSON")].into(),
/// })
/// .with_token_usage(TokenUsage::new(10, 5));
///
/// assert_eq!(err.issues().len(), 1);
/// assert_eq!(err.token_usage.total, 15);
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Generation Error: {} at line {} in {}", kind, line, file)]
pub struct GenerationError {
    /// The kind of error that occurred
    pub kind: GenerationErrorKind,
    /// Tokens consumed before the failure
    pub token_usage: TokenUsage,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GenerationError {
    /// Create a new generation error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GenerationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            token_usage: TokenUsage::default(),
            line: location.line(),
            file: location.file(),
        }
    }

    /// Attach the token usage accumulated before the failure.
    pub fn with_token_usage(mut self, token_usage: TokenUsage) -> Self {
        self.token_usage = token_usage;
        self
    }

    /// Issues carried by the error, empty for `Cancelled`.
    pub fn issues(&self) -> &[ValidationIssue] {
        match &self.kind {
            GenerationErrorKind::SchemaViolation(issues)
            | GenerationErrorKind::SemanticViolation(issues)
            | GenerationErrorKind::ContinuityViolation { issues, .. }
            | GenerationErrorKind::BudgetExceeded { issues, .. } => issues,
            GenerationErrorKind::Cancelled => &[],
        }
    }
}
