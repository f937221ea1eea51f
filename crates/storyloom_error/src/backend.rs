//! Model client error types.

use storyloom_core::TokenUsage;

/// Model client or transport failure with source location.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Backend Error: {} at line {} in {}", message, line, file)]
pub struct BackendError {
    /// Error message
    pub message: String,
    /// Tokens spent by earlier calls of the same generation
    pub token_usage: TokenUsage,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl BackendError {
    /// Create a new BackendError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use storyloom_error::BackendError;
    ///
    /// let err = BackendError::new("Provider returned 503");
    /// assert!(err.message.contains("503"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            token_usage: TokenUsage::default(),
            line: location.line(),
            file: location.file(),
        }
    }

    /// Attach the token usage spent before the failure.
    pub fn with_token_usage(mut self, token_usage: TokenUsage) -> Self {
        self.token_usage = token_usage;
        self
    }
}
