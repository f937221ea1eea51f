//! Top-level error wrapper types.

use crate::{
    BackendError, BuilderError, ConfigError, ExtractionError, GenerationError, JsonError,
    ProgressError, SequenceError,
};
use storyloom_core::TokenUsage;

/// Every error the Storyloom crates can raise.
///
/// # Examples
///
/// ```
/// use storyloom_error::{ConfigError, StoryloomError};
///
/// let err: StoryloomError = ConfigError::new("bad phrase pattern").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum StoryloomErrorKind {
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Model client error
    #[from(BackendError)]
    Backend(BackendError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
    /// Text extraction error
    #[from(ExtractionError)]
    Extraction(ExtractionError),
    /// Generation loop error
    #[from(GenerationError)]
    Generation(GenerationError),
    /// Progress persistence error
    #[from(ProgressError)]
    Progress(ProgressError),
    /// Sequence construction error
    #[from(SequenceError)]
    Sequence(SequenceError),
}

/// Storyloom error with kind discrimination.
///
/// # Examples
///
/// ```
/// use storyloom_error::{BackendError, StoryloomResult};
///
/// fn might_fail() -> StoryloomResult<()> {
///     Err(BackendError::new("timeout"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Storyloom Error: {}", _0)]
pub struct StoryloomError(Box<StoryloomErrorKind>);

impl StoryloomError {
    /// Create a new error from a kind.
    pub fn new(kind: StoryloomErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StoryloomErrorKind {
        &self.0
    }

    /// The generation error, if this is one.
    pub fn as_generation(&self) -> Option<&GenerationError> {
        match self.kind() {
            StoryloomErrorKind::Generation(err) => Some(err),
            _ => None,
        }
    }

    /// Tokens spent before the failure.
    ///
    /// Only generation and backend errors carry usage; every other kind
    /// reports zero.
    pub fn token_usage(&self) -> TokenUsage {
        match self.kind() {
            StoryloomErrorKind::Generation(err) => err.token_usage,
            StoryloomErrorKind::Backend(err) => err.token_usage,
            _ => TokenUsage::default(),
        }
    }

    /// Add `earlier` to the usage a generation or backend error carries.
    ///
    /// # Examples
    ///
    /// ```
    /// use storyloom_core::TokenUsage;
    /// use storyloom_error::{BackendError, ConfigError, StoryloomError};
    ///
    /// let err: StoryloomError = BackendError::new("connection reset").into();
    /// let err = err.with_earlier_usage(TokenUsage::new(10, 5));
    /// assert_eq!(err.token_usage().total, 15);
    ///
    /// let other: StoryloomError = ConfigError::new("bad").into();
    /// assert_eq!(other.with_earlier_usage(TokenUsage::new(1, 1)).token_usage().total, 0);
    /// ```
    pub fn with_earlier_usage(mut self, earlier: TokenUsage) -> Self {
        match self.0.as_mut() {
            StoryloomErrorKind::Generation(err) => err.token_usage += earlier,
            StoryloomErrorKind::Backend(err) => err.token_usage += earlier,
            _ => {}
        }
        self
    }
}

// Generic From implementation for any type that converts to StoryloomErrorKind
impl<T> From<T> for StoryloomError
where
    T: Into<StoryloomErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Storyloom operations.
pub type StoryloomResult<T> = std::result::Result<T, StoryloomError>;
