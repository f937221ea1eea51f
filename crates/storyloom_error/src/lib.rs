//! Error types for the Storyloom pipeline.
//!
//! This crate provides the error types used throughout the Storyloom crates.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use storyloom_error::{BackendError, StoryloomResult};
//!
//! fn call_model() -> StoryloomResult<String> {
//!     Err(BackendError::new("Connection refused"))?
//! }
//!
//! assert!(call_model().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod builder;
mod config;
mod error;
mod extraction;
mod generation;
mod json;
mod progress;
mod sequence;

pub use backend::BackendError;
pub use builder::{BuilderError, BuilderErrorKind};
pub use config::ConfigError;
pub use error::{StoryloomError, StoryloomErrorKind, StoryloomResult};
pub use extraction::{ExtractionError, ExtractionErrorKind};
pub use generation::{GenerationError, GenerationErrorKind};
pub use json::JsonError;
pub use progress::{ProgressError, ProgressErrorKind};
pub use sequence::{SequenceError, SequenceErrorKind};
