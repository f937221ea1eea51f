//! Trait definitions for the Storyloom pipeline.
//!
//! These traits are the seams to the systems Storyloom consumes but does not
//! own: the model provider, the prompt template store, and progress
//! persistence.

mod progress;
mod prompts;
mod traits;

pub use progress::ProgressRepository;
pub use prompts::PromptStore;
pub use traits::ModelClient;
