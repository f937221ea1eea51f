//! Validation for model-generated JSON.
//!
//! Three layers run in order on every model response:
//!
//! 1. [`extract_json`] pulls a single JSON value out of free-form text.
//! 2. [`Shape`] checks the value structurally and reports path-located issues.
//! 3. [`SemanticValidator`]s check domain rules on the typed value:
//!    forbidden phrases, frame differentiation, duplicates, continuity
//!    carry-over and secondary-attribute consistency.
//!
//! Every layer reports problems as [`ValidationIssue`](storyloom_core::ValidationIssue)s
//! so a repair prompt can quote them back to the model.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod extraction;
mod schema;
mod semantic;

pub use extraction::{Extracted, JsonKind, extract_json, repair_json};
pub use schema::{Field, ObjectShape, Shape, Strictness, validate_typed};
pub use semantic::{
    AttributeSet, ChangeAllowance, FrameSubject, FnValidator, PhraseMatch, PhraseMatcher,
    PhraseSet, SemanticValidator, ValidatorSet, check_carry_over, check_duplicates,
    check_secondary, check_transition, default_phrase_sets, diff_score,
};
