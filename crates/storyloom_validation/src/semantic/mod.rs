//! Domain checks that run after a value passes its shape.

mod continuity;
mod differentiation;
mod duplicates;
mod phrases;
mod secondary;

pub use continuity::{ChangeAllowance, check_carry_over};
pub use differentiation::{FrameSubject, check_transition, diff_score};
pub use duplicates::check_duplicates;
pub use phrases::{PhraseMatch, PhraseMatcher, PhraseSet, default_phrase_sets};
pub use secondary::{AttributeSet, check_secondary};

use std::sync::Arc;
use storyloom_core::ValidationIssue;

/// A composable check over a typed artifact.
pub trait SemanticValidator<T>: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Issues found in `value`; empty means the check passed.
    fn validate(&self, value: &T) -> Vec<ValidationIssue>;
}

/// A validator built from a closure.
pub struct FnValidator<F> {
    name: String,
    check: F,
}

impl<F> FnValidator<F> {
    /// Wrap `check` under `name`.
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<T, F> SemanticValidator<T> for FnValidator<F>
where
    F: Fn(&T) -> Vec<ValidationIssue> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, value: &T) -> Vec<ValidationIssue> {
        (self.check)(value)
    }
}

/// An ordered collection of semantic validators.
///
/// Every validator runs, and their issues are concatenated in order.
///
/// # Examples
///
/// ```
/// use storyloom_core::ValidationIssue;
/// use storyloom_validation::ValidatorSet;
///
/// let validators = ValidatorSet::<String>::new()
///     .with_fn("not_empty", |s: &String| {
///         if s.is_empty() {
///             vec![ValidationIssue::root("must not be empty")]
///         } else {
///             vec![]
///         }
///     });
///
/// assert_eq!(validators.run(&String::new()).len(), 1);
/// assert!(validators.run(&"ok".to_string()).is_empty());
/// ```
pub struct ValidatorSet<T> {
    validators: Vec<Arc<dyn SemanticValidator<T>>>,
}

impl<T> Clone for ValidatorSet<T> {
    fn clone(&self) -> Self {
        Self {
            validators: self.validators.clone(),
        }
    }
}

impl<T> Default for ValidatorSet<T> {
    fn default() -> Self {
        Self {
            validators: Vec::new(),
        }
    }
}

impl<T> std::fmt::Debug for ValidatorSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.validators.iter().map(|v| v.name()))
            .finish()
    }
}

impl<T: 'static> ValidatorSet<T> {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator.
    pub fn with(mut self, validator: impl SemanticValidator<T> + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Add a closure as a validator.
    pub fn with_fn<F>(self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&T) -> Vec<ValidationIssue> + Send + Sync + 'static,
    {
        self.with(FnValidator::new(name, check))
    }

    /// Append every validator of `other`.
    pub fn extend(mut self, other: ValidatorSet<T>) -> Self {
        self.validators.extend(other.validators);
        self
    }

    /// Run every validator and collect their issues.
    pub fn run(&self, value: &T) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for validator in &self.validators {
            let found = validator.validate(value);
            if !found.is_empty() {
                tracing::debug!(
                    validator = validator.name(),
                    count = found.len(),
                    "Semantic validator reported issues"
                );
            }
            issues.extend(found);
        }
        issues
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// True when the set holds no validators.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
