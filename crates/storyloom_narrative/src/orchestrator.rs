//! The bounded generate, validate, repair loop.
//!
//! One orchestrator serves every artifact type. A call is parameterized by
//! the request (prompts, shape, budget), a [`ValidatorSet`] for the typed
//! value, and a [`RepairPromptBuilder`].

use crate::{GenerationRequest, Generated, RepairPromptBuilder};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use storyloom_core::{
    ChatConfig, ChatMessage, ResponseFormat, TokenUsage, UnitStatus, ValidationIssue,
};
use storyloom_error::{GenerationError, GenerationErrorKind, StoryloomResult};
use storyloom_interface::ModelClient;
use storyloom_validation::{Extracted, Shape, ValidatorSet, extract_json, validate_typed};
use tracing::{debug, error, info, instrument, warn};

/// Check a parsed value against a shape, then against semantic validators.
///
/// Semantic validators only run once the shape check is clean.
///
/// # Errors
///
/// `SchemaViolation` for structural or decode issues, `SemanticViolation`
/// for issues reported by `validators`.
pub fn evaluate<T>(
    shape: &Shape,
    validators: &ValidatorSet<T>,
    value: &Value,
) -> Result<T, GenerationError>
where
    T: DeserializeOwned + 'static,
{
    let typed: T = validate_typed(shape, value)
        .map_err(|issues| GenerationError::new(GenerationErrorKind::SchemaViolation(issues.into())))?;
    let issues = validators.run(&typed);
    if !issues.is_empty() {
        return Err(GenerationError::new(GenerationErrorKind::SemanticViolation(
            issues.into(),
        )));
    }
    Ok(typed)
}

/// Told each time an attempt moves the unit to a new status.
///
/// The orchestrator awaits every notification before going on, so an
/// observer that saves progress has saved `Repairing` before the repair call
/// it announces is made.
#[async_trait]
pub trait PhaseObserver: Send + Sync {
    /// The unit entered `status` during `attempt` (1-based).
    async fn phase(&self, status: UnitStatus, attempt: u32) -> StoryloomResult<()>;
}

/// A [`PhaseObserver`] that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnorePhases;

#[async_trait]
impl PhaseObserver for IgnorePhases {
    async fn phase(&self, _status: UnitStatus, _attempt: u32) -> StoryloomResult<()> {
        Ok(())
    }
}

/// A rejected attempt: the text to quote back and why it failed.
struct Rejection {
    text: String,
    error: GenerationError,
}

/// Drives a model client through generation and repair.
pub struct GenerationOrchestrator<C> {
    client: C,
    config: ChatConfig,
}

impl<C: ModelClient> GenerationOrchestrator<C> {
    /// Create an orchestrator with default chat configuration.
    pub fn new(client: C) -> Self {
        Self {
            client,
            config: ChatConfig::default(),
        }
    }

    /// Use `config` as the base for every call (model, temperature, ...).
    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    /// The underlying model client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Generate a value, repairing until it validates or the budget runs out.
    ///
    /// Exactly one model call is made per attempt, and the call count never
    /// exceeds `request.max_attempts()`.
    ///
    /// # Errors
    ///
    /// - `BudgetExceeded` with the final issue list and summed token usage
    /// - `Cancelled` if the request's token fires between calls
    /// - any error the model client returns
    pub async fn generate<T>(
        &self,
        request: &GenerationRequest,
        validators: &ValidatorSet<T>,
        repair: &dyn RepairPromptBuilder,
    ) -> StoryloomResult<Generated<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.generate_observed(request, validators, repair, &IgnorePhases)
            .await
    }

    /// [`generate`](Self::generate), reporting every status change to `observer`.
    ///
    /// The first call is `Generating`, later calls `Repairing`. Each reply is
    /// `Validating`, and a rejected reply with budget left is `NeedsRepair`.
    #[instrument(skip_all, fields(schema = %request.schema_name(), max_attempts = request.max_attempts()))]
    pub async fn generate_observed<T>(
        &self,
        request: &GenerationRequest,
        validators: &ValidatorSet<T>,
        repair: &dyn RepairPromptBuilder,
        observer: &dyn PhaseObserver,
    ) -> StoryloomResult<Generated<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let messages = vec![
            ChatMessage::system(request.system_prompt().clone()),
            ChatMessage::user(request.user_prompt().clone()),
        ];
        self.drive(request, messages, UnitStatus::Generating, validators, repair, observer)
            .await
    }

    /// Repair an existing value that failed checks outside the orchestrator.
    ///
    /// The first call is already a repair call built from `previous` and
    /// `issues`; the budget covers repair calls only.
    pub async fn repair<T>(
        &self,
        request: &GenerationRequest,
        previous: &str,
        issues: &[ValidationIssue],
        validators: &ValidatorSet<T>,
        repair: &dyn RepairPromptBuilder,
    ) -> StoryloomResult<Generated<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.repair_observed(request, previous, issues, validators, repair, &IgnorePhases)
            .await
    }

    /// [`repair`](Self::repair), reporting every status change to `observer`.
    /// Every call of a repair is `Repairing`.
    #[instrument(skip_all, fields(schema = %request.schema_name(), max_attempts = request.max_attempts(), issues = issues.len()))]
    pub async fn repair_observed<T>(
        &self,
        request: &GenerationRequest,
        previous: &str,
        issues: &[ValidationIssue],
        validators: &ValidatorSet<T>,
        repair: &dyn RepairPromptBuilder,
        observer: &dyn PhaseObserver,
    ) -> StoryloomResult<Generated<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let messages = repair.build(request, previous, issues);
        self.drive(request, messages, UnitStatus::Repairing, validators, repair, observer)
            .await
    }

    async fn drive<T>(
        &self,
        request: &GenerationRequest,
        mut messages: Vec<ChatMessage>,
        first_phase: UnitStatus,
        validators: &ValidatorSet<T>,
        repair: &dyn RepairPromptBuilder,
        observer: &dyn PhaseObserver,
    ) -> StoryloomResult<Generated<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let config = self
            .config
            .clone()
            .with_response_format(ResponseFormat {
                name: request.schema_name().clone(),
                strict: true,
                schema: request.expected_shape().to_json_schema(),
            })
            .with_cancellation(request.cancellation().clone());

        let max_attempts = *request.max_attempts();
        let mut token_usage = TokenUsage::default();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if request.cancellation().is_cancelled() {
                info!(attempt, "Generation cancelled before model call");
                return Err(GenerationError::new(GenerationErrorKind::Cancelled)
                    .with_token_usage(token_usage)
                    .into());
            }

            let phase = if attempt == 1 {
                first_phase
            } else {
                UnitStatus::Repairing
            };
            observer
                .phase(phase, attempt)
                .await
                .map_err(|e| e.with_earlier_usage(token_usage))?;
            debug!(attempt, phase = %phase, "Calling model");
            let response = self
                .client
                .chat(&messages, &config)
                .await
                .map_err(|e| e.with_earlier_usage(token_usage))?;
            token_usage.absorb(response.token_usage);

            observer
                .phase(UnitStatus::Validating, attempt)
                .await
                .map_err(|e| e.with_earlier_usage(token_usage))?;
            debug!(attempt, response_length = response.content.len(), "Validating response");
            let rejection = match self.check(request, validators, &response.content) {
                Ok((value, extracted)) => {
                    info!(attempt, tokens = token_usage.total, "Response accepted");
                    return Ok(Generated {
                        value,
                        extracted,
                        token_usage,
                        attempts: attempt,
                    });
                }
                Err(rejection) => rejection,
            };

            let issues = rejection.error.issues().to_vec();
            if attempt >= max_attempts {
                error!(
                    attempts = attempt,
                    issues = issues.len(),
                    "Generation budget exhausted"
                );
                return Err(GenerationError::new(GenerationErrorKind::BudgetExceeded {
                    attempts: attempt,
                    issues: issues.into(),
                })
                .with_token_usage(token_usage)
                .into());
            }

            warn!(
                attempt,
                issues = issues.len(),
                first_issue = %issues.first().map(ToString::to_string).unwrap_or_default(),
                "Response rejected, requesting repair"
            );
            observer
                .phase(UnitStatus::NeedsRepair, attempt)
                .await
                .map_err(|e| e.with_earlier_usage(token_usage))?;
            messages = repair.build(request, &rejection.text, &issues);
        }
    }

    fn check<T>(
        &self,
        request: &GenerationRequest,
        validators: &ValidatorSet<T>,
        content: &str,
    ) -> Result<(T, Extracted), Rejection>
    where
        T: DeserializeOwned + 'static,
    {
        let extracted = match extract_json(content, Some(*request.expected_kind())) {
            Ok(extracted) => extracted,
            Err(err) => {
                debug!(error = %err.kind, "Response is not parseable JSON");
                let issue = ValidationIssue::root(format!(
                    "reply is not valid JSON: {}",
                    err.reason()
                ));
                return Err(Rejection {
                    text: content.to_string(),
                    error: GenerationError::new(GenerationErrorKind::SchemaViolation(
                        vec![issue].into(),
                    )),
                });
            }
        };
        match evaluate(request.expected_shape(), validators, &extracted.value) {
            Ok(value) => Ok((value, extracted)),
            Err(error) => Err(Rejection {
                text: extracted.text,
                error,
            }),
        }
    }
}
