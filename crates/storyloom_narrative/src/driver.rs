//! Drives a sequence of units through generation, continuity repair and
//! persistence.
//!
//! Units run strictly in order. Each accepted unit's end state becomes the
//! previous-end context of the next, and its start must agree with that
//! context. A disagreement triggers a narrow repair of the start fragment
//! only. If that repair budget runs out the unit is marked `NeedsFix` and the
//! run halts; later units are left untouched.

use crate::{
    ACTION_PLAN_REPAIR_KEY, ACTION_PLAN_SYSTEM_KEY, ActionPlan, Artifact, ArtifactContext,
    ContinuityRepairPrompt, GenerationOrchestrator, GenerationRequest, GenerationRequestBuilder,
    GenerationSettings, Generated, PhaseObserver, SceneBrief, Sequence, SequenceUnit,
    StandardRepairPrompt, StoryloomConfig,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storyloom_core::{
    SequenceStatus, StepState, TokenUsage, UnitStatus, ValidationIssue,
};
use storyloom_error::{
    BuilderError, ConfigError, GenerationError, GenerationErrorKind, ProgressError,
    ProgressErrorKind, StoryloomError, StoryloomResult,
};
use storyloom_interface::{ModelClient, ProgressRepository, PromptStore};
use storyloom_validation::{AttributeSet, PhraseMatcher, Shape, ValidatorSet, check_secondary};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// What a run did.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Sequence status when the run stopped
    pub status: SequenceStatus,
    /// Units accepted during this run
    pub units_generated: usize,
    /// Continuity repairs started
    pub continuity_repairs: usize,
    /// Secondary-attribute repairs started
    pub secondary_repairs: usize,
    /// Tokens spent during this run
    pub token_usage: TokenUsage,
    /// Unit the run halted at
    pub halted_at: Option<String>,
    /// Outstanding issues of the halting unit
    pub issues: Vec<ValidationIssue>,
}

/// An accepted unit and what it cost.
struct Produced<U> {
    output: U,
    token_usage: TokenUsage,
}

/// What generating one unit reads from its sequence.
struct UnitInputs<U: SequenceUnit> {
    id: String,
    brief: U::Brief,
    settings: serde_json::Value,
    running_summary: Option<String>,
}

impl<U: SequenceUnit> UnitInputs<U> {
    fn of(sequence: &Sequence<U>, index: usize) -> Self {
        let unit = &sequence.units()[index];
        Self {
            id: unit.id.clone(),
            brief: unit.brief.clone(),
            settings: sequence.settings().clone(),
            running_summary: sequence.running_summary().map(str::to_string),
        }
    }
}

/// Writes each status of the unit in flight and saves the sequence.
struct UnitTracker<'a, C, U: SequenceUnit> {
    driver: &'a SequenceDriver<C>,
    parent_id: Option<&'a str>,
    index: usize,
    sequence: Mutex<&'a mut Sequence<U>>,
}

impl<'a, C: ModelClient, U: SequenceUnit> UnitTracker<'a, C, U> {
    fn new(
        driver: &'a SequenceDriver<C>,
        parent_id: Option<&'a str>,
        index: usize,
        sequence: &'a mut Sequence<U>,
    ) -> Self {
        Self {
            driver,
            parent_id,
            index,
            sequence: Mutex::new(sequence),
        }
    }

    async fn set(&self, status: UnitStatus) -> StoryloomResult<()> {
        let mut sequence = self.sequence.lock().await;
        let unit = sequence.unit_mut(self.index);
        if unit.status == status {
            return Ok(());
        }
        debug!(unit = %unit.id, %status, "Unit status changed");
        unit.status = status;
        self.driver.persist(self.parent_id, &mut **sequence).await
    }
}

#[async_trait]
impl<C: ModelClient, U: SequenceUnit> PhaseObserver for UnitTracker<'_, C, U> {
    async fn phase(&self, status: UnitStatus, _attempt: u32) -> StoryloomResult<()> {
        self.set(status).await
    }
}

/// Runs sequences of units against a model client.
pub struct SequenceDriver<C> {
    orchestrator: GenerationOrchestrator<C>,
    prompts: Arc<dyn PromptStore>,
    repository: Option<Arc<dyn ProgressRepository>>,
    settings: GenerationSettings,
    phrases: Arc<PhraseMatcher>,
}

impl<C: ModelClient> SequenceDriver<C> {
    /// Create a driver without persistence.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the budgets are invalid or a phrase pattern does not
    /// compile.
    pub fn new(
        client: C,
        prompts: Arc<dyn PromptStore>,
        config: &StoryloomConfig,
    ) -> StoryloomResult<Self> {
        config.validate()?;
        let phrases = Arc::new(config.phrase_matcher()?);
        Ok(Self {
            orchestrator: GenerationOrchestrator::new(client)
                .with_config(config.generation.chat_config()),
            prompts,
            repository: None,
            settings: config.generation.clone(),
            phrases,
        })
    }

    /// Save progress to `repository` after every unit transition.
    pub fn with_repository(mut self, repository: Arc<dyn ProgressRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// The orchestrator used for every call.
    pub fn orchestrator(&self) -> &GenerationOrchestrator<C> {
        &self.orchestrator
    }

    /// Generation budgets in effect.
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    fn context(&self, brief: serde_json::Value, settings: serde_json::Value) -> ArtifactContext {
        ArtifactContext::new(self.phrases.clone(), self.settings.min_frame_difference)
            .with_brief(brief)
            .with_settings(settings)
    }

    fn request(
        &self,
        system_prompt: String,
        user_prompt: String,
        shape: Shape,
        max_attempts: u32,
        schema_name: &str,
        cancel: &CancellationToken,
    ) -> StoryloomResult<GenerationRequest> {
        Ok(GenerationRequestBuilder::default()
            .system_prompt(system_prompt)
            .user_prompt(user_prompt)
            .expected_shape(shape)
            .max_attempts(max_attempts)
            .schema_name(schema_name)
            .cancellation(cancel.clone())
            .build()
            .map_err(|e| BuilderError::from(e.to_string()))?)
    }

    /// Generate an action plan for a scene.
    ///
    /// The plan's beats become keyframe-group briefs via
    /// [`ActionPlan::unit_briefs`].
    #[instrument(skip_all, fields(scene_id = %scene.scene_id))]
    pub async fn plan_scene(
        &self,
        scene: &SceneBrief,
        cancel: &CancellationToken,
    ) -> StoryloomResult<Generated<ActionPlan>> {
        let system = self.prompts.load(ACTION_PLAN_SYSTEM_KEY).await?;
        let repair_system = self.prompts.load(ACTION_PLAN_REPAIR_KEY).await?;
        let ctx = self.context(
            serde_json::to_value(scene).map_err(storyloom_error::JsonError::from)?,
            serde_json::Value::Null,
        );
        let request = self.request(
            system,
            scene.render_prompt(),
            ActionPlan::shape(),
            self.settings.max_attempts,
            ActionPlan::NAME,
            cancel,
        )?;
        let plan = self
            .orchestrator
            .generate(
                &request,
                &ActionPlan::validators(&ctx),
                &StandardRepairPrompt::with_system_prompt(repair_system),
            )
            .await?;
        info!(beats = plan.value.beats.len(), "Action plan accepted");
        Ok(plan)
    }

    /// Run every unit that is not yet `Ready`, without persistence.
    ///
    /// `seed` is the state the first unit must start from, if any.
    ///
    /// # Errors
    ///
    /// - `Cancelled` if `cancel` fires; the interrupted unit returns to `Pending`
    /// - model client and persistence errors; the failing unit is `NeedsFix`
    ///
    /// A unit that exhausts its repair budget is not an error: the run halts
    /// and the report carries `NeedsFix`, the unit id and its issues.
    pub async fn run<U: SequenceUnit>(
        &self,
        sequence: &mut Sequence<U>,
        seed: Option<&StepState>,
        cancel: &CancellationToken,
    ) -> StoryloomResult<RunReport> {
        self.drive(None, sequence, seed, cancel).await
    }

    /// Save a new sequence under `parent_id`, then run it.
    ///
    /// # Errors
    ///
    /// `VersionConflict` if a document already exists for `parent_id`, plus
    /// everything [`run`](Self::run) can return.
    pub async fn start<U: SequenceUnit>(
        &self,
        parent_id: &str,
        sequence: &mut Sequence<U>,
        seed: Option<&StepState>,
        cancel: &CancellationToken,
    ) -> StoryloomResult<RunReport> {
        self.persist(Some(parent_id), sequence).await?;
        self.drive(Some(parent_id), sequence, seed, cancel).await
    }

    /// Load the sequence stored under `parent_id` and continue it.
    ///
    /// Ready units are skipped; their end states still feed continuity.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing is stored, `ConfigError` without a repository.
    pub async fn resume<U: SequenceUnit>(
        &self,
        parent_id: &str,
        seed: Option<&StepState>,
        cancel: &CancellationToken,
    ) -> StoryloomResult<(Sequence<U>, RunReport)> {
        let repository = self.repository()?;
        let doc = repository
            .load(parent_id)
            .await?
            .ok_or_else(|| ProgressError::new(ProgressErrorKind::NotFound(parent_id.to_string())))?;
        let mut sequence = Sequence::<U>::from_document(doc)?;
        info!(parent_id, version = sequence.version(), "Resuming sequence");
        let report = self.drive(Some(parent_id), &mut sequence, seed, cancel).await?;
        Ok((sequence, report))
    }

    fn repository(&self) -> Result<&Arc<dyn ProgressRepository>, ConfigError> {
        self.repository
            .as_ref()
            .ok_or_else(|| ConfigError::new("No progress repository configured"))
    }

    async fn persist<U: SequenceUnit>(
        &self,
        parent_id: Option<&str>,
        sequence: &mut Sequence<U>,
    ) -> StoryloomResult<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        let repository = self.repository()?;
        let version = repository.save(parent_id, &sequence.to_document()?).await?;
        sequence.set_version(version);
        Ok(())
    }

    #[instrument(skip_all, fields(kind = U::NAME, units = sequence.len(), parent_id = parent_id.unwrap_or("-")))]
    async fn drive<U: SequenceUnit>(
        &self,
        parent_id: Option<&str>,
        sequence: &mut Sequence<U>,
        seed: Option<&StepState>,
        cancel: &CancellationToken,
    ) -> StoryloomResult<RunReport> {
        let mut report = RunReport::default();
        let mut prev_end = seed.cloned();
        let mut prev_secondary: Option<AttributeSet> = None;

        for index in 0..sequence.len() {
            let unit = &sequence.units()[index];
            if let Some(output) = unit.output.as_ref().filter(|_| unit.is_ready()) {
                prev_end = Some(output.end_state());
                prev_secondary = Some(output.secondary_attributes());
                continue;
            }

            let id = unit.id.clone();
            if cancel.is_cancelled() {
                info!(unit = %id, "Run cancelled before unit");
                self.persist(parent_id, sequence).await?;
                return Err(GenerationError::new(GenerationErrorKind::Cancelled)
                    .with_token_usage(report.token_usage)
                    .into());
            }

            {
                let unit = sequence.unit_mut(index);
                unit.status = UnitStatus::Generating;
                unit.last_error = None;
                unit.issues.clear();
            }
            self.persist(parent_id, sequence).await?;
            info!(unit = %id, status = %UnitStatus::Generating, "Unit started");

            let inputs = UnitInputs::of(sequence, index);
            let outcome = {
                let tracker = UnitTracker::new(self, parent_id, index, &mut *sequence);
                self.produce::<U>(
                    &inputs,
                    prev_end.as_ref(),
                    prev_secondary.as_ref(),
                    cancel,
                    &mut report,
                    &tracker,
                )
                .await
            };

            match outcome {
                Ok(produced) => {
                    report.units_generated += 1;
                    report.token_usage += produced.token_usage;
                    prev_end = Some(produced.output.end_state());
                    prev_secondary = Some(produced.output.secondary_attributes());
                    let summary = produced.output.summary_line();

                    let unit = sequence.unit_mut(index);
                    unit.status = UnitStatus::Ready;
                    unit.token_usage = Some(produced.token_usage);
                    unit.output = Some(produced.output);
                    if let Some(line) = summary {
                        sequence.push_summary(line);
                    }
                    self.persist(parent_id, sequence).await?;
                    info!(unit = %id, status = %UnitStatus::Ready, tokens = produced.token_usage.total, "Unit accepted");
                }
                Err(err) => {
                    return self
                        .fail_unit(parent_id, sequence, index, err, report)
                        .await;
                }
            }
        }

        report.status = sequence.status();
        info!(
            status = %report.status,
            units_generated = report.units_generated,
            tokens = report.token_usage.total,
            "Run finished"
        );
        Ok(report)
    }

    /// Record a failed unit, save, and decide whether the run halts or errors.
    async fn fail_unit<U: SequenceUnit>(
        &self,
        parent_id: Option<&str>,
        sequence: &mut Sequence<U>,
        index: usize,
        err: StoryloomError,
        mut report: RunReport,
    ) -> StoryloomResult<RunReport> {
        let usage = err.token_usage();
        report.token_usage += usage;
        let kind = err.as_generation().map(|g| g.kind.clone());
        let unit = sequence.unit_mut(index);
        let id = unit.id.clone();

        match kind {
            Some(GenerationErrorKind::Cancelled) => {
                info!(unit = %id, "Unit cancelled");
                unit.reset();
                self.persist(parent_id, sequence).await?;
                Err(err)
            }
            Some(kind) => {
                let issues = match &kind {
                    GenerationErrorKind::Cancelled => Vec::new(),
                    GenerationErrorKind::SchemaViolation(issues)
                    | GenerationErrorKind::SemanticViolation(issues)
                    | GenerationErrorKind::ContinuityViolation { issues, .. }
                    | GenerationErrorKind::BudgetExceeded { issues, .. } => issues.to_vec(),
                };
                error!(unit = %id, issues = issues.len(), error = %kind, "Unit needs fixing, halting run");
                unit.status = UnitStatus::NeedsFix;
                unit.last_error = Some(kind.to_string());
                unit.issues = issues.clone();
                unit.token_usage = Some(usage);
                self.persist(parent_id, sequence).await?;

                report.status = SequenceStatus::NeedsFix;
                report.halted_at = Some(id);
                report.issues = issues;
                Ok(report)
            }
            None => {
                error!(unit = %id, error = %err, tokens = usage.total, "Unit failed");
                unit.status = UnitStatus::NeedsFix;
                unit.last_error = Some(err.to_string());
                unit.token_usage = (usage.total > 0).then_some(usage);
                self.persist(parent_id, sequence).await?;
                Err(err)
            }
        }
    }

    /// Generate one unit and bring it into agreement with its predecessor.
    #[instrument(skip_all, fields(unit = %inputs.id))]
    async fn produce<U: SequenceUnit>(
        &self,
        inputs: &UnitInputs<U>,
        prev_end: Option<&StepState>,
        prev_secondary: Option<&AttributeSet>,
        cancel: &CancellationToken,
        report: &mut RunReport,
        tracker: &UnitTracker<'_, C, U>,
    ) -> StoryloomResult<Produced<U>> {
        let system = self.prompts.load(U::SYSTEM_PROMPT_KEY).await?;
        let repair_system = self.prompts.load(U::REPAIR_PROMPT_KEY).await?;
        let ctx = self.context(
            serde_json::to_value(&inputs.brief).map_err(storyloom_error::JsonError::from)?,
            inputs.settings.clone(),
        );
        let user_prompt =
            U::render_prompt(&inputs.brief, prev_end, inputs.running_summary.as_deref());
        let validators = U::validators(&ctx);
        let repair = StandardRepairPrompt::with_system_prompt(repair_system.clone());

        let request = self.request(
            system.clone(),
            user_prompt.clone(),
            U::shape(),
            self.settings.max_attempts,
            U::NAME,
            cancel,
        )?;
        let generated = self
            .orchestrator
            .generate_observed(&request, &validators, &repair, tracker)
            .await?;
        let mut token_usage = generated.token_usage;
        let mut output = generated.value;

        if let Some(prev_end) = prev_end {
            let issues = output.continuity_issues(prev_end);
            if !issues.is_empty() {
                report.continuity_repairs += 1;
                warn!(unit = %inputs.id, issues = issues.len(), "Start disagrees with previous end, repairing fragment");
                tracker
                    .set(UnitStatus::NeedsRepair)
                    .await
                    .map_err(|e| e.with_earlier_usage(token_usage))?;
                output = self
                    .repair_continuity(
                        &inputs.id,
                        output,
                        prev_end,
                        issues,
                        &ctx,
                        cancel,
                        &mut token_usage,
                        tracker,
                    )
                    .await?;
            }
        }

        if let Some(prev_secondary) = prev_secondary {
            let issues = check_secondary(prev_secondary, &output.secondary_attributes(), "$");
            if !issues.is_empty() {
                report.secondary_repairs += 1;
                warn!(unit = %inputs.id, issues = issues.len(), "Secondary attributes drifted, repairing unit");
                tracker
                    .set(UnitStatus::NeedsRepair)
                    .await
                    .map_err(|e| e.with_earlier_usage(token_usage))?;
                let validators = with_boundary_checks(validators, prev_end, prev_secondary);
                let request = self.request(
                    system,
                    user_prompt,
                    U::shape(),
                    self.settings.secondary_repair_attempts,
                    U::NAME,
                    cancel,
                )?;
                let previous = serde_json::to_string_pretty(&output)
                    .map_err(storyloom_error::JsonError::from)?;
                let repaired = self
                    .orchestrator
                    .repair_observed(&request, &previous, &issues, &validators, &repair, tracker)
                    .await
                    .map_err(|e| e.with_earlier_usage(token_usage))?;
                token_usage += repaired.token_usage;
                output = repaired.value;
            }
        }

        Ok(Produced {
            output,
            token_usage,
        })
    }

    /// Rewrite only the start fragment until it agrees with `prev_end`.
    ///
    /// The rest of the unit is kept verbatim. Each candidate fragment is
    /// spliced back and the whole unit is re-checked, so a repair can never
    /// trade a continuity issue for a semantic one.
    #[allow(clippy::too_many_arguments)]
    async fn repair_continuity<U: SequenceUnit>(
        &self,
        unit_id: &str,
        output: U,
        prev_end: &StepState,
        issues: Vec<ValidationIssue>,
        ctx: &ArtifactContext,
        cancel: &CancellationToken,
        token_usage: &mut TokenUsage,
        tracker: &UnitTracker<'_, C, U>,
    ) -> StoryloomResult<U> {
        let system = self.prompts.load(U::CONTINUITY_PROMPT_KEY).await?;
        let prompt = ContinuityRepairPrompt::new(system, prev_end);
        let fragment = serde_json::to_string_pretty(&output.start_fragment())
            .map_err(storyloom_error::JsonError::from)?;

        let base = output.clone();
        let unit_validators = U::validators(ctx);
        let boundary = prev_end.clone();
        let validators = ValidatorSet::<U::Fragment>::new().with_fn(
            "spliced_unit",
            move |candidate: &U::Fragment| {
                let spliced = base.with_start_fragment(candidate.clone());
                let mut issues = unit_validators.run(&spliced);
                issues.extend(spliced.continuity_issues(&boundary));
                issues
            },
        );

        let request = self.request(
            prompt.system_prompt().to_string(),
            prompt.render(&fragment, &issues),
            U::fragment_shape(),
            self.settings.continuity_repair_attempts,
            &format!("{}_start_fragment", U::NAME),
            cancel,
        )?;

        match self
            .orchestrator
            .repair_observed(&request, &fragment, &issues, &validators, &prompt, tracker)
            .await
        {
            Ok(repaired) => {
                *token_usage += repaired.token_usage;
                info!(unit = unit_id, attempts = repaired.attempts, "Continuity repaired");
                Ok(output.with_start_fragment(repaired.value))
            }
            Err(err) => {
                let exhausted = match err.as_generation() {
                    Some(GenerationError {
                        kind: GenerationErrorKind::BudgetExceeded { issues, .. },
                        token_usage: spent,
                        ..
                    }) => Some((issues.clone(), *spent)),
                    _ => None,
                };
                let Some((issues, spent)) = exhausted else {
                    return Err(err.with_earlier_usage(*token_usage));
                };
                *token_usage += spent;
                error!(unit = unit_id, issues = issues.len(), "Continuity repair exhausted");
                Err(GenerationError::new(GenerationErrorKind::ContinuityViolation {
                    unit: unit_id.to_string(),
                    issues,
                })
                .with_token_usage(*token_usage)
                .into())
            }
        }
    }
}

/// Unit validators plus the boundary checks against the previous unit.
fn with_boundary_checks<U: SequenceUnit>(
    validators: ValidatorSet<U>,
    prev_end: Option<&StepState>,
    prev_secondary: &AttributeSet,
) -> ValidatorSet<U> {
    let prev_secondary = prev_secondary.clone();
    let validators = validators.with_fn("secondary_attributes", move |unit: &U| {
        check_secondary(&prev_secondary, &unit.secondary_attributes(), "$")
    });
    match prev_end.cloned() {
        Some(prev_end) => validators.with_fn("continuity", move |unit: &U| {
            unit.continuity_issues(&prev_end)
        }),
        None => validators,
    }
}
