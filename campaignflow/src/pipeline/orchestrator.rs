//! Sequences the four specialists through retry, contract and merge.

use super::phase::{PhaseTracker, PipelinePhase};
use super::result::{DeliveryReceipt, PipelineFailure, PipelineSuccess, StageRecord};
use crate::cancellation::CancellationToken;
use crate::config::{PipelineConfig, RetryConfig};
use crate::contracts::{validate, ValidatedHandoff};
use crate::errors::{ConfigError, PipelineError, RunError, SpecialistError, StageFailure};
use crate::events::{EventKind, EventSink, NoOpEventSink, PipelineEvent};
use crate::observability::{PipelineLogger, TracingLogger};
use crate::retry::{RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};
use crate::specialists::{Specialist, SpecialistSet, StageInput, StageName};
use crate::state::{check_preconditions, GenerationState};
use crate::utils::{content_digest, duration_ms, generate_run_id};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Per-invocation options for [`Orchestrator::run_pipeline`].
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Overrides the retry count for this run.
    pub max_retries: Option<u32>,
    /// Overrides the base backoff delay, in milliseconds.
    pub retry_delay_ms: Option<u64>,
    /// Overrides the backoff ceiling, in milliseconds.
    pub backoff_ceiling_ms: Option<u64>,
    /// Overrides the per-invocation timeout; `Some(None)` disables it.
    pub stage_timeout: Option<Option<Duration>>,
    /// Reference date; defaults to now.
    pub current_date: Option<DateTime<Utc>>,
    /// External cancellation signal.
    pub cancellation: Option<Arc<CancellationToken>>,
    /// Passed through to every specialist.
    pub params: Map<String, Value>,
}

impl PipelineOptions {
    /// Creates options that inherit everything from the orchestrator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides every retry setting at once.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.max_retries = Some(retry.max_retries);
        self.retry_delay_ms = Some(retry.retry_delay_ms);
        self.backoff_ceiling_ms = Some(retry.backoff_ceiling_ms);
        self
    }

    /// Overrides the retry count; delays stay as configured.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Overrides the base backoff delay.
    #[must_use]
    pub fn with_retry_delay_ms(mut self, delay: u64) -> Self {
        self.retry_delay_ms = Some(delay);
        self
    }

    /// Overrides the backoff ceiling.
    #[must_use]
    pub fn with_backoff_ceiling_ms(mut self, ceiling: u64) -> Self {
        self.backoff_ceiling_ms = Some(ceiling);
        self
    }

    /// Applies the set overrides on top of `base`.
    #[must_use]
    pub fn retry_config(&self, base: RetryConfig) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(base.retry_delay_ms),
            backoff_ceiling_ms: self.backoff_ceiling_ms.unwrap_or(base.backoff_ceiling_ms),
        }
    }

    /// Overrides the per-invocation timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Sets the reference date.
    #[must_use]
    pub fn with_current_date(mut self, date: DateTime<Utc>) -> Self {
        self.current_date = Some(date);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Adds a pass-through parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Everything scoped to one run.
struct RunScope<'a> {
    run_id: Uuid,
    options: &'a PipelineOptions,
    executor: RetryExecutor,
    stage_timeout: Option<Duration>,
}

/// Runs the Content, Design, Quality and Delivery specialists in order.
///
/// An orchestrator holds no per-run state, so one instance can serve any
/// number of concurrent runs.
#[derive(Clone)]
pub struct Orchestrator {
    specialists: SpecialistSet,
    config: PipelineConfig,
    logger: Arc<dyn PipelineLogger>,
    events: Arc<dyn EventSink>,
    sleeper: Arc<dyn Sleeper>,
}

impl Orchestrator {
    /// Creates an orchestrator with default config, `tracing` logging and no events.
    #[must_use]
    pub fn new(specialists: SpecialistSet) -> Self {
        Self {
            specialists,
            config: PipelineConfig::default(),
            logger: Arc::new(TracingLogger),
            events: Arc::new(NoOpEventSink),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Sets the config.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets how backoff waits are performed.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Returns the config.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs all four stages for `brief`.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineFailure`] naming the stage that failed or observed
    /// cancellation, or carrying the config error if `options` are invalid.
    pub async fn run_pipeline(
        &self,
        brief: impl Into<String>,
        options: PipelineOptions,
    ) -> Result<PipelineSuccess, PipelineFailure> {
        let run_id = generate_run_id();
        let mut phases = PhaseTracker::new();
        let mut stages = Vec::with_capacity(StageName::PIPELINE.len());

        let scope = match self.scope(run_id, &options) {
            Ok(scope) => scope,
            Err(err) => {
                return Err(PipelineFailure {
                    run_id,
                    error: err.into(),
                    stages,
                    phases: phases.into_history(),
                })
            }
        };

        let state = GenerationState::new(brief, options.current_date.unwrap_or_else(Utc::now));
        info!(run_id = %run_id, brief = %state.brief(), "Pipeline run started");
        self.emit(
            PipelineEvent::new(run_id, EventKind::PipelineStarted)
                .with_data(json!({ "brief": state.brief() })),
        )
        .await;

        match self.drive(&scope, state, &mut phases, &mut stages).await {
            Ok((final_state, receipt)) => {
                let digest = content_digest(final_state.html().unwrap_or_default());
                info!(
                    run_id = %run_id,
                    qa_score = final_state.qa_score(),
                    campaign_id = receipt.campaign_id.as_deref(),
                    "Pipeline run completed"
                );
                self.emit(
                    PipelineEvent::new(run_id, EventKind::PipelineCompleted).with_data(json!({
                        "qa_score": final_state.qa_score(),
                        "content_digest": digest,
                    })),
                )
                .await;
                Ok(PipelineSuccess {
                    run_id,
                    final_state,
                    receipt,
                    content_digest: digest,
                    stages,
                    phases: phases.into_history(),
                })
            }
            Err(failure) => {
                let error = RunError::from(failure);
                let (terminal, kind) = if error.is_cancelled() {
                    (PipelinePhase::Cancelled, EventKind::PipelineCancelled)
                } else {
                    (PipelinePhase::Failed, EventKind::PipelineFailed)
                };
                if let Err(err) = phases.advance(terminal) {
                    tracing::warn!(run_id = %run_id, error = %err, "Could not record terminal phase");
                }
                self.emit(
                    PipelineEvent::new(run_id, kind).with_data(json!({
                        "failed_stage": error.failed_stage(),
                        "kind": error.kind(),
                        "error": error.to_string(),
                    })),
                )
                .await;
                Err(PipelineFailure {
                    run_id,
                    error,
                    stages,
                    phases: phases.into_history(),
                })
            }
        }
    }

    fn scope<'a>(
        &self,
        run_id: Uuid,
        options: &'a PipelineOptions,
    ) -> Result<RunScope<'a>, ConfigError> {
        let mut config = self.config.clone();
        config.retry = options.retry_config(config.retry);
        if let Some(timeout) = options.stage_timeout {
            config.stage_timeout_ms =
                timeout.map(|limit| u64::try_from(limit.as_millis()).unwrap_or(u64::MAX));
        }
        config.validate()?;

        let mut executor = RetryExecutor::new(RetryPolicy::from(config.retry))
            .with_logger(self.logger.clone())
            .with_sleeper(self.sleeper.clone());
        if let Some(token) = &options.cancellation {
            executor = executor.with_cancellation(token.clone());
        }

        Ok(RunScope {
            run_id,
            options,
            executor,
            stage_timeout: config.stage_timeout(),
        })
    }

    async fn drive(
        &self,
        scope: &RunScope<'_>,
        mut state: GenerationState,
        phases: &mut PhaseTracker,
        stages: &mut Vec<StageRecord>,
    ) -> Result<(GenerationState, DeliveryReceipt), StageFailure> {
        let mut handoff: Option<ValidatedHandoff> = None;

        for stage in StageName::PIPELINE {
            if let Some(token) = &scope.options.cancellation {
                if token.is_cancelled() {
                    let reason = token.reason().unwrap_or_default();
                    info!(run_id = %scope.run_id, stage = %stage, reason = %reason, "Pipeline cancelled at stage boundary");
                    return Err(StageFailure::new(stage, PipelineError::Cancelled { reason }));
                }
            }
            phases
                .advance(PipelinePhase::running(stage))
                .map_err(|err| StageFailure::new(stage, err))?;

            let input = StageInput {
                handoff: handoff.take(),
                params: scope.options.params.clone(),
            };
            match self.run_stage(scope, stage, input, state).await {
                Ok((output, next_state, record)) => {
                    state = next_state;
                    handoff = Some(output);
                    stages.push(record);
                }
                Err(err) => {
                    if err.is_cancelled() {
                        info!(run_id = %scope.run_id, stage = %stage, "Pipeline cancelled during stage");
                    } else {
                        self.logger.stage_failed(stage, &err);
                        self.emit(
                            PipelineEvent::new(scope.run_id, EventKind::StageFailed)
                                .with_stage(stage)
                                .with_data(json!(err.to_dict())),
                        )
                        .await;
                    }
                    return Err(StageFailure::new(stage, err));
                }
            }
        }

        phases
            .advance(PipelinePhase::Completed)
            .map_err(|err| StageFailure::new(StageName::Delivery, err))?;
        let receipt =
            DeliveryReceipt::from_value(handoff.as_ref().map_or(&Value::Null, ValidatedHandoff::package));
        Ok((state, receipt))
    }

    async fn run_stage(
        &self,
        scope: &RunScope<'_>,
        stage: StageName,
        input: StageInput,
        state: GenerationState,
    ) -> Result<(ValidatedHandoff, GenerationState, StageRecord), PipelineError> {
        check_preconditions(stage, &state)?;

        self.emit(PipelineEvent::new(scope.run_id, EventKind::StageStarted).with_stage(stage))
            .await;
        let started_at = Utc::now();
        let clock = Instant::now();
        let attempts = AtomicU32::new(0);
        let specialist = self.specialists.get(stage);

        let output = scope
            .executor
            .execute(stage.as_str(), || {
                attempts.fetch_add(1, Ordering::Relaxed);
                debug!(run_id = %scope.run_id, stage = %stage, "Invoking specialist");
                invoke(
                    &**specialist,
                    input.clone(),
                    state.clone(),
                    scope.stage_timeout,
                )
            })
            .await
            .map_err(|err| PipelineError::from_specialist(stage.as_str(), err))?;

        let handoff = validate(stage.output_boundary(), output)?;
        let state = state.merge(stage, &handoff)?;

        let record = StageRecord {
            stage,
            attempts: attempts.into_inner(),
            started_at,
            duration_ms: duration_ms(clock.elapsed()),
        };
        self.logger.stage_completed(&record);
        self.emit(
            PipelineEvent::new(scope.run_id, EventKind::StageCompleted)
                .with_stage(stage)
                .with_data(json!({
                    "attempts": record.attempts,
                    "duration_ms": record.duration_ms,
                })),
        )
        .await;

        Ok((handoff, state, record))
    }

    async fn emit(&self, event: PipelineEvent) {
        self.events.emit(event).await;
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Calls `specialist` once, bounded by `timeout`.
async fn invoke(
    specialist: &dyn Specialist,
    input: StageInput,
    state: GenerationState,
    timeout: Option<Duration>,
) -> Result<Value, SpecialistError> {
    let call = specialist.run(input, state);
    match timeout {
        None => call.await,
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(SpecialistError::TimedOut(limit))),
    }
}
