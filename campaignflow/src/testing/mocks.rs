//! Test doubles for specialists, logging and backoff suspension.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

use crate::errors::{ErrorKind, PipelineError, SpecialistError};
use crate::observability::PipelineLogger;
use crate::pipeline::StageRecord;
use crate::retry::{RetryContext, Sleeper};
use crate::specialists::{Specialist, StageInput, StageName};
use crate::state::GenerationState;

/// A retry warning captured by [`RecordingLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryWarning {
    /// Executor bookkeeping at the time of the failure.
    pub context: RetryContext,
    /// Display form of the failure.
    pub error: String,
}

/// A logger that keeps everything it is told.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    warnings: Mutex<Vec<RetryWarning>>,
    failures: Mutex<Vec<(StageName, ErrorKind, String)>>,
    completed: Mutex<Vec<StageRecord>>,
}

impl RecordingLogger {
    /// Creates an empty logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All retry warnings, in order.
    #[must_use]
    pub fn retry_warnings(&self) -> Vec<RetryWarning> {
        self.warnings.lock().clone()
    }

    /// Retry warnings logged for one operation.
    #[must_use]
    pub fn retry_warnings_for(&self, operation: &str) -> Vec<RetryWarning> {
        self.warnings
            .lock()
            .iter()
            .filter(|warning| warning.context.operation == operation)
            .cloned()
            .collect()
    }

    /// Stage failures as `(stage, kind, message)`.
    #[must_use]
    pub fn stage_failures(&self) -> Vec<(StageName, ErrorKind, String)> {
        self.failures.lock().clone()
    }

    /// Records of the stages that completed.
    #[must_use]
    pub fn completed_stages(&self) -> Vec<StageRecord> {
        self.completed.lock().clone()
    }
}

impl PipelineLogger for RecordingLogger {
    fn retry_scheduled(&self, context: &RetryContext, error: &str) {
        self.warnings.lock().push(RetryWarning {
            context: context.clone(),
            error: error.to_string(),
        });
    }

    fn stage_failed(&self, stage: StageName, error: &PipelineError) {
        self.failures
            .lock()
            .push((stage, error.kind(), error.to_string()));
    }

    fn stage_completed(&self, record: &StageRecord) {
        self.completed.lock().push(record.clone());
    }
}

/// A sleeper that records requested durations and returns at once.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Creates an empty sleeper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested durations, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    /// Sum of all requested durations.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.sleeps.lock().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        tokio::task::yield_now().await;
    }
}

/// One scripted invocation outcome.
#[derive(Debug, Clone)]
pub struct Step {
    delay: Option<Duration>,
    outcome: Result<Value, String>,
}

impl Step {
    /// Succeeds with `output`.
    #[must_use]
    pub fn ok(output: Value) -> Self {
        Self {
            delay: None,
            outcome: Ok(output),
        }
    }

    /// Fails with `message`.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            delay: None,
            outcome: Err(message.into()),
        }
    }

    /// Waits `delay` on the tokio timer before resolving.
    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A specialist that plays back a script of outcomes.
///
/// Once the script runs out, the last step repeats.
#[derive(Debug)]
pub struct ScriptedSpecialist {
    label: String,
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: Mutex<Vec<(StageInput, GenerationState)>>,
}

impl ScriptedSpecialist {
    /// Creates a specialist with an empty script; it fails until given steps.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A specialist that always succeeds with `output`.
    #[must_use]
    pub fn succeeding(label: impl Into<String>, output: Value) -> Self {
        Self::new(label).then(Step::ok(output))
    }

    /// A specialist that fails `failures` times before succeeding with `output`.
    #[must_use]
    pub fn failing_then(label: impl Into<String>, failures: usize, output: Value) -> Self {
        let label = label.into();
        let mut specialist = Self::new(label.clone());
        for attempt in 1..=failures {
            specialist = specialist.then(Step::fail(format!("{label} attempt {attempt} failed")));
        }
        specialist.then(Step::ok(output))
    }

    /// A specialist that always fails with `message`.
    #[must_use]
    pub fn always_failing(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(label).then(Step::fail(message))
    }

    /// Appends a step to the script.
    #[must_use]
    pub fn then(self, step: Step) -> Self {
        self.script.lock().push_back(step);
        self
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Inputs and state snapshots seen by each invocation.
    #[must_use]
    pub fn calls(&self) -> Vec<(StageInput, GenerationState)> {
        self.calls.lock().clone()
    }

    fn next_step(&self) -> Option<Step> {
        let mut last = self.last.lock();
        if let Some(step) = self.script.lock().pop_front() {
            *last = Some(step);
        }
        last.clone()
    }
}

#[async_trait]
impl Specialist for ScriptedSpecialist {
    async fn run(&self, input: StageInput, state: GenerationState) -> Result<Value, SpecialistError> {
        self.calls.lock().push((input, state));
        let Some(step) = self.next_step() else {
            return Err(SpecialistError::failed(format!("{} has no script", self.label)));
        };
        if let Some(delay) = step.delay {
            tokio::time::sleep(delay).await;
        }
        step.outcome.map_err(SpecialistError::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    async fn invoke(specialist: &ScriptedSpecialist) -> Result<Value, SpecialistError> {
        specialist
            .run(StageInput::default(), GenerationState::new("brief", Utc::now()))
            .await
    }

    #[tokio::test]
    async fn test_script_plays_in_order_then_repeats() {
        let specialist = ScriptedSpecialist::failing_then("content", 2, json!({"ok": true}));

        assert_eq!(invoke(&specialist).await.unwrap_err().to_string(), "content attempt 1 failed");
        assert!(invoke(&specialist).await.is_err());
        assert_eq!(invoke(&specialist).await.unwrap(), json!({"ok": true}));
        assert_eq!(invoke(&specialist).await.unwrap(), json!({"ok": true}));
        assert_eq!(specialist.call_count(), 4);
    }

    #[tokio::test]
    async fn test_empty_script_fails() {
        let specialist = ScriptedSpecialist::new("idle");
        assert!(invoke(&specialist).await.is_err());
        assert_eq!(specialist.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_step() {
        let specialist = ScriptedSpecialist::new("slow")
            .then(Step::ok(json!(1)).after(Duration::from_secs(30)));
        let started = tokio::time::Instant::now();

        assert_eq!(invoke(&specialist).await.unwrap(), json!(1));
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_recording_sleeper() {
        let sleeper = RecordingSleeper::new();
        sleeper.sleep(Duration::from_millis(100)).await;
        sleeper.sleep(Duration::from_millis(200)).await;

        assert_eq!(sleeper.sleeps().len(), 2);
        assert_eq!(sleeper.total(), Duration::from_millis(300));
    }

    #[test]
    fn test_recording_logger_filters_by_operation() {
        let logger = RecordingLogger::new();
        for operation in ["content", "design", "content"] {
            logger.retry_scheduled(
                &RetryContext {
                    operation: operation.to_string(),
                    attempt: 0,
                    max_attempts: 2,
                    backoff: Duration::from_millis(10),
                },
                "boom",
            );
        }
        assert_eq!(logger.retry_warnings().len(), 3);
        assert_eq!(logger.retry_warnings_for("content").len(), 2);
    }
}
