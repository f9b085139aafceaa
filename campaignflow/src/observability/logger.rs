//! Structured logging capability injected into the executor and orchestrator.

use crate::errors::PipelineError;
use crate::pipeline::StageRecord;
use crate::retry::RetryContext;
use crate::specialists::StageName;

/// Sink for the warnings and errors a pipeline run produces.
///
/// Passed explicitly to each run rather than reached through a global, so
/// concurrent runs can log to different places.
pub trait PipelineLogger: Send + Sync {
    /// A non-final attempt failed and a retry is scheduled.
    fn retry_scheduled(&self, context: &RetryContext, error: &str);

    /// A stage terminated the run.
    fn stage_failed(&self, stage: StageName, error: &PipelineError);

    /// A stage finished and its output was merged.
    fn stage_completed(&self, record: &StageRecord);
}

/// Logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl PipelineLogger for NoOpLogger {
    fn retry_scheduled(&self, _context: &RetryContext, _error: &str) {}
    fn stage_failed(&self, _stage: StageName, _error: &PipelineError) {}
    fn stage_completed(&self, _record: &StageRecord) {}
}

/// Logger backed by the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl PipelineLogger for TracingLogger {
    fn retry_scheduled(&self, context: &RetryContext, error: &str) {
        tracing::warn!(
            context = %context.operation,
            attempt = context.attempt + 1,
            max_attempts = context.max_attempts,
            backoff_ms = u64::try_from(context.backoff.as_millis()).unwrap_or(u64::MAX),
            error,
            "Attempt failed, retrying after backoff"
        );
    }

    fn stage_failed(&self, stage: StageName, error: &PipelineError) {
        tracing::error!(
            stage = %stage,
            kind = %error.kind(),
            error = %error,
            "Pipeline stage failed"
        );
    }

    fn stage_completed(&self, record: &StageRecord) {
        tracing::info!(
            stage = %record.stage,
            attempts = record.attempts,
            duration_ms = record.duration_ms,
            "Pipeline stage completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_loggers_do_not_panic() {
        let context = RetryContext {
            operation: "content".to_string(),
            attempt: 0,
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        };
        let error = PipelineError::Internal("boom".to_string());

        for logger in [&NoOpLogger as &dyn PipelineLogger, &TracingLogger] {
            logger.retry_scheduled(&context, "timeout");
            logger.stage_failed(StageName::Design, &error);
        }
    }
}
