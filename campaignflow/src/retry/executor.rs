//! Retry executor with injectable suspension and cancellable backoff.

use super::backoff::{RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::cancellation::CancellationToken;
use crate::observability::{PipelineLogger, TracingLogger};
use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Suspends the calling task between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bookkeeping for a single call into the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    /// Logical operation name.
    pub operation: String,
    /// Index of the attempt that just failed (0-indexed).
    pub attempt: u32,
    /// Total attempts allowed for this call.
    pub max_attempts: u32,
    /// Wait before the next attempt.
    pub backoff: Duration,
}

impl RetryContext {
    fn new(operation: &str, max_attempts: u32) -> Self {
        Self {
            operation: operation.to_string(),
            attempt: 0,
            max_attempts,
            backoff: Duration::ZERO,
        }
    }
}

/// Reasons the executor stops without a result from the operation itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetryInterrupt {
    /// Cancellation was observed while waiting to retry.
    #[error("{context} cancelled during backoff: {reason}")]
    Cancelled {
        /// Logical operation name.
        context: String,
        /// The cancellation reason.
        reason: String,
    },

    /// The attempt loop ended without a success or a final failure.
    #[error("{context} exhausted its attempt range after {attempts} attempts without an outcome")]
    AttemptsUnaccounted {
        /// Logical operation name.
        context: String,
        /// Attempts that were actually made.
        attempts: u32,
    },
}

/// Runs fallible operations with bounded retries.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    logger: Arc<dyn PipelineLogger>,
    sleeper: Arc<dyn Sleeper>,
    cancellation: Option<Arc<CancellationToken>>,
}

impl RetryExecutor {
    /// Creates an executor logging through `tracing` and sleeping on tokio.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            logger: Arc::new(TracingLogger),
            sleeper: Arc::new(TokioSleeper),
            cancellation: None,
        }
    }

    /// Sets the logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Sets the sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Makes backoff waits cancellable through `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns the policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` under the executor's own retry limit.
    pub async fn execute<T, E, F, Fut>(&self, context: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display + From<RetryInterrupt>,
    {
        self.execute_with_retry(operation, self.policy.max_retries, context)
            .await
    }

    /// Runs `operation` up to `max_retries + 1` times.
    ///
    /// The error of the final attempt is returned unchanged. Failures before
    /// that are logged and followed by a backoff wait.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        mut operation: F,
        max_retries: u32,
        context: &str,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display + From<RetryInterrupt>,
    {
        let mut retry = RetryContext::new(context, max_retries.saturating_add(1));
        let mut attempts_made = 0u32;

        for attempt in 0..=max_retries {
            attempts_made += 1;
            retry.attempt = attempt;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt == max_retries => return Err(error),
                Err(error) => {
                    retry.backoff = self.policy.backoff(attempt);
                    self.logger.retry_scheduled(&retry, &error.to_string());
                    self.wait(&retry).await?;
                }
            }
        }

        Err(RetryInterrupt::AttemptsUnaccounted {
            context: context.to_string(),
            attempts: attempts_made,
        }
        .into())
    }

    async fn wait(&self, retry: &RetryContext) -> Result<(), RetryInterrupt> {
        let Some(token) = &self.cancellation else {
            self.sleeper.sleep(retry.backoff).await;
            return Ok(());
        };

        let cancelled = || RetryInterrupt::Cancelled {
            context: retry.operation.clone(),
            reason: token.reason().unwrap_or_default(),
        };

        if token.is_cancelled() {
            return Err(cancelled());
        }

        tokio::select! {
            biased;
            () = token.cancelled() => Err(cancelled()),
            () = self.sleeper.sleep(retry.backoff) => Ok(()),
        }
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("cancellable", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}

/// Runs `operation` with the default policy, `tracing` logging and tokio sleeps.
pub async fn execute_with_retry<T, E, F, Fut>(
    operation: F,
    max_retries: Option<u32>,
    context: Option<&str>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + From<RetryInterrupt>,
{
    RetryExecutor::new(RetryPolicy::default())
        .execute_with_retry(
            operation,
            max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            context.unwrap_or("operation"),
        )
        .await
}
