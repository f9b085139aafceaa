//! Bounded retries with exponential backoff.
//!
//! The executor here knows nothing about pipelines: it wraps any fallible
//! asynchronous operation, and the orchestrator reuses it for every
//! specialist invocation.

mod backoff;
mod executor;

pub use backoff::{compute_backoff, RetryPolicy, DEFAULT_MAX_RETRIES};
pub use executor::{
    execute_with_retry, RetryContext, RetryExecutor, RetryInterrupt, Sleeper, TokioSleeper,
};
