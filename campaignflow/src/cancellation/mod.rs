//! Cooperative cancellation for pipeline runs.
//!
//! A [`CancellationToken`] is checked by the orchestrator at every stage
//! boundary and raced against backoff waits inside the retry executor.

mod token;

pub use token::CancellationToken;
