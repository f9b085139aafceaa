//! # Campaignflow
//!
//! Orchestration core for a campaign email generation pipeline.
//!
//! Four specialists run strictly in order (Content, Design, Quality, Delivery)
//! with support for:
//!
//! - **Bounded retries**: every specialist call goes through a retry executor
//!   with capped exponential backoff
//! - **Handoff contracts**: each stage output is checked for its envelope
//!   before the next stage sees it
//! - **Accumulated state**: a single generation state per run, folded forward
//!   with write-once fields and accumulating metadata
//! - **Cancellation handling**: checked at stage boundaries and during backoff
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use campaignflow::prelude::*;
//!
//! let orchestrator = Orchestrator::new(SpecialistSet::new(content, design, quality, delivery))
//!     .with_config(PipelineConfig::default().apply_env()?);
//!
//! match orchestrator
//!     .run_pipeline("Paris flight sale", PipelineOptions::new().with_max_retries(2))
//!     .await
//! {
//!     Ok(success) => println!("sent {}", success.content_digest),
//!     Err(failure) => eprintln!("{:?} failed: {}", failure.failed_stage(), failure.error),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod retry;
pub mod specialists;
pub mod state;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{PipelineConfig, RetryConfig};
    pub use crate::contracts::{validate, Boundary, HandoffPayload, ValidatedHandoff};
    pub use crate::errors::{
        ErrorKind, PipelineError, PreconditionViolation, RunError, SchemaViolation,
        SpecialistError, StageFailure,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
    pub use crate::observability::{init_tracing, PipelineLogger, TracingLogger};
    pub use crate::pipeline::{
        Orchestrator, PipelineFailure, PipelineOptions, PipelinePhase, PipelineResult,
        PipelineSuccess,
    };
    pub use crate::retry::{execute_with_retry, RetryExecutor, RetryPolicy};
    pub use crate::specialists::{FnSpecialist, Specialist, SpecialistSet, StageInput, StageName};
    pub use crate::state::GenerationState;
}
