//! Pipeline orchestration.
//!
//! This module provides:
//! - The phase state machine a run moves through
//! - The orchestrator that drives the four specialists
//! - Success, failure and caller-facing result types

mod integration_tests;
mod orchestrator;
mod phase;
mod result;

pub use orchestrator::{Orchestrator, PipelineOptions};
pub use phase::{PhaseTracker, PipelinePhase};
pub use result::{
    DeliveryReceipt, ErrorReport, PipelineFailure, PipelineResult, PipelineSuccess, StageRecord,
};
