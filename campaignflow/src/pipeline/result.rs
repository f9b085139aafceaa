//! What a pipeline run returns.

use super::phase::PipelinePhase;
use crate::errors::{ErrorKind, RunError};
use crate::specialists::StageName;
use crate::state::GenerationState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Bookkeeping for one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage.
    pub stage: StageName,
    /// Specialist invocations it took, retries included.
    pub attempts: u32,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// Wall time from start to merged output.
    pub duration_ms: f64,
}

/// Receipt returned by the Delivery stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Identifier assigned by the delivery service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    /// Delivery status as reported by the service.
    #[serde(default = "default_status")]
    pub status: String,
    /// Anything else the service reported.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_status() -> String {
    "submitted".to_string()
}

impl DeliveryReceipt {
    /// Reads a receipt from the opaque envelope value.
    ///
    /// Unknown shapes are kept under `extra["receipt"]` rather than rejected.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|_| {
            let mut extra = Map::new();
            extra.insert("receipt".to_string(), value.clone());
            Self {
                campaign_id: None,
                status: default_status(),
                extra,
            }
        })
    }
}

/// A run that reached `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSuccess {
    /// Run identifier.
    pub run_id: Uuid,
    /// State after all four merges.
    pub final_state: GenerationState,
    /// Delivery receipt.
    pub receipt: DeliveryReceipt,
    /// Hex SHA-256 of the delivered markup.
    pub content_digest: String,
    /// One record per stage, in order.
    pub stages: Vec<StageRecord>,
    /// Every phase the run went through.
    pub phases: Vec<PipelinePhase>,
}

impl PipelineSuccess {
    /// Total specialist invocations across all stages.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.stages.iter().map(|record| record.attempts).sum()
    }

    /// The record for `stage`.
    #[must_use]
    pub fn stage(&self, stage: StageName) -> Option<&StageRecord> {
        self.stages.iter().find(|record| record.stage == stage)
    }
}

/// A run that ended in `Failed` or `Cancelled`.
#[derive(Debug, Error)]
#[error("pipeline run {run_id}: {error}")]
pub struct PipelineFailure {
    /// Run identifier.
    pub run_id: Uuid,
    /// Why the run stopped.
    #[source]
    pub error: RunError,
    /// Stages that completed before the failure.
    pub stages: Vec<StageRecord>,
    /// Every phase the run went through.
    pub phases: Vec<PipelinePhase>,
}

impl PipelineFailure {
    /// The stage the run stopped at.
    #[must_use]
    pub fn failed_stage(&self) -> Option<StageName> {
        self.error.failed_stage()
    }

    /// The error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// The terminal phase.
    #[must_use]
    pub fn phase(&self) -> PipelinePhase {
        self.phases
            .last()
            .copied()
            .unwrap_or(PipelinePhase::Initialized)
    }
}

/// Caller-facing error summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Kind-specific diagnostics.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl From<&RunError> for ErrorReport {
    fn from(error: &RunError) -> Self {
        let details = match error {
            RunError::Failed(failure) => failure
                .error
                .to_dict()
                .into_iter()
                .filter(|(key, _)| key != "kind" && key != "message")
                .collect(),
            RunError::Cancelled { .. } | RunError::InvalidOptions(_) => Map::new(),
        };
        Self {
            kind: error.kind(),
            message: error.to_string(),
            details,
        }
    }
}

/// Serializable run outcome for HTTP callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineResult {
    /// The run completed.
    Success {
        /// Always `true`.
        success: bool,
        /// Run identifier.
        run_id: Uuid,
        /// Final generation state.
        final_state: GenerationState,
        /// Delivery receipt.
        receipt: DeliveryReceipt,
        /// Hex SHA-256 of the delivered markup.
        content_digest: String,
        /// Per-stage records.
        stages: Vec<StageRecord>,
        /// Every phase the run went through.
        phases: Vec<PipelinePhase>,
    },
    /// The run failed or was cancelled.
    Failure {
        /// Always `false`.
        success: bool,
        /// Run identifier.
        run_id: Uuid,
        /// Stage the run stopped at.
        failed_stage: Option<StageName>,
        /// What went wrong.
        error: ErrorReport,
        /// Every phase the run went through.
        phases: Vec<PipelinePhase>,
    },
}

impl PipelineResult {
    /// Whether the run completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Result<PipelineSuccess, PipelineFailure>> for PipelineResult {
    fn from(outcome: Result<PipelineSuccess, PipelineFailure>) -> Self {
        match outcome {
            Ok(success) => Self::Success {
                success: true,
                run_id: success.run_id,
                final_state: success.final_state,
                receipt: success.receipt,
                content_digest: success.content_digest,
                stages: success.stages,
                phases: success.phases,
            },
            Err(failure) => Self::Failure {
                success: false,
                run_id: failure.run_id,
                failed_stage: failure.failed_stage(),
                error: ErrorReport::from(&failure.error),
                phases: failure.phases,
            },
        }
    }
}
