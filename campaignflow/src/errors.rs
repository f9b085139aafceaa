//! Error types for campaign pipeline runs.
//!
//! The taxonomy separates failures that the retry executor may absorb
//! (transient specialist errors) from structural failures that are never
//! retried (schema and precondition violations), and keeps caller-initiated
//! cancellation distinct from genuine stage failure.

use crate::contracts::{Boundary, ContractErrorInfo};
use crate::retry::RetryInterrupt;
use crate::specialists::StageName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a pipeline error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Specialist failure that was eligible for retry.
    TransientFailure,
    /// Handoff payload missing its envelope field.
    SchemaViolation,
    /// State merge found a required field absent or already owned.
    PreconditionViolation,
    /// Caller-initiated abort.
    Cancelled,
    /// Run options failed validation before any stage ran.
    InvalidConfig,
    /// Internal accounting bug.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransientFailure => write!(f, "transient_failure"),
            Self::SchemaViolation => write!(f, "schema_violation"),
            Self::PreconditionViolation => write!(f, "precondition_violation"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::InvalidConfig => write!(f, "invalid_config"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Error raised by a specialist invocation.
#[derive(Debug, Error)]
pub enum SpecialistError {
    /// The specialist reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The invocation exceeded its per-call timeout.
    #[error("specialist timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    /// The retry executor stopped before the operation could finish.
    #[error(transparent)]
    Interrupted(#[from] RetryInterrupt),

    /// Any other error raised inside the specialist.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpecialistError {
    /// Creates a plain failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A handoff payload did not carry its required envelope field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("schema violation at {boundary}: {}", info.summary)]
pub struct SchemaViolation {
    /// The boundary whose contract rejected the payload.
    pub boundary: Boundary,
    /// The envelope field that was missing, if a single field is to blame.
    pub field: Option<String>,
    /// Structured diagnostics.
    pub info: ContractErrorInfo,
}

/// A state merge found its preconditions unmet.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("precondition violation in {stage} stage: field '{field}' {reason}")]
pub struct PreconditionViolation {
    /// Stage whose merge or invocation was rejected.
    pub stage: StageName,
    /// The offending state field.
    pub field: String,
    /// Why the field is unacceptable.
    pub reason: String,
}

impl PreconditionViolation {
    /// A field required downstream is absent.
    #[must_use]
    pub fn missing(stage: StageName, field: impl Into<String>) -> Self {
        Self {
            stage,
            field: field.into(),
            reason: "is required but absent".to_string(),
        }
    }

    /// A field owned by an earlier stage would be overwritten.
    #[must_use]
    pub fn already_set(stage: StageName, field: impl Into<String>) -> Self {
        Self {
            stage,
            field: field.into(),
            reason: "is already set and may not be overwritten".to_string(),
        }
    }

    /// A field is present but has the wrong shape.
    #[must_use]
    pub fn malformed(stage: StageName, field: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self {
            stage,
            field: field.into(),
            reason: format!("is malformed: {detail}"),
        }
    }
}

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A specialist kept failing until retries were exhausted.
    #[error("{operation} failed: {source}")]
    Transient {
        /// Logical operation name used by the retry executor.
        operation: String,
        /// The error raised by the final attempt.
        #[source]
        source: SpecialistError,
    },

    /// A handoff contract rejected the stage output.
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    /// A state merge precondition was not met.
    #[error(transparent)]
    PreconditionViolation(#[from] PreconditionViolation),

    /// The run was cancelled.
    #[error("pipeline cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },

    /// An internal invariant was broken.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Classifies a specialist error surfaced by the retry executor.
    #[must_use]
    pub fn from_specialist(operation: impl Into<String>, error: SpecialistError) -> Self {
        match error {
            SpecialistError::Interrupted(RetryInterrupt::Cancelled { reason, .. }) => {
                Self::Cancelled { reason }
            }
            SpecialistError::Interrupted(interrupt @ RetryInterrupt::AttemptsUnaccounted { .. }) => {
                Self::Internal(interrupt.to_string())
            }
            source => Self::Transient {
                operation: operation.into(),
                source,
            },
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient { .. } => ErrorKind::TransientFailure,
            Self::SchemaViolation(_) => ErrorKind::SchemaViolation,
            Self::PreconditionViolation(_) => ErrorKind::PreconditionViolation,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the error came from cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Converts to a dictionary representation for logs and API responses.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Self::SchemaViolation(violation) = self {
            map.insert("boundary".to_string(), serde_json::json!(violation.boundary));
            map.insert("code".to_string(), serde_json::json!(violation.info.code));
        }
        if let Self::PreconditionViolation(violation) = self {
            map.insert("field".to_string(), serde_json::json!(violation.field));
        }
        map
    }
}

/// A pipeline error tagged with the stage that raised it.
#[derive(Debug, Error)]
#[error("stage '{stage}' failed: {error}")]
pub struct StageFailure {
    /// The failing stage.
    pub stage: StageName,
    /// The terminal error.
    #[source]
    pub error: PipelineError,
}

impl StageFailure {
    /// Creates a new stage failure.
    #[must_use]
    pub fn new(stage: StageName, error: impl Into<PipelineError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }

    /// Returns the kind of the wrapped error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Terminal outcome of an unsuccessful run.
#[derive(Debug, Error)]
pub enum RunError {
    /// A stage failed and the run transitioned to `Failed`.
    #[error(transparent)]
    Failed(StageFailure),

    /// Cancellation was observed before or during a stage.
    #[error("pipeline cancelled at stage '{stage}': {reason}")]
    Cancelled {
        /// The stage that was about to run or was backing off.
        stage: StageName,
        /// The cancellation reason.
        reason: String,
    },

    /// Per-run options were rejected; no stage ran.
    #[error("invalid run options: {0}")]
    InvalidOptions(#[from] ConfigError),
}

impl RunError {
    /// Returns the stage at which the run stopped, if one had started.
    #[must_use]
    pub fn failed_stage(&self) -> Option<StageName> {
        match self {
            Self::Failed(failure) => Some(failure.stage),
            Self::Cancelled { stage, .. } => Some(*stage),
            Self::InvalidOptions(_) => None,
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Failed(failure) => failure.kind(),
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::InvalidOptions(_) => ErrorKind::InvalidConfig,
        }
    }

    /// Returns true if the run was cancelled rather than failed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<StageFailure> for RunError {
    fn from(failure: StageFailure) -> Self {
        match failure.error {
            PipelineError::Cancelled { reason } => Self::Cancelled {
                stage: failure.stage,
                reason,
            },
            _ => Self::Failed(failure),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is outside its accepted range.
    #[error("invalid config value for '{field}': {message}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// An environment override could not be parsed.
    #[error("invalid environment override {var}={value}")]
    Env {
        /// The environment variable.
        var: String,
        /// The raw value.
        value: String,
    },

    /// The config file could not be parsed.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::codes;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::SchemaViolation.to_string(), "schema_violation");
        assert_eq!(ErrorKind::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_error_kind_serialize() {
        let json = serde_json::to_string(&ErrorKind::PreconditionViolation).unwrap();
        assert_eq!(json, r#""precondition_violation""#);
    }

    #[test]
    fn test_from_specialist_classifies_cancellation() {
        let err = PipelineError::from_specialist(
            "content",
            SpecialistError::Interrupted(RetryInterrupt::Cancelled {
                context: "content".to_string(),
                reason: "user abort".to_string(),
            }),
        );
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_from_specialist_keeps_original_failure() {
        let err = PipelineError::from_specialist("design", SpecialistError::failed("render crashed"));
        assert_eq!(err.kind(), ErrorKind::TransientFailure);
        assert!(err.to_string().contains("render crashed"));
    }

    #[test]
    fn test_precondition_violation_message() {
        let err = PreconditionViolation::missing(StageName::Design, "html");
        assert!(err.to_string().contains("design"));
        assert!(err.to_string().contains("html"));
    }

    #[test]
    fn test_schema_violation_to_dict() {
        let violation = SchemaViolation {
            boundary: Boundary::DesignToQuality,
            field: Some("email_package".to_string()),
            info: ContractErrorInfo::new(codes::MISSING_ENVELOPE, "missing email_package"),
        };
        let dict = PipelineError::from(violation).to_dict();
        assert_eq!(dict.get("kind"), Some(&serde_json::json!("schema_violation")));
        assert_eq!(dict.get("code"), Some(&serde_json::json!(codes::MISSING_ENVELOPE)));
    }

    #[test]
    fn test_run_error_from_cancelled_stage_failure() {
        let failure = StageFailure::new(
            StageName::Quality,
            PipelineError::Cancelled {
                reason: "shutdown".to_string(),
            },
        );
        let run_err = RunError::from(failure);
        assert!(run_err.is_cancelled());
        assert_eq!(run_err.failed_stage(), Some(StageName::Quality));
        assert_eq!(run_err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_run_error_from_precondition_failure() {
        let failure = StageFailure::new(
            StageName::Design,
            PreconditionViolation::missing(StageName::Design, "html"),
        );
        let run_err = RunError::from(failure);
        assert!(!run_err.is_cancelled());
        assert_eq!(run_err.kind(), ErrorKind::PreconditionViolation);
    }

    #[test]
    fn test_run_error_from_config_error() {
        let run_err = RunError::from(ConfigError::Invalid {
            field: "retry_delay_ms",
            message: "must be greater than zero".to_string(),
        });
        assert_eq!(run_err.failed_stage(), None);
        assert_eq!(run_err.kind(), ErrorKind::InvalidConfig);
    }
}
