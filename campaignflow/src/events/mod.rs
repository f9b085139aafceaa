//! Lifecycle events emitted while a pipeline run progresses.
//!
//! Events are fire-and-forget: a sink never influences the run. The
//! orchestrator emits one event per phase change, tagged with the run id.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::specialists::StageName;
use crate::utils::iso_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A run began.
    #[serde(rename = "pipeline.started")]
    PipelineStarted,
    /// A stage is about to be invoked.
    #[serde(rename = "stage.started")]
    StageStarted,
    /// A stage's output was validated and merged.
    #[serde(rename = "stage.completed")]
    StageCompleted,
    /// A stage terminated the run.
    #[serde(rename = "stage.failed")]
    StageFailed,
    /// All four stages completed.
    #[serde(rename = "pipeline.completed")]
    PipelineCompleted,
    /// The run ended in failure.
    #[serde(rename = "pipeline.failed")]
    PipelineFailed,
    /// The run was cancelled by the caller.
    #[serde(rename = "pipeline.cancelled")]
    PipelineCancelled,
}

impl EventKind {
    /// Returns the dotted event name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PipelineStarted => "pipeline.started",
            Self::StageStarted => "stage.started",
            Self::StageCompleted => "stage.completed",
            Self::StageFailed => "stage.failed",
            Self::PipelineCompleted => "pipeline.completed",
            Self::PipelineFailed => "pipeline.failed",
            Self::PipelineCancelled => "pipeline.cancelled",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Run the event belongs to.
    pub run_id: Uuid,
    /// What happened.
    pub kind: EventKind,
    /// Stage involved, for stage events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageName>,
    /// RFC 3339 emission time.
    pub timestamp: String,
    /// Event-specific payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl PipelineEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(run_id: Uuid, kind: EventKind) -> Self {
        Self {
            run_id,
            kind,
            stage: None,
            timestamp: iso_timestamp(),
            data: Value::Null,
        }
    }

    /// Sets the stage.
    #[must_use]
    pub fn with_stage(mut self, stage: StageName) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}
