//! The orchestrator's state machine.

use crate::errors::PipelineError;
use crate::specialists::StageName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    /// State created, no stage started.
    Initialized,
    /// Content specialist running.
    ContentRunning,
    /// Design specialist running.
    DesignRunning,
    /// Quality specialist running.
    QualityRunning,
    /// Delivery specialist running.
    DeliveryRunning,
    /// Every stage completed.
    Completed,
    /// A stage failed.
    Failed,
    /// The caller cancelled the run.
    Cancelled,
}

impl PipelinePhase {
    /// The running phase for `stage`.
    #[must_use]
    pub fn running(stage: StageName) -> Self {
        match stage {
            StageName::Content => Self::ContentRunning,
            StageName::Design => Self::DesignRunning,
            StageName::Quality => Self::QualityRunning,
            StageName::Delivery => Self::DeliveryRunning,
        }
    }

    /// The stage running in this phase, if any.
    #[must_use]
    pub fn stage(self) -> Option<StageName> {
        match self {
            Self::ContentRunning => Some(StageName::Content),
            Self::DesignRunning => Some(StageName::Design),
            Self::QualityRunning => Some(StageName::Quality),
            Self::DeliveryRunning => Some(StageName::Delivery),
            _ => None,
        }
    }

    /// Whether the run has ended.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `next` may follow this phase.
    ///
    /// Stages advance strictly in order. `Failed` is reachable from any
    /// running phase; `Cancelled` also from `Initialized`, since cancellation
    /// is checked before the first stage starts.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Initialized, Self::ContentRunning | Self::Cancelled) => true,
            (current, Self::Failed | Self::Cancelled) => current.stage().is_some(),
            (current, Self::Completed) => current == Self::DeliveryRunning,
            (current, next) => match (current.stage(), next.stage()) {
                (Some(from), Some(to)) => from.next() == Some(to),
                _ => false,
            },
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "initialized",
            Self::ContentRunning => "content_running",
            Self::DesignRunning => "design_running",
            Self::QualityRunning => "quality_running",
            Self::DeliveryRunning => "delivery_running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Tracks the current phase and every phase visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTracker {
    history: Vec<PipelinePhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    /// Starts in `Initialized`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: vec![PipelinePhase::Initialized],
        }
    }

    /// The current phase.
    #[must_use]
    pub fn current(&self) -> PipelinePhase {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelinePhase::Initialized)
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Internal`] for a transition the machine does
    /// not allow; reaching one means the orchestrator itself is broken.
    pub fn advance(&mut self, next: PipelinePhase) -> Result<(), PipelineError> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(PipelineError::Internal(format!(
                "illegal phase transition {current} -> {next}"
            )));
        }
        self.history.push(next);
        Ok(())
    }

    /// Every phase visited, in order.
    #[must_use]
    pub fn history(&self) -> &[PipelinePhase] {
        &self.history
    }

    /// Consumes the tracker and returns the history.
    #[must_use]
    pub fn into_history(self) -> Vec<PipelinePhase> {
        self.history
    }
}
