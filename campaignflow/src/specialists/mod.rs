//! Specialists: the four units of work the pipeline sequences.
//!
//! Each specialist is reached through the same [`Specialist::run`] capability.
//! The set of stages is closed ([`StageName`]); a [`SpecialistSet`] fills one
//! slot per stage, so the orchestrator treats every variant uniformly.

mod function;
mod stage;

pub use function::FnSpecialist;
pub use stage::StageName;

use crate::contracts::ValidatedHandoff;
use crate::errors::SpecialistError;
use crate::state::GenerationState;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// What a specialist receives besides the state snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageInput {
    /// Handoff from the previous stage; `None` for Content.
    pub handoff: Option<ValidatedHandoff>,
    /// Caller-supplied options, passed through untouched.
    pub params: Map<String, Value>,
}

impl StageInput {
    /// Returns the inner package of the incoming handoff, if any.
    #[must_use]
    pub fn package(&self) -> Option<&Value> {
        self.handoff.as_ref().map(ValidatedHandoff::package)
    }
}

/// A pipeline stage implementation.
///
/// `state` is an owned snapshot taken before the invocation; changes a
/// specialist makes to it are discarded. The returned value is the raw handoff
/// payload, validated by the orchestrator against the stage's boundary.
#[async_trait]
pub trait Specialist: Send + Sync {
    /// Runs the specialist.
    async fn run(&self, input: StageInput, state: GenerationState) -> Result<Value, SpecialistError>;
}

/// One specialist per stage.
#[derive(Clone)]
pub struct SpecialistSet {
    content: Arc<dyn Specialist>,
    design: Arc<dyn Specialist>,
    quality: Arc<dyn Specialist>,
    delivery: Arc<dyn Specialist>,
}

impl SpecialistSet {
    /// Creates a set from the four specialists.
    #[must_use]
    pub fn new(
        content: Arc<dyn Specialist>,
        design: Arc<dyn Specialist>,
        quality: Arc<dyn Specialist>,
        delivery: Arc<dyn Specialist>,
    ) -> Self {
        Self {
            content,
            design,
            quality,
            delivery,
        }
    }

    /// Returns the specialist filling `stage`.
    #[must_use]
    pub fn get(&self, stage: StageName) -> &Arc<dyn Specialist> {
        match stage {
            StageName::Content => &self.content,
            StageName::Design => &self.design,
            StageName::Quality => &self.quality,
            StageName::Delivery => &self.delivery,
        }
    }

    /// Replaces the specialist for `stage`.
    #[must_use]
    pub fn with(mut self, stage: StageName, specialist: Arc<dyn Specialist>) -> Self {
        match stage {
            StageName::Content => self.content = specialist,
            StageName::Design => self.design = specialist,
            StageName::Quality => self.quality = specialist,
            StageName::Delivery => self.delivery = specialist,
        }
        self
    }
}

impl fmt::Debug for SpecialistSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecialistSet").finish_non_exhaustive()
    }
}
