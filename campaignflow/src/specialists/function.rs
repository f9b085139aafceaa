//! Closure-backed specialists.

use super::{Specialist, StageInput};
use crate::errors::SpecialistError;
use crate::state::GenerationState;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::future::Future;

type RunFn =
    dyn Fn(StageInput, GenerationState) -> BoxFuture<'static, Result<Value, SpecialistError>>
        + Send
        + Sync;

/// A specialist backed by an async closure.
pub struct FnSpecialist {
    label: String,
    func: Box<RunFn>,
}

impl FnSpecialist {
    /// Wraps `func` as a specialist.
    pub fn new<F, Fut>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(StageInput, GenerationState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, SpecialistError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            func: Box::new(move |input, state| func(input, state).boxed()),
        }
    }

    /// Returns the label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for FnSpecialist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSpecialist")
            .field("label", &self.label)
            .finish()
    }
}

#[async_trait]
impl Specialist for FnSpecialist {
    async fn run(&self, input: StageInput, state: GenerationState) -> Result<Value, SpecialistError> {
        (self.func)(input, state).await
    }
}
