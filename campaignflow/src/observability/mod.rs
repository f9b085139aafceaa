//! Observability utilities.

mod logger;
mod telemetry;

pub use logger::{NoOpLogger, PipelineLogger, TracingLogger};
pub use telemetry::{init_tracing, init_tracing_with_level, LogFormat};
