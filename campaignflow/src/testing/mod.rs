//! Testing utilities for campaign pipelines.
//!
//! This module provides:
//! - Scripted specialists that fail, succeed or stall on cue
//! - A recording logger and a sleeper that never actually waits
//! - Sample stage outputs for every boundary

pub mod fixtures;
mod mocks;

pub use mocks::{RecordingLogger, RecordingSleeper, RetryWarning, ScriptedSpecialist, Step};
