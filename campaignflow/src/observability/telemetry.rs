//! `tracing-subscriber` setup for binaries embedding the pipeline.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Installs a global subscriber at `log_level`.
///
/// `RUST_LOG` takes priority over `log_level`. Installing twice is a no-op.
pub fn init_tracing_with_level(log_level: &str, format: LogFormat) {
    let default_filter = format!("{log_level},campaignflow={log_level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init().ok(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .ok(),
    };
}

/// Installs a global subscriber at `info`, pretty in debug builds and JSON otherwise.
pub fn init_tracing() {
    let format = if cfg!(debug_assertions) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    };
    init_tracing_with_level("info", format);
}
