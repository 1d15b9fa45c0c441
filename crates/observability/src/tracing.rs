//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Output format for emitted log lines.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers.
    #[default]
    Json,
    /// Human-readable output, for local development.
    Text,
}

impl LogFormat {
    /// Resolve the format from `STOCKLEDGER_LOG_FORMAT` ("json" or "text").
    pub fn from_env() -> Self {
        match std::env::var("STOCKLEDGER_LOG_FORMAT").as_deref() {
            Ok("text") => LogFormat::Text,
            _ => LogFormat::Json,
        }
    }
}

/// Initialize tracing/logging for the process with defaults: filter from
/// `RUST_LOG` (falling back to `info`), format from `STOCKLEDGER_LOG_FORMAT`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(LogFormat::from_env(), None);
}

/// Initialize with an explicit format and optional filter directive.
pub fn init_with(format: LogFormat, filter: Option<&str>) {
    let filter = match filter {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
}
