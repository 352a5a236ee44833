//! Structured logging to stderr.
//!
//! stdout carries JSON-RPC in `mcp-stdio` mode, so nothing here may write to it.
//!
//! Level precedence: `--log-level` / `OPUS_MCP_LOG_LEVEL`, then `RUST_LOG`, then `info`.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub(crate) enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub(crate) fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

fn filter_for(level: Option<LogLevel>, rust_log: Option<&str>) -> EnvFilter {
    if let Some(l) = level {
        return EnvFilter::new(l.as_filter_str());
    }
    rust_log
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(LogLevel::default().as_filter_str()))
}

/// Install the global subscriber. A second call is a no-op.
pub(crate) fn init_logging(level: Option<LogLevel>) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level, rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
