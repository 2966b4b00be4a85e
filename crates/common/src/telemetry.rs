//! Shared `tracing` initialization for the broker and MCP adapter binaries.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Options controlling how a binary's tracing subscriber is wired up.
pub struct TelemetryOptions {
    pub log_level: String,
    pub json_logs: bool,
    /// Write formatted logs to stderr instead of stdout. The MCP adapter
    /// must set this: stdout is reserved for MCP JSON-RPC framing.
    pub stderr_only: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            json_logs: false,
            stderr_only: false,
        }
    }
}

/// Initialize the global `tracing` subscriber. Call once, at process start.
pub fn init(opts: &TelemetryOptions) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&opts.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    let writer = if opts.stderr_only {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    if opts.json_logs {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(writer);
        registry.with(layer).init();
    } else {
        let layer = fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_ansi(!opts.stderr_only)
            .with_writer(writer);
        registry.with(layer).init();
    }
}
