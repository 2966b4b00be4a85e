//! CLI surface for the broker binary: bind address, ports, and the usual
//! log-level/JSON-logs flags.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "figbridge-broker", about = "WebSocket channel broker")]
pub struct Config {
    /// Address to bind the channel-broker WebSocket endpoint on.
    #[arg(long, default_value = "127.0.0.1", env = "FIGBRIDGE_BIND")]
    pub bind: String,

    /// Port for the channel-broker WebSocket endpoint.
    #[arg(long, default_value_t = 3055, env = "FIGBRIDGE_PORT")]
    pub port: u16,

    /// Port for the deprecated-SSE migration sniffer.
    #[arg(long, default_value_t = 3056, env = "FIGBRIDGE_SSE_PORT")]
    pub sse_port: u16,

    /// How long after startup the migration sniffer stays listening.
    #[arg(long, default_value_t = 60, env = "FIGBRIDGE_SSE_WINDOW_SECS")]
    pub sse_window_secs: u64,

    /// Tracing filter directive, e.g. "info" or "bridge_broker=debug".
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, default_value_t = false, env = "FIGBRIDGE_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    pub fn ws_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn sse_addr(&self) -> String {
        format!("{}:{}", self.bind, self.sse_port)
    }
}
