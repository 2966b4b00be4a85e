//! CLI surface for the MCP adapter binary, mirroring the broker CLI's
//! global-flags pattern.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "figbridge-mcp-server", about = "MCP stdio adapter for the channel broker")]
pub struct Config {
    /// WebSocket URL of the channel broker to connect to.
    #[arg(long, default_value = "ws://127.0.0.1:3055", env = "FIGBRIDGE_BROKER_URL")]
    pub broker_url: String,

    /// Delay before retrying a dropped broker connection.
    #[arg(long, default_value_t = 2000, env = "FIGBRIDGE_RECONNECT_DELAY_MS")]
    pub reconnect_delay_ms: u64,

    /// Tracing filter directive, e.g. "info" or "bridge_mcp_adapter=debug".
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, default_value_t = false, env = "FIGBRIDGE_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    pub fn reconnect_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.reconnect_delay_ms)
    }
}
