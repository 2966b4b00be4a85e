use bridge_common::telemetry::{self, TelemetryOptions};
use bridge_mcp_adapter::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    telemetry::init(&TelemetryOptions {
        log_level: config.log_level.clone(),
        json_logs: config.json_logs,
        stderr_only: true,
    });

    bridge_mcp_adapter::run(config).await;
}
