use bridge_broker::config::Config;
use bridge_common::telemetry::{self, TelemetryOptions};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    telemetry::init(&TelemetryOptions {
        log_level: config.log_level.clone(),
        json_logs: config.json_logs,
        stderr_only: false,
    });

    bridge_broker::run(config).await?;
    Ok(())
}
