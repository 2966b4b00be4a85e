//! The MCP stdio adapter binary's library half: an outbound WebSocket
//! connection to the channel broker on one side, an MCP stdio server loop
//! on the other. The `figbridge-mcp-server` binary is a thin CLI wrapper
//! around [`run`], mirroring the split between the broker binary and its
//! library half.

pub mod canonicalize;
pub mod config;
pub mod error;
pub mod mcp_types;
pub mod prompts_catalog;
pub mod server;
pub mod state;
pub mod tool_catalog;
pub mod ws_client;

use std::sync::Arc;

use config::Config;
use state::AdapterState;
use tokio::sync::mpsc;
use ws_client::WsClient;

pub async fn run(config: Config) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let ws = WsClient::spawn(config.broker_url.clone(), config.reconnect_delay(), event_tx);
    let state = Arc::new(AdapterState::new(ws));

    server::run(state, event_rx).await;
}
