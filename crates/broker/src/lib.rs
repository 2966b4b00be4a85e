//! The WebSocket channel broker binary's library half: wiring for the
//! axum server, the SSE migration sniffer, and graceful shutdown. The
//! `figbridge-broker` binary is a thin CLI wrapper around [`run`].

pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod figma_client;
pub mod observe;
pub mod router;
pub mod sse;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use axum::routing::get;
use tracing::info;

use config::Config;
use error::{Context, Result};
use state::{BrokerState, FigmaAuth};

/// How long shutdown waits for outbound queues to drain before forcing
/// connections closed.
const SHUTDOWN_DRAIN_DEADLINE: Duration = Duration::from_secs(3);

pub async fn run(config: Config) -> Result<()> {
    let state = Arc::new(BrokerState::new(config.port, FigmaAuth::from_env()));

    let app = Router::new()
        .route("/", get(ws_handler))
        .with_state(state.clone())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let ws_addr: SocketAddr = config.ws_addr().parse().context("invalid --bind/--port")?;
    let listener = tokio::net::TcpListener::bind(ws_addr)
        .await
        .context("binding the channel-broker WebSocket port")?;
    info!(%ws_addr, "channel broker listening");

    let sse_addr: SocketAddr = config.sse_addr().parse().context("invalid --bind/--sse-port")?;
    let sse_window = Duration::from_secs(config.sse_window_secs);
    tokio::spawn(sse::run(sse_addr, sse_window, || {
        info!("legacy SSE client observed; migration notice served");
    }));

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .context("broker server loop exited")?;

    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<BrokerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state))
}

async fn shutdown_signal(state: Arc<BrokerState>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, notifying connections");

    let notice = bridge_protocol::envelope::shutdown_notice();
    for conn in state.connection_ids() {
        let _ = state.send(conn, notice.clone());
    }

    tokio::time::sleep(SHUTDOWN_DRAIN_DEADLINE).await;
    info!("shutdown drain window elapsed, closing remaining connections");
}
