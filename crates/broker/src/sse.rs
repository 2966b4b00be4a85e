//! The SSE migration sniffer: a short-lived HTTP listener on
//! the deprecated SSE port that tells stragglers to switch to stdio, then
//! stops itself after the first request or after its window elapses.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{info, warn};

struct SniffState {
    fired: AtomicBool,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    on_observed: Box<dyn Fn() + Send + Sync>,
}

/// Bind the sniffer on `addr` and serve until the first request is
/// observed or `window` elapses, whichever comes first. A bind failure
/// (e.g. port already in use) is logged and treated as non-fatal.
pub async fn run(addr: SocketAddr, window: Duration, on_observed: impl Fn() + Send + Sync + 'static) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            warn!(%err, %addr, "sse migration sniffer failed to bind, continuing without it");
            return;
        },
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let state = Arc::new(SniffState {
        fired: AtomicBool::new(false),
        shutdown_tx: Mutex::new(Some(shutdown_tx)),
        on_observed: Box::new(on_observed),
    });

    let app = Router::new().fallback(sniff).with_state(state);

    info!(%addr, window_secs = window.as_secs(), "sse migration sniffer listening");

    let shutdown = async move {
        tokio::select! {
            _ = shutdown_rx => {},
            _ = tokio::time::sleep(window) => {},
        }
    };

    if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        warn!(%err, "sse migration sniffer exited with error");
    }
}

async fn sniff(State(state): State<Arc<SniffState>>, method: Method, uri: Uri) -> Response {
    if !state.fired.swap(true, Ordering::SeqCst) {
        (state.on_observed)();
        if let Some(tx) = state.shutdown_tx.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = tx.send(());
        }
    }

    if method == Method::GET && uri.path() == "/sse" {
        let body = json!({
            "error": "upgrade_required",
            "message": "The SSE transport has been retired; reconnect over stdio.",
            "migration": { "from": "/sse", "to": "stdio" },
        });
        let mut response = (StatusCode::UPGRADE_REQUIRED, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::UPGRADE, HeaderValue::from_static("stdio"));
        response
    } else {
        let body = json!({
            "error": "upgrade_required",
            "message": "The SSE transport has been retired; reconnect over stdio.",
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
