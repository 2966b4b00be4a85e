//! Connection manager: accepts a WebSocket, spawns its inbound-decode loop
//! and outbound-writer loop, and cleans up on close. No authentication
//! layer — broker client authentication is out of scope here.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bridge_channels::ConnId;
use futures::{SinkExt, StreamExt};
use tracing::{info, warn};

use crate::router;
use crate::state::BrokerState;

/// Drive one accepted connection end to end: send the welcome prompt,
/// then alternate reading inbound frames and draining the outbound queue
/// until the socket closes.
pub async fn handle_connection(socket: WebSocket, state: Arc<BrokerState>) {
    let conn_id = ConnId::new();
    let mut outbound = state.register_connection(conn_id);
    info!(conn = %conn_id, "connection accepted");

    let (mut sink, mut stream) = socket.split();

    let welcome = bridge_protocol::envelope::welcome_prompt();
    if sink.send(Message::Text(welcome.into())).await.is_err() {
        state.remove_connection(conn_id);
        return;
    }

    loop {
        tokio::select! {
            biased;

            outgoing = outbound.recv() => {
                match outgoing {
                    Some(msg) => {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    },
                    None => break,
                }
            },
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        state.touch(conn_id);
                        if router::handle_frame(&state, conn_id, &text).await {
                            warn!(conn = %conn_id, "oversized frame rejected, closing connection");
                            break;
                        }
                    },
                    Some(Ok(Message::Binary(_))) => {
                        warn!(conn = %conn_id, "binary frame rejected, closing connection");
                        break;
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Ping/Pong handled transparently by axum.
                    },
                    Some(Err(err)) => {
                        warn!(conn = %conn_id, %err, "transport error, closing connection");
                        break;
                    },
                }
            },
        }
    }

    let channels = state.remove_connection(conn_id);
    info!(conn = %conn_id, ?channels, "connection closed");
}
