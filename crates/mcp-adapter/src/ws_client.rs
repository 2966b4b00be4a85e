//! The adapter's outbound WebSocket connection to the broker: connect,
//! forward frames bidirectionally, and reconnect with a fixed backoff on
//! close, modeled as a small state machine so a late close event can never
//! schedule a reconnect after shutdown has already been requested.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Frame(String),
}

pub struct WsClient {
    write_tx: mpsc::UnboundedSender<String>,
    shutting_down: Arc<AtomicBool>,
}

impl WsClient {
    /// Spawn the connection loop. Returns immediately; the connection runs
    /// in a background task.
    pub fn spawn(url: String, reconnect_delay: Duration, event_tx: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        let (write_tx, write_rx) = mpsc::unbounded_channel::<String>();
        let shutting_down = Arc::new(AtomicBool::new(false));

        tokio::spawn(connection_loop(url, reconnect_delay, event_tx, write_rx, shutting_down.clone()));

        Self { write_tx, shutting_down }
    }

    pub fn send_raw(&self, text: String) {
        let _ = self.write_tx.send(text);
    }

    /// Stop reconnecting once the current (or next) connection attempt
    /// ends. Does not forcibly close an in-flight connection; the drain
    /// happens naturally when the write half is dropped.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }
}

async fn connection_loop(
    url: String,
    reconnect_delay: Duration,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    mut write_rx: mpsc::UnboundedReceiver<String>,
    shutting_down: Arc<AtomicBool>,
) {
    loop {
        if shutting_down.load(Ordering::SeqCst) {
            debug!("adapter is shutting down, not reconnecting");
            return;
        }

        info!(%url, "connecting to broker");
        match connect_and_run(&url, &event_tx, &mut write_rx).await {
            Ok(()) => debug!("broker connection closed cleanly"),
            Err(err) => error!(%err, "broker connection error"),
        }

        let _ = event_tx.send(ConnectionEvent::Disconnected);

        if shutting_down.load(Ordering::SeqCst) {
            return;
        }
        info!(delay_ms = reconnect_delay.as_millis(), "reconnecting after delay");
        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn connect_and_run(
    url: &str,
    event_tx: &mpsc::UnboundedSender<ConnectionEvent>,
    write_rx: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let (ws_stream, _response) = connect_async(url).await?;
    let (mut sink, mut reader) = ws_stream.split();
    let _ = event_tx.send(ConnectionEvent::Connected);

    loop {
        tokio::select! {
            msg = reader.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = event_tx.send(ConnectionEvent::Frame(text.to_string()));
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("broker closed the connection");
                        return Ok(());
                    },
                    Some(Ok(Message::Ping(data))) => {
                        sink.send(Message::Pong(data)).await?;
                    },
                    Some(Ok(_)) => {},
                    Some(Err(err)) => return Err(err),
                }
            },
            text = write_rx.recv() => {
                match text {
                    Some(text) => sink.send(Message::Text(text.into())).await?,
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return Ok(());
                    },
                }
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_sets_the_flag() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = WsClient::spawn("ws://127.0.0.1:1".into(), Duration::from_millis(1), tx);
        assert!(!client.shutting_down.load(Ordering::SeqCst));
        client.shutdown();
        assert!(client.shutting_down.load(Ordering::SeqCst));
    }

    #[test]
    fn send_raw_before_any_connection_does_not_panic() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = WsClient::spawn("ws://127.0.0.1:1".into(), Duration::from_millis(1), tx);
        warn!("sending on a client that will never reach a live socket in this test");
        client.send_raw("noop".into());
    }
}
