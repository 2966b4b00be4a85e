//! Shared broker state: the connection table and channel registry, plus
//! the handful of process-wide collaborators (HTTP client, credentials,
//! log sink) local-command handlers need.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Instant;

use axum::extract::ws::Message;
use bridge_channels::{ChannelRegistry, ConnId};
use bridge_protocol::ClientType;
use secrecy::{Secret, SecretString};
use tokio::sync::{broadcast, mpsc};

use crate::observe::LogRecord;

/// Outbound queue depth before a connection is considered a slow consumer
/// and closed.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("connection not found")]
    NotFound,
    #[error("outbound queue full")]
    SlowConsumer,
}

/// Per-connection bookkeeping: identity, self-declared role, and the
/// sending half of its outbound writer queue.
pub struct ConnectionHandle {
    pub id: ConnId,
    pub client_type: Mutex<ClientType>,
    pub connected_at: Instant,
    pub last_activity: Mutex<Instant>,
    tx: mpsc::Sender<Message>,
}

impl ConnectionHandle {
    pub fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub fn client_type(&self) -> ClientType {
        *self.client_type.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_client_type(&self, client_type: ClientType) {
        *self.client_type.lock().unwrap_or_else(|e| e.into_inner()) = client_type;
    }
}

/// Figma-style REST credentials, read once at startup. Never logged.
#[derive(Clone)]
pub struct FigmaAuth {
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub default_file_key: Option<String>,
}

impl FigmaAuth {
    pub fn from_env() -> Self {
        Self {
            access_token: std::env::var("FIGBRIDGE_ACCESS_TOKEN").ok().map(Secret::new),
            refresh_token: std::env::var("FIGBRIDGE_REFRESH_TOKEN").ok().map(Secret::new),
            default_file_key: std::env::var("FIGBRIDGE_DEFAULT_FILE_KEY").ok(),
        }
    }
}

pub struct BrokerState {
    pub channels: Mutex<ChannelRegistry>,
    connections: RwLock<HashMap<ConnId, ConnectionHandle>>,
    pub started_at: Instant,
    pub port: u16,
    pub http: reqwest::Client,
    pub figma_auth: FigmaAuth,
    pub log_sink: broadcast::Sender<LogRecord>,
    /// The "small config blob" `get_config`/`set_config` read and write.
    /// Broker-local; not a Figma REST endpoint.
    pub config_blob: Mutex<serde_json::Map<String, serde_json::Value>>,
}

impl BrokerState {
    pub fn new(port: u16, figma_auth: FigmaAuth) -> Self {
        let (log_sink, _rx) = broadcast::channel(1024);
        Self {
            channels: Mutex::new(ChannelRegistry::new()),
            connections: RwLock::new(HashMap::new()),
            started_at: Instant::now(),
            port,
            http: reqwest::Client::new(),
            figma_auth,
            log_sink,
            config_blob: Mutex::new(serde_json::Map::new()),
        }
    }

    pub fn register_connection(&self, id: ConnId) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let handle = ConnectionHandle {
            id,
            client_type: Mutex::new(ClientType::Controller),
            connected_at: Instant::now(),
            last_activity: Mutex::new(Instant::now()),
            tx,
        };
        self.connections.write().unwrap_or_else(|e| e.into_inner()).insert(id, handle);
        rx
    }

    /// Remove the connection from the table and from every channel it had
    /// joined. Returns the channels it was removed from, for observability.
    pub fn remove_connection(&self, id: ConnId) -> Vec<String> {
        self.connections.write().unwrap_or_else(|e| e.into_inner()).remove(&id);
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).remove_connection(id)
    }

    pub fn set_client_type(&self, id: ConnId, client_type: ClientType) {
        if let Some(handle) = self.connections.read().unwrap_or_else(|e| e.into_inner()).get(&id) {
            handle.set_client_type(client_type);
        }
    }

    pub fn client_type_of(&self, id: ConnId) -> Option<ClientType> {
        self.connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .map(ConnectionHandle::client_type)
    }

    pub fn touch(&self, id: ConnId) {
        if let Some(handle) = self.connections.read().unwrap_or_else(|e| e.into_inner()).get(&id) {
            handle.touch();
        }
    }

    /// Enqueue a text frame for `id`. Closes the connection (by dropping
    /// its sender-facing handle, which the writer loop observes) when the
    /// queue is full rather than blocking the caller.
    pub fn send(&self, id: ConnId, text: String) -> Result<(), SendError> {
        let connections = self.connections.read().unwrap_or_else(|e| e.into_inner());
        let handle = connections.get(&id).ok_or(SendError::NotFound)?;
        handle
            .tx
            .try_send(Message::Text(text.into()))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => SendError::SlowConsumer,
                mpsc::error::TrySendError::Closed(_) => SendError::NotFound,
            })
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn connection_ids(&self) -> Vec<ConnId> {
        self.connections.read().unwrap_or_else(|e| e.into_inner()).keys().copied().collect()
    }

    /// Per-channel `(controller_count, executor_count)`, for
    /// `connection_diagnostics`.
    pub fn channel_role_counts(&self, channel: &str) -> (usize, usize) {
        let members = self.channels.lock().unwrap_or_else(|e| e.into_inner()).members(channel);
        let connections = self.connections.read().unwrap_or_else(|e| e.into_inner());
        let mut controllers = 0;
        let mut executors = 0;
        for member in members {
            match connections.get(&member).map(ConnectionHandle::client_type) {
                Some(ClientType::Controller) => controllers += 1,
                Some(ClientType::Executor) => executors += 1,
                None => {},
            }
        }
        (controllers, executors)
    }

    pub fn has_any_executor(&self) -> bool {
        self.connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .any(|h| h.client_type() == ClientType::Executor)
    }
}
