//! The error taxonomy used uniformly in `message.error`.

use serde::{Deserialize, Serialize};

/// The fixed set of error kinds the broker and adapter ever emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Envelope malformed or missing a required field.
    BadRequest,
    /// Sender issued a channel-requiring command without joining.
    NotJoined,
    /// Deadline expired on a pending request.
    Timeout,
    /// Peer disconnected before a reply arrived.
    ConnectionClosed,
    /// A REST-API tool was attempted without valid credentials.
    Unauthenticated,
    /// A REST-API call returned a non-2xx response.
    Upstream,
    /// Unexpected local-handler exception.
    Internal,
    /// The broker is terminating.
    Shutdown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::NotJoined => "not_joined",
            Self::Timeout => "timeout",
            Self::ConnectionClosed => "connection_closed",
            Self::Unauthenticated => "unauthenticated",
            Self::Upstream => "upstream",
            Self::Internal => "internal",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shape carried in `message.error` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorShape {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorShape {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// An `upstream` error carrying the HTTP status and a body excerpt.
    pub fn upstream(status: u16, excerpt: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, format!("upstream returned {status}")).with_details(
            serde_json::json!({ "status": status, "excerpt": excerpt.into() }),
        )
    }
}

impl std::fmt::Display for ErrorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorShape {}
