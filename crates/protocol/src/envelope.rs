//! The wire codec: parses/serializes the JSON envelope and classifies
//! it into a strongly typed sum. `WireEnvelope` is the only place raw JSON
//! is touched; everything downstream works with [`Envelope`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorShape;

/// Maximum accepted frame size.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// The self-declared role a client presents on `join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Controller,
    Executor,
}

impl Default for ClientType {
    fn default() -> Self {
        Self::Controller
    }
}

/// The raw wire shape. Permissive about unknown top-level
/// keys (serde ignores fields absent from the struct); strict about `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(
        default,
        rename = "clientType",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_type: Option<ClientType>,
}

/// The nested `message` payload on a `message`-typed envelope, once
/// classified as either a request or a response. Envelopes whose `message`
/// is neither (missing both `command` and `result`/`error`) classify to
/// `None` and are dropped by the router with a debug log.
#[derive(Debug, Clone)]
pub enum MessageBody {
    Request {
        id: String,
        command: String,
        params: Value,
    },
    Response {
        id: String,
        result: Option<Value>,
        error: Option<ErrorShape>,
    },
}

impl MessageBody {
    pub fn inner_id(&self) -> &str {
        match self {
            Self::Request { id, .. } | Self::Response { id, .. } => id,
        }
    }

    /// Classify a nested `message` object. Returns `None` when it is
    /// neither a clear request nor a clear response.
    fn classify(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = obj.get("id")?.as_str()?.to_string();

        let has_command = obj.contains_key("command");
        let has_result_or_error = obj.contains_key("result") || obj.contains_key("error");

        if has_command && !has_result_or_error {
            let command = obj.get("command")?.as_str()?.to_string();
            let params = obj.get("params").cloned().unwrap_or(Value::Object(Default::default()));
            Some(Self::Request { id, command, params })
        } else if has_result_or_error && !has_command {
            let result = obj.get("result").cloned();
            let error = obj
                .get("error")
                .and_then(|e| serde_json::from_value::<ErrorShape>(e.clone()).ok());
            Some(Self::Response { id, result, error })
        } else {
            None
        }
    }
}

/// The strongly typed classification of an incoming envelope. Replaces the
/// loosely-typed envelope some systems carry over the wire.
#[derive(Debug, Clone)]
pub enum Envelope {
    Join {
        transport_id: Option<String>,
        channel: String,
        client_type: ClientType,
    },
    Message {
        transport_id: String,
        channel: String,
        body: MessageBody,
    },
    ProgressUpdate {
        transport_id: String,
        channel: String,
        data: Value,
    },
    System {
        channel: Option<String>,
        payload: Value,
    },
    ErrorFrame {
        channel: Option<String>,
        payload: Value,
    },
    /// A `type` this codec version doesn't know about. Forward-compatible:
    /// the router replies with an error but keeps the connection open.
    Unknown(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("empty channel")]
    EmptyChannel,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("frame exceeds maximum size of {MAX_FRAME_BYTES} bytes")]
    FrameTooLarge,
}

/// Parse and classify one wire frame.
pub fn parse(text: &str) -> Result<Envelope, CodecError> {
    if text.len() > MAX_FRAME_BYTES {
        return Err(CodecError::FrameTooLarge);
    }
    let wire: WireEnvelope = serde_json::from_str(text)?;
    classify(wire)
}

fn classify(wire: WireEnvelope) -> Result<Envelope, CodecError> {
    match wire.r#type.as_str() {
        "join" => {
            let channel = wire.channel.ok_or(CodecError::MissingField("channel"))?;
            if channel.is_empty() {
                return Err(CodecError::EmptyChannel);
            }
            Ok(Envelope::Join {
                transport_id: wire.id,
                channel,
                client_type: wire.client_type.unwrap_or_default(),
            })
        },
        "message" => {
            let channel = wire.channel.ok_or(CodecError::MissingField("channel"))?;
            if channel.is_empty() {
                return Err(CodecError::EmptyChannel);
            }
            let transport_id = wire.id.ok_or(CodecError::MissingField("id"))?;
            let message = wire.message.ok_or(CodecError::MissingField("message"))?;
            let body = MessageBody::classify(&message)
                .ok_or(CodecError::MissingField("message.{command|result|error}"))?;
            Ok(Envelope::Message {
                transport_id,
                channel,
                body,
            })
        },
        "progress_update" => {
            let channel = wire.channel.ok_or(CodecError::MissingField("channel"))?;
            let transport_id = wire.id.ok_or(CodecError::MissingField("id"))?;
            let data = wire
                .message
                .and_then(|m| m.get("data").cloned())
                .unwrap_or(Value::Null);
            Ok(Envelope::ProgressUpdate {
                transport_id,
                channel,
                data,
            })
        },
        "system" => Ok(Envelope::System {
            channel: wire.channel,
            payload: wire.message.unwrap_or(Value::Null),
        }),
        "error" => Ok(Envelope::ErrorFrame {
            channel: wire.channel,
            payload: wire.message.unwrap_or(Value::Null),
        }),
        other => Ok(Envelope::Unknown(other.to_string())),
    }
}

// ── Outgoing constructors ────────────────────────────────────────────────────

/// The welcome prompt sent immediately on accept, before any `join`.
pub fn welcome_prompt() -> String {
    let wire = WireEnvelope {
        r#type: "system".into(),
        channel: None,
        id: None,
        message: Some(serde_json::json!({ "message": "Please join a channel to proceed" })),
        client_type: None,
    };
    serde_json::to_string(&wire).unwrap_or_default()
}

/// A `system` acknowledgement in reply to a `join`, preserving the joiner's
/// transport id if present.
pub fn join_ack(channel: &str, transport_id: Option<&str>) -> String {
    let wire = WireEnvelope {
        r#type: "system".into(),
        channel: Some(channel.to_string()),
        id: transport_id.map(str::to_string),
        message: Some(serde_json::json!({ "message": format!("Joined channel: {channel}") })),
        client_type: None,
    };
    serde_json::to_string(&wire).unwrap_or_default()
}

/// The system notice broadcast to other channel members when someone joins.
pub fn join_notice(channel: &str) -> String {
    let wire = WireEnvelope {
        r#type: "system".into(),
        channel: Some(channel.to_string()),
        id: None,
        message: Some(serde_json::json!({ "message": "A new user has joined the channel" })),
        client_type: None,
    };
    serde_json::to_string(&wire).unwrap_or_default()
}

/// A bare protocol-level error envelope (not a `message.error` reply) — used
/// for malformed frames and unknown types.
pub fn error_frame(channel: Option<&str>, message: impl Into<String>) -> String {
    let wire = WireEnvelope {
        r#type: "error".into(),
        channel: channel.map(str::to_string),
        id: None,
        message: Some(serde_json::json!({ "message": message.into() })),
        client_type: None,
    };
    serde_json::to_string(&wire).unwrap_or_default()
}

/// The notice unicast to every connection as the broker begins shutting
/// down, so a waiting adapter can reject with `shutdown` rather than the
/// less specific `connection_closed` once the socket drops.
pub fn shutdown_notice() -> String {
    let error = crate::error::ErrorShape::new(crate::error::ErrorKind::Shutdown, "broker is shutting down");
    let wire = WireEnvelope {
        r#type: "error".into(),
        channel: None,
        id: None,
        message: Some(serde_json::to_value(error).unwrap_or(Value::Null)),
        client_type: None,
    };
    serde_json::to_string(&wire).unwrap_or_default()
}

/// A `message` reply to a request: `{type: "message", id: envelope.id,
/// message: {id: request.id, result|error}}`.
pub fn message_reply(
    envelope_transport_id: &str,
    channel: &str,
    request_id: &str,
    result: std::result::Result<Value, ErrorShape>,
) -> String {
    let message = match result {
        Ok(result) => serde_json::json!({ "id": request_id, "result": result }),
        Err(error) => serde_json::json!({ "id": request_id, "error": error }),
    };
    let wire = WireEnvelope {
        r#type: "message".into(),
        channel: Some(channel.to_string()),
        id: Some(envelope_transport_id.to_string()),
        message: Some(message),
        client_type: None,
    };
    serde_json::to_string(&wire).unwrap_or_default()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join() {
        let text = r#"{"type":"join","channel":"fig-1","id":"j1","clientType":"controller"}"#;
        match parse(text).unwrap() {
            Envelope::Join {
                channel,
                client_type,
                transport_id,
            } => {
                assert_eq!(channel, "fig-1");
                assert_eq!(client_type, ClientType::Controller);
                assert_eq!(transport_id.as_deref(), Some("j1"));
            },
            other => panic!("expected Join, got {other:?}"),
        }
    }

    #[test]
    fn join_defaults_to_controller() {
        let text = r#"{"type":"join","channel":"fig-1"}"#;
        match parse(text).unwrap() {
            Envelope::Join { client_type, .. } => assert_eq!(client_type, ClientType::Controller),
            other => panic!("expected Join, got {other:?}"),
        }
    }

    #[test]
    fn empty_channel_is_bad_request() {
        let text = r#"{"type":"join","channel":""}"#;
        assert!(matches!(parse(text), Err(CodecError::EmptyChannel)));
    }

    #[test]
    fn parses_request_message() {
        let text = r#"{"type":"message","channel":"fig-1","id":"e1","message":{"id":"r1","command":"get_document_info","params":{}}}"#;
        match parse(text).unwrap() {
            Envelope::Message { body, .. } => match body {
                MessageBody::Request { command, .. } => assert_eq!(command, "get_document_info"),
                other => panic!("expected Request, got {other:?}"),
            },
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn parses_response_message() {
        let text = r#"{"type":"message","channel":"fig-1","id":"e2","message":{"id":"r1","result":{"name":"Doc"}}}"#;
        match parse(text).unwrap() {
            Envelope::Message { body, .. } => match body {
                MessageBody::Response { result, error, .. } => {
                    assert!(result.is_some());
                    assert!(error.is_none());
                },
                other => panic!("expected Response, got {other:?}"),
            },
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn ambiguous_message_is_dropped_at_classification() {
        let text = r#"{"type":"message","channel":"fig-1","id":"e3","message":{"id":"r1"}}"#;
        assert!(parse(text).is_err());
    }

    #[test]
    fn unknown_type_classifies_but_does_not_error() {
        let text = r#"{"type":"ping"}"#;
        match parse(text).unwrap() {
            Envelope::Unknown(t) => assert_eq!(t, "ping"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn oversized_frame_rejected() {
        let huge = "x".repeat(MAX_FRAME_BYTES + 1);
        assert!(matches!(parse(&huge), Err(CodecError::FrameTooLarge)));
    }

    #[test]
    fn round_trip_join_ack() {
        let json = join_ack("fig-1", Some("j1"));
        let wire: WireEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(wire.r#type, "system");
        assert_eq!(wire.channel.as_deref(), Some("fig-1"));
        assert_eq!(wire.id.as_deref(), Some("j1"));
    }

    #[test]
    fn message_reply_round_trips_as_message_response() {
        let json = message_reply("e1", "fig-1", "r1", Ok(serde_json::json!({"ok": true})));
        match parse(&json).unwrap() {
            Envelope::Message { body, .. } => match body {
                MessageBody::Response { id, result, .. } => {
                    assert_eq!(id, "r1");
                    assert_eq!(result, Some(serde_json::json!({"ok": true})));
                },
                other => panic!("expected Response, got {other:?}"),
            },
            other => panic!("expected Message, got {other:?}"),
        }
    }
}
