//! The router: dispatches a parsed envelope to local-command handling,
//! channel forwarding, or join bookkeeping.

use std::sync::Arc;

use bridge_channels::ConnId;
use bridge_protocol::envelope::{self, Envelope, MessageBody};
use bridge_protocol::{ClientType, ErrorKind, ErrorShape};
use tracing::{debug, warn};

use crate::commands;
use crate::state::{BrokerState, SendError};

/// Decode and dispatch one inbound text frame from `sender`. Malformed
/// frames get a `bad_request` reply and the connection stays open, except
/// an oversized frame, which gets the same reply and then closes the
/// connection — returns `true` when the caller should close the socket.
pub async fn handle_frame(state: &Arc<BrokerState>, sender: ConnId, raw: &str) -> bool {
    match envelope::parse(raw) {
        Ok(parsed) => {
            handle_envelope(state, sender, parsed, raw).await;
            false
        },
        Err(err) => {
            let too_large = matches!(err, envelope::CodecError::FrameTooLarge);
            debug!(%err, too_large, "dropping malformed frame");
            let frame = envelope::error_frame(None, format!("bad_request: {err}"));
            deliver(state, sender, frame);
            too_large
        },
    }
}

async fn handle_envelope(state: &Arc<BrokerState>, sender: ConnId, envelope: Envelope, raw: &str) {
    match envelope {
        Envelope::Join { transport_id, channel, client_type } => {
            handle_join(state, sender, transport_id, channel, client_type);
        },
        Envelope::Message { transport_id, channel, body } => match body {
            MessageBody::Request { id, command, params } => {
                handle_request(state, sender, transport_id, channel, id, command, params).await;
            },
            MessageBody::Response { .. } => {
                forward_to_others(state, sender, &channel, raw);
            },
        },
        Envelope::ProgressUpdate { channel, .. } => {
            forward_to_others(state, sender, &channel, raw);
        },
        Envelope::System { .. } | Envelope::ErrorFrame { .. } => {
            // Diagnostic only; never forwarded.
        },
        Envelope::Unknown(kind) => {
            warn!(%kind, "unknown envelope type");
            let frame = envelope::error_frame(None, format!("unknown envelope type '{kind}'"));
            deliver(state, sender, frame);
        },
    }
}

fn handle_join(
    state: &Arc<BrokerState>,
    sender: ConnId,
    transport_id: Option<String>,
    channel: String,
    client_type: ClientType,
) {
    state.set_client_type(sender, client_type);
    state.channels.lock().unwrap_or_else(|e| e.into_inner()).join(sender, &channel);

    let ack = envelope::join_ack(&channel, transport_id.as_deref());
    deliver(state, sender, ack);

    let notice = envelope::join_notice(&channel);
    forward_to_others(state, sender, &channel, &notice);
}

async fn handle_request(
    state: &Arc<BrokerState>,
    sender: ConnId,
    transport_id: String,
    channel: String,
    request_id: String,
    command: String,
    params: serde_json::Value,
) {
    if commands::is_local_command(&command) {
        let result = commands::dispatch(&command, &params, state).await;
        let reply = envelope::message_reply(&transport_id, &channel, &request_id, result);
        deliver(state, sender, reply);
        return;
    }

    let is_member = state.channels.lock().unwrap_or_else(|e| e.into_inner()).is_member(sender, &channel);
    if !is_member {
        let error = ErrorShape::new(
            ErrorKind::NotJoined,
            format!("sender has not joined channel '{channel}'"),
        );
        let reply = envelope::message_reply(&transport_id, &channel, &request_id, Err(error));
        deliver(state, sender, reply);
        return;
    }

    let forward = envelope::WireEnvelope {
        r#type: "message".into(),
        channel: Some(channel.clone()),
        id: Some(transport_id),
        message: Some(serde_json::json!({ "id": request_id, "command": command, "params": params })),
        client_type: None,
    };
    let text = serde_json::to_string(&forward).unwrap_or_default();
    forward_to_others(state, sender, &channel, &text);
}

fn forward_to_others(state: &Arc<BrokerState>, sender: ConnId, channel: &str, raw: &str) {
    let members = state.channels.lock().unwrap_or_else(|e| e.into_inner()).members_excluding(channel, sender);
    for member in members {
        deliver(state, member, raw.to_string());
    }
}

fn deliver(state: &Arc<BrokerState>, to: ConnId, text: String) {
    match state.send(to, text) {
        Ok(()) => {},
        Err(SendError::NotFound) => debug!(conn = %to, "dropping send to closed connection"),
        Err(SendError::SlowConsumer) => {
            warn!(conn = %to, "outbound queue full, closing as slow consumer");
            state.remove_connection(to);
        },
    }
}
