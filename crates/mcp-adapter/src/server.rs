//! The MCP server loop: JSON-RPC 2.0 requests in on stdin, responses out on
//! stdout, one line each. Every `call_tool` suspends its own task so a slow
//! executor reply never blocks the next incoming stdin line.

use std::sync::Arc;
use std::time::Duration;

use bridge_protocol::envelope::{self, Envelope, MessageBody};
use bridge_protocol::{DEFAULT_REQUEST_TIMEOUT, ErrorKind, ErrorShape};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::canonicalize::canonicalize;
use crate::mcp_types::{
    ClientInfo, GetPromptParams, InitializeParams, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    METHOD_NOT_FOUND, PROTOCOL_VERSION, ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCallResult,
    ToolsCapability, ToolsListResult,
};
use crate::prompts_catalog;
use crate::state::{AdapterState, LIVENESS_SWEEP_INTERVAL};
use crate::tool_catalog::{self, CHANNEL_NOT_REQUIRED};
use crate::ws_client::ConnectionEvent;

/// Fallback channel name for broker-local tools called before any
/// `join_channel` — the broker's local-command dispatch never inspects the
/// channel name, so this placeholder never actually routes anywhere.
const UNJOINED_PLACEHOLDER_CHANNEL: &str = "_unjoined";

pub async fn run(state: Arc<AdapterState>, mut event_rx: mpsc::UnboundedReceiver<ConnectionEvent>) {
    let (stdout_tx, mut stdout_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = stdout_rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let event_state = state.clone();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ConnectionEvent::Connected => info!("connected to broker"),
                ConnectionEvent::Disconnected => {
                    warn!("disconnected from broker");
                    event_state.on_disconnected();
                },
                ConnectionEvent::Frame(text) => handle_inbound_frame(&event_state, &text),
            }
        }
    });

    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIVENESS_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            for id in sweep_state.sweep_timeouts() {
                debug!(request_id = %id, "pending request timed out");
            }
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                dispatch_line(state.clone(), stdout_tx.clone(), trimmed.to_string());
            },
            Ok(None) => {
                debug!("stdin closed, shutting down");
                break;
            },
            Err(err) => {
                warn!(%err, "error reading stdin");
                break;
            },
        }
    }

    state.shutdown();
}

fn dispatch_line(state: Arc<AdapterState>, stdout_tx: mpsc::UnboundedSender<String>, line: String) {
    let request: JsonRpcRequest = match serde_json::from_str(&line) {
        Ok(req) => req,
        Err(err) => {
            warn!(%err, "malformed JSON-RPC line, ignoring (no id to reply to)");
            return;
        },
    };

    tokio::spawn(async move {
        if let Some(response) = handle_request(&state, request).await {
            if let Ok(json) = serde_json::to_string(&response) {
                let _ = stdout_tx.send(json);
            }
        }
    });
}

pub async fn handle_request(state: &Arc<AdapterState>, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    match request.method.as_str() {
        "initialize" => Some(handle_initialize(request)),
        "initialized" => None,
        "tools/list" => Some(handle_tools_list(request)),
        "prompts/list" => Some(handle_prompts_list(request)),
        "get_prompt" => Some(handle_get_prompt(request)),
        "call_tool" => Some(handle_call_tool(state, request).await),
        "notifications/cancelled" => {
            handle_cancelled(state, request);
            None
        },
        other => Some(JsonRpcResponse::err(request.id, METHOD_NOT_FOUND, format!("unknown method '{other}'"))),
    }
}

/// A client asking to abandon an in-flight `call_tool`. Best-effort: if the
/// call already resolved or was never tracked, this is a no-op.
fn handle_cancelled(state: &Arc<AdapterState>, request: JsonRpcRequest) {
    let Some(mcp_id) = request.params.as_ref().and_then(|p| p.get("requestId")) else {
        warn!("notifications/cancelled missing 'requestId', ignoring");
        return;
    };
    let key = mcp_id_key(mcp_id);
    if state.cancel_call(&key) {
        debug!(request_id = %key, "cancelled in-flight call_tool");
    }
}

/// Stable string key for an MCP request id, which may be a JSON number or
/// string on the wire.
fn mcp_id_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn handle_initialize(request: JsonRpcRequest) -> JsonRpcResponse {
    let _params: InitializeParams = match request.params.map(serde_json::from_value).transpose() {
        Ok(params) => params.unwrap_or_else(|| InitializeParams {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: Default::default(),
            client_info: ClientInfo { name: "unknown".into(), version: String::new() },
        }),
        Err(err) => return JsonRpcResponse::err(request.id, METHOD_NOT_FOUND, format!("invalid initialize params: {err}")),
    };

    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.into(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: false }),
            prompts: Some(Value::Object(Default::default())),
        },
        server_info: ServerInfo { name: "figbridge-mcp-server".into(), version: Some(env!("CARGO_PKG_VERSION").into()) },
    };
    JsonRpcResponse::ok(request.id, serde_json::to_value(result).unwrap_or(Value::Null))
}

fn handle_tools_list(request: JsonRpcRequest) -> JsonRpcResponse {
    let result = ToolsListResult { tools: tool_catalog::catalog() };
    JsonRpcResponse::ok(request.id, serde_json::to_value(result).unwrap_or(Value::Null))
}

fn handle_prompts_list(request: JsonRpcRequest) -> JsonRpcResponse {
    let result = crate::mcp_types::PromptsListResult { prompts: prompts_catalog::catalog() };
    JsonRpcResponse::ok(request.id, serde_json::to_value(result).unwrap_or(Value::Null))
}

fn handle_get_prompt(request: JsonRpcRequest) -> JsonRpcResponse {
    let params: GetPromptParams = match request.params.clone().map(serde_json::from_value).transpose() {
        Ok(Some(params)) => params,
        Ok(None) => return JsonRpcResponse::err(request.id, METHOD_NOT_FOUND, "missing params"),
        Err(err) => return JsonRpcResponse::err(request.id, METHOD_NOT_FOUND, format!("invalid get_prompt params: {err}")),
    };
    match prompts_catalog::get(&params.name) {
        Some(result) => JsonRpcResponse::ok(request.id, serde_json::to_value(result).unwrap_or(Value::Null)),
        None => JsonRpcResponse::err(request.id, METHOD_NOT_FOUND, format!("unknown prompt '{}'", params.name)),
    }
}

async fn handle_call_tool(state: &Arc<AdapterState>, request: JsonRpcRequest) -> JsonRpcResponse {
    let params: ToolsCallParams = match request.params.clone().map(serde_json::from_value).transpose() {
        Ok(Some(params)) => params,
        Ok(None) => return JsonRpcResponse::err(request.id, METHOD_NOT_FOUND, "missing params"),
        Err(err) => return JsonRpcResponse::err(request.id, METHOD_NOT_FOUND, format!("invalid call_tool params: {err}")),
    };

    if params.name == "join_channel" {
        let channel = params.arguments.get("channel").and_then(Value::as_str).unwrap_or_default();
        if channel.is_empty() {
            let result = ToolsCallResult::error("join_channel requires a non-empty 'channel' argument");
            return JsonRpcResponse::ok(request.id, serde_json::to_value(result).unwrap_or(Value::Null));
        }
        let result = match state.join_channel(channel).await {
            Ok(()) => ToolsCallResult::text(format!("joined channel '{channel}'")),
            Err(err) => ToolsCallResult::error(format!("{}: {}", err.kind, err.message)),
        };
        return JsonRpcResponse::ok(request.id, serde_json::to_value(result).unwrap_or(Value::Null));
    }

    let channel_required = !CHANNEL_NOT_REQUIRED.contains(&params.name.as_str());
    let channel = match state.current_channel() {
        Some(channel) => channel,
        None if channel_required => {
            let result = ToolsCallResult::error("no channel joined: call join_channel first");
            return JsonRpcResponse::ok(request.id, serde_json::to_value(result).unwrap_or(Value::Null));
        },
        None => UNJOINED_PLACEHOLDER_CHANNEL.to_string(),
    };

    let mcp_id = mcp_id_key(&request.id);
    let result = forward_call(state, &mcp_id, &channel, &params.name, params.arguments).await;
    JsonRpcResponse::ok(request.id, serde_json::to_value(result).unwrap_or(Value::Null))
}

async fn forward_call(state: &Arc<AdapterState>, mcp_id: &str, channel: &str, command: &str, arguments: Value) -> ToolsCallResult {
    let request_id = state.fresh_id("r");
    let transport_id = state.fresh_id("e");
    let canonical_params = canonicalize(command, arguments);

    let rx = state.pending.register(request_id.clone(), command.to_string(), DEFAULT_REQUEST_TIMEOUT);
    state.track_call(mcp_id.to_string(), request_id.clone());

    let message = envelope::WireEnvelope {
        r#type: "message".into(),
        channel: Some(channel.to_string()),
        id: Some(transport_id),
        message: Some(serde_json::json!({ "id": request_id, "command": command, "params": canonical_params })),
        client_type: None,
    };
    let text = serde_json::to_string(&message).unwrap_or_default();
    state.send_raw(text);

    let result = match rx.await {
        Ok(Ok(value)) => ToolsCallResult::text(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())),
        Ok(Err(error)) => ToolsCallResult::error(format!("{}: {}", error.kind, error.message)),
        Err(_) => ToolsCallResult::error("internal: pending waiter dropped without a reply"),
    };
    state.untrack_call(mcp_id);
    result
}

pub fn handle_inbound_frame(state: &Arc<AdapterState>, text: &str) {
    let parsed = match envelope::parse(text) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(%err, "dropping malformed frame from broker");
            return;
        },
    };

    match parsed {
        Envelope::System { channel: Some(channel), .. } => state.resolve_join_ack(&channel),
        Envelope::System { channel: None, .. } => {},
        Envelope::Message { body: MessageBody::Response { id, result, error }, .. } => match error {
            Some(error) => state.pending.reject(&id, error),
            None => state.pending.resolve(&id, result.unwrap_or(Value::Null)),
        },
        Envelope::ProgressUpdate { transport_id, .. } => {
            state.pending.extend_deadline(&transport_id, bridge_protocol::PROGRESS_EXTENSION);
        },
        Envelope::ErrorFrame { channel: None, .. } => {
            warn!("broker signaled shutdown, rejecting all pending requests");
            state.pending.reject_all(ErrorShape::new(ErrorKind::Shutdown, "broker is shutting down"));
        },
        Envelope::ErrorFrame { .. } | Envelope::Join { .. } | Envelope::Message { .. } | Envelope::Unknown(_) => {},
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_client::WsClient;

    fn state() -> Arc<AdapterState> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let ws = WsClient::spawn("ws://127.0.0.1:1".into(), Duration::from_millis(1), tx);
        Arc::new(AdapterState::new(ws))
    }

    #[tokio::test]
    async fn initialize_reports_protocol_version() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Value::from(1),
            method: "initialize".into(),
            params: None,
        };
        let response = handle_initialize(request);
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn tools_list_includes_join_channel() {
        let request = JsonRpcRequest { jsonrpc: "2.0".into(), id: Value::from(1), method: "tools/list".into(), params: None };
        let response = handle_tools_list(request);
        let result = response.result.unwrap();
        let names: Vec<_> = result["tools"].as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"join_channel"));
    }

    #[tokio::test]
    async fn call_tool_without_join_on_channel_required_tool_errors_locally() {
        let state = state();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Value::from(1),
            method: "call_tool".into(),
            params: Some(serde_json::json!({ "name": "get_document_info", "arguments": {} })),
        };
        let response = handle_call_tool(&state, request).await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("join_channel"));
    }

    #[tokio::test]
    async fn call_tool_on_channel_not_required_tool_uses_placeholder_channel() {
        let state = state();
        let state2 = state.clone();
        let handle = tokio::spawn(async move {
            forward_call(&state2, "1", UNJOINED_PLACEHOLDER_CHANNEL, "get_active_channels", Value::Null).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        // The request id counter starts at 1 and forward_call draws the
        // request id before the transport id, so this is "r1".
        state.pending.resolve("r1", serde_json::json!({ "channels": [] }));
        let result = handle.await.unwrap();
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn cancelling_an_in_flight_call_rejects_its_waiter() {
        let state = state();
        let state2 = state.clone();
        let handle = tokio::spawn(async move {
            forward_call(&state2, "7", UNJOINED_PLACEHOLDER_CHANNEL, "get_active_channels", Value::Null).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let cancel = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Value::Null,
            method: "notifications/cancelled".into(),
            params: Some(serde_json::json!({ "requestId": 7 })),
        };
        assert!(handle_request(&state, cancel).await.is_none());

        let result = handle.await.unwrap();
        assert!(result.is_error);
        let crate::mcp_types::ToolContent::Text { text } = &result.content[0];
        assert!(text.contains("cancelled"));
    }

    #[tokio::test]
    async fn cancelling_an_unknown_call_is_a_noop() {
        let state = state();
        let cancel = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Value::Null,
            method: "notifications/cancelled".into(),
            params: Some(serde_json::json!({ "requestId": "does-not-exist" })),
        };
        assert!(handle_request(&state, cancel).await.is_none());
    }

    #[test]
    fn progress_update_extends_deadline_without_panicking() {
        let state = state();
        handle_inbound_frame(
            &state,
            r#"{"type":"progress_update","channel":"fig-1","id":"r1","message":{"data":{"pct":50}}}"#,
        );
    }

    #[test]
    fn shutdown_error_frame_rejects_all_pending() {
        let state = state();
        let _rx = state.pending.register("r1".into(), "noop".into(), Duration::from_secs(30));
        handle_inbound_frame(&state, r#"{"type":"error","message":{"kind":"shutdown","message":"bye"}}"#);
        assert_eq!(state.pending.len(), 0);
    }
}
