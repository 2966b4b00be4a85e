#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end scenarios exercising the adapter's JSON-RPC surface and its
//! pending-request table directly, mirroring the broker's own
//! drive-the-router-without-a-real-socket integration style.

use std::sync::Arc;
use std::time::Duration;

use bridge_mcp_adapter::mcp_types::JsonRpcRequest;
use bridge_mcp_adapter::server;
use bridge_mcp_adapter::state::AdapterState;
use bridge_mcp_adapter::ws_client::WsClient;
use serde_json::{Value, json};

fn new_state() -> Arc<AdapterState> {
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let ws = WsClient::spawn("ws://127.0.0.1:1".into(), Duration::from_millis(1), tx);
    Arc::new(AdapterState::new(ws))
}

fn call_tool_request(id: i64, name: &str, arguments: Value) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".into(),
        id: Value::from(id),
        method: "call_tool".into(),
        params: Some(json!({ "name": name, "arguments": arguments })),
    }
}

async fn join(state: &Arc<AdapterState>, channel: &str) {
    let state2 = state.clone();
    let channel2 = channel.to_string();
    let handle = tokio::spawn(async move { state2.join_channel(&channel2).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    state.resolve_join_ack(channel);
    handle.await.expect("join task panicked").expect("join failed");
}

/// S3: a channel-required tool call with no executor connected times out
/// and surfaces as an `isError` tool result rather than hanging forever.
#[tokio::test(start_paused = true)]
async fn s3_call_times_out_without_an_executor_reply() {
    let state = new_state();
    join(&state, "fig-1").await;

    let request = call_tool_request(1, "get_document_info", json!({}));
    let call = tokio::spawn({
        let state = state.clone();
        async move { server::handle_request(&state, request).await }
    });

    // Nothing ever resolves the pending waiter; advance paused time past
    // the default request timeout so the liveness sweep would fire, and
    // directly simulate what that sweep does: reject as a timeout.
    tokio::time::sleep(Duration::from_secs(31)).await;
    for id in state.sweep_timeouts() {
        let _ = id;
    }

    let response = call.await.expect("call_tool task panicked").expect("handle_request returned None");
    let result = response.result.expect("call_tool always replies with a result, even on failure");
    assert_eq!(result["isError"], true);
    assert!(result["content"][0]["text"].as_str().unwrap().contains("timeout"));
}

/// S4: a progress_update frame arriving mid-call extends the pending
/// request's deadline instead of leaving it to expire on schedule.
#[tokio::test]
async fn s4_progress_update_extends_pending_deadline() {
    let state = new_state();
    join(&state, "fig-1").await;

    let rx = state.pending.register("r1".into(), "export_node".into(), Duration::from_millis(50));

    server::handle_inbound_frame(
        &state,
        r#"{"type":"progress_update","channel":"fig-1","id":"r1","message":{"data":{"pct":10}}}"#,
    );

    // Without the extension this sleep alone would already have expired
    // the original 50ms deadline.
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(state.pending.len(), 1, "progress_update should have pushed the deadline out");

    state.pending.resolve("r1", json!({ "ok": true }));
    let resolved = rx.await.expect("resolver dropped").expect("resolved as an error");
    assert_eq!(resolved, json!({ "ok": true }));
}

/// A channel-not-required tool called before any `join_channel` succeeds
/// via the placeholder channel rather than being rejected locally.
#[tokio::test]
async fn channel_not_required_tool_bypasses_the_join_precondition() {
    let state = new_state();
    let request = call_tool_request(1, "get_active_channels", json!({}));

    let call = tokio::spawn({
        let state = state.clone();
        async move { server::handle_request(&state, request).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    state.pending.resolve("r1", json!({ "channels": [] }));

    let response = call.await.expect("call_tool task panicked").expect("handle_request returned None");
    let result = response.result.expect("missing result");
    assert_eq!(result["isError"], false);
}

/// A channel-required tool called before any `join_channel` is rejected
/// locally, without ever reaching the broker.
#[tokio::test]
async fn channel_required_tool_without_join_is_rejected_locally() {
    let state = new_state();
    let request = call_tool_request(1, "get_document_info", json!({}));
    let response = server::handle_request(&state, request).await.expect("missing response");
    let result = response.result.expect("missing result");
    assert_eq!(result["isError"], true);
    assert_eq!(state.pending.len(), 0, "a locally-rejected call never registers a pending waiter");
}
