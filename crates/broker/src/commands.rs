//! The local command set: commands the broker answers itself
//! rather than forwarding to an executor, because they need broker state,
//! external credentials the executor doesn't hold, or the host shell.

use bridge_protocol::{ErrorKind, ErrorShape};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::figma_client::FigmaClient;
use crate::observe;
use crate::state::BrokerState;

/// Every command name the router must intercept instead of forwarding.
pub const LOCAL_COMMANDS: &[&str] = &[
    "get_active_channels",
    "connection_diagnostics",
    "get_comments",
    "post_comment",
    "reply_to_comment",
    "post_reaction",
    "get_reactions",
    "delete_reaction",
    "get_config",
    "set_config",
    "send_notification",
];

pub fn is_local_command(command: &str) -> bool {
    LOCAL_COMMANDS.contains(&command)
}

fn param_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// Dispatch a local command. Callers must have already checked
/// [`is_local_command`]; an unrecognized name here is a programming error,
/// not a client-facing one.
pub async fn dispatch(command: &str, params: &Value, state: &Arc<BrokerState>) -> Result<Value, ErrorShape> {
    match command {
        "get_active_channels" => Ok(get_active_channels(state)),
        "connection_diagnostics" => Ok(connection_diagnostics(state)),
        "get_comments" => {
            let client = FigmaClient::new(&state.http, &state.figma_auth);
            client.get_comments(param_str(params, "fileKey")).await
        },
        "post_comment" => {
            let message = require_str(params, "message")?;
            let client = FigmaClient::new(&state.http, &state.figma_auth);
            client
                .post_comment(param_str(params, "fileKey"), message, params.get("clientMeta").cloned())
                .await
        },
        "reply_to_comment" => {
            let comment_id = require_str(params, "commentId")?;
            let message = require_str(params, "message")?;
            let client = FigmaClient::new(&state.http, &state.figma_auth);
            client.reply_comment(param_str(params, "fileKey"), comment_id, message).await
        },
        "post_reaction" => {
            let comment_id = require_str(params, "commentId")?;
            let emoji = require_str(params, "emoji")?;
            let client = FigmaClient::new(&state.http, &state.figma_auth);
            client.post_reaction(param_str(params, "fileKey"), comment_id, emoji).await
        },
        "get_reactions" => {
            let comment_id = require_str(params, "commentId")?;
            let client = FigmaClient::new(&state.http, &state.figma_auth);
            client.get_reactions(param_str(params, "fileKey"), comment_id).await
        },
        "delete_reaction" => {
            let comment_id = require_str(params, "commentId")?;
            let emoji = require_str(params, "emoji")?;
            let client = FigmaClient::new(&state.http, &state.figma_auth);
            client.delete_reaction(param_str(params, "fileKey"), comment_id, emoji).await
        },
        "get_config" => Ok(get_config(state)),
        "set_config" => set_config(state, params),
        "send_notification" => Ok(send_notification(state, params)),
        other => Err(ErrorShape::new(ErrorKind::Internal, format!("unregistered local command: {other}"))),
    }
}

fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ErrorShape> {
    param_str(params, key).ok_or_else(|| ErrorShape::new(ErrorKind::BadRequest, format!("missing required param '{key}'")))
}

/// "Active channels (N): a, b, c" — the exact phrasing the router must
/// produce for `get_active_channels`.
fn get_active_channels(state: &BrokerState) -> Value {
    let channels = state.channels.lock().unwrap_or_else(|e| e.into_inner()).active_channels();
    let names: Vec<&str> = channels.iter().map(|(name, _)| name.as_str()).collect();
    Value::String(format!("Active channels ({}): {}", names.len(), names.join(", ")))
}

fn connection_diagnostics(state: &BrokerState) -> Value {
    let channels = state.channels.lock().unwrap_or_else(|e| e.into_inner()).active_channels();
    let has_executor = state.has_any_executor();
    let channel_details: Vec<Value> = channels
        .iter()
        .map(|(name, total)| {
            let (controllers, executors) = state.channel_role_counts(name);
            json!({
                "channel": name,
                "members": total,
                "controllers": controllers,
                "executors": executors,
            })
        })
        .collect();

    json!({
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "port": state.port,
        "connectionCount": state.connection_count(),
        "channels": channel_details,
        "hint": if has_executor {
            None
        } else {
            Some("No executor is currently connected to any channel; requests will time out until a design-tool plugin joins.")
        },
    })
}

fn get_config(state: &BrokerState) -> Value {
    Value::Object(state.config_blob.lock().unwrap_or_else(|e| e.into_inner()).clone())
}

fn set_config(state: &BrokerState, params: &Value) -> Result<Value, ErrorShape> {
    let updates = params
        .as_object()
        .ok_or_else(|| ErrorShape::new(ErrorKind::BadRequest, "set_config params must be an object"))?;
    let mut blob = state.config_blob.lock().unwrap_or_else(|e| e.into_inner());
    for (key, value) in updates {
        blob.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(blob.clone()))
}

fn send_notification(state: &BrokerState, params: &Value) -> Value {
    let title = param_str(params, "title").unwrap_or("FigBridge");
    let body = param_str(params, "body").unwrap_or("");
    observe::publish_notification(&state.log_sink, title, body);
    json!({ "delivered": true })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FigmaAuth;
    use bridge_channels::ConnId;

    fn state() -> Arc<BrokerState> {
        Arc::new(BrokerState::new(3055, FigmaAuth::from_env()))
    }

    #[tokio::test]
    async fn get_active_channels_formats_as_count_and_names() {
        let state = state();
        state.channels.lock().unwrap_or_else(|e| e.into_inner()).join(ConnId::new(), "fig-1");
        let result = dispatch("get_active_channels", &json!({}), &state).await.unwrap();
        assert_eq!(result, json!("Active channels (1): fig-1"));
    }

    #[tokio::test]
    async fn get_active_channels_empty() {
        let state = state();
        let result = dispatch("get_active_channels", &json!({}), &state).await.unwrap();
        assert_eq!(result, json!("Active channels (0): "));
    }

    #[tokio::test]
    async fn connection_diagnostics_hints_when_no_executor() {
        let state = state();
        let result = dispatch("connection_diagnostics", &json!({}), &state).await.unwrap();
        assert!(result["hint"].is_string());
    }

    #[tokio::test]
    async fn set_config_then_get_config_round_trips() {
        let state = state();
        dispatch("set_config", &json!({"theme": "dark"}), &state).await.unwrap();
        let result = dispatch("get_config", &json!({}), &state).await.unwrap();
        assert_eq!(result["theme"], "dark");
    }

    #[tokio::test]
    async fn comment_tools_without_credentials_are_unauthenticated() {
        let state = state();
        let err = dispatch("get_comments", &json!({"fileKey": "abc"}), &state).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn post_comment_requires_message() {
        let state = state();
        let err = dispatch("post_comment", &json!({}), &state).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn send_notification_publishes_to_sink() {
        let state = state();
        let mut rx = state.log_sink.subscribe();
        let result = dispatch("send_notification", &json!({"title": "Hi", "body": "there"}), &state).await.unwrap();
        assert_eq!(result["delivered"], true);
        let record = rx.try_recv().unwrap();
        assert_eq!(record.source, "notification");
    }

    #[test]
    fn local_command_set_contains_expected_commands() {
        assert!(is_local_command("get_active_channels"));
        assert!(is_local_command("connection_diagnostics"));
        assert!(is_local_command("send_notification"));
        assert!(!is_local_command("get_document_info"));
    }
}
