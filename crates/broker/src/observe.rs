//! The structured-log sink the rest of the broker publishes onto: structured
//! log records with fields `{level, source, message, optional fields}`. This
//! in-process `tracing_subscriber::Layer` turns events into [`LogRecord`]s on
//! a broadcast channel any collaborator can subscribe to, without on-disk
//! persistence.

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub level: String,
    pub source: String,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.fields.insert(field.name().to_string(), Value::String(rendered));
        }
    }
}

/// A `tracing_subscriber::Layer` that republishes every event as a
/// [`LogRecord`] on `sink`. Send failures (no subscribers) are ignored.
pub struct BroadcastLogLayer {
    sink: broadcast::Sender<LogRecord>,
}

impl BroadcastLogLayer {
    pub fn new(sink: broadcast::Sender<LogRecord>) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for BroadcastLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let level = match *event.metadata().level() {
            Level::ERROR => "error",
            Level::WARN => "warn",
            Level::INFO => "info",
            Level::DEBUG => "debug",
            Level::TRACE => "trace",
        };

        let record = LogRecord {
            level: level.to_string(),
            source: event.metadata().target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        };
        let _ = self.sink.send(record);
    }
}

/// Publish a `send_notification` payload onto the same sink: there is no
/// real desktop shell here, so the notification is observable the same way
/// any other structured log record is.
pub fn publish_notification(sink: &broadcast::Sender<LogRecord>, title: &str, body: &str) {
    let mut fields = Map::new();
    fields.insert("title".to_string(), Value::String(title.to_string()));
    fields.insert("body".to_string(), Value::String(body.to_string()));
    let _ = sink.send(LogRecord {
        level: "info".to_string(),
        source: "notification".to_string(),
        message: "send_notification".to_string(),
        fields,
    });
}
