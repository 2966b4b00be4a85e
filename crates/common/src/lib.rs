//! Shared error type and tracing setup used by the broker and MCP adapter.

pub mod error;
pub mod telemetry;

pub use error::{BridgeError, Error, FromMessage, Result};
