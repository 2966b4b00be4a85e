//! The wire envelope codec, error taxonomy, and pending-request bookkeeping
//! shared by the broker and the MCP adapter.

pub mod envelope;
pub mod error;
pub mod pending;

pub use envelope::{ClientType, CodecError, Envelope, MessageBody, WireEnvelope, MAX_FRAME_BYTES};
pub use error::{ErrorKind, ErrorShape};
pub use pending::{PendingRequestTable, PROGRESS_EXTENSION, STUCK_AFTER};

/// The default deadline for a request awaiting a reply, absent a
/// command-specific override.
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
