//! A generic id-keyed table of in-flight requests, each resolved exactly
//! once by a matching response or by timeout. Used by the broker (waiting
//! on executor replies) and by the MCP adapter (waiting on broker replies).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{ErrorKind, ErrorShape};

/// How long a progress update extends a pending request's deadline.
pub const PROGRESS_EXTENSION: Duration = Duration::from_secs(60);

/// Requests still pending after this long are considered stuck and are
/// logged by the liveness sweep, though they are not rejected solely for
/// exceeding it — only their own deadline rejects them.
pub const STUCK_AFTER: Duration = Duration::from_secs(300);

struct Entry<T> {
    sender: oneshot::Sender<Result<T, ErrorShape>>,
    command: String,
    created_at: Instant,
    deadline: Instant,
}

/// A table of outstanding requests keyed by id, each paired with a
/// [`oneshot`] resolver. Safe to share behind an `Arc`.
pub struct PendingRequestTable<T> {
    entries: Mutex<HashMap<String, Entry<T>>>,
}

impl<T> Default for PendingRequestTable<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> PendingRequestTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending request, returning a receiver that resolves
    /// when [`Self::resolve`], [`Self::reject`], or [`Self::reject_all`] is
    /// called with a matching id, or is dropped on timeout sweep. Re-using
    /// an id still in flight rejects the earlier entry as superseded rather
    /// than dropping its waiter silently.
    pub fn register(
        &self,
        id: impl Into<String>,
        command: impl Into<String>,
        timeout: Duration,
    ) -> oneshot::Receiver<Result<T, ErrorShape>> {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        let entry = Entry {
            sender: tx,
            command: command.into(),
            created_at: now,
            deadline: now + timeout,
        };
        let id = id.into();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(superseded) = entries.insert(id, entry) {
            let _ = superseded.sender.send(Err(ErrorShape::new(ErrorKind::Internal, "request id reused before the original was resolved")));
        }
        drop(entries);
        rx
    }

    /// Resolve a pending request with a success value. No-op if the id is
    /// unknown (already timed out, already resolved, or never registered).
    pub fn resolve(&self, id: &str, value: T) {
        if let Some(entry) = self.entries.lock().unwrap_or_else(|e| e.into_inner()).remove(id) {
            let _ = entry.sender.send(Ok(value));
        }
    }

    /// Resolve a pending request with an error.
    pub fn reject(&self, id: &str, error: ErrorShape) {
        if let Some(entry) = self.entries.lock().unwrap_or_else(|e| e.into_inner()).remove(id) {
            let _ = entry.sender.send(Err(error));
        }
    }

    /// Extend a pending request's deadline, e.g. on receipt of a
    /// `progress_update`. The deadline only ever moves forward.
    pub fn extend_deadline(&self, id: &str, by: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(id) {
            let candidate = Instant::now() + by;
            if candidate > entry.deadline {
                entry.deadline = candidate;
            }
        }
    }

    /// Reject every pending request with the same error, e.g. on connection
    /// loss or shutdown.
    pub fn reject_all(&self, error: ErrorShape) {
        let drained: Vec<_> = self.entries.lock().unwrap_or_else(|e| e.into_inner()).drain().collect();
        for (_, entry) in drained {
            let _ = entry.sender.send(Err(error.clone()));
        }
    }

    /// Remove and reject every entry whose deadline has passed. Returns the
    /// ids rejected, for logging.
    pub fn sweep_expired(&self) -> Vec<String> {
        let now = Instant::now();
        let mut expired = Vec::new();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired_ids: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired_ids {
            if let Some(entry) = entries.remove(&id) {
                let _ = entry.sender.send(Err(ErrorShape::new(
                    ErrorKind::Timeout,
                    format!("command '{}' timed out", entry.command),
                )));
                expired.push(id);
            }
        }
        expired
    }

    /// Ids whose age exceeds [`STUCK_AFTER`] but have not yet expired —
    /// surfaced by the liveness sweep as a warning signal, not rejected.
    pub fn stuck_ids(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .lock().unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, e)| now.duration_since(e.created_at) >= STUCK_AFTER)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_delivers_value() {
        let table: PendingRequestTable<u32> = PendingRequestTable::new();
        let rx = table.register("r1", "get_document_info", Duration::from_secs(5));
        table.resolve("r1", 42);
        assert_eq!(rx.await.unwrap().unwrap(), 42);
    }

    #[tokio::test]
    async fn reject_delivers_error() {
        let table: PendingRequestTable<u32> = PendingRequestTable::new();
        let rx = table.register("r1", "get_document_info", Duration::from_secs(5));
        table.reject("r1", ErrorShape::new(ErrorKind::Upstream, "boom"));
        assert_eq!(rx.await.unwrap().unwrap_err().kind, ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn reregistering_an_in_flight_id_rejects_the_superseded_waiter() {
        let table: PendingRequestTable<u32> = PendingRequestTable::new();
        let first = table.register("r1", "get_document_info", Duration::from_secs(5));
        let second = table.register("r1", "get_document_info", Duration::from_secs(5));
        assert_eq!(first.await.unwrap().unwrap_err().kind, ErrorKind::Internal);
        table.resolve("r1", 42);
        assert_eq!(second.await.unwrap().unwrap(), 42);
    }

    #[tokio::test]
    async fn unknown_id_is_noop() {
        let table: PendingRequestTable<u32> = PendingRequestTable::new();
        table.resolve("nope", 1);
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn sweep_expired_rejects_with_timeout() {
        let table: PendingRequestTable<u32> = PendingRequestTable::new();
        let rx = table.register("r1", "get_document_info", Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let expired = table.sweep_expired();
        assert_eq!(expired, vec!["r1".to_string()]);
        assert_eq!(rx.await.unwrap().unwrap_err().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn extend_deadline_survives_a_sweep_that_would_otherwise_expire_it() {
        let table: PendingRequestTable<u32> = PendingRequestTable::new();
        let rx = table.register("r1", "export_node", Duration::from_millis(5));
        table.extend_deadline("r1", Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let expired = table.sweep_expired();
        assert!(expired.is_empty());
        table.resolve("r1", 7);
        assert_eq!(rx.await.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn reject_all_drains_every_entry() {
        let table: PendingRequestTable<u32> = PendingRequestTable::new();
        let rx1 = table.register("r1", "a", Duration::from_secs(5));
        let rx2 = table.register("r2", "b", Duration::from_secs(5));
        table.reject_all(ErrorShape::new(ErrorKind::Shutdown, "bye"));
        assert_eq!(rx1.await.unwrap().unwrap_err().kind, ErrorKind::Shutdown);
        assert_eq!(rx2.await.unwrap().unwrap_err().kind, ErrorKind::Shutdown);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn stuck_ids_reports_old_unexpired_entries() {
        let table: PendingRequestTable<u32> = PendingRequestTable::new();
        let _rx = table.register("r1", "slow_tool", Duration::from_secs(600));
        assert!(table.stuck_ids().is_empty());
    }
}
