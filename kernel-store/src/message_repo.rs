//! Message Repository (§4.B) — append-only log with per-agent read cursors.

use std::collections::HashMap;

use chrono::Utc;
use kernel_bus::Bus;
use kernel_types::{KernelEvent, MessageKind, MessageLogEntry, RouteTarget};
use tokio::sync::RwLock;
use uuid::Uuid;

struct Inner {
    entries: Vec<MessageLogEntry>,
    cursors: HashMap<String, usize>,
}

/// Append-only log of inter-agent messages with a per-agent "high-water
/// mark" read cursor, publishing an entry-posted event on its embedded
/// bus after every append.
///
/// Semantics: a "broadcast log" — every agent sees every entry regardless
/// of `to`; `to` is advisory routing for the recipient's own filter
/// logic. `append` and `read_and_mark` are serialized by the same lock so
/// the atomicity contract holds: no entry appended between a reader's
/// snapshot and its cursor advance can be silently marked read without
/// being returned to that reader.
pub struct MessageRepository {
    inner: RwLock<Inner>,
    bus: Bus<KernelEvent>,
}

impl Default for MessageRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRepository {
    /// Create an empty repository with its own event bus.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: Vec::new(),
                cursors: HashMap::new(),
            }),
            bus: Bus::default(),
        }
    }

    /// Append a new entry, mark the sender as an implicit reader, and
    /// publish an entry-posted event.
    pub async fn append(
        &self,
        from: impl Into<String>,
        to: RouteTarget,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> MessageLogEntry {
        let entry = MessageLogEntry::new(from, to, content, kind, Utc::now(), Uuid::new_v4());
        let mut inner = self.inner.write().await;
        inner.entries.push(entry.clone());
        drop(inner);
        self.bus.publish(KernelEvent::EntryPosted(entry.clone()));
        entry
    }

    /// Append a previously persisted entry during restore. Does not
    /// publish.
    pub async fn append_restored(&self, entry: MessageLogEntry) {
        let mut inner = self.inner.write().await;
        inner.entries.push(entry);
    }

    /// Snapshot copy of every entry, oldest first.
    pub async fn entries(&self) -> Vec<MessageLogEntry> {
        self.inner.read().await.entries.clone()
    }

    /// Atomically return every entry appended since `agent_id`'s last
    /// read and advance its cursor to the current length.
    pub async fn read_and_mark(&self, agent_id: &str) -> Vec<MessageLogEntry> {
        let mut inner = self.inner.write().await;
        let start = *inner.cursors.get(agent_id).unwrap_or(&0);
        let unread = inner.entries[start.min(inner.entries.len())..].to_vec();
        let new_cursor = inner.entries.len();
        inner.cursors.insert(agent_id.to_string(), new_cursor);
        unread
    }

    /// Peek at unread entries without advancing the cursor.
    pub async fn unread_for(&self, agent_id: &str) -> Vec<MessageLogEntry> {
        let inner = self.inner.read().await;
        let start = *inner.cursors.get(agent_id).unwrap_or(&0);
        inner.entries[start.min(inner.entries.len())..].to_vec()
    }

    /// Total number of entries ever appended.
    pub async fn count(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// The embedded bus, for direct subscription (used by the nudger).
    pub fn broker(&self) -> &Bus<KernelEvent> {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_and_mark_is_atomic_and_advances_cursor() {
        let repo = MessageRepository::new();
        repo.append("worker-1", RouteTarget::Coordinator, "hi", MessageKind::Info)
            .await;

        let first = repo.read_and_mark("coordinator").await;
        assert_eq!(first.len(), 1);

        let second = repo.read_and_mark("coordinator").await;
        assert!(second.is_empty());

        repo.append("worker-1", RouteTarget::Coordinator, "again", MessageKind::Info)
            .await;
        let third = repo.read_and_mark("coordinator").await;
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].content, "again");
    }

    #[tokio::test]
    async fn unread_for_does_not_advance_cursor() {
        let repo = MessageRepository::new();
        repo.append("worker-1", RouteTarget::All, "hi", MessageKind::Info).await;

        let peeked = repo.unread_for("coordinator").await;
        assert_eq!(peeked.len(), 1);
        let peeked_again = repo.unread_for("coordinator").await;
        assert_eq!(peeked_again.len(), 1);
    }

    #[tokio::test]
    async fn broadcast_log_is_visible_regardless_of_to_field() {
        let repo = MessageRepository::new();
        repo.append("worker-1", RouteTarget::Process("worker-2".to_string()), "hi", MessageKind::Info)
            .await;

        let all = repo.entries().await;
        assert_eq!(all.len(), 1);
        let unread = repo.unread_for("worker-3").await;
        assert_eq!(unread.len(), 1);
    }
}
