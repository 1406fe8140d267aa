//! Queue Repository (§4.E) — per-process bounded FIFO of pending envelopes.

use std::collections::HashMap;

use kernel_types::{MessageQueue, ProcessId, QueueFullError, QueuedEnvelope, DEFAULT_QUEUE_DEPTH};
use tokio::sync::RwLock;

/// Bounded in-memory map from process ID to that process's
/// [`MessageQueue`]. `enqueue` fails with [`QueueFullError`] above the
/// configured cap; `dequeue` returns `None` rather than blocking; `drain`
/// removes every pending entry at once.
pub struct QueueRepository {
    queues: RwLock<HashMap<ProcessId, MessageQueue>>,
    cap: usize,
}

impl Default for QueueRepository {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}

impl QueueRepository {
    /// Create an empty repository with the given per-process cap.
    pub fn new(cap: usize) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            cap,
        }
    }

    /// Push an envelope onto `process_id`'s queue, creating it on first
    /// use.
    pub async fn enqueue(&self, process_id: &ProcessId, envelope: QueuedEnvelope) -> Result<(), QueueFullError> {
        let mut queues = self.queues.write().await;
        let queue = queues
            .entry(process_id.clone())
            .or_insert_with(|| MessageQueue::new(self.cap));
        queue.enqueue(envelope)
    }

    /// Pop the oldest envelope for `process_id`, if any.
    pub async fn dequeue(&self, process_id: &ProcessId) -> Option<QueuedEnvelope> {
        let mut queues = self.queues.write().await;
        queues.get_mut(process_id)?.dequeue()
    }

    /// Remove and return every pending envelope for `process_id`, oldest
    /// first.
    pub async fn drain(&self, process_id: &ProcessId) -> Vec<QueuedEnvelope> {
        let mut queues = self.queues.write().await;
        match queues.get_mut(process_id) {
            Some(queue) => queue.drain(),
            None => Vec::new(),
        }
    }

    /// Number of pending envelopes for `process_id`.
    pub async fn len(&self, process_id: &ProcessId) -> usize {
        self.queues.read().await.get(process_id).map(MessageQueue::len).unwrap_or(0)
    }

    /// Drop the queue entirely (used when a process retires).
    pub async fn remove(&self, process_id: &ProcessId) {
        self.queues.write().await.remove(process_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kernel_types::SenderKind;

    fn env(s: &str) -> QueuedEnvelope {
        QueuedEnvelope {
            content: s.to_string(),
            sender_kind: SenderKind::Worker,
            enqueued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn enqueue_creates_queue_lazily_and_respects_cap() {
        let repo = QueueRepository::new(1);
        let id = ProcessId::from("worker-1");
        repo.enqueue(&id, env("a")).await.unwrap();
        assert!(repo.enqueue(&id, env("b")).await.is_err());
        assert_eq!(repo.len(&id).await, 1);
    }

    #[tokio::test]
    async fn drain_on_unknown_process_returns_empty() {
        let repo = QueueRepository::new(10);
        let id = ProcessId::from("ghost");
        assert!(repo.drain(&id).await.is_empty());
    }
}
