//! MessageQueue (§3) — per-process bounded ordered envelope queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default maximum depth of a per-process message queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 1000;

/// Who originated a queued envelope.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    /// The coordinator.
    Coordinator,
    /// Another worker process.
    Worker,
    /// The kernel itself (enforcement reminders, system notices).
    System,
}

/// One pending envelope in a process's message queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEnvelope {
    /// Message body to deliver as the resumed turn's prompt.
    pub content: String,
    /// Who originated it.
    pub sender_kind: SenderKind,
    /// When it was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

/// Queue-full error raised when `enqueue` exceeds the configured cap.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("queue full (cap {cap})")]
pub struct QueueFullError {
    /// The configured cap that was hit.
    pub cap: usize,
}

/// A bounded FIFO of envelopes for one process. `enqueue` fails with
/// [`QueueFullError`] above the configured cap; `dequeue` returns `None`
/// rather than blocking; `drain` removes everything at once.
#[derive(Debug, Clone)]
pub struct MessageQueue {
    cap: usize,
    items: VecDeque<QueuedEnvelope>,
}

impl MessageQueue {
    /// Create an empty queue with the given cap.
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            items: VecDeque::new(),
        }
    }

    /// Push an envelope onto the back of the queue.
    pub fn enqueue(&mut self, envelope: QueuedEnvelope) -> Result<(), QueueFullError> {
        if self.items.len() >= self.cap {
            return Err(QueueFullError { cap: self.cap });
        }
        self.items.push_back(envelope);
        Ok(())
    }

    /// Pop the oldest envelope, if any.
    pub fn dequeue(&mut self) -> Option<QueuedEnvelope> {
        self.items.pop_front()
    }

    /// Remove and return every pending envelope, oldest first.
    pub fn drain(&mut self) -> Vec<QueuedEnvelope> {
        self.items.drain(..).collect()
    }

    /// Number of pending envelopes.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue currently holds nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(s: &str) -> QueuedEnvelope {
        QueuedEnvelope {
            content: s.to_string(),
            sender_kind: SenderKind::Worker,
            enqueued_at: Utc::now(),
        }
    }

    #[test]
    fn enqueue_respects_cap() {
        let mut q = MessageQueue::new(2);
        q.enqueue(env("a")).unwrap();
        q.enqueue(env("b")).unwrap();
        assert!(q.enqueue(env("c")).is_err());
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn fifo_order_preserved() {
        let mut q = MessageQueue::new(10);
        q.enqueue(env("a")).unwrap();
        q.enqueue(env("b")).unwrap();
        assert_eq!(q.dequeue().unwrap().content, "a");
        assert_eq!(q.dequeue().unwrap().content, "b");
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn drain_empties_and_preserves_order() {
        let mut q = MessageQueue::new(10);
        q.enqueue(env("a")).unwrap();
        q.enqueue(env("b")).unwrap();
        let drained = q.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].content, "a");
        assert!(q.is_empty());
    }
}
