//! MessageLogEntry (§3) — the append-only unit stored by the Message
//! Repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Kind of a logged message. Informs nudger grouping and UI rendering.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Informational notice, no specific follow-up expected.
    Info,
    /// A worker announcing it has finished starting up.
    WorkerReady,
    /// A worker reporting task completion.
    Completion,
    /// A reply to a prior message.
    Response,
    /// A reviewer's verdict.
    Verdict,
    /// A human-attention request.
    NotifyUser,
}

/// Routing target of a message. `Process` carries a literal process ID;
/// `All` and `Coordinator` are the two reserved values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    /// Every active worker.
    All,
    /// The coordinator's message log.
    Coordinator,
    /// A literal process ID.
    Process(String),
}

impl RouteTarget {
    /// Parse the `to` field of `post_message`/`send_to_worker`, mapping the
    /// two reserved literals and treating everything else as a process ID.
    pub fn parse(raw: &str) -> Self {
        match raw {
            crate::id::ROUTE_ALL => Self::All,
            crate::id::ROUTE_COORDINATOR => Self::Coordinator,
            other => Self::Process(other.to_string()),
        }
    }

    /// Render back to the wire string form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => crate::id::ROUTE_ALL,
            Self::Coordinator => crate::id::ROUTE_COORDINATOR,
            Self::Process(id) => id,
        }
    }
}

/// An entry in the broadcast message log. Append-only; `read_by` is the
/// only mutable field and is updated atomically with the reader's cursor
/// by the owning repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLogEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Originating process ID.
    pub from: String,
    /// Advisory routing target; every agent still sees every entry.
    pub to: RouteTarget,
    /// Message body.
    pub content: String,
    /// Message kind.
    pub kind: MessageKind,
    /// Process IDs that have read this entry, including the implicit
    /// sender read recorded at append time.
    pub read_by: BTreeSet<String>,
}

impl MessageLogEntry {
    /// Construct a new entry, marking the sender as an implicit reader.
    pub fn new(from: impl Into<String>, to: RouteTarget, content: impl Into<String>, kind: MessageKind, now: DateTime<Utc>, id: Uuid) -> Self {
        let from = from.into();
        let mut read_by = BTreeSet::new();
        read_by.insert(from.clone());
        Self {
            id,
            timestamp: now,
            from,
            to,
            content: content.into(),
            kind,
            read_by,
        }
    }

    /// Whether `agent_id` has already read this entry.
    pub fn is_read_by(&self, agent_id: &str) -> bool {
        self.read_by.contains(agent_id)
    }
}
