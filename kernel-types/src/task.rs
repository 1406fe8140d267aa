//! TaskAssignment record (§3).

use crate::id::{ProcessId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a task assignment.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created by `AssignTask`, no reviewer yet.
    Assigned,
    /// Implementer is actively working it.
    InImplementation,
    /// A reviewer has been assigned and is reviewing.
    InReview,
    /// Terminated successfully.
    Completed,
    /// Terminated unsuccessfully.
    Failed,
}

/// A task assignment. Created by `AssignTask`; reviewer set by
/// `AssignReview`; terminated by `MarkTaskComplete`/`MarkTaskFailed`.
///
/// Invariant: `reviewer != implementer` whenever both are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignment {
    /// Task identifier.
    pub id: TaskId,
    /// Process assigned to implement it.
    pub implementer: ProcessId,
    /// Process assigned to review it, if any.
    pub reviewer: Option<ProcessId>,
    /// Current status.
    pub status: TaskStatus,
    /// When implementation started.
    pub started_at: DateTime<Utc>,
    /// When review started, if it has.
    pub review_started_at: Option<DateTime<Utc>>,
    /// Free-text summary supplied at assignment time.
    pub summary: Option<String>,
}

impl TaskAssignment {
    /// Create a freshly assigned task with no reviewer.
    pub fn new(id: TaskId, implementer: ProcessId, summary: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            implementer,
            reviewer: None,
            status: TaskStatus::Assigned,
            started_at: now,
            review_started_at: None,
            summary,
        }
    }

    /// Assign a reviewer, enforcing `reviewer != implementer`.
    pub fn assign_reviewer(&mut self, reviewer: ProcessId, now: DateTime<Utc>) -> Result<(), String> {
        if reviewer == self.implementer {
            return Err(format!(
                "reviewer {reviewer} cannot equal implementer for task {}",
                self.id
            ));
        }
        self.reviewer = Some(reviewer);
        self.status = TaskStatus::InReview;
        self.review_started_at = Some(now);
        Ok(())
    }

    /// Whether the task has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Review depth requested on `AssignReview`. Unknown or missing values
/// default to `Complex` per the handler's edge-case policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    /// Lightweight review.
    Simple,
    /// Full review.
    #[default]
    Complex,
}

impl ReviewType {
    /// Parse from the MCP tool surface's `review_type` string, defaulting
    /// unknown or missing values to `Complex`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("simple") => Self::Simple,
            Some("complex") => Self::Complex,
            _ => Self::Complex,
        }
    }
}
