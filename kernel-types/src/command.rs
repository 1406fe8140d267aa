//! Command (§3, §4.F/I) — the discriminated union that is the only way
//! to mutate kernel state, plus its result and bus-event counterparts.

use crate::error::KernelError;
use crate::id::{ProcessId, TaskId};
use crate::message::{MessageKind, MessageLogEntry, RouteTarget};
use crate::process::AgentType;
use crate::task::ReviewType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Where a command originated. Carried through for tracing and for
/// handlers (like `PostMessage`) whose behavior depends on the caller.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    /// Arrived through the MCP tool surface.
    McpTool,
    /// Submitted by kernel-internal logic (nudger, enforcer).
    Internal,
    /// Submitted by the supervisor's process event loop.
    Callback,
    /// Submitted on behalf of a human operator.
    User,
}

/// Relative scheduling priority. The processor is strict FIFO regardless
/// of this field; it exists for middleware/log annotation only, per
/// spec.md's command shape (no priority-queue reordering is specified).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background housekeeping.
    Low,
    /// Ordinary traffic.
    #[default]
    Normal,
    /// Turn-completion callbacks and enforcement reminders.
    High,
}

/// Distributed-trace context threaded through the processor's tracing
/// middleware. Optional: absent on commands constructed outside a traced
/// call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    /// Trace identifier, generated if the caller didn't supply one.
    pub trace_id: String,
    /// Parent span identifier, if this command was caused by another.
    pub parent_span_id: Option<String>,
}

/// The approximately twenty handler kinds from §4.I, grouped as the spec
/// groups them: process lifecycle, messaging, task assignment, worker
/// callbacks, and one internal callback.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum CommandKind {
    // -- process lifecycle --
    /// Allocate (or use a supplied) process ID, spawn, register.
    SpawnProcess {
        /// Caller-supplied ID, or `None` to auto-generate one.
        process_id: Option<ProcessId>,
        /// Specialization; empty string maps to `Generic`.
        agent_type: AgentType,
        /// Opaque workflow configuration blob passed to the spawner.
        workflow_config: Option<Value>,
    },
    /// Remove from the registry, mark repository status retired.
    RetireProcess {
        /// Target process.
        process_id: ProcessId,
        /// Free-text reason, logged and surfaced in status.
        reason: Option<String>,
    },
    /// Retire then spawn, preserving role and optional continuation.
    ReplaceProcess {
        /// Target process.
        process_id: ProcessId,
        /// Free-text reason.
        reason: Option<String>,
    },
    /// Forcible or cooperative termination; clears task, drains queue.
    StopProcess {
        /// Target process.
        process_id: ProcessId,
        /// Free-text reason.
        reason: Option<String>,
    },

    // -- messaging --
    /// Queue-or-deliver rule keyed on process status.
    SendToProcess {
        /// Target worker.
        worker_id: ProcessId,
        /// Message body.
        message: String,
    },
    /// Send to every active worker except the listed exclusions.
    Broadcast {
        /// Message body.
        message: String,
        /// Worker IDs to skip.
        exclude: Vec<ProcessId>,
    },
    /// Atomically move a process's queued items to the deliverer.
    DeliverProcessQueued {
        /// Target process.
        process_id: ProcessId,
    },
    /// Append a routed message to the log (`to` ∈ {ALL, COORDINATOR, id}).
    PostMessage {
        /// Caller-identified sender (the MCP adapter resolves this from
        /// the originating process's session, not a JSON argument).
        from: ProcessId,
        /// Raw `to` field, parsed by the handler.
        to: RouteTarget,
        /// Message body.
        content: String,
        /// Kind tag for nudger grouping / UI rendering.
        message_kind: MessageKind,
    },

    // -- task assignment --
    /// Create a task assignment for an implementer.
    AssignTask {
        /// Implementer process.
        worker_id: ProcessId,
        /// Task identifier.
        task_id: TaskId,
        /// Optional free-text summary.
        summary: Option<String>,
    },
    /// Assign a reviewer to an existing task.
    AssignReview {
        /// Reviewer process.
        reviewer_id: ProcessId,
        /// Task identifier.
        task_id: TaskId,
        /// Implementer process, must differ from `reviewer_id`.
        implementer_id: ProcessId,
        /// Optional free-text summary.
        summary: Option<String>,
        /// Review depth.
        review_type: ReviewType,
    },
    /// Implementer resumes with the reviewer's feedback.
    AssignReviewFeedback {
        /// Implementer process.
        implementer_id: ProcessId,
        /// Task identifier.
        task_id: TaskId,
        /// Feedback body.
        feedback: String,
    },
    /// Reviewer approves the implementer's commit.
    ApproveCommit {
        /// Implementer process.
        implementer_id: ProcessId,
        /// Task identifier.
        task_id: TaskId,
        /// Optional commit message to surface downstream.
        commit_message: Option<String>,
    },
    /// Mark a task completed; syncs to the external issue executor.
    MarkTaskComplete {
        /// Task identifier.
        task_id: TaskId,
    },
    /// Mark a task failed; syncs to the external issue executor.
    MarkTaskFailed {
        /// Task identifier.
        task_id: TaskId,
        /// Required failure reason.
        reason: String,
    },

    // -- worker callbacks --
    /// Worker signals its turn's implementation is done.
    ReportComplete {
        /// Reporting process (caller-identified, not a payload field).
        process_id: ProcessId,
        /// Optional free-text summary.
        summary: Option<String>,
    },
    /// Reviewer emits a verdict; must be `APPROVED` or `DENIED`.
    ReportVerdict {
        /// Reporting process (caller-identified).
        process_id: ProcessId,
        /// Verdict literal.
        verdict: String,
        /// Optional reviewer comments.
        comments: Option<String>,
    },
    /// Update a process's workflow phase tag.
    TransitionPhase {
        /// Target process.
        process_id: ProcessId,
        /// New phase tag.
        phase: String,
    },
    /// Coordinator signals the whole workflow is done.
    SignalWorkflowComplete {
        /// One of `success`, `partial`, `aborted`.
        status: String,
        /// Required non-empty summary.
        summary: String,
        /// Optional epic identifier.
        epic_id: Option<String>,
        /// Optional count of tasks closed.
        tasks_closed: Option<u64>,
    },
    /// Human-attention request.
    NotifyUser {
        /// Reporting process (caller-identified).
        process_id: ProcessId,
        /// Message to surface to the human operator.
        message: String,
    },

    // -- internal callback --
    /// Submitted by the supervisor's event loop when a turn ends.
    ProcessTurnComplete {
        /// Target process.
        process_id: ProcessId,
        /// Whether the turn ended successfully.
        succeeded: bool,
        /// Classified failure reason, if `succeeded` is false.
        error_reason: Option<String>,
    },
}

impl CommandKind {
    /// Stable kind name, used in logs, dedup hashing, and the "unknown
    /// command" error message.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SpawnProcess { .. } => "spawn_process",
            Self::RetireProcess { .. } => "retire_process",
            Self::ReplaceProcess { .. } => "replace_process",
            Self::StopProcess { .. } => "stop_process",
            Self::SendToProcess { .. } => "send_to_process",
            Self::Broadcast { .. } => "broadcast",
            Self::DeliverProcessQueued { .. } => "deliver_process_queued",
            Self::PostMessage { .. } => "post_message",
            Self::AssignTask { .. } => "assign_task",
            Self::AssignReview { .. } => "assign_review",
            Self::AssignReviewFeedback { .. } => "assign_review_feedback",
            Self::ApproveCommit { .. } => "approve_commit",
            Self::MarkTaskComplete { .. } => "mark_task_complete",
            Self::MarkTaskFailed { .. } => "mark_task_failed",
            Self::ReportComplete { .. } => "report_complete",
            Self::ReportVerdict { .. } => "report_verdict",
            Self::TransitionPhase { .. } => "transition_phase",
            Self::SignalWorkflowComplete { .. } => "signal_workflow_complete",
            Self::NotifyUser { .. } => "notify_user",
            Self::ProcessTurnComplete { .. } => "process_turn_complete",
        }
    }

    /// Validate the kind-specific payload, returning a `KernelError` on bad
    /// input. Never panics. Mirrors the edge-case policies in §4.I.
    pub fn validate(&self) -> Result<(), KernelError> {
        match self {
            Self::SpawnProcess { .. } => Ok(()),
            Self::AssignReview {
                reviewer_id,
                implementer_id,
                ..
            } => {
                if reviewer_id == implementer_id {
                    return Err(KernelError::Validation(format!(
                        "reviewer {reviewer_id} cannot equal implementer"
                    )));
                }
                Ok(())
            }
            Self::ReportVerdict { verdict, .. } => {
                if verdict != "APPROVED" && verdict != "DENIED" {
                    return Err(KernelError::Validation(format!(
                        "verdict must be APPROVED or DENIED, got {verdict}"
                    )));
                }
                Ok(())
            }
            Self::SignalWorkflowComplete { status, summary, .. } => {
                if !matches!(status.as_str(), "success" | "partial" | "aborted") {
                    return Err(KernelError::Validation(format!(
                        "status must be success, partial, or aborted, got {status}"
                    )));
                }
                if summary.trim().is_empty() {
                    return Err(KernelError::Validation("summary must be non-empty".to_string()));
                }
                Ok(())
            }
            Self::MarkTaskFailed { reason, .. } => {
                if reason.trim().is_empty() {
                    return Err(KernelError::Validation("reason must be non-empty".to_string()));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// An envelope wrapping a [`CommandKind`] with the identity/provenance
/// fields every command carries (§3: UUID, created-at, source, priority,
/// optional trace context).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Unique command identifier.
    pub id: Uuid,
    /// When the envelope was constructed.
    pub created_at: DateTime<Utc>,
    /// Where it originated.
    pub source: CommandSource,
    /// Scheduling priority (annotation only; FIFO is unaffected).
    pub priority: Priority,
    /// Optional distributed-trace context.
    pub trace: Option<TraceContext>,
    /// The kind-specific payload.
    pub kind: CommandKind,
}

impl CommandEnvelope {
    /// Wrap a kind with freshly generated identity fields.
    pub fn new(kind: CommandKind, source: CommandSource, id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            source,
            priority: Priority::default(),
            trace: None,
            kind,
        }
    }

    /// Builder-style priority override.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder-style trace context attach.
    pub fn with_trace(mut self, trace: TraceContext) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Delegate validation to the wrapped kind.
    pub fn validate(&self) -> Result<(), KernelError> {
        self.kind.validate()
    }
}

/// A payload published on the Event Bus (§4.A) as a side effect of
/// command execution. The processor's pipeline publishes these
/// non-blockingly after a handler returns.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum KernelEvent {
    /// A new entry was appended to the message log.
    EntryPosted(MessageLogEntry),
    /// One log line's worth of structured command telemetry, for the UI.
    CommandLog {
        /// The command's stable kind name.
        command_kind: String,
        /// Whether the handler reported success.
        success: bool,
        /// Wall-clock duration of the handler invocation, in microseconds.
        duration_us: u64,
    },
    /// A command failed validation or handler execution.
    CommandError {
        /// The command's stable kind name.
        command_kind: String,
        /// Machine-stable error discriminant, see `KernelError::kind`.
        error_kind: String,
        /// Human-readable message.
        message: String,
    },
    /// A process's lifecycle status changed.
    ProcessStatusChanged {
        /// The process.
        process_id: ProcessId,
        /// New status name.
        status: String,
    },
}

/// Outcome of a handler invocation (§3 CommandResult). `events` are
/// published on the bus; `follow_up` is enqueued back onto the
/// processor's own queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the handler succeeded.
    pub success: bool,
    /// Populated when `success` is false.
    pub error: Option<KernelError>,
    /// Events to publish on the bus.
    pub events: Vec<KernelEvent>,
    /// Follow-up commands to enqueue.
    pub follow_up: Vec<CommandEnvelope>,
    /// Opaque handler-specific payload (e.g. an auto-generated process ID).
    pub data: Option<Value>,
}

impl CommandResult {
    /// A bare success result with no events, follow-ups, or data.
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// A success result carrying an opaque data payload.
    pub fn ok_with_data(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    /// A failure result wrapping `err`.
    pub fn err(err: KernelError) -> Self {
        Self {
            success: false,
            error: Some(err),
            ..Default::default()
        }
    }

    /// Attach events to publish alongside this result.
    pub fn with_events(mut self, events: Vec<KernelEvent>) -> Self {
        self.events = events;
        self
    }

    /// Attach follow-up commands to enqueue alongside this result.
    pub fn with_follow_up(mut self, follow_up: Vec<CommandEnvelope>) -> Self {
        self.follow_up = follow_up;
        self
    }
}

/// Anything that accepts fire-and-forget command submissions. Lets
/// satellite components (the nudger, the supervisor's turn-complete
/// callback) enqueue onto the Command Processor without depending on its
/// crate directly.
pub trait CommandSubmitter: Send + Sync {
    /// Fire-and-forget enqueue. See `CommandProcessor::submit`.
    fn submit(&self, envelope: CommandEnvelope) -> Result<(), KernelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_review_rejects_self_review() {
        let kind = CommandKind::AssignReview {
            reviewer_id: ProcessId::from("worker-1"),
            task_id: TaskId::from("task-1"),
            implementer_id: ProcessId::from("worker-1"),
            summary: None,
            review_type: ReviewType::Complex,
        };
        assert!(kind.validate().is_err());
    }

    #[test]
    fn report_verdict_requires_exact_literal() {
        let kind = CommandKind::ReportVerdict {
            process_id: ProcessId::from("worker-1"),
            verdict: "approved".to_string(),
            comments: None,
        };
        assert!(kind.validate().is_err());

        let kind = CommandKind::ReportVerdict {
            process_id: ProcessId::from("worker-1"),
            verdict: "APPROVED".to_string(),
            comments: None,
        };
        assert!(kind.validate().is_ok());
    }

    #[test]
    fn signal_workflow_complete_requires_known_status_and_summary() {
        let bad_status = CommandKind::SignalWorkflowComplete {
            status: "done".to_string(),
            summary: "all good".to_string(),
            epic_id: None,
            tasks_closed: None,
        };
        assert!(bad_status.validate().is_err());

        let empty_summary = CommandKind::SignalWorkflowComplete {
            status: "success".to_string(),
            summary: "   ".to_string(),
            epic_id: None,
            tasks_closed: None,
        };
        assert!(empty_summary.validate().is_err());

        let ok = CommandKind::SignalWorkflowComplete {
            status: "partial".to_string(),
            summary: "shipped half of it".to_string(),
            epic_id: None,
            tasks_closed: None,
        };
        assert!(ok.validate().is_ok());
    }
}
