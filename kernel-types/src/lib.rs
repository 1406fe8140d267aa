//! Shared data model for the orchestration kernel.
//!
//! IDs, the command/result discriminated union, process and task
//! records, the message log and per-process queue, the vendor-event
//! boundary type, and the kernel-wide error taxonomy all live here so
//! every other `kernel-*` crate depends on one small, stable vocabulary
//! instead of on each other.

#![deny(missing_docs)]

pub mod command;
pub mod error;
pub mod event;
pub mod id;
pub mod message;
pub mod process;
pub mod queue;
pub mod task;

pub use command::{
    CommandEnvelope, CommandKind, CommandResult, CommandSource, CommandSubmitter, KernelEvent,
    Priority, TraceContext,
};
pub use error::KernelError;
pub use event::{
    AssistantMessage, ContentBlock, ErrorReason, EventError, EventType, OutputEvent, ToolResult,
    Usage,
};
pub use id::{ProcessId, SessionRef, TaskId, COORDINATOR_ID, ROUTE_ALL, ROUTE_COORDINATOR};
pub use message::{MessageKind, MessageLogEntry, RouteTarget};
pub use process::{AgentType, Process, ProcessMetrics, ProcessStatus, Role};
pub use queue::{MessageQueue, QueueFullError, QueuedEnvelope, SenderKind, DEFAULT_QUEUE_DEPTH};
pub use task::{ReviewType, TaskAssignment, TaskStatus};
