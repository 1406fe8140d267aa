//! Collaborators the adapter needs beyond the command surface: read-only
//! repository access for `query_worker_state`/`read_message_log`, and the
//! turn-completion enforcer for required-tool bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use kernel_enforcer::TurnEnforcer;
use kernel_processor::CommandProcessor;
use kernel_store::{MessageRepository, ProcessRepository, TaskRepository};
use tokio_util::sync::CancellationToken;

/// Default ceiling on how long a tool call waits for its command to be
/// handled before the adapter reports a timeout to the caller.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state behind every tool exposed to one process's MCP session.
pub struct AdapterContext {
    /// The Command Processor, for `submit_and_wait`.
    pub processor: Arc<CommandProcessor>,
    /// Message Repository, read directly by `read_message_log`.
    pub messages: Arc<MessageRepository>,
    /// Process Repository, read directly by `query_worker_state`.
    pub processes: Arc<ProcessRepository>,
    /// Task Repository, read directly by `query_worker_state`.
    pub tasks: Arc<TaskRepository>,
    /// Turn-Completion Enforcer.
    pub enforcer: Arc<TurnEnforcer>,
    /// Cancelled when the kernel is shutting down; aborts any in-flight
    /// `submit_and_wait` call promptly instead of waiting out the timeout.
    pub scope: CancellationToken,
}
