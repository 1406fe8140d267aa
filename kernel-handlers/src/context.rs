//! Shared collaborators every handler needs: the four repositories, the
//! supervisor's registry/spawner/deliverer, the turn enforcer, and the
//! opaque external issue-tracker interface.

use std::sync::Arc;

use async_trait::async_trait;
use kernel_enforcer::TurnEnforcer;
use kernel_store::{MessageRepository, ProcessRepository, QueueRepository, TaskRepository};
use kernel_supervisor::{MessageDeliverer, ProcessRegistry, ProcessSpawner};
use kernel_types::{TaskId, TaskStatus};

/// The core's only contract with the external issue tracker (§1, §4.I):
/// `MarkTaskComplete`/`MarkTaskFailed` call this after updating the Task
/// Repository. The core never talks to the tracker's database directly.
#[async_trait]
pub trait IssueExecutor: Send + Sync {
    /// Sync a task's terminal status to the external tracker.
    async fn sync_status(&self, task_id: &TaskId, status: TaskStatus, detail: Option<&str>);
}

/// An executor that does nothing, for deployments without a configured
/// tracker or for tests.
pub struct NoopIssueExecutor;

#[async_trait]
impl IssueExecutor for NoopIssueExecutor {
    async fn sync_status(&self, _task_id: &TaskId, _status: TaskStatus, _detail: Option<&str>) {}
}

/// Everything a handler needs, bundled so the factory (§4.M) can
/// construct every handler with one shared `Arc<HandlerContext>` rather
/// than threading a dozen constructor arguments through.
pub struct HandlerContext {
    /// Message Repository.
    pub messages: Arc<MessageRepository>,
    /// Process Repository.
    pub processes: Arc<ProcessRepository>,
    /// Task Repository.
    pub tasks: Arc<TaskRepository>,
    /// Queue Repository.
    pub queues: Arc<QueueRepository>,
    /// Process Supervisor's registry.
    pub registry: Arc<ProcessRegistry>,
    /// Process Supervisor's spawner.
    pub spawner: Arc<ProcessSpawner>,
    /// Process Supervisor's message deliverer.
    pub deliverer: Arc<MessageDeliverer>,
    /// Turn-Completion Enforcer.
    pub enforcer: Arc<TurnEnforcer>,
    /// External issue-tracker sync.
    pub issue_executor: Arc<dyn IssueExecutor>,
}
