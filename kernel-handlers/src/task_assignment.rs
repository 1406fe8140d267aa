//! Task-assignment handlers (§4.I): `AssignTask`, `AssignReview`,
//! `AssignReviewFeedback`, `ApproveCommit`, `MarkTaskComplete`,
//! `MarkTaskFailed`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kernel_processor::CommandHandler;
use kernel_types::{
    CommandEnvelope, CommandKind, CommandResult, CommandSource, KernelError, MessageKind,
    ProcessStatus, RouteTarget, TaskAssignment, TaskStatus,
};
use uuid::Uuid;

use crate::context::HandlerContext;

fn send_to(worker_id: kernel_types::ProcessId, message: String) -> CommandEnvelope {
    CommandEnvelope::new(
        CommandKind::SendToProcess { worker_id, message },
        CommandSource::Internal,
        Uuid::new_v4(),
        Utc::now(),
    )
}

/// `AssignTask`: creates the task record and notifies the implementer.
pub struct AssignTaskHandler {
    ctx: Arc<HandlerContext>,
}

impl AssignTaskHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for AssignTaskHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::AssignTask { worker_id, task_id, summary } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("assign_task handler received the wrong kind".into()));
        };

        if self.ctx.processes.get(worker_id).await.is_none() {
            return CommandResult::err(KernelError::Validation(format!("no such process: {worker_id}")));
        }

        let task = TaskAssignment::new(task_id.clone(), worker_id.clone(), summary.clone(), Utc::now());
        self.ctx.tasks.save(task).await;
        self.ctx
            .processes
            .update(worker_id, |p| {
                p.task_id = Some(task_id.clone());
                p.status = ProcessStatus::Working;
            })
            .await;

        let mut message = format!("You have been assigned task {task_id}.");
        if let Some(summary) = summary {
            message.push_str(&format!(" Summary: {summary}"));
        }
        CommandResult::ok().with_follow_up(vec![send_to(worker_id.clone(), message)])
    }
}

/// `AssignReview`: attaches a reviewer to an existing task and notifies
/// them (the `reviewer != implementer` check already ran in
/// `CommandKind::validate`).
pub struct AssignReviewHandler {
    ctx: Arc<HandlerContext>,
}

impl AssignReviewHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for AssignReviewHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::AssignReview {
            reviewer_id,
            task_id,
            implementer_id,
            summary,
            review_type,
        } = &envelope.kind
        else {
            return CommandResult::err(KernelError::Other("assign_review handler received the wrong kind".into()));
        };

        if self.ctx.processes.get(reviewer_id).await.is_none() {
            return CommandResult::err(KernelError::Validation(format!("no such process: {reviewer_id}")));
        }

        let updated = self
            .ctx
            .tasks
            .update(task_id, |t| {
                let _ = t.assign_reviewer(reviewer_id.clone(), Utc::now());
            })
            .await;
        if updated.is_none() {
            return CommandResult::err(KernelError::Validation(format!("no such task: {task_id}")));
        }
        if updated.as_ref().map(|t| &t.reviewer) != Some(&Some(reviewer_id.clone())) {
            return CommandResult::err(KernelError::Validation(format!(
                "reviewer {reviewer_id} cannot equal implementer for task {task_id}"
            )));
        }

        self.ctx
            .processes
            .update(reviewer_id, |p| {
                p.task_id = Some(task_id.clone());
                p.status = ProcessStatus::Working;
            })
            .await;

        let mut message = format!(
            "You have been assigned to review task {task_id} (implementer: {implementer_id}, depth: {review_type:?})."
        );
        if let Some(summary) = summary {
            message.push_str(&format!(" Summary: {summary}"));
        }
        CommandResult::ok().with_follow_up(vec![send_to(reviewer_id.clone(), message)])
    }
}

/// `AssignReviewFeedback`: hands the reviewer's comments back to the
/// implementer, returning the task to implementation.
pub struct AssignReviewFeedbackHandler {
    ctx: Arc<HandlerContext>,
}

impl AssignReviewFeedbackHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for AssignReviewFeedbackHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::AssignReviewFeedback { implementer_id, task_id, feedback } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("assign_review_feedback handler received the wrong kind".into()));
        };

        let updated = self
            .ctx
            .tasks
            .update(task_id, |t| t.status = TaskStatus::InImplementation)
            .await;
        if updated.is_none() {
            return CommandResult::err(KernelError::Validation(format!("no such task: {task_id}")));
        }

        self.ctx
            .processes
            .update(implementer_id, |p| p.status = ProcessStatus::Working)
            .await;

        let message = format!("Review feedback for task {task_id}: {feedback}");
        CommandResult::ok().with_follow_up(vec![send_to(implementer_id.clone(), message)])
    }
}

/// `ApproveCommit`: reviewer signs off; notifies the implementer. Does
/// not itself mark the task complete — the implementer still calls
/// `report_implementation_complete` or the coordinator calls
/// `mark_task_complete`.
pub struct ApproveCommitHandler {
    ctx: Arc<HandlerContext>,
}

impl ApproveCommitHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for ApproveCommitHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::ApproveCommit { implementer_id, task_id, commit_message } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("approve_commit handler received the wrong kind".into()));
        };

        if self.ctx.tasks.get(task_id).await.is_none() {
            return CommandResult::err(KernelError::Validation(format!("no such task: {task_id}")));
        }

        let mut message = format!("Your commit for task {task_id} was approved.");
        if let Some(commit_message) = commit_message {
            message.push_str(&format!(" ({commit_message})"));
        }
        CommandResult::ok().with_follow_up(vec![send_to(implementer_id.clone(), message)])
    }
}

/// `MarkTaskComplete`: terminal status, synced to the issue executor.
pub struct MarkTaskCompleteHandler {
    ctx: Arc<HandlerContext>,
}

impl MarkTaskCompleteHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for MarkTaskCompleteHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::MarkTaskComplete { task_id } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("mark_task_complete handler received the wrong kind".into()));
        };

        let updated = self.ctx.tasks.update(task_id, |t| t.status = TaskStatus::Completed).await;
        let Some(task) = updated else {
            return CommandResult::err(KernelError::Validation(format!("no such task: {task_id}")));
        };

        self.ctx
            .processes
            .update(&task.implementer, |p| p.task_id = None)
            .await;
        self.ctx.issue_executor.sync_status(task_id, TaskStatus::Completed, None).await;

        let entry = self
            .ctx
            .messages
            .append(
                "system",
                RouteTarget::Coordinator,
                format!("Task {task_id} completed."),
                MessageKind::Info,
            )
            .await;
        CommandResult::ok().with_events(vec![kernel_types::KernelEvent::EntryPosted(entry)])
    }
}

/// `MarkTaskFailed`: terminal status, required reason, synced to the
/// issue executor.
pub struct MarkTaskFailedHandler {
    ctx: Arc<HandlerContext>,
}

impl MarkTaskFailedHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for MarkTaskFailedHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::MarkTaskFailed { task_id, reason } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("mark_task_failed handler received the wrong kind".into()));
        };

        let updated = self.ctx.tasks.update(task_id, |t| t.status = TaskStatus::Failed).await;
        let Some(task) = updated else {
            return CommandResult::err(KernelError::Validation(format!("no such task: {task_id}")));
        };

        self.ctx
            .processes
            .update(&task.implementer, |p| p.task_id = None)
            .await;
        self.ctx
            .issue_executor
            .sync_status(task_id, TaskStatus::Failed, Some(reason))
            .await;

        let entry = self
            .ctx
            .messages
            .append(
                "system",
                RouteTarget::Coordinator,
                format!("Task {task_id} failed: {reason}"),
                MessageKind::Info,
            )
            .await;
        CommandResult::ok().with_events(vec![kernel_types::KernelEvent::EntryPosted(entry)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::test_context;
    use kernel_types::{AgentType, Process, ProcessId, Role, TaskId};

    async fn make_process(ctx: &HandlerContext, id: &str) {
        ctx.processes
            .save(Process::new(ProcessId::from(id), Role::Worker, AgentType::Implementer, Utc::now()))
            .await;
    }

    #[tokio::test]
    async fn assign_task_creates_record_and_notifies() {
        let ctx = test_context().await;
        make_process(&ctx, "worker-1").await;

        let handler = AssignTaskHandler::new(ctx.clone());
        let envelope = CommandEnvelope::new(
            CommandKind::AssignTask {
                worker_id: ProcessId::from("worker-1"),
                task_id: TaskId::from("task-1"),
                summary: Some("do the thing".to_string()),
            },
            CommandSource::Internal,
            Uuid::new_v4(),
            Utc::now(),
        );
        let result = handler.handle(&envelope).await;
        assert!(result.success);
        assert_eq!(result.follow_up.len(), 1);
        assert!(ctx.tasks.get(&TaskId::from("task-1")).await.is_some());
    }

    #[tokio::test]
    async fn assign_review_rejects_self_review() {
        let ctx = test_context().await;
        make_process(&ctx, "worker-1").await;
        ctx.tasks
            .save(TaskAssignment::new(TaskId::from("task-1"), ProcessId::from("worker-1"), None, Utc::now()))
            .await;

        let handler = AssignReviewHandler::new(ctx.clone());
        let envelope = CommandEnvelope::new(
            CommandKind::AssignReview {
                reviewer_id: ProcessId::from("worker-1"),
                task_id: TaskId::from("task-1"),
                implementer_id: ProcessId::from("worker-1"),
                summary: None,
                review_type: kernel_types::ReviewType::Complex,
            },
            CommandSource::Internal,
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(!handler.handle(&envelope).await.success);
    }

    #[tokio::test]
    async fn mark_task_complete_clears_implementer_assignment() {
        let ctx = test_context().await;
        make_process(&ctx, "worker-1").await;
        ctx.processes
            .update(&ProcessId::from("worker-1"), |p| p.task_id = Some(TaskId::from("task-1")))
            .await;
        ctx.tasks
            .save(TaskAssignment::new(TaskId::from("task-1"), ProcessId::from("worker-1"), None, Utc::now()))
            .await;

        let handler = MarkTaskCompleteHandler::new(ctx.clone());
        let envelope = CommandEnvelope::new(
            CommandKind::MarkTaskComplete { task_id: TaskId::from("task-1") },
            CommandSource::Internal,
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(handler.handle(&envelope).await.success);
        let process = ctx.processes.get(&ProcessId::from("worker-1")).await.unwrap();
        assert!(process.task_id.is_none());
    }
}
