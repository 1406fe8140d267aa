//! Worker-callback handlers (§4.I) and the one internal callback,
//! `ProcessTurnComplete`, submitted by the supervisor's event loop when a
//! subprocess's turn ends (§4.G, §4.K).
//!
//! Tool-call bookkeeping for the turn-completion enforcer happens in the
//! MCP adapter, not here — every tool invocation records itself there
//! regardless of which handler it dispatches to.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kernel_processor::CommandHandler;
use kernel_types::{
    CommandEnvelope, CommandKind, CommandResult, CommandSource, KernelError, KernelEvent,
    MessageKind, ProcessStatus, RouteTarget,
};
use uuid::Uuid;

use crate::context::HandlerContext;

/// `ReportComplete`: implementer signals its turn's work is done. Logged
/// to the coordinator; the turn itself only ends when `ProcessTurnComplete`
/// arrives from the subprocess's event loop.
pub struct ReportCompleteHandler {
    ctx: Arc<HandlerContext>,
}

impl ReportCompleteHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for ReportCompleteHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::ReportComplete { process_id, summary } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("report_complete handler received the wrong kind".into()));
        };

        let content = match summary {
            Some(summary) => format!("{process_id} reports implementation complete: {summary}"),
            None => format!("{process_id} reports implementation complete."),
        };
        let entry = self
            .ctx
            .messages
            .append(process_id.as_str(), RouteTarget::Coordinator, content, MessageKind::Completion)
            .await;
        CommandResult::ok().with_events(vec![KernelEvent::EntryPosted(entry)])
    }
}

/// `ReportVerdict`: reviewer emits `APPROVED`/`DENIED` (validated upstream
/// by `CommandKind::validate`).
pub struct ReportVerdictHandler {
    ctx: Arc<HandlerContext>,
}

impl ReportVerdictHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for ReportVerdictHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::ReportVerdict { process_id, verdict, comments } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("report_verdict handler received the wrong kind".into()));
        };

        let mut content = format!("{process_id} reports review verdict: {verdict}");
        if let Some(comments) = comments {
            content.push_str(&format!(" ({comments})"));
        }
        let entry = self
            .ctx
            .messages
            .append(process_id.as_str(), RouteTarget::Coordinator, content, MessageKind::Verdict)
            .await;
        CommandResult::ok().with_events(vec![KernelEvent::EntryPosted(entry)])
    }
}

/// `TransitionPhase`: tags a process with a free-text workflow phase.
pub struct TransitionPhaseHandler {
    ctx: Arc<HandlerContext>,
}

impl TransitionPhaseHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for TransitionPhaseHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::TransitionPhase { process_id, phase } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("transition_phase handler received the wrong kind".into()));
        };

        let updated = self
            .ctx
            .processes
            .update(process_id, |p| p.phase = Some(phase.clone()))
            .await;
        if updated.is_none() {
            return CommandResult::err(KernelError::Validation(format!("no such process: {process_id}")));
        }
        CommandResult::ok()
    }
}

/// `SignalWorkflowComplete`: coordinator-only terminal announcement
/// (status/summary validated upstream). Logged for the UI; carries no
/// further lifecycle effect at the core layer.
pub struct SignalWorkflowCompleteHandler {
    ctx: Arc<HandlerContext>,
}

impl SignalWorkflowCompleteHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for SignalWorkflowCompleteHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::SignalWorkflowComplete { status, summary, epic_id, tasks_closed } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("signal_workflow_complete handler received the wrong kind".into()));
        };

        let mut content = format!("workflow complete ({status}): {summary}");
        if let Some(epic_id) = epic_id {
            content.push_str(&format!(" [epic {epic_id}]"));
        }
        if let Some(tasks_closed) = tasks_closed {
            content.push_str(&format!(" [{tasks_closed} tasks closed]"));
        }
        let entry = self
            .ctx
            .messages
            .append("coordinator", RouteTarget::All, content, MessageKind::Info)
            .await;
        CommandResult::ok().with_events(vec![KernelEvent::EntryPosted(entry)])
    }
}

/// `NotifyUser`: a process requests human attention.
pub struct NotifyUserHandler {
    ctx: Arc<HandlerContext>,
}

impl NotifyUserHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for NotifyUserHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::NotifyUser { process_id, message } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("notify_user handler received the wrong kind".into()));
        };

        let entry = self
            .ctx
            .messages
            .append(process_id.as_str(), RouteTarget::Coordinator, message.clone(), MessageKind::NotifyUser)
            .await;
        CommandResult::ok().with_events(vec![KernelEvent::EntryPosted(entry)])
    }
}

/// `ProcessTurnComplete`: submitted internally when a subprocess's turn
/// ends. Checks the turn-completion enforcer; either redelivers an
/// enforcement reminder to the same process, or marks it `Ready` and
/// drains anything that queued up while it was working, or marks it
/// `Failed` and tells the coordinator why.
pub struct ProcessTurnCompleteHandler {
    ctx: Arc<HandlerContext>,
}

impl ProcessTurnCompleteHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for ProcessTurnCompleteHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::ProcessTurnComplete { process_id, succeeded, error_reason } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("process_turn_complete handler received the wrong kind".into()));
        };

        let Some(process) = self.ctx.processes.get(process_id).await else {
            return CommandResult::err(KernelError::Validation(format!("no such process: {process_id}")));
        };

        if !*succeeded {
            self.ctx
                .processes
                .update(process_id, |p| p.status = ProcessStatus::Failed)
                .await;
            let reason = error_reason.clone().unwrap_or_else(|| "unknown error".to_string());
            let entry = self
                .ctx
                .messages
                .append(
                    process_id.as_str(),
                    RouteTarget::Coordinator,
                    format!("{process_id}'s turn failed: {reason}"),
                    MessageKind::Info,
                )
                .await;
            return CommandResult::ok().with_events(vec![KernelEvent::EntryPosted(entry)]);
        }

        let missing = self
            .ctx
            .enforcer
            .check_turn_completion(process_id, process.role, true)
            .await;

        if !missing.is_empty() && self.ctx.enforcer.should_retry(process_id).await {
            self.ctx.enforcer.increment_retry(process_id).await;
            let reminder = format!(
                "Your turn ended without calling one of the required tools ({}). \
                 Call one before finishing your next turn.",
                missing.join(", ")
            );
            if let Err(err) = self
                .ctx
                .queues
                .enqueue(
                    process_id,
                    kernel_types::QueuedEnvelope {
                        content: reminder,
                        sender_kind: kernel_types::SenderKind::System,
                        enqueued_at: Utc::now(),
                    },
                )
                .await
            {
                return CommandResult::err(KernelError::QueueFull(err.to_string()));
            }
            let deliver = CommandEnvelope::new(
                CommandKind::DeliverProcessQueued { process_id: process_id.clone() },
                CommandSource::Internal,
                Uuid::new_v4(),
                Utc::now(),
            );
            return CommandResult::ok().with_follow_up(vec![deliver]);
        }

        self.ctx
            .processes
            .update(process_id, |p| p.status = ProcessStatus::Ready)
            .await;

        if self.ctx.queues.len(process_id).await > 0 {
            let deliver = CommandEnvelope::new(
                CommandKind::DeliverProcessQueued { process_id: process_id.clone() },
                CommandSource::Internal,
                Uuid::new_v4(),
                Utc::now(),
            );
            return CommandResult::ok().with_follow_up(vec![deliver]);
        }

        CommandResult::ok().with_events(vec![KernelEvent::ProcessStatusChanged {
            process_id: process_id.clone(),
            status: "ready".to_string(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::test_context;
    use kernel_types::{AgentType, Process, ProcessId, Role};

    #[tokio::test]
    async fn failed_turn_marks_process_failed() {
        let ctx = test_context().await;
        let id = ProcessId::from("worker-1");
        ctx.processes
            .save(Process::new(id.clone(), Role::Worker, AgentType::Generic, Utc::now()))
            .await;

        let handler = ProcessTurnCompleteHandler::new(ctx.clone());
        let envelope = CommandEnvelope::new(
            CommandKind::ProcessTurnComplete { process_id: id.clone(), succeeded: false, error_reason: Some("boom".to_string()) },
            CommandSource::Callback,
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(handler.handle(&envelope).await.success);
        assert_eq!(ctx.processes.get(&id).await.unwrap().status, ProcessStatus::Failed);
    }

    #[tokio::test]
    async fn successful_turn_with_missing_tool_redelivers_reminder() {
        let ctx = test_context().await;
        let id = ProcessId::from("worker-1");
        ctx.processes
            .save(Process::new(id.clone(), Role::Worker, AgentType::Generic, Utc::now()))
            .await;
        ctx.enforcer.reset_turn(&id).await;

        let handler = ProcessTurnCompleteHandler::new(ctx.clone());
        let envelope = CommandEnvelope::new(
            CommandKind::ProcessTurnComplete { process_id: id.clone(), succeeded: true, error_reason: None },
            CommandSource::Callback,
            Uuid::new_v4(),
            Utc::now(),
        );
        let result = handler.handle(&envelope).await;
        assert!(result.success);
        assert_eq!(result.follow_up.len(), 1);
        assert_eq!(ctx.queues.len(&id).await, 1);
    }

    #[tokio::test]
    async fn successful_turn_with_satisfied_requirement_goes_ready() {
        let ctx = test_context().await;
        let id = ProcessId::from("worker-1");
        ctx.processes
            .save(Process::new(id.clone(), Role::Worker, AgentType::Generic, Utc::now()))
            .await;
        ctx.enforcer.reset_turn(&id).await;
        ctx.enforcer.record_tool_call(&id, "signal_ready").await;

        let handler = ProcessTurnCompleteHandler::new(ctx.clone());
        let envelope = CommandEnvelope::new(
            CommandKind::ProcessTurnComplete { process_id: id.clone(), succeeded: true, error_reason: None },
            CommandSource::Callback,
            Uuid::new_v4(),
            Utc::now(),
        );
        let result = handler.handle(&envelope).await;
        assert!(result.success);
        assert!(result.follow_up.is_empty());
        assert_eq!(ctx.processes.get(&id).await.unwrap().status, ProcessStatus::Ready);
    }
}
