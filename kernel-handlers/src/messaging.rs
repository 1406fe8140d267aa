//! Messaging handlers (§4.I): `SendToProcess`, `Broadcast`,
//! `DeliverProcessQueued`, `PostMessage`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kernel_processor::CommandHandler;
use kernel_types::{
    CommandEnvelope, CommandKind, CommandResult, KernelError, ProcessStatus, QueuedEnvelope,
    RouteTarget, SenderKind,
};
use uuid::Uuid;

use crate::context::HandlerContext;

/// `SendToProcess`: the queue-or-deliver rule (§4.G, S2). `ready` queues
/// and immediately follows up with a drain; `working` only queues; a
/// missing or retired target is an error.
pub struct SendToProcessHandler {
    ctx: Arc<HandlerContext>,
}

impl SendToProcessHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for SendToProcessHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::SendToProcess { worker_id, message } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("send_to_process handler received the wrong kind".into()));
        };

        let Some(process) = self.ctx.processes.get(worker_id).await else {
            return CommandResult::err(KernelError::Validation(format!("no such process: {worker_id}")));
        };
        if process.is_retired() {
            return CommandResult::err(KernelError::Validation(format!("{worker_id} is retired")));
        }

        let sender_kind = match envelope.source {
            kernel_types::CommandSource::Internal => SenderKind::System,
            _ => SenderKind::Coordinator,
        };

        match process.status {
            ProcessStatus::Ready => {
                if let Err(err) = self.ctx.queues.enqueue(
                    worker_id,
                    QueuedEnvelope { content: message.clone(), sender_kind, enqueued_at: Utc::now() },
                ).await {
                    return CommandResult::err(KernelError::QueueFull(err.to_string()));
                }
                let deliver = CommandEnvelope::new(
                    CommandKind::DeliverProcessQueued { process_id: worker_id.clone() },
                    envelope.source,
                    Uuid::new_v4(),
                    Utc::now(),
                );
                CommandResult::ok().with_follow_up(vec![deliver])
            }
            ProcessStatus::Working => {
                if let Err(err) = self.ctx.queues.enqueue(
                    worker_id,
                    QueuedEnvelope { content: message.clone(), sender_kind, enqueued_at: Utc::now() },
                ).await {
                    return CommandResult::err(KernelError::QueueFull(err.to_string()));
                }
                CommandResult::ok()
            }
            other => CommandResult::err(KernelError::Validation(format!(
                "{worker_id} is not deliverable in status {other:?}"
            ))),
        }
    }
}

/// `Broadcast`: fan out to every active worker not in `exclude`, as a
/// `SendToProcess` follow-up per recipient.
pub struct BroadcastHandler {
    ctx: Arc<HandlerContext>,
}

impl BroadcastHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for BroadcastHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::Broadcast { message, exclude } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("broadcast handler received the wrong kind".into()));
        };

        let recipients = self.ctx.processes.active_workers().await;
        let follow_up = recipients
            .into_iter()
            .filter(|p| !exclude.contains(&p.id))
            .map(|p| {
                CommandEnvelope::new(
                    CommandKind::SendToProcess { worker_id: p.id, message: message.clone() },
                    envelope.source,
                    Uuid::new_v4(),
                    Utc::now(),
                )
            })
            .collect();

        CommandResult::ok().with_follow_up(follow_up)
    }
}

/// `DeliverProcessQueued`: atomically drain a process's queue and hand
/// the concatenated content to the deliverer as one resumed turn,
/// resetting the turn enforcer's per-turn record first.
pub struct DeliverProcessQueuedHandler {
    ctx: Arc<HandlerContext>,
}

impl DeliverProcessQueuedHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for DeliverProcessQueuedHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::DeliverProcessQueued { process_id } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("deliver_process_queued handler received the wrong kind".into()));
        };

        let Some(process) = self.ctx.processes.get(process_id).await else {
            return CommandResult::err(KernelError::Validation(format!("no such process: {process_id}")));
        };

        let queued = self.ctx.queues.drain(process_id).await;
        if queued.is_empty() {
            return CommandResult::ok();
        }
        let joined = queued
            .into_iter()
            .map(|e| e.content)
            .collect::<Vec<_>>()
            .join("\n\n");

        self.ctx.enforcer.reset_turn(process_id).await;
        self.ctx
            .processes
            .update(process_id, |p| p.status = ProcessStatus::Working)
            .await;

        if let Err(err) = self
            .ctx
            .deliverer
            .deliver(process_id, process.role, process.agent_type, joined)
            .await
        {
            self.ctx
                .processes
                .update(process_id, |p| p.status = ProcessStatus::Failed)
                .await;
            return CommandResult::err(err);
        }

        CommandResult::ok()
    }
}

/// `PostMessage`: `to = ALL` broadcasts, `to = COORDINATOR` appends to
/// the log with no follow-up command, anything else is a literal process
/// ID routed via `SendToProcess` (S5).
pub struct PostMessageHandler {
    ctx: Arc<HandlerContext>,
}

impl PostMessageHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for PostMessageHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::PostMessage { from, to, content, message_kind } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("post_message handler received the wrong kind".into()));
        };

        self.ctx
            .messages
            .append(from.as_str(), to.clone(), content.clone(), *message_kind)
            .await;

        match to {
            RouteTarget::All => {
                let broadcast = CommandEnvelope::new(
                    CommandKind::Broadcast { message: content.clone(), exclude: vec![from.clone()] },
                    envelope.source,
                    Uuid::new_v4(),
                    Utc::now(),
                );
                CommandResult::ok().with_follow_up(vec![broadcast])
            }
            RouteTarget::Coordinator => CommandResult::ok(),
            RouteTarget::Process(target) => {
                let deliver = CommandEnvelope::new(
                    CommandKind::SendToProcess {
                        worker_id: kernel_types::ProcessId::from(target.clone()),
                        message: content.clone(),
                    },
                    envelope.source,
                    Uuid::new_v4(),
                    Utc::now(),
                );
                CommandResult::ok().with_follow_up(vec![deliver])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::test_context;
    use kernel_types::{AgentType, CommandSource, Process, ProcessId, Role};

    #[tokio::test]
    async fn send_to_ready_process_queues_and_follows_up_with_drain() {
        let ctx = test_context().await;
        let id = ProcessId::from("worker-1");
        ctx.processes
            .save(Process { status: ProcessStatus::Ready, ..Process::new(id.clone(), Role::Worker, AgentType::Generic, Utc::now()) })
            .await;

        let handler = SendToProcessHandler::new(ctx.clone());
        let envelope = CommandEnvelope::new(
            CommandKind::SendToProcess { worker_id: id.clone(), message: "hello".to_string() },
            CommandSource::Internal,
            Uuid::new_v4(),
            Utc::now(),
        );
        let result = handler.handle(&envelope).await;
        assert!(result.success);
        assert_eq!(result.follow_up.len(), 1);
        assert_eq!(ctx.queues.len(&id).await, 1);
    }

    #[tokio::test]
    async fn send_to_working_process_only_queues() {
        let ctx = test_context().await;
        let id = ProcessId::from("worker-1");
        ctx.processes
            .save(Process { status: ProcessStatus::Working, ..Process::new(id.clone(), Role::Worker, AgentType::Generic, Utc::now()) })
            .await;

        let handler = SendToProcessHandler::new(ctx.clone());
        let envelope = CommandEnvelope::new(
            CommandKind::SendToProcess { worker_id: id.clone(), message: "hello".to_string() },
            CommandSource::Internal,
            Uuid::new_v4(),
            Utc::now(),
        );
        let result = handler.handle(&envelope).await;
        assert!(result.success);
        assert!(result.follow_up.is_empty());
        assert_eq!(ctx.queues.len(&id).await, 1);
    }

    #[tokio::test]
    async fn send_to_missing_process_fails() {
        let ctx = test_context().await;
        let handler = SendToProcessHandler::new(ctx.clone());
        let envelope = CommandEnvelope::new(
            CommandKind::SendToProcess { worker_id: ProcessId::from("ghost"), message: "hi".to_string() },
            CommandSource::Internal,
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(!handler.handle(&envelope).await.success);
    }
}
