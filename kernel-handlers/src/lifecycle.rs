//! Process lifecycle handlers (§4.I): `SpawnProcess`, `RetireProcess`,
//! `ReplaceProcess`, `StopProcess`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kernel_processor::CommandHandler;
use kernel_supervisor::{SpawnRequest, Turn};
use kernel_types::{
    CommandEnvelope, CommandKind, CommandResult, KernelError, KernelEvent, Process, ProcessId,
    ProcessStatus, Role, COORDINATOR_ID,
};
use serde_json::json;
use uuid::Uuid;

use crate::context::HandlerContext;

fn role_for(process_id: &ProcessId) -> Role {
    if process_id.as_str() == COORDINATOR_ID {
        Role::Coordinator
    } else {
        Role::Worker
    }
}

fn status_event(process_id: &ProcessId, status: ProcessStatus) -> KernelEvent {
    KernelEvent::ProcessStatusChanged {
        process_id: process_id.clone(),
        status: format!("{status:?}").to_lowercase(),
    }
}

/// `SpawnProcess`: allocates an ID if absent, invokes the spawner,
/// registers the process record, and marks it newly-spawned in the Turn
/// Enforcer.
pub struct SpawnProcessHandler {
    ctx: Arc<HandlerContext>,
}

impl SpawnProcessHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for SpawnProcessHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::SpawnProcess {
            process_id,
            agent_type,
            workflow_config,
        } = &envelope.kind
        else {
            return CommandResult::err(KernelError::Other("spawn_process handler received the wrong kind".into()));
        };

        let process_id = process_id
            .clone()
            .unwrap_or_else(|| ProcessId::from(format!("worker-{}", Uuid::new_v4())));
        let role = role_for(&process_id);

        let record = Process::new(process_id.clone(), role, *agent_type, Utc::now());
        self.ctx.processes.save(record).await;

        let req = SpawnRequest {
            process_id: process_id.clone(),
            role,
            agent_type: *agent_type,
            turn: Turn::Initial { workflow_config: workflow_config.clone() },
            env: HashMap::new(),
            work_dir: None,
        };

        if let Err(err) = self.ctx.spawner.spawn(req).await {
            self.ctx
                .processes
                .update(&process_id, |p| p.status = ProcessStatus::Failed)
                .await;
            return CommandResult::err(err);
        }

        self.ctx
            .processes
            .update(&process_id, |p| p.status = ProcessStatus::Starting)
            .await;
        self.ctx.enforcer.mark_as_newly_spawned(&process_id).await;

        CommandResult::ok_with_data(json!({ "process_id": process_id.as_str() }))
            .with_events(vec![status_event(&process_id, ProcessStatus::Starting)])
    }
}

/// `RetireProcess`: removes from the supervisor registry, marks the
/// repository record retired, and clears enforcer state.
pub struct RetireProcessHandler {
    ctx: Arc<HandlerContext>,
}

impl RetireProcessHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for RetireProcessHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::RetireProcess { process_id, reason } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("retire_process handler received the wrong kind".into()));
        };

        if let Some(headless) = self.ctx.registry.remove(process_id).await {
            headless.cancel().await;
        }
        self.ctx.queues.remove(process_id).await;
        self.ctx.enforcer.forget(process_id).await;

        let updated = self
            .ctx
            .processes
            .update(process_id, |p| {
                p.status = ProcessStatus::Retired;
                p.retired_at = Some(Utc::now());
            })
            .await;

        if updated.is_none() {
            return CommandResult::err(KernelError::Validation(format!("no such process: {process_id}")));
        }

        tracing::info!(process_id = %process_id, reason = reason.as_deref().unwrap_or(""), "process retired");
        CommandResult::ok().with_events(vec![status_event(process_id, ProcessStatus::Retired)])
    }
}

/// `ReplaceProcess`: retire, then spawn a replacement preserving role (and,
/// for now, agent type — a continuation workflow-config is not carried
/// across since the spec leaves its shape to the coordinator policy).
pub struct ReplaceProcessHandler {
    ctx: Arc<HandlerContext>,
}

impl ReplaceProcessHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for ReplaceProcessHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::ReplaceProcess { process_id, reason } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("replace_process handler received the wrong kind".into()));
        };

        let Some(existing) = self.ctx.processes.get(process_id).await else {
            return CommandResult::err(KernelError::Validation(format!("no such process: {process_id}")));
        };

        let retire = CommandEnvelope::new(
            CommandKind::RetireProcess {
                process_id: process_id.clone(),
                reason: reason.clone(),
            },
            envelope.source,
            Uuid::new_v4(),
            Utc::now(),
        );
        let spawn = CommandEnvelope::new(
            CommandKind::SpawnProcess {
                process_id: Some(process_id.clone()),
                agent_type: existing.agent_type,
                workflow_config: None,
            },
            envelope.source,
            Uuid::new_v4(),
            Utc::now(),
        );

        CommandResult::ok().with_follow_up(vec![retire, spawn])
    }
}

/// `StopProcess`: forcible or cooperative termination, clears task
/// assignment, drains the queue.
pub struct StopProcessHandler {
    ctx: Arc<HandlerContext>,
}

impl StopProcessHandler {
    /// Wrap the shared handler context.
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CommandHandler for StopProcessHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        let CommandKind::StopProcess { process_id, reason } = &envelope.kind else {
            return CommandResult::err(KernelError::Other("stop_process handler received the wrong kind".into()));
        };

        if let Some(headless) = self.ctx.registry.remove(process_id).await {
            headless.cancel().await;
        }
        self.ctx.queues.drain(process_id).await;
        self.ctx.enforcer.forget(process_id).await;

        let updated = self
            .ctx
            .processes
            .update(process_id, |p| {
                p.status = ProcessStatus::Retired;
                p.task_id = None;
                p.retired_at = Some(Utc::now());
            })
            .await;

        if updated.is_none() {
            return CommandResult::err(KernelError::Validation(format!("no such process: {process_id}")));
        }

        tracing::info!(process_id = %process_id, reason = reason.as_deref().unwrap_or(""), "process stopped");
        CommandResult::ok().with_events(vec![status_event(process_id, ProcessStatus::Retired)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::test_context;
    use kernel_types::{AgentType, CommandSource};

    fn envelope(kind: CommandKind) -> CommandEnvelope {
        CommandEnvelope::new(kind, CommandSource::Internal, Uuid::new_v4(), Utc::now())
    }

    #[tokio::test]
    async fn spawn_assigns_worker_role_and_starting_status() {
        let ctx = test_context().await;
        let handler = SpawnProcessHandler::new(ctx.clone());

        let result = handler
            .handle(&envelope(CommandKind::SpawnProcess {
                process_id: Some(ProcessId::from("worker-1")),
                agent_type: AgentType::Implementer,
                workflow_config: None,
            }))
            .await;

        assert!(result.success, "{:?}", result.error);
        let record = ctx.processes.get(&ProcessId::from("worker-1")).await.unwrap();
        assert_eq!(record.role, Role::Worker);
        assert_eq!(record.status, ProcessStatus::Starting);
    }

    #[tokio::test]
    async fn spawn_with_coordinator_id_assigns_coordinator_role() {
        let ctx = test_context().await;
        let handler = SpawnProcessHandler::new(ctx.clone());

        handler
            .handle(&envelope(CommandKind::SpawnProcess {
                process_id: Some(ProcessId::from(COORDINATOR_ID)),
                agent_type: AgentType::Generic,
                workflow_config: None,
            }))
            .await;

        let record = ctx.processes.get(&ProcessId::from(COORDINATOR_ID)).await.unwrap();
        assert_eq!(record.role, Role::Coordinator);
    }

    #[tokio::test]
    async fn spawn_without_process_id_generates_a_worker_id() {
        let ctx = test_context().await;
        let handler = SpawnProcessHandler::new(ctx.clone());

        let result = handler
            .handle(&envelope(CommandKind::SpawnProcess {
                process_id: None,
                agent_type: AgentType::Generic,
                workflow_config: None,
            }))
            .await;

        assert!(result.success);
        let generated = result.data.unwrap()["process_id"].as_str().unwrap().to_string();
        assert!(ctx.processes.get(&ProcessId::from(generated)).await.is_some());
    }

    #[tokio::test]
    async fn retire_then_stop_leave_process_retired_and_clear_enforcer_state() {
        let ctx = test_context().await;
        let spawn = SpawnProcessHandler::new(ctx.clone());
        spawn
            .handle(&envelope(CommandKind::SpawnProcess {
                process_id: Some(ProcessId::from("worker-2")),
                agent_type: AgentType::Implementer,
                workflow_config: None,
            }))
            .await;

        let retire = RetireProcessHandler::new(ctx.clone());
        let result = retire
            .handle(&envelope(CommandKind::RetireProcess {
                process_id: ProcessId::from("worker-2"),
                reason: Some("done".to_string()),
            }))
            .await;

        assert!(result.success);
        let record = ctx.processes.get(&ProcessId::from("worker-2")).await.unwrap();
        assert_eq!(record.status, ProcessStatus::Retired);
        assert!(record.retired_at.is_some());
    }

    #[tokio::test]
    async fn retire_unknown_process_fails_validation() {
        let ctx = test_context().await;
        let retire = RetireProcessHandler::new(ctx.clone());

        let result = retire
            .handle(&envelope(CommandKind::RetireProcess {
                process_id: ProcessId::from("ghost"),
                reason: None,
            }))
            .await;

        assert!(!result.success);
    }

    #[tokio::test]
    async fn replace_process_queues_retire_then_spawn_as_follow_up() {
        let ctx = test_context().await;
        let spawn = SpawnProcessHandler::new(ctx.clone());
        spawn
            .handle(&envelope(CommandKind::SpawnProcess {
                process_id: Some(ProcessId::from("worker-3")),
                agent_type: AgentType::Reviewer,
                workflow_config: None,
            }))
            .await;

        let replace = ReplaceProcessHandler::new(ctx.clone());
        let result = replace
            .handle(&envelope(CommandKind::ReplaceProcess {
                process_id: ProcessId::from("worker-3"),
                reason: Some("crashed".to_string()),
            }))
            .await;

        assert!(result.success);
        assert_eq!(result.follow_up.len(), 2);
        assert!(matches!(result.follow_up[0].kind, CommandKind::RetireProcess { .. }));
        assert!(matches!(result.follow_up[1].kind, CommandKind::SpawnProcess { .. }));
    }
}
