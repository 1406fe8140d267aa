//! One [`ToolDyn`] per MCP tool (§6). Tools that mutate state build a
//! [`CommandKind`] and go through `submit_and_wait`; `query_worker_state`
//! and `read_message_log` are read-only and bypass the processor
//! entirely, reading straight off the repositories.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use kernel_enforcer::REQUIRED_TOOLS;
use kernel_types::{
    CommandEnvelope, CommandKind, CommandSource, MessageKind, ProcessId, ReviewType, RouteTarget,
    TaskId,
};
use neuron_tool::{ToolDyn, ToolError};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::{AdapterContext, SUBMIT_TIMEOUT};

fn required_str<'a>(input: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidInput(format!("missing required field: {field}")))
}

fn opt_str(input: &Value, field: &str) -> Option<String> {
    input.get(field).and_then(Value::as_str).map(str::to_string)
}

fn opt_u64(input: &Value, field: &str) -> Option<u64> {
    input.get(field).and_then(Value::as_u64)
}

/// Submits `kind` as an envelope from `process_id`, waits for the result
/// (bounded by [`SUBMIT_TIMEOUT`]), and renders it as the tool's return
/// value or a [`ToolError`].
async fn submit_and_render(ctx: &AdapterContext, kind: CommandKind) -> Result<Value, ToolError> {
    let envelope = CommandEnvelope::new(kind, CommandSource::McpTool, Uuid::new_v4(), chrono::Utc::now());
    let outcome = tokio::time::timeout(SUBMIT_TIMEOUT, ctx.processor.submit_and_wait(ctx.scope.clone(), envelope)).await;
    match outcome {
        Ok(Ok(result)) if result.success => Ok(result.data.unwrap_or_else(|| json!({"ok": true}))),
        Ok(Ok(result)) => Err(ToolError::ExecutionFailed(
            result.error.map(|e| e.to_string()).unwrap_or_else(|| "command failed".to_string()),
        )),
        Ok(Err(err)) => Err(ToolError::ExecutionFailed(err.to_string())),
        Err(_elapsed) => Err(ToolError::ExecutionFailed("command timed out".to_string())),
    }
}

/// Records a tool call against the turn-completion enforcer when `name`
/// is one of the required-tool names it tracks. A no-op for every other
/// tool.
async fn record_if_required(ctx: &AdapterContext, process_id: &ProcessId, name: &str) {
    if REQUIRED_TOOLS.contains(&name) {
        ctx.enforcer.record_tool_call(process_id, name).await;
    }
}

/// Generic tool: extracts a `CommandKind` from the caller's bound
/// process ID and the raw JSON input, then submits and waits. Covers
/// every mutating tool except the two read-only queries.
pub struct KernelCommandTool {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
    process_id: ProcessId,
    ctx: Arc<AdapterContext>,
    build: Box<dyn Fn(&ProcessId, &Value) -> Result<CommandKind, ToolError> + Send + Sync>,
}

impl ToolDyn for KernelCommandTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    fn call(&self, input: Value) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let kind = (self.build)(&self.process_id, &input)?;
            record_if_required(&self.ctx, &self.process_id, self.name).await;
            submit_and_render(&self.ctx, kind).await
        })
    }
}

fn command_tool(
    name: &'static str,
    description: &'static str,
    input_schema: Value,
    process_id: ProcessId,
    ctx: Arc<AdapterContext>,
    build: impl Fn(&ProcessId, &Value) -> Result<CommandKind, ToolError> + Send + Sync + 'static,
) -> Arc<dyn ToolDyn> {
    Arc::new(KernelCommandTool {
        name,
        description,
        input_schema,
        process_id,
        ctx,
        build: Box::new(build),
    })
}

/// Every MCP tool's construction, bound to one caller's process ID.
pub fn build_tools(process_id: ProcessId, ctx: Arc<AdapterContext>) -> Vec<Arc<dyn ToolDyn>> {
    vec![
        command_tool(
            "spawn_process",
            "Spawn a new supervised worker process.",
            json!({
                "type": "object",
                "properties": {
                    "process_id": {"type": "string"},
                    "agent_type": {"type": "string"},
                    "workflow_config": {"type": "object"},
                },
            }),
            process_id.clone(),
            ctx.clone(),
            |_caller, input| {
                let agent_type = kernel_types::AgentType::parse(input.get("agent_type").and_then(Value::as_str).unwrap_or(""))
                    .map_err(ToolError::InvalidInput)?;
                Ok(CommandKind::SpawnProcess {
                    process_id: opt_str(input, "process_id").map(ProcessId::from),
                    agent_type,
                    workflow_config: input.get("workflow_config").cloned(),
                })
            },
        ),
        command_tool(
            "retire_process",
            "Retire a worker process, releasing its resources.",
            json!({"type": "object", "properties": {"process_id": {"type": "string"}, "reason": {"type": "string"}}, "required": ["process_id"]}),
            process_id.clone(),
            ctx.clone(),
            |_caller, input| {
                Ok(CommandKind::RetireProcess {
                    process_id: ProcessId::from(required_str(input, "process_id")?.to_string()),
                    reason: opt_str(input, "reason"),
                })
            },
        ),
        command_tool(
            "replace_process",
            "Retire and respawn a worker process in place.",
            json!({"type": "object", "properties": {"process_id": {"type": "string"}, "reason": {"type": "string"}}, "required": ["process_id"]}),
            process_id.clone(),
            ctx.clone(),
            |_caller, input| {
                Ok(CommandKind::ReplaceProcess {
                    process_id: ProcessId::from(required_str(input, "process_id")?.to_string()),
                    reason: opt_str(input, "reason"),
                })
            },
        ),
        command_tool(
            "send_to_worker",
            "Send a message to a specific worker's mailbox.",
            json!({"type": "object", "properties": {"worker_id": {"type": "string"}, "message": {"type": "string"}}, "required": ["worker_id", "message"]}),
            process_id.clone(),
            ctx.clone(),
            |_caller, input| {
                Ok(CommandKind::SendToProcess {
                    worker_id: ProcessId::from(required_str(input, "worker_id")?.to_string()),
                    message: required_str(input, "message")?.to_string(),
                })
            },
        ),
        command_tool(
            "post_message",
            "Post a message to the shared log, routed to ALL, COORDINATOR, or a process ID.",
            json!({"type": "object", "properties": {"to": {"type": "string"}, "content": {"type": "string"}, "message_kind": {"type": "string"}}, "required": ["to", "content"]}),
            process_id.clone(),
            ctx.clone(),
            |caller, input| {
                let message_kind = match input.get("message_kind").and_then(Value::as_str) {
                    Some(raw) => serde_json::from_value::<MessageKind>(Value::String(raw.to_string()))
                        .map_err(|_| ToolError::InvalidInput(format!("invalid message_kind: {raw}")))?,
                    None => MessageKind::Info,
                };
                Ok(CommandKind::PostMessage {
                    from: caller.clone(),
                    to: RouteTarget::parse(required_str(input, "to")?),
                    content: required_str(input, "content")?.to_string(),
                    message_kind,
                })
            },
        ),
        command_tool(
            "assign_task",
            "Assign a task to an implementer.",
            json!({"type": "object", "properties": {"worker_id": {"type": "string"}, "task_id": {"type": "string"}, "summary": {"type": "string"}}, "required": ["worker_id", "task_id"]}),
            process_id.clone(),
            ctx.clone(),
            |_caller, input| {
                Ok(CommandKind::AssignTask {
                    worker_id: ProcessId::from(required_str(input, "worker_id")?.to_string()),
                    task_id: TaskId::from(required_str(input, "task_id")?.to_string()),
                    summary: opt_str(input, "summary"),
                })
            },
        ),
        command_tool(
            "assign_task_review",
            "Assign a reviewer to an in-flight task.",
            json!({
                "type": "object",
                "properties": {
                    "reviewer_id": {"type": "string"},
                    "task_id": {"type": "string"},
                    "implementer_id": {"type": "string"},
                    "summary": {"type": "string"},
                    "review_type": {"type": "string"},
                },
                "required": ["reviewer_id", "task_id", "implementer_id"],
            }),
            process_id.clone(),
            ctx.clone(),
            |_caller, input| {
                Ok(CommandKind::AssignReview {
                    reviewer_id: ProcessId::from(required_str(input, "reviewer_id")?.to_string()),
                    task_id: TaskId::from(required_str(input, "task_id")?.to_string()),
                    implementer_id: ProcessId::from(required_str(input, "implementer_id")?.to_string()),
                    summary: opt_str(input, "summary"),
                    review_type: ReviewType::parse(input.get("review_type").and_then(Value::as_str)),
                })
            },
        ),
        command_tool(
            "assign_review_feedback",
            "Send a reviewer's feedback back to the implementer.",
            json!({"type": "object", "properties": {"implementer_id": {"type": "string"}, "task_id": {"type": "string"}, "feedback": {"type": "string"}}, "required": ["implementer_id", "task_id", "feedback"]}),
            process_id.clone(),
            ctx.clone(),
            |_caller, input| {
                Ok(CommandKind::AssignReviewFeedback {
                    implementer_id: ProcessId::from(required_str(input, "implementer_id")?.to_string()),
                    task_id: TaskId::from(required_str(input, "task_id")?.to_string()),
                    feedback: required_str(input, "feedback")?.to_string(),
                })
            },
        ),
        command_tool(
            "approve_commit",
            "Approve an implementer's commit for a task.",
            json!({"type": "object", "properties": {"implementer_id": {"type": "string"}, "task_id": {"type": "string"}, "commit_message": {"type": "string"}}, "required": ["implementer_id", "task_id"]}),
            process_id.clone(),
            ctx.clone(),
            |_caller, input| {
                Ok(CommandKind::ApproveCommit {
                    implementer_id: ProcessId::from(required_str(input, "implementer_id")?.to_string()),
                    task_id: TaskId::from(required_str(input, "task_id")?.to_string()),
                    commit_message: opt_str(input, "commit_message"),
                })
            },
        ),
        command_tool(
            "report_implementation_complete",
            "Report that the calling worker's implementation turn is done.",
            json!({"type": "object", "properties": {"summary": {"type": "string"}}}),
            process_id.clone(),
            ctx.clone(),
            |caller, input| {
                Ok(CommandKind::ReportComplete { process_id: caller.clone(), summary: opt_str(input, "summary") })
            },
        ),
        command_tool(
            "report_review_verdict",
            "Report a review verdict (APPROVED or DENIED).",
            json!({"type": "object", "properties": {"verdict": {"type": "string"}, "comments": {"type": "string"}}, "required": ["verdict"]}),
            process_id.clone(),
            ctx.clone(),
            |caller, input| {
                Ok(CommandKind::ReportVerdict {
                    process_id: caller.clone(),
                    verdict: required_str(input, "verdict")?.to_string(),
                    comments: opt_str(input, "comments"),
                })
            },
        ),
        command_tool(
            "mark_task_complete",
            "Mark a task as completed.",
            json!({"type": "object", "properties": {"task_id": {"type": "string"}}, "required": ["task_id"]}),
            process_id.clone(),
            ctx.clone(),
            |_caller, input| Ok(CommandKind::MarkTaskComplete { task_id: TaskId::from(required_str(input, "task_id")?.to_string()) }),
        ),
        command_tool(
            "mark_task_failed",
            "Mark a task as failed, with a required reason.",
            json!({"type": "object", "properties": {"task_id": {"type": "string"}, "reason": {"type": "string"}}, "required": ["task_id", "reason"]}),
            process_id.clone(),
            ctx.clone(),
            |_caller, input| {
                Ok(CommandKind::MarkTaskFailed {
                    task_id: TaskId::from(required_str(input, "task_id")?.to_string()),
                    reason: required_str(input, "reason")?.to_string(),
                })
            },
        ),
        command_tool(
            "signal_workflow_complete",
            "Coordinator-only: announce the whole workflow is done.",
            json!({
                "type": "object",
                "properties": {
                    "status": {"type": "string"},
                    "summary": {"type": "string"},
                    "epic_id": {"type": "string"},
                    "tasks_closed": {"type": "integer"},
                },
                "required": ["status", "summary"],
            }),
            process_id.clone(),
            ctx.clone(),
            |_caller, input| {
                Ok(CommandKind::SignalWorkflowComplete {
                    status: required_str(input, "status")?.to_string(),
                    summary: required_str(input, "summary")?.to_string(),
                    epic_id: opt_str(input, "epic_id"),
                    tasks_closed: opt_u64(input, "tasks_closed"),
                })
            },
        ),
        command_tool(
            "notify_user",
            "Request human attention.",
            json!({"type": "object", "properties": {"message": {"type": "string"}}, "required": ["message"]}),
            process_id.clone(),
            ctx.clone(),
            |caller, input| {
                Ok(CommandKind::NotifyUser { process_id: caller.clone(), message: required_str(input, "message")?.to_string() })
            },
        ),
        Arc::new(SignalReadyTool { process_id: process_id.clone(), ctx: ctx.clone() }),
        Arc::new(QueryWorkerStateTool { ctx: ctx.clone() }),
        Arc::new(ReadMessageLogTool { process_id, ctx }),
    ]
}

/// `signal_ready`: satisfies the turn-completion requirement without
/// otherwise touching kernel state.
struct SignalReadyTool {
    process_id: ProcessId,
    ctx: Arc<AdapterContext>,
}

impl ToolDyn for SignalReadyTool {
    fn name(&self) -> &str {
        "signal_ready"
    }

    fn description(&self) -> &str {
        "Signal that the calling worker's turn is complete with nothing further to report."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn call(&self, _input: Value) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            self.ctx.enforcer.record_tool_call(&self.process_id, "signal_ready").await;
            Ok(json!({"ok": true}))
        })
    }
}

/// `query_worker_state`: read-only, bypasses the processor.
struct QueryWorkerStateTool {
    ctx: Arc<AdapterContext>,
}

impl ToolDyn for QueryWorkerStateTool {
    fn name(&self) -> &str {
        "query_worker_state"
    }

    fn description(&self) -> &str {
        "Read a snapshot of one worker's state, or every worker's if process_id is omitted."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"process_id": {"type": "string"}}})
    }

    fn call(&self, input: Value) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            match opt_str(&input, "process_id") {
                Some(id) => match self.ctx.processes.get(&ProcessId::from(id.clone())).await {
                    Some(process) => Ok(serde_json::to_value(process).unwrap_or(Value::Null)),
                    None => Err(ToolError::NotFound(id)),
                },
                None => {
                    let all = self.ctx.processes.all().await;
                    Ok(serde_json::to_value(all).unwrap_or(Value::Null))
                }
            }
        })
    }
}

/// `read_message_log`: read-only, returns and marks-read every entry the
/// caller hasn't seen yet.
struct ReadMessageLogTool {
    process_id: ProcessId,
    ctx: Arc<AdapterContext>,
}

impl ToolDyn for ReadMessageLogTool {
    fn name(&self) -> &str {
        "read_message_log"
    }

    fn description(&self) -> &str {
        "Read and mark-as-read every message log entry not yet seen by the calling process."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn call(&self, _input: Value) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let entries = self.ctx.messages.read_and_mark(self.process_id.as_str()).await;
            Ok(serde_json::to_value(entries).unwrap_or(Value::Null))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_bus::Bus;
    use kernel_enforcer::TurnEnforcer;
    use kernel_processor::{CommandHandler, CommandProcessor, ProcessorConfig};
    use kernel_store::{MessageRepository, ProcessRepository, TaskRepository};
    use kernel_types::{CommandResult, KernelEvent};
    use std::sync::Arc;

    struct Echo;

    #[async_trait::async_trait]
    impl CommandHandler for Echo {
        async fn handle(&self, _envelope: &CommandEnvelope) -> CommandResult {
            CommandResult::ok_with_data(json!({"process_id": "worker-1"}))
        }
    }

    async fn test_ctx() -> Arc<AdapterContext> {
        let bus: Bus<KernelEvent> = Bus::default();
        let processor = CommandProcessor::new(bus, ProcessorConfig::default());
        processor.register_handler("spawn_process", Arc::new(Echo)).await;
        processor.run(tokio_util::sync::CancellationToken::new());
        processor.wait_for_ready(tokio_util::sync::CancellationToken::new()).await;

        Arc::new(AdapterContext {
            processor,
            messages: Arc::new(MessageRepository::new()),
            processes: Arc::new(ProcessRepository::new()),
            tasks: Arc::new(TaskRepository::new()),
            enforcer: Arc::new(TurnEnforcer::new()),
            scope: tokio_util::sync::CancellationToken::new(),
        })
    }

    #[tokio::test]
    async fn spawn_process_tool_round_trips_through_processor() {
        let ctx = test_ctx().await;
        let tools = build_tools(ProcessId::from("coordinator"), ctx);
        let tool = tools.iter().find(|t| t.name() == "spawn_process").unwrap();
        let result = tool.call(json!({"agent_type": "implementer"})).await.unwrap();
        assert_eq!(result["process_id"], "worker-1");
    }

    #[tokio::test]
    async fn post_message_rejects_missing_content() {
        let ctx = test_ctx().await;
        let tools = build_tools(ProcessId::from("worker-1"), ctx);
        let tool = tools.iter().find(|t| t.name() == "post_message").unwrap();
        let result = tool.call(json!({"to": "ALL"})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn query_worker_state_is_read_only() {
        let ctx = test_ctx().await;
        ctx.processes
            .save(kernel_types::Process::new(
                ProcessId::from("worker-1"),
                kernel_types::Role::Worker,
                kernel_types::AgentType::Generic,
                chrono::Utc::now(),
            ))
            .await;
        let tools = build_tools(ProcessId::from("coordinator"), ctx);
        let tool = tools.iter().find(|t| t.name() == "query_worker_state").unwrap();
        let result = tool.call(json!({"process_id": "worker-1"})).await.unwrap();
        assert_eq!(result["id"], "worker-1");
    }

    #[tokio::test]
    async fn signal_ready_records_required_tool_call() {
        let ctx = test_ctx().await;
        let id = ProcessId::from("worker-1");
        ctx.enforcer.reset_turn(&id).await;
        let tools = build_tools(id.clone(), ctx.clone());
        let tool = tools.iter().find(|t| t.name() == "signal_ready").unwrap();
        tool.call(json!({})).await.unwrap();
        let missing = ctx.enforcer.check_turn_completion(&id, kernel_types::Role::Worker, true).await;
        assert!(missing.is_empty());
    }
}
