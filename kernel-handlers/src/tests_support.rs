//! Test-only `HandlerContext` builder shared by every handler module's
//! unit tests. Uses `DemoCommandBuilder` pointed at `/bin/true`, since no
//! test in this crate actually spawns a process through it.

#![cfg(test)]

use std::path::PathBuf;
use std::sync::Arc;

use kernel_enforcer::TurnEnforcer;
use kernel_parser::DemoVendorParser;
use kernel_store::{MessageRepository, ProcessRepository, QueueRepository, TaskRepository};
use kernel_supervisor::{DemoCommandBuilder, MessageDeliverer, ProcessRegistry, ProcessSpawner};
use kernel_types::{CommandEnvelope, CommandSubmitter, KernelError, ProcessId, SessionRef};

use crate::context::{HandlerContext, NoopIssueExecutor};

struct NoopSubmitter;

impl CommandSubmitter for NoopSubmitter {
    fn submit(&self, _envelope: CommandEnvelope) -> Result<(), KernelError> {
        Ok(())
    }
}

fn noop_notifier(_process_id: ProcessId, _session_ref: SessionRef) {}

pub async fn test_context() -> Arc<HandlerContext> {
    let registry = Arc::new(ProcessRegistry::new());
    let builder = Arc::new(DemoCommandBuilder { executable: PathBuf::from("/bin/true") });
    let parser = Arc::new(DemoVendorParser::default());
    let submitter: Arc<dyn CommandSubmitter> = Arc::new(NoopSubmitter);
    let spawner = Arc::new(ProcessSpawner::new(
        builder,
        parser,
        registry.clone(),
        submitter,
        Arc::new(noop_notifier),
    ));
    let deliverer = Arc::new(MessageDeliverer::new(registry.clone(), spawner.clone()));

    Arc::new(HandlerContext {
        messages: Arc::new(MessageRepository::new()),
        processes: Arc::new(ProcessRepository::new()),
        tasks: Arc::new(TaskRepository::new()),
        queues: Arc::new(QueueRepository::new(kernel_types::DEFAULT_QUEUE_DEPTH)),
        registry,
        spawner,
        deliverer,
        enforcer: Arc::new(TurnEnforcer::new()),
        issue_executor: Arc::new(NoopIssueExecutor),
    })
}
