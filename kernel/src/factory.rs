//! Infrastructure Factory (§4.M): the composition root. Assembles the
//! Event Bus, the four repositories, the Command Processor (with every
//! handler registered), the Process Supervisor, the Turn-Completion
//! Enforcer, and the Coordinator Nudger into one [`Kernel`], and drives
//! the startup/shutdown ordering from §5.
//!
//! Per-vendor MCP stdio wiring — binding one spawned subprocess's own
//! stdio to its dedicated [`kernel_mcp`] session — is a deployment
//! concern, not solved here; see `kernel_mcp::server` for the scoping
//! note. This factory builds one [`kernel_mcp::AdapterContext`] that a
//! deployment's per-process wiring constructs tool registries from.

use std::sync::Arc;
use std::time::Duration;

use kernel_bus::Bus;
use kernel_enforcer::TurnEnforcer;
use kernel_handlers::HandlerContext;
use kernel_mcp::AdapterContext;
use kernel_nudger::Nudger;
use kernel_parser::demo_vendor::DemoVendorParser;
use kernel_processor::{CommandProcessor, ProcessorConfig};
use kernel_store::{MessageRepository, ProcessRepository, QueueRepository, TaskRepository};
use kernel_supervisor::{CommandBuilder, MessageDeliverer, ProcessRegistry, ProcessSpawner};
use kernel_types::{
    AgentType, CommandEnvelope, CommandKind, CommandSource, CommandSubmitter, KernelEvent, ProcessId, ProcessStatus,
    SessionRef, COORDINATOR_ID,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::KernelConfig;
use crate::error::KernelBinError;
use crate::vendor::VendorCommandBuilder;

/// Every collaborator the binary needs after assembly, plus the
/// lifecycle methods that enforce §5's startup/shutdown ordering.
pub struct Kernel {
    /// The Command Processor.
    pub processor: Arc<CommandProcessor>,
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
    /// Turn-Completion Enforcer.
    pub enforcer: Arc<TurnEnforcer>,
    /// Coordinator Nudger.
    pub nudger: Arc<Nudger>,
    /// Collaborators for an MCP session's tool surface.
    pub mcp: Arc<AdapterContext>,
    /// Root cancellation scope; cancelling it cascades to every
    /// subsystem per §5.
    pub scope: CancellationToken,
}

fn session_ref_notifier(processes: Arc<ProcessRepository>) -> Arc<dyn kernel_supervisor::SessionRefNotifier> {
    Arc::new(move |process_id: ProcessId, session_ref: SessionRef| {
        let processes = processes.clone();
        tokio::spawn(async move {
            processes
                .update(&process_id, |p| {
                    p.session_ref = Some(session_ref);
                    p.status = ProcessStatus::Ready;
                })
                .await;
        });
    })
}

impl Kernel {
    /// Wire every subsystem from `config`. Does not start anything; call
    /// [`Self::start`] afterward.
    pub async fn build(config: &KernelConfig) -> Result<Arc<Self>, KernelBinError> {
        config.validate()?;

        let bus: Bus<KernelEvent> = Bus::default();
        let processor = CommandProcessor::new(
            bus,
            ProcessorConfig {
                queue_depth: config.queue_depth,
                slow_handler_threshold: Duration::from_secs(config.slow_handler_threshold_secs),
                dedup_ttl: config.dedup_ttl_secs.map(Duration::from_secs),
            },
        );

        let messages = Arc::new(MessageRepository::new());
        let processes = Arc::new(ProcessRepository::new());
        let tasks = Arc::new(TaskRepository::new());
        let queues = Arc::new(QueueRepository::new(config.per_process_queue_depth));
        let registry = Arc::new(ProcessRegistry::new());
        let enforcer = Arc::new(TurnEnforcer::new());

        let builder: Arc<dyn CommandBuilder> = Arc::new(VendorCommandBuilder::new(config.vendor.clone()));
        let parser = Arc::new(DemoVendorParser::default());
        let submitter: Arc<dyn CommandSubmitter> = processor.clone();
        let notifier = session_ref_notifier(processes.clone());
        let spawner = Arc::new(ProcessSpawner::new(builder, parser, registry.clone(), submitter, notifier));
        let deliverer = Arc::new(MessageDeliverer::new(registry.clone(), spawner.clone()));

        let handler_ctx = Arc::new(HandlerContext {
            messages: messages.clone(),
            processes: processes.clone(),
            tasks: tasks.clone(),
            queues: queues.clone(),
            registry: registry.clone(),
            spawner,
            deliverer,
            enforcer: enforcer.clone(),
            issue_executor: Arc::new(kernel_handlers::NoopIssueExecutor),
        });
        kernel_handlers::register_all(&processor, handler_ctx).await;

        let nudger_submitter: Arc<dyn CommandSubmitter> = processor.clone();
        let nudger = Arc::new(Nudger::with_clock(
            nudger_submitter,
            kernel_nudger::TokioClock,
            Duration::from_millis(config.nudger.debounce_ms),
        ));

        let scope = CancellationToken::new();
        let mcp = Arc::new(AdapterContext {
            processor: processor.clone(),
            messages: messages.clone(),
            processes: processes.clone(),
            tasks: tasks.clone(),
            enforcer: enforcer.clone(),
            scope: scope.clone(),
        });

        Ok(Arc::new(Self {
            processor,
            messages,
            processes,
            tasks,
            queues,
            registry,
            enforcer,
            nudger,
            mcp,
            scope,
        }))
    }

    /// §5 startup ordering: (1) launch the processor loop, (2) wait for
    /// its ready signal, (3) launch the nudger. Then submit the initial
    /// coordinator spawn, since nothing else triggers it.
    pub async fn start(&self) -> Result<(), KernelBinError> {
        self.processor.run(self.scope.clone());
        self.processor.wait_for_ready(self.scope.clone()).await;
        self.nudger.start(self.messages.broker());

        let envelope = CommandEnvelope::new(
            CommandKind::SpawnProcess {
                process_id: Some(ProcessId::from(COORDINATOR_ID)),
                agent_type: AgentType::Generic,
                workflow_config: None,
            },
            CommandSource::Internal,
            Uuid::new_v4(),
            chrono::Utc::now(),
        );
        let result = self.processor.submit_and_wait(self.scope.clone(), envelope).await?;
        if !result.success {
            let reason = result.error.map(|e| e.to_string()).unwrap_or_else(|| "unknown error".to_string());
            return Err(KernelBinError::Config(format!("coordinator spawn failed: {reason}")));
        }
        tracing::info!("kernel started, coordinator spawned");
        Ok(())
    }

    /// §5 shutdown ordering, idempotent: (1) stop the nudger, (2)
    /// `StopAll` on the process registry, (3) drain the processor, (4)
    /// cancel the root scope.
    pub async fn shutdown(&self) {
        self.nudger.stop();
        self.registry.stop_all().await;
        self.processor.drain().await;
        self.scope.cancel();
        tracing::info!("kernel shut down");
    }
}
