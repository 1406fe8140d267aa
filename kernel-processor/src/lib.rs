//! The Command Processor (§4.F): single-consumer FIFO channel, handler
//! registry, and the kernel's built-in middleware chain (tracing,
//! structured logging, command-log publishing, slow-handler warning, and
//! optional content-hash deduplication).

#![deny(missing_docs)]

pub mod dedup;
pub mod handler;
pub mod processor;

pub use dedup::Deduplicator;
pub use handler::CommandHandler;
pub use processor::{CommandProcessor, ProcessorConfig, DEFAULT_QUEUE_DEPTH, DEFAULT_SLOW_HANDLER_THRESHOLD};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kernel_bus::Bus;
    use kernel_types::{CommandEnvelope, CommandKind, CommandResult, CommandSource, ProcessId, AgentType};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    struct EchoHandler;

    #[async_trait]
    impl CommandHandler for EchoHandler {
        async fn handle(&self, _envelope: &CommandEnvelope) -> CommandResult {
            CommandResult::ok()
        }
    }

    fn spawn_cmd() -> CommandEnvelope {
        CommandEnvelope::new(
            CommandKind::SpawnProcess {
                process_id: Some(ProcessId::from("worker-1")),
                agent_type: AgentType::Generic,
                workflow_config: None,
            },
            CommandSource::Internal,
            Uuid::new_v4(),
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn submit_and_wait_returns_handler_result() {
        let bus: Bus<kernel_types::KernelEvent> = Bus::default();
        let processor = CommandProcessor::new(bus, ProcessorConfig::default());
        processor.register_handler("spawn_process", Arc::new(EchoHandler)).await;

        let scope = CancellationToken::new();
        processor.run(scope.clone());
        processor.wait_for_ready(scope.clone()).await;

        let result = processor.submit_and_wait(scope.clone(), spawn_cmd()).await.unwrap();
        assert!(result.success);
        assert_eq!(processor.processed_count(), 1);
    }

    #[tokio::test]
    async fn unknown_command_kind_yields_error_result() {
        let bus: Bus<kernel_types::KernelEvent> = Bus::default();
        let processor = CommandProcessor::new(bus, ProcessorConfig::default());

        let scope = CancellationToken::new();
        processor.run(scope.clone());
        processor.wait_for_ready(scope.clone()).await;

        let result = processor.submit_and_wait(scope.clone(), spawn_cmd()).await.unwrap();
        assert!(!result.success);
        assert_eq!(processor.error_count(), 1);
    }

    #[tokio::test]
    async fn submit_after_stop_is_rejected() {
        let bus: Bus<kernel_types::KernelEvent> = Bus::default();
        let processor = CommandProcessor::new(bus, ProcessorConfig::default());
        processor.register_handler("spawn_process", Arc::new(EchoHandler)).await;

        let scope = CancellationToken::new();
        processor.run(scope.clone());
        processor.wait_for_ready(scope.clone()).await;
        processor.stop().await;

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(processor.submit(spawn_cmd()).is_err());
    }

    #[tokio::test]
    async fn drain_processes_remaining_queue_then_stops_accepting() {
        let bus: Bus<kernel_types::KernelEvent> = Bus::default();
        let processor = CommandProcessor::new(bus, ProcessorConfig::default());
        processor.register_handler("spawn_process", Arc::new(EchoHandler)).await;

        let scope = CancellationToken::new();
        processor.run(scope.clone());
        processor.wait_for_ready(scope.clone()).await;

        processor.submit(spawn_cmd()).unwrap();
        processor.drain().await;

        assert_eq!(processor.processed_count(), 1);
        assert!(!processor.is_running());
    }
}
