use kernel::{Kernel, KernelConfig};
use kernel_types::{ProcessStatus, COORDINATOR_ID};

fn test_config() -> KernelConfig {
    let mut config = KernelConfig::default();
    config.vendor.executable_paths = vec![std::path::PathBuf::from("/bin/true")];
    config.vendor.executable_name = "true".to_string();
    config.nudger.debounce_ms = 10;
    config
}

#[tokio::test]
async fn start_spawns_coordinator_and_shutdown_is_idempotent() {
    let kernel = Kernel::build(&test_config()).await.unwrap();
    kernel.start().await.unwrap();

    let coordinator = kernel.processes.get(&kernel_types::ProcessId::from(COORDINATOR_ID)).await.unwrap();
    assert_eq!(coordinator.role, kernel_types::Role::Coordinator);
    assert!(matches!(coordinator.status, ProcessStatus::Starting | ProcessStatus::Ready));

    kernel.shutdown().await;
    kernel.shutdown().await;
}

#[tokio::test]
async fn rejects_invalid_config_before_building_anything() {
    let mut config = test_config();
    config.queue_depth = 0;
    let result = Kernel::build(&config).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn worker_spawn_registers_in_process_repository() {
    let kernel = Kernel::build(&test_config()).await.unwrap();
    kernel.start().await.unwrap();

    let envelope = kernel_types::CommandEnvelope::new(
        kernel_types::CommandKind::SpawnProcess {
            process_id: Some(kernel_types::ProcessId::from("worker-1")),
            agent_type: kernel_types::AgentType::Implementer,
            workflow_config: None,
        },
        kernel_types::CommandSource::Internal,
        uuid::Uuid::new_v4(),
        chrono::Utc::now(),
    );
    let result = kernel.processor.submit_and_wait(kernel.scope.clone(), envelope).await.unwrap();
    assert!(result.success);

    let worker = kernel.processes.get(&kernel_types::ProcessId::from("worker-1")).await.unwrap();
    assert_eq!(worker.role, kernel_types::Role::Worker);
    assert_eq!(worker.agent_type, kernel_types::AgentType::Implementer);

    kernel.shutdown().await;
}
