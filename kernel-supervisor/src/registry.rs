//! `ProcessRegistry` (§4.G) — in-memory map from process ID to the
//! [`HeadlessProcess`] the supervisor is driving for it.

use std::collections::HashMap;
use std::sync::Arc;

use kernel_types::ProcessId;
use tokio::sync::RwLock;

use crate::headless_process::HeadlessProcess;

/// Owns every live `HeadlessProcess`. Registry operations are short
/// critical sections; each `HeadlessProcess` has its own internal
/// synchronization, so holding the registry lock never blocks on child
/// I/O.
#[derive(Default)]
pub struct ProcessRegistry {
    processes: RwLock<HashMap<ProcessId, Arc<HeadlessProcess>>>,
}

impl ProcessRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `process_id`. Replacing is how
    /// `MessageDeliverer` swaps in a resumed child without changing the
    /// process's identity as seen by the rest of the system.
    pub async fn register(&self, process_id: ProcessId, process: Arc<HeadlessProcess>) {
        self.processes.write().await.insert(process_id, process);
    }

    /// Look up the current `HeadlessProcess` for `process_id`.
    pub async fn get(&self, process_id: &ProcessId) -> Option<Arc<HeadlessProcess>> {
        self.processes.read().await.get(process_id).cloned()
    }

    /// Remove and return the entry for `process_id`, if any. Does not
    /// cancel it; callers that want termination should `cancel().await`
    /// the returned handle.
    pub async fn remove(&self, process_id: &ProcessId) -> Option<Arc<HeadlessProcess>> {
        self.processes.write().await.remove(process_id)
    }

    /// Number of entries currently registered.
    pub async fn count(&self) -> usize {
        self.processes.read().await.len()
    }

    /// Cancel and remove every registered process. Called during
    /// shutdown, before the Command Processor drains.
    pub async fn stop_all(&self) {
        let drained: Vec<Arc<HeadlessProcess>> = {
            let mut guard = self.processes.write().await;
            guard.drain().map(|(_, p)| p).collect()
        };
        for process in drained {
            process.cancel().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_parser::demo_vendor::DemoVendorParser;
    use std::process::Stdio;

    fn spawn_sleep_child() -> tokio::process::Child {
        tokio::process::Command::new("sleep")
            .arg("30")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn sleep")
    }

    #[tokio::test]
    async fn register_get_remove_round_trip() {
        let registry = ProcessRegistry::new();
        let id = ProcessId::from("worker-1");
        let child = spawn_sleep_child();
        let process = HeadlessProcess::spawn(
            child,
            std::sync::Arc::new(DemoVendorParser::default()),
            |_| {},
            |_| {},
        );

        registry.register(id.clone(), process.clone()).await;
        assert_eq!(registry.count().await, 1);
        assert!(registry.get(&id).await.is_some());

        let removed = registry.remove(&id).await;
        assert!(removed.is_some());
        assert_eq!(registry.count().await, 0);
        removed.unwrap().cancel().await;
    }

    #[tokio::test]
    async fn stop_all_cancels_every_registered_process() {
        let registry = ProcessRegistry::new();
        for i in 0..3 {
            let id = ProcessId::from(format!("worker-{i}"));
            let child = spawn_sleep_child();
            let process = HeadlessProcess::spawn(
                child,
                std::sync::Arc::new(DemoVendorParser::default()),
                |_| {},
                |_| {},
            );
            registry.register(id, process).await;
        }
        registry.stop_all().await;
        assert_eq!(registry.count().await, 0);
    }
}
