//! Process Repository (§4.C) — process ID to process record.

use std::collections::HashMap;

use kernel_types::{Process, ProcessId, ProcessStatus};
use tokio::sync::RwLock;

/// Bounded in-memory map from process ID to [`Process`]. The only writer
/// is the Command Processor's single-threaded context; the lock exists
/// to let query tools and the UI read safely from other threads.
#[derive(Default)]
pub struct ProcessRepository {
    processes: RwLock<HashMap<ProcessId, Process>>,
}

impl ProcessRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a process record.
    pub async fn save(&self, process: Process) {
        self.processes.write().await.insert(process.id.clone(), process);
    }

    /// Fetch a snapshot copy of one process record.
    pub async fn get(&self, id: &ProcessId) -> Option<Process> {
        self.processes.read().await.get(id).cloned()
    }

    /// Mutate a process record in place via `f`, if it exists.
    pub async fn update<F>(&self, id: &ProcessId, f: F) -> Option<Process>
    where
        F: FnOnce(&mut Process),
    {
        let mut processes = self.processes.write().await;
        let process = processes.get_mut(id)?;
        f(process);
        Some(process.clone())
    }

    /// Snapshot copy of every process record, including retired ones.
    pub async fn all(&self) -> Vec<Process> {
        self.processes.read().await.values().cloned().collect()
    }

    /// Workers (non-coordinator, non-observer) that are not retired.
    pub async fn active_workers(&self) -> Vec<Process> {
        self.processes
            .read()
            .await
            .values()
            .filter(|p| matches!(p.role, kernel_types::Role::Worker) && !p.is_retired())
            .cloned()
            .collect()
    }

    /// Workers that have been retired.
    pub async fn retired_workers(&self) -> Vec<Process> {
        self.processes
            .read()
            .await
            .values()
            .filter(|p| matches!(p.role, kernel_types::Role::Worker) && p.is_retired())
            .cloned()
            .collect()
    }

    /// Remove a process record entirely (used only by tests/restore; the
    /// normal retirement path keeps the record with `status = Retired`).
    pub async fn remove(&self, id: &ProcessId) -> Option<Process> {
        self.processes.write().await.remove(id)
    }

    /// Count of records currently in a given status.
    pub async fn count_in_status(&self, status: ProcessStatus) -> usize {
        self.processes
            .read()
            .await
            .values()
            .filter(|p| p.status == status)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kernel_types::{AgentType, Role};

    #[tokio::test]
    async fn save_and_get_roundtrip() {
        let repo = ProcessRepository::new();
        let p = Process::new(ProcessId::from("worker-1"), Role::Worker, AgentType::Generic, Utc::now());
        repo.save(p).await;

        let fetched = repo.get(&ProcessId::from("worker-1")).await.unwrap();
        assert_eq!(fetched.id.as_str(), "worker-1");
    }

    #[tokio::test]
    async fn active_and_retired_workers_partition_correctly() {
        let repo = ProcessRepository::new();
        let mut retired = Process::new(ProcessId::from("w1"), Role::Worker, AgentType::Generic, Utc::now());
        retired.status = ProcessStatus::Retired;
        repo.save(retired).await;
        repo.save(Process::new(ProcessId::from("w2"), Role::Worker, AgentType::Generic, Utc::now()))
            .await;

        assert_eq!(repo.active_workers().await.len(), 1);
        assert_eq!(repo.retired_workers().await.len(), 1);
        assert_eq!(repo.all().await.len(), 2);
    }
}
