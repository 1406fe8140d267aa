//! Task Repository (§4.D) — task ID to assignment record.

use std::collections::HashMap;

use kernel_types::{TaskAssignment, TaskId};
use tokio::sync::RwLock;

/// Bounded in-memory map from task ID to [`TaskAssignment`].
#[derive(Default)]
pub struct TaskRepository {
    tasks: RwLock<HashMap<TaskId, TaskAssignment>>,
}

impl TaskRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a task assignment.
    pub async fn save(&self, task: TaskAssignment) {
        self.tasks.write().await.insert(task.id.clone(), task);
    }

    /// Fetch a snapshot copy of one task assignment.
    pub async fn get(&self, id: &TaskId) -> Option<TaskAssignment> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Mutate a task assignment in place via `f`, if it exists.
    pub async fn update<F>(&self, id: &TaskId, f: F) -> Option<TaskAssignment>
    where
        F: FnOnce(&mut TaskAssignment),
    {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(id)?;
        f(task);
        Some(task.clone())
    }

    /// Snapshot copy of every task assignment.
    pub async fn all(&self) -> Vec<TaskAssignment> {
        self.tasks.read().await.values().cloned().collect()
    }

    /// Task assignments that have not reached a terminal status.
    pub async fn in_flight(&self) -> Vec<TaskAssignment> {
        self.tasks
            .read()
            .await
            .values()
            .filter(|t| !t.is_terminal())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kernel_types::ProcessId;

    #[tokio::test]
    async fn save_get_and_update() {
        let repo = TaskRepository::new();
        repo.save(TaskAssignment::new(
            TaskId::from("task-1"),
            ProcessId::from("worker-1"),
            None,
            Utc::now(),
        ))
        .await;

        let updated = repo
            .update(&TaskId::from("task-1"), |t| {
                t.status = kernel_types::TaskStatus::InImplementation;
            })
            .await
            .unwrap();
        assert_eq!(updated.status, kernel_types::TaskStatus::InImplementation);

        assert_eq!(repo.in_flight().await.len(), 1);
    }
}
