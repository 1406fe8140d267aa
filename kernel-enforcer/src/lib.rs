//! Turn-Completion Enforcer (§4.K) — per-process record of required-tool
//! calls in the current turn.

#![deny(missing_docs)]

use std::collections::{HashMap, HashSet};

use kernel_types::{ProcessId, Role};
use tokio::sync::Mutex;

/// Reminders are stopped after this many enforcement retries per process.
pub const MAX_RETRIES: u32 = 2;

/// A worker satisfies the turn-completion requirement by calling any one
/// of these tools during its turn.
pub const REQUIRED_TOOLS: &[&str] = &[
    "post_message",
    "report_implementation_complete",
    "report_review_verdict",
    "signal_ready",
];

#[derive(Debug, Clone, Default)]
struct TurnRecord {
    retry_count: u32,
    newly_spawned: bool,
    tools_called: HashSet<String>,
}

/// Tracks, per process, whether the current turn called a required
/// reporting tool. Coordinators are never enforced; the startup turn
/// (newly-spawned flag set) and failed turns are exempt; after
/// [`MAX_RETRIES`] enforcement retries without satisfaction, further
/// turns complete normally without reminders.
///
/// The map is protected by a dedicated mutex (not folded into the
/// process repository) because `record_tool_call` can be invoked from
/// the MCP adapter's serving context before the corresponding command
/// reaches the processor.
#[derive(Default)]
pub struct TurnEnforcer {
    records: Mutex<HashMap<ProcessId, TurnRecord>>,
}

impl TurnEnforcer {
    /// Create an empty enforcer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a process's current turn as its startup turn, exempt from
    /// enforcement.
    pub async fn mark_as_newly_spawned(&self, process_id: &ProcessId) {
        let mut records = self.records.lock().await;
        let record = records.entry(process_id.clone()).or_default();
        record.newly_spawned = true;
    }

    /// Clear the newly-spawned flag and the tool-call set, starting a
    /// fresh turn. Called before each delivery.
    pub async fn reset_turn(&self, process_id: &ProcessId) {
        let mut records = self.records.lock().await;
        let record = records.entry(process_id.clone()).or_default();
        record.newly_spawned = false;
        record.tools_called.clear();
    }

    /// Record that `tool_name` was called during the process's current
    /// turn.
    pub async fn record_tool_call(&self, process_id: &ProcessId, tool_name: &str) {
        let mut records = self.records.lock().await;
        let record = records.entry(process_id.clone()).or_default();
        record.tools_called.insert(tool_name.to_string());
    }

    /// Check whether the current turn satisfied the requirement. Returns
    /// the list of required tools still missing — empty if the role is
    /// exempt, the turn is exempt, or one was called. `succeeded = false`
    /// turns are always exempt (failed turns never enforce).
    pub async fn check_turn_completion(&self, process_id: &ProcessId, role: Role, succeeded: bool) -> Vec<&'static str> {
        if role == Role::Coordinator || !succeeded {
            return Vec::new();
        }
        let records = self.records.lock().await;
        let Some(record) = records.get(process_id) else {
            return Vec::new();
        };
        if record.newly_spawned {
            return Vec::new();
        }
        if record.retry_count >= MAX_RETRIES {
            return Vec::new();
        }
        let satisfied = REQUIRED_TOOLS.iter().any(|t| record.tools_called.contains(*t));
        if satisfied {
            Vec::new()
        } else {
            REQUIRED_TOOLS.to_vec()
        }
    }

    /// Bump the retry counter after sending an enforcement reminder.
    pub async fn increment_retry(&self, process_id: &ProcessId) {
        let mut records = self.records.lock().await;
        let record = records.entry(process_id.clone()).or_default();
        record.retry_count += 1;
    }

    /// Whether another enforcement retry is still permitted.
    pub async fn should_retry(&self, process_id: &ProcessId) -> bool {
        let records = self.records.lock().await;
        records.get(process_id).map(|r| r.retry_count < MAX_RETRIES).unwrap_or(true)
    }

    /// Drop all enforcement state for a process (on retire/replace/stop).
    pub async fn forget(&self, process_id: &ProcessId) {
        self.records.lock().await.remove(process_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn coordinator_is_never_enforced() {
        let enforcer = TurnEnforcer::new();
        let id = ProcessId::from("coordinator");
        let missing = enforcer.check_turn_completion(&id, Role::Coordinator, true).await;
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn newly_spawned_turn_is_exempt() {
        let enforcer = TurnEnforcer::new();
        let id = ProcessId::from("worker-1");
        enforcer.mark_as_newly_spawned(&id).await;
        let missing = enforcer.check_turn_completion(&id, Role::Worker, true).await;
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn missing_required_tool_is_flagged_after_reset() {
        let enforcer = TurnEnforcer::new();
        let id = ProcessId::from("worker-1");
        enforcer.mark_as_newly_spawned(&id).await;
        enforcer.reset_turn(&id).await;
        let missing = enforcer.check_turn_completion(&id, Role::Worker, true).await;
        assert!(!missing.is_empty());
    }

    #[tokio::test]
    async fn calling_any_required_tool_satisfies() {
        let enforcer = TurnEnforcer::new();
        let id = ProcessId::from("worker-1");
        enforcer.reset_turn(&id).await;
        enforcer.record_tool_call(&id, "signal_ready").await;
        let missing = enforcer.check_turn_completion(&id, Role::Worker, true).await;
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn failed_turn_is_exempt() {
        let enforcer = TurnEnforcer::new();
        let id = ProcessId::from("worker-1");
        enforcer.reset_turn(&id).await;
        let missing = enforcer.check_turn_completion(&id, Role::Worker, false).await;
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn retries_cap_at_two() {
        let enforcer = TurnEnforcer::new();
        let id = ProcessId::from("worker-1");
        enforcer.reset_turn(&id).await;
        enforcer.increment_retry(&id).await;
        enforcer.increment_retry(&id).await;
        assert!(!enforcer.should_retry(&id).await);
        let missing = enforcer.check_turn_completion(&id, Role::Worker, true).await;
        assert!(missing.is_empty());
    }
}
