//! `MessageDeliverer` (§4.G session-resume semantics) — delivering content
//! to a running AI process means spawning a fresh child in "resume" mode
//! and swapping it into the registry; the vendor CLIs are not long-lived
//! REPLs that accept stdin mid-turn.

use std::collections::HashMap;
use std::sync::Arc;

use kernel_types::{KernelError, ProcessId, ProcessStatus};

use crate::headless_process::HeadlessProcess;
use crate::registry::ProcessRegistry;
use crate::spawn::{SpawnRequest, Turn};
use crate::spawner::ProcessSpawner;

/// Delivers a message to an already-spawned process by resuming its
/// vendor session in a new child invocation, hiding the per-send
/// subprocess churn behind one stable process identity.
pub struct MessageDeliverer {
    registry: Arc<ProcessRegistry>,
    spawner: Arc<ProcessSpawner>,
}

impl MessageDeliverer {
    /// Pair a deliverer with the registry and spawner it coordinates.
    pub fn new(registry: Arc<ProcessRegistry>, spawner: Arc<ProcessSpawner>) -> Self {
        Self { registry, spawner }
    }

    /// Resume `process_id`'s session with `message` as the new prompt.
    /// The previous `HeadlessProcess` is cancelled and replaced in the
    /// registry with the freshly spawned one; the process's own status
    /// transitions to `working` for the duration of the new turn.
    pub async fn deliver(
        &self,
        process_id: &ProcessId,
        role: kernel_types::Role,
        agent_type: kernel_types::AgentType,
        message: String,
    ) -> Result<Arc<HeadlessProcess>, KernelError> {
        let previous = self
            .registry
            .get(process_id)
            .await
            .ok_or_else(|| KernelError::Validation(format!("no such process: {process_id}")))?;

        let session_ref = previous
            .session_ref()
            .ok_or_else(|| KernelError::Validation(format!("{process_id} has no session to resume")))?;

        let req = SpawnRequest {
            process_id: process_id.clone(),
            role,
            agent_type,
            turn: Turn::Resume { session_ref, message },
            env: HashMap::new(),
            work_dir: None,
        };

        let next = self.spawner.spawn(req).await?;
        next.set_status(ProcessStatus::Working);
        previous.cancel().await;
        Ok(next)
    }
}
