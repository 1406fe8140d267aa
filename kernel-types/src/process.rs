//! The Process record (§3) — owned exclusively by the Process Repository;
//! handlers are the only mutators.

use crate::id::{ProcessId, SessionRef, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What role a process plays in the workflow.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The singleton coordinator, process id `"coordinator"`.
    Coordinator,
    /// A worker that implements, reviews, or researches.
    Worker,
    /// A read-only observer (never enforced by the turn-completion enforcer).
    Observer,
}

/// Lifecycle status of a supervised process. See the state machine in
/// §4.G of the spec.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Allocated but the spawner hasn't been invoked yet.
    Pending,
    /// Spawner invoked; waiting for the first `system/init` event.
    Starting,
    /// Idle, no turn in flight.
    Ready,
    /// A turn is in flight.
    Working,
    /// Cooperatively suspended; excluded from delivery until resumed.
    Paused,
    /// Stopped and removed from the registry.
    Retired,
    /// Unrecoverable spawn error, timeout, or vendor error.
    Failed,
}

/// Specialization of a worker process. Informs prompt assembly and which
/// required-tool set the turn-completion enforcer checks.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// No specialization.
    Generic,
    /// Implements tasks.
    Implementer,
    /// Reviews implementations.
    Reviewer,
    /// Researches without implementing.
    Researcher,
}

impl AgentType {
    /// Parse from the MCP tool surface's `agent_type` string. Empty string
    /// maps to `Generic`; an unrecognized non-empty value is a validation
    /// error (per §4.I `SpawnProcess` edge-case policy).
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "" => Ok(Self::Generic),
            "generic" => Ok(Self::Generic),
            "implementer" => Ok(Self::Implementer),
            "reviewer" => Ok(Self::Reviewer),
            "researcher" => Ok(Self::Researcher),
            other => Err(format!("invalid agent_type: {other}")),
        }
    }
}

/// Accumulated token usage and cost for a process across its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    /// Cumulative input tokens.
    pub input_tokens: u64,
    /// Cumulative output tokens.
    pub output_tokens: u64,
    /// Cumulative cache-read input tokens.
    pub cache_read_tokens: u64,
    /// Cumulative cache-creation input tokens.
    pub cache_creation_tokens: u64,
    /// Cumulative cost in USD (as provided by the vendor's `result` event).
    pub total_cost_usd: f64,
    /// Number of turns completed.
    pub turns_completed: u64,
}

impl ProcessMetrics {
    /// Fold in usage reported by one turn.
    pub fn accumulate(
        &mut self,
        input: u64,
        output: u64,
        cache_read: u64,
        cache_creation: u64,
        cost_usd: f64,
    ) {
        self.input_tokens += input;
        self.output_tokens += output;
        self.cache_read_tokens += cache_read;
        self.cache_creation_tokens += cache_creation;
        self.total_cost_usd += cost_usd;
        self.turns_completed += 1;
    }
}

/// A supervised process record (§3 Process). Created when `SpawnProcess`
/// runs; mutated only by command handlers; destroyed (status set to
/// `Retired`) by `RetireProcess`/`StopProcess`.
///
/// Invariant: a process in status `Ready` has no `task_id`; a process in
/// status `Working` may or may not have one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    /// `"coordinator"` or an auto-generated worker id.
    pub id: ProcessId,
    /// Coordinator, worker, or observer.
    pub role: Role,
    /// Current lifecycle status.
    pub status: ProcessStatus,
    /// Optional workflow phase tag, set by `TransitionPhase`.
    pub phase: Option<String>,
    /// Specialization.
    pub agent_type: AgentType,
    /// Opaque vendor session identifier. Empty until the first `system/init`
    /// event of the current spawn.
    pub session_ref: Option<SessionRef>,
    /// Current task assignment, if any.
    pub task_id: Option<TaskId>,
    /// Accumulated token/cost metrics.
    pub metrics: ProcessMetrics,
    /// When the process was created (`SpawnProcess` ran).
    pub created_at: DateTime<Utc>,
    /// When the process was retired, if it has been.
    pub retired_at: Option<DateTime<Utc>>,
}

impl Process {
    /// Construct a freshly spawned process record in `Pending` status.
    pub fn new(id: ProcessId, role: Role, agent_type: AgentType, now: DateTime<Utc>) -> Self {
        Self {
            id,
            role,
            status: ProcessStatus::Pending,
            phase: None,
            agent_type,
            session_ref: None,
            task_id: None,
            metrics: ProcessMetrics::default(),
            created_at: now,
            retired_at: None,
        }
    }

    /// Whether this process can still receive `SendToProcess` deliveries.
    pub fn is_deliverable(&self) -> bool {
        matches!(
            self.status,
            ProcessStatus::Ready | ProcessStatus::Working | ProcessStatus::Starting
        )
    }

    /// Whether this process is retired (removed from the supervisor's
    /// registry, terminal in the state machine).
    pub fn is_retired(&self) -> bool {
        self.status == ProcessStatus::Retired
    }
}
