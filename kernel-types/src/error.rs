//! Error taxonomy (§7). One kind per disposition, not per failing call site.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kernel-wide error kinds. Every handler, adapter, and supervisor error
/// collapses into one of these — the disposition (§7) is what callers act on,
/// not the originating subsystem.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum KernelError {
    /// Bad input on a command or tool call. Returned to caller; never retried.
    #[error("validation: {0}")]
    Validation(String),

    /// Submission queue or per-process queue at capacity.
    #[error("queue full: {0}")]
    QueueFull(String),

    /// No handler registered for the command kind.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A handler reached a failure outcome.
    #[error("handler failed: {0}")]
    HandlerFailure(String),

    /// Subprocess spawn/exit/I-O failure.
    #[error("transport: {0}")]
    Transport(String),

    /// Unparseable vendor event. Does not terminate the process.
    #[error("parse: {0}")]
    Parse(String),

    /// Vendor signalled context-window overflow.
    #[error("context window exceeded")]
    ContextExceeded,

    /// Vendor rate limit.
    #[error("rate limited")]
    RateLimited,

    /// `SubmitAndWait` deadline elapsed. The command may still complete
    /// server-side.
    #[error("timeout waiting for command result")]
    Timeout,

    /// The processor (or the scope governing a call) is not running / was
    /// cancelled.
    #[error("not running")]
    NotRunning,

    /// Catch-all for errors that don't fit a named kind.
    #[error("{0}")]
    Other(String),
}

impl KernelError {
    /// Short machine-stable discriminant, used in structured log fields and
    /// MCP error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::QueueFull(_) => "queue_full",
            Self::UnknownCommand(_) => "unknown_command",
            Self::HandlerFailure(_) => "handler_failure",
            Self::Transport(_) => "transport",
            Self::Parse(_) => "parse",
            Self::ContextExceeded => "context_exceeded",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::NotRunning => "not_running",
            Self::Other(_) => "other",
        }
    }
}
