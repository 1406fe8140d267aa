//! The handler seam (§4.F, §4.I). One implementor per command kind,
//! looked up by [`kernel_types::CommandKind::name`].

use async_trait::async_trait;
use kernel_types::{CommandEnvelope, CommandResult};

/// A single command kind's behavioral contract. Handlers never panic;
/// failures are reported through [`CommandResult::err`].
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Execute the command. The processor guarantees no two handler
    /// invocations overlap in time.
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(CommandEnvelope) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = CommandResult> + Send,
{
    async fn handle(&self, envelope: &CommandEnvelope) -> CommandResult {
        (self)(envelope.clone()).await
    }
}
