//! Command Handlers (§4.I): one struct per [`kernel_types::CommandKind`]
//! variant, each holding a shared [`HandlerContext`] and implementing
//! [`kernel_processor::CommandHandler`].

#![deny(missing_docs)]

pub mod callbacks;
pub mod context;
pub mod lifecycle;
pub mod messaging;
pub mod task_assignment;

#[cfg(test)]
mod tests_support;

use std::sync::Arc;

use kernel_processor::CommandProcessor;

pub use context::{HandlerContext, IssueExecutor, NoopIssueExecutor};

/// Construct every handler and register it under its stable kind name
/// (matching [`kernel_types::CommandKind::name`]) on `processor`.
pub async fn register_all(processor: &Arc<CommandProcessor>, ctx: Arc<HandlerContext>) {
    use callbacks::{
        NotifyUserHandler, ProcessTurnCompleteHandler, ReportCompleteHandler, ReportVerdictHandler,
        SignalWorkflowCompleteHandler, TransitionPhaseHandler,
    };
    use lifecycle::{ReplaceProcessHandler, RetireProcessHandler, SpawnProcessHandler, StopProcessHandler};
    use messaging::{BroadcastHandler, DeliverProcessQueuedHandler, PostMessageHandler, SendToProcessHandler};
    use task_assignment::{
        ApproveCommitHandler, AssignReviewFeedbackHandler, AssignReviewHandler, AssignTaskHandler,
        MarkTaskCompleteHandler, MarkTaskFailedHandler,
    };

    processor.register_handler("spawn_process", Arc::new(SpawnProcessHandler::new(ctx.clone()))).await;
    processor.register_handler("retire_process", Arc::new(RetireProcessHandler::new(ctx.clone()))).await;
    processor.register_handler("replace_process", Arc::new(ReplaceProcessHandler::new(ctx.clone()))).await;
    processor.register_handler("stop_process", Arc::new(StopProcessHandler::new(ctx.clone()))).await;

    processor.register_handler("send_to_process", Arc::new(SendToProcessHandler::new(ctx.clone()))).await;
    processor.register_handler("broadcast", Arc::new(BroadcastHandler::new(ctx.clone()))).await;
    processor
        .register_handler("deliver_process_queued", Arc::new(DeliverProcessQueuedHandler::new(ctx.clone())))
        .await;
    processor.register_handler("post_message", Arc::new(PostMessageHandler::new(ctx.clone()))).await;

    processor.register_handler("assign_task", Arc::new(AssignTaskHandler::new(ctx.clone()))).await;
    processor.register_handler("assign_review", Arc::new(AssignReviewHandler::new(ctx.clone()))).await;
    processor
        .register_handler("assign_review_feedback", Arc::new(AssignReviewFeedbackHandler::new(ctx.clone())))
        .await;
    processor.register_handler("approve_commit", Arc::new(ApproveCommitHandler::new(ctx.clone()))).await;
    processor
        .register_handler("mark_task_complete", Arc::new(MarkTaskCompleteHandler::new(ctx.clone())))
        .await;
    processor.register_handler("mark_task_failed", Arc::new(MarkTaskFailedHandler::new(ctx.clone()))).await;

    processor.register_handler("report_complete", Arc::new(ReportCompleteHandler::new(ctx.clone()))).await;
    processor.register_handler("report_verdict", Arc::new(ReportVerdictHandler::new(ctx.clone()))).await;
    processor.register_handler("transition_phase", Arc::new(TransitionPhaseHandler::new(ctx.clone()))).await;
    processor
        .register_handler("signal_workflow_complete", Arc::new(SignalWorkflowCompleteHandler::new(ctx.clone())))
        .await;
    processor.register_handler("notify_user", Arc::new(NotifyUserHandler::new(ctx.clone()))).await;
    processor
        .register_handler("process_turn_complete", Arc::new(ProcessTurnCompleteHandler::new(ctx)))
        .await;
}
