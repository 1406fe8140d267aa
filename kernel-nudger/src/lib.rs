//! Coordinator Nudger (§4.L) — a debounced batcher subscribed to the
//! Message Repository's broker, collapsing bursts of worker→coordinator
//! notifications into consolidated `SendToProcess` commands.

#![deny(missing_docs)]

pub mod clock;

use std::collections::HashMap;
use std::future::pending;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kernel_bus::Bus;
use kernel_types::{
    CommandEnvelope, CommandKind, CommandSource, CommandSubmitter, KernelEvent, MessageKind,
    ProcessId, COORDINATOR_ID,
};
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use clock::{Clock, ManualClock, TokioClock};

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// True if an entry should be batched: routed to the coordinator or to
/// everyone, and not itself sent by the coordinator.
fn is_nudge_worthy(from: &str, to: &kernel_types::RouteTarget) -> bool {
    if from == COORDINATOR_ID {
        return false;
    }
    matches!(to, kernel_types::RouteTarget::Coordinator | kernel_types::RouteTarget::All)
}

/// Debounced batcher. Subscribes to a bus of [`KernelEvent`] (the Message
/// Repository's broker), and on each relevant `EntryPosted` event, arms
/// (or re-arms) a single timer. When it fires, workers are grouped by
/// message kind — most recent kind wins if a worker posted more than one
/// — and one `SendToProcess` command per non-empty group is submitted to
/// the coordinator, with sorted worker IDs in the form
/// `[worker-1, worker-2 sent messages] Use read_message_log to check for
/// new messages.`
pub struct Nudger<C: Clock = TokioClock> {
    clock: Arc<C>,
    debounce: Duration,
    submitter: Arc<dyn CommandSubmitter>,
    pending: Arc<Mutex<HashMap<ProcessId, MessageKind>>>,
    stop_token: CancellationToken,
    started: AtomicBool,
}

impl Nudger<TokioClock> {
    /// Construct a nudger with the real-time clock and the default
    /// debounce window.
    pub fn new(submitter: Arc<dyn CommandSubmitter>) -> Self {
        Self::with_clock(submitter, TokioClock, DEFAULT_DEBOUNCE)
    }
}

impl<C: Clock> Nudger<C> {
    /// Construct a nudger with an injected clock and debounce window,
    /// for deterministic tests.
    pub fn with_clock(submitter: Arc<dyn CommandSubmitter>, clock: C, debounce: Duration) -> Self {
        Self {
            clock: Arc::new(clock),
            debounce,
            submitter,
            pending: Arc::new(Mutex::new(HashMap::new())),
            stop_token: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Subscribe to `broker` and start the debounce loop. Idempotent: a
    /// second call is a no-op.
    pub fn start(self: &Arc<Self>, broker: &Bus<KernelEvent>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut stream = broker.subscribe(self.stop_token.clone());
        let this = self.clone();

        tokio::spawn(async move {
            let mut timer: Option<Pin<Box<C::Sleep>>> = None;

            loop {
                tokio::select! {
                    biased;
                    _ = this.stop_token.cancelled() => break,
                    maybe_event = stream.next() => {
                        match maybe_event {
                            Some(KernelEvent::EntryPosted(entry)) => {
                                if is_nudge_worthy(&entry.from, &entry.to) {
                                    this.pending.lock().await.insert(ProcessId::from(entry.from.clone()), entry.kind);
                                    if timer.is_none() {
                                        timer = Some(Box::pin(this.clock.sleep(this.debounce)));
                                    }
                                }
                            }
                            Some(_) => {}
                            None => break,
                        }
                    }
                    _ = async {
                        match &mut timer {
                            Some(t) => t.as_mut().await,
                            None => pending::<()>().await,
                        }
                    }, if timer.is_some() => {
                        timer = None;
                        this.fire().await;
                    }
                }
            }
        });
    }

    async fn fire(&self) {
        let snapshot: HashMap<ProcessId, MessageKind> = {
            let mut pending = self.pending.lock().await;
            std::mem::take(&mut *pending)
        };
        if snapshot.is_empty() {
            return;
        }

        let mut groups: HashMap<MessageKind, Vec<String>> = HashMap::new();
        for (worker, kind) in snapshot {
            groups.entry(kind).or_default().push(worker.as_str().to_string());
        }

        for (_kind, mut workers) in groups {
            workers.sort();
            let sentence =
                format!("[{} sent messages] Use read_message_log to check for new messages.", workers.join(", "));
            let envelope = CommandEnvelope::new(
                CommandKind::SendToProcess {
                    worker_id: ProcessId::from(COORDINATOR_ID),
                    message: sentence,
                },
                CommandSource::Internal,
                Uuid::new_v4(),
                Utc::now(),
            );
            if let Err(err) = self.submitter.submit(envelope) {
                tracing::warn!(%err, "nudger failed to submit consolidated nudge");
            }
        }
    }

    /// Idempotent; safe to call before `start`. Drains any in-flight
    /// timer by cancelling the subscription scope, which ends the loop.
    pub fn stop(&self) {
        self.stop_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_types::{MessageLogEntry, RouteTarget};
    use std::sync::Mutex as StdMutex;

    struct RecordingSubmitter {
        received: StdMutex<Vec<CommandEnvelope>>,
    }

    impl CommandSubmitter for RecordingSubmitter {
        fn submit(&self, envelope: CommandEnvelope) -> Result<(), kernel_types::KernelError> {
            self.received.lock().unwrap().push(envelope);
            Ok(())
        }
    }

    fn entry(from: &str, to: RouteTarget, kind: MessageKind) -> MessageLogEntry {
        MessageLogEntry::new(from, to, "body", kind, Utc::now(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn debounced_burst_yields_one_sorted_nudge_per_kind() {
        let bus: Bus<KernelEvent> = Bus::default();
        let submitter = Arc::new(RecordingSubmitter { received: StdMutex::new(Vec::new()) });
        let clock = ManualClock::new();
        let nudger = Arc::new(Nudger::with_clock(submitter.clone(), clock.clone(), Duration::from_secs(1)));
        nudger.start(&bus);

        bus.publish(KernelEvent::EntryPosted(entry("worker-2", RouteTarget::Coordinator, MessageKind::WorkerReady)));
        bus.publish(KernelEvent::EntryPosted(entry("worker-1", RouteTarget::All, MessageKind::WorkerReady)));
        tokio::task::yield_now().await;

        clock.fire_all().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let received = submitter.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        match &received[0].kind {
            CommandKind::SendToProcess { message, .. } => {
                assert_eq!(
                    message,
                    "[worker-1, worker-2 sent messages] Use read_message_log to check for new messages."
                );
            }
            _ => panic!("expected SendToProcess"),
        }
    }

    #[tokio::test]
    async fn three_worker_burst_yields_the_exact_nudge_sentence() {
        let bus: Bus<KernelEvent> = Bus::default();
        let submitter = Arc::new(RecordingSubmitter { received: StdMutex::new(Vec::new()) });
        let clock = ManualClock::new();
        let nudger = Arc::new(Nudger::with_clock(submitter.clone(), clock.clone(), Duration::from_secs(1)));
        nudger.start(&bus);

        bus.publish(KernelEvent::EntryPosted(entry("worker-1", RouteTarget::Coordinator, MessageKind::Info)));
        tokio::task::yield_now().await;
        bus.publish(KernelEvent::EntryPosted(entry("worker-2", RouteTarget::Coordinator, MessageKind::Info)));
        tokio::task::yield_now().await;
        bus.publish(KernelEvent::EntryPosted(entry("worker-3", RouteTarget::Coordinator, MessageKind::Info)));
        tokio::task::yield_now().await;

        clock.fire_all().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let received = submitter.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        match &received[0].kind {
            CommandKind::SendToProcess { worker_id, message } => {
                assert_eq!(worker_id.as_str(), COORDINATOR_ID);
                assert_eq!(
                    message,
                    "[worker-1, worker-2, worker-3 sent messages] Use read_message_log to check for new messages."
                );
            }
            _ => panic!("expected SendToProcess"),
        }
    }

    #[tokio::test]
    async fn coordinator_originated_messages_are_not_nudge_worthy() {
        assert!(!is_nudge_worthy(COORDINATOR_ID, &RouteTarget::All));
        assert!(is_nudge_worthy("worker-1", &RouteTarget::Coordinator));
        assert!(!is_nudge_worthy("worker-1", &RouteTarget::Process("worker-2".to_string())));
    }

    #[tokio::test]
    async fn stop_before_start_is_a_safe_no_op() {
        let bus: Bus<KernelEvent> = Bus::default();
        let submitter = Arc::new(RecordingSubmitter { received: StdMutex::new(Vec::new()) });
        let nudger = Arc::new(Nudger::with_clock(submitter, ManualClock::new(), Duration::from_secs(1)));
        nudger.stop();
        nudger.stop();
        nudger.start(&bus);
    }
}
