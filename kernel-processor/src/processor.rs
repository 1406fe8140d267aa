//! The Command Processor (§4.F) — single-consumer FIFO + handler
//! registry + built-in middleware chain; the sole writer of every
//! repository in the kernel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kernel_bus::Bus;
use kernel_types::{CommandEnvelope, CommandResult, CommandSubmitter, KernelError, KernelEvent};
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::dedup::Deduplicator;
use crate::handler::CommandHandler;

/// Default bounded submission queue depth.
pub const DEFAULT_QUEUE_DEPTH: usize = 1000;

/// Logged (not enforced) threshold above which a handler invocation is
/// flagged by the slow-handler warner.
pub const DEFAULT_SLOW_HANDLER_THRESHOLD: Duration = Duration::from_secs(5);

struct QueueItem {
    envelope: CommandEnvelope,
    responder: Option<oneshot::Sender<CommandResult>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Configuration knobs for [`CommandProcessor::new`].
pub struct ProcessorConfig {
    /// Bounded submission queue depth.
    pub queue_depth: usize,
    /// Threshold above which the slow-handler warner logs.
    pub slow_handler_threshold: Duration,
    /// Optional content-hash deduplication window. `None` disables it.
    pub dedup_ttl: Option<Duration>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            slow_handler_threshold: DEFAULT_SLOW_HANDLER_THRESHOLD,
            dedup_ttl: None,
        }
    }
}

/// Contract: for every command that is `submit`-ted and accepted, exactly
/// one handler invocation occurs, and no two handler invocations overlap
/// in time.
pub struct CommandProcessor {
    handlers: Mutex<HashMap<&'static str, Arc<dyn CommandHandler>>>,
    tx: mpsc::Sender<QueueItem>,
    rx: Mutex<Option<mpsc::Receiver<QueueItem>>>,
    bus: Bus<KernelEvent>,
    mode: std::sync::Mutex<Mode>,
    stop_token: CancellationToken,
    accepting: AtomicBool,
    ready: Notify,
    ready_fired: AtomicBool,
    exited: Notify,
    exited_flag: AtomicBool,
    wake: Notify,
    queue_len: AtomicI64,
    processed_count: AtomicU64,
    error_count: AtomicU64,
    slow_handler_threshold: Duration,
    dedup: Option<Deduplicator>,
}

impl CommandProcessor {
    /// Construct a processor wired to `bus` with `config`. Call
    /// [`Self::register_handler`] for every command kind before
    /// [`Self::run`].
    pub fn new(bus: Bus<KernelEvent>, config: ProcessorConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        Arc::new(Self {
            handlers: Mutex::new(HashMap::new()),
            tx,
            rx: Mutex::new(Some(rx)),
            bus,
            mode: std::sync::Mutex::new(Mode::Idle),
            stop_token: CancellationToken::new(),
            accepting: AtomicBool::new(false),
            ready: Notify::new(),
            ready_fired: AtomicBool::new(false),
            exited: Notify::new(),
            exited_flag: AtomicBool::new(false),
            wake: Notify::new(),
            queue_len: AtomicI64::new(0),
            processed_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            slow_handler_threshold: config.slow_handler_threshold,
            dedup: config.dedup_ttl.map(Deduplicator::new),
        })
    }

    /// Register a handler for one command kind. Must be called before
    /// [`Self::run`].
    pub async fn register_handler(&self, kind_name: &'static str, handler: Arc<dyn CommandHandler>) {
        self.handlers.lock().await.insert(kind_name, handler);
    }

    /// Idempotent start. Spawns the main loop, which runs until `scope`
    /// is cancelled or [`Self::drain`] empties the queue. Fires the ready
    /// signal once the loop is accepting commands.
    pub fn run(self: &Arc<Self>, scope: CancellationToken) {
        {
            let mut mode = self.mode.lock().expect("processor mode mutex poisoned");
            if *mode != Mode::Idle {
                return;
            }
            *mode = Mode::Running;
        }
        self.accepting.store(true, Ordering::SeqCst);

        let this = self.clone();
        tokio::spawn(async move {
            this.run_loop(scope).await;
        });
    }

    async fn run_loop(self: Arc<Self>, scope: CancellationToken) {
        let mut rx = self
            .rx
            .lock()
            .await
            .take()
            .expect("run called more than once on the same processor");

        if !self.ready_fired.swap(true, Ordering::SeqCst) {
            self.ready.notify_waiters();
        }

        loop {
            if *self.mode.lock().expect("mode mutex poisoned") == Mode::Stopped {
                break;
            }

            let draining = *self.mode.lock().expect("mode mutex poisoned") == Mode::Draining;

            tokio::select! {
                biased;
                _ = scope.cancelled() => {
                    self.accepting.store(false, Ordering::SeqCst);
                    *self.mode.lock().expect("mode mutex poisoned") = Mode::Stopped;
                    break;
                }
                _ = self.stop_token.cancelled(), if !draining => {
                    *self.mode.lock().expect("mode mutex poisoned") = Mode::Stopped;
                    break;
                }
                _ = self.wake.notified() => {}
                item = rx.recv() => {
                    match item {
                        Some(item) => {
                            self.queue_len.fetch_sub(1, Ordering::SeqCst);
                            self.execute(item).await;
                        }
                        None => {
                            *self.mode.lock().expect("mode mutex poisoned") = Mode::Stopped;
                            break;
                        }
                    }
                }
            }

            let draining_and_empty = {
                let mode = self.mode.lock().expect("mode mutex poisoned");
                *mode == Mode::Draining && self.queue_len.load(Ordering::SeqCst) <= 0
            };
            if draining_and_empty {
                *self.mode.lock().expect("mode mutex poisoned") = Mode::Stopped;
                break;
            }
        }

        *self.rx.lock().await = Some(rx);
        self.exited_flag.store(true, Ordering::SeqCst);
        self.exited.notify_waiters();
    }

    /// Block until the ready signal fires or `scope` ends.
    pub async fn wait_for_ready(&self, scope: CancellationToken) {
        if self.ready_fired.load(Ordering::SeqCst) {
            return;
        }
        tokio::select! {
            _ = self.ready.notified() => {}
            _ = scope.cancelled() => {}
        }
    }

    /// Fire-and-forget enqueue. Fails with [`KernelError::QueueFull`] if
    /// the bounded queue is full, or [`KernelError::NotRunning`] if the
    /// processor isn't accepting commands.
    pub fn submit(&self, envelope: CommandEnvelope) -> Result<(), KernelError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(KernelError::NotRunning);
        }
        let kind_name = envelope.kind.name();
        match self.tx.try_send(QueueItem { envelope, responder: None }) {
            Ok(()) => {
                self.queue_len.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(KernelError::QueueFull(kind_name.to_string())),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(KernelError::NotRunning),
        }
    }

    /// Enqueue with a one-shot result channel; respects `scope`
    /// cancellation both while enqueuing and while waiting. Once
    /// enqueued, the command will execute and produce a result even if
    /// the caller stops waiting.
    pub async fn submit_and_wait(
        &self,
        scope: CancellationToken,
        envelope: CommandEnvelope,
    ) -> Result<CommandResult, KernelError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(KernelError::NotRunning);
        }
        let kind_name = envelope.kind.name();
        let (resp_tx, resp_rx) = oneshot::channel();

        let send_result = tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(KernelError::Timeout),
            result = self.tx.send(QueueItem { envelope, responder: Some(resp_tx) }) => result,
        };
        match send_result {
            Ok(()) => self.queue_len.fetch_add(1, Ordering::SeqCst),
            Err(_) => return Err(KernelError::NotRunning),
        };
        let _ = kind_name;

        tokio::select! {
            biased;
            _ = scope.cancelled() => Err(KernelError::Timeout),
            result = resp_rx => result.map_err(|_| KernelError::NotRunning),
        }
    }

    /// Cancel the loop. Pending queued commands are discarded.
    pub async fn stop(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.stop_token.cancel();
    }

    /// Stop accepting new commands, process everything already queued to
    /// empty, then exit. Idempotent.
    pub async fn drain(&self) {
        let already_done = {
            let mut mode = self.mode.lock().expect("mode mutex poisoned");
            match *mode {
                Mode::Stopped => true,
                Mode::Idle => {
                    *mode = Mode::Stopped;
                    true
                }
                _ => {
                    self.accepting.store(false, Ordering::SeqCst);
                    *mode = Mode::Draining;
                    false
                }
            }
        };
        if already_done {
            return;
        }
        self.wake.notify_waiters();
        if self.exited_flag.load(Ordering::SeqCst) {
            return;
        }
        self.exited.notified().await;
    }

    /// Whether the main loop is currently accepting submissions.
    pub fn is_running(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Total handler invocations that completed, success or failure.
    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::SeqCst)
    }

    /// Total handler invocations (or validation/lookup steps) that failed.
    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::SeqCst)
    }

    /// Current queue depth, for telemetry.
    pub fn queue_length(&self) -> usize {
        self.queue_len.load(Ordering::SeqCst).max(0) as usize
    }

    async fn execute(self: &Arc<Self>, item: QueueItem) {
        let QueueItem { envelope, responder } = item;
        let kind_name = envelope.kind.name();
        let span = tracing::info_span!("command", kind = kind_name, id = %envelope.id);

        let result = async {
            if let Err(err) = envelope.validate() {
                self.bus.publish(KernelEvent::CommandError {
                    command_kind: kind_name.to_string(),
                    error_kind: err.kind().to_string(),
                    message: err.to_string(),
                });
                return CommandResult::err(err);
            }

            if let Some(dedup) = &self.dedup {
                let hash = Deduplicator::content_hash(&envelope.kind);
                if dedup.check_and_record(hash) {
                    tracing::debug!(kind = kind_name, "duplicate command suppressed");
                    return CommandResult::ok();
                }
            }

            let handler = self.handlers.lock().await.get(kind_name).cloned();
            let Some(handler) = handler else {
                let err = KernelError::UnknownCommand(kind_name.to_string());
                self.bus.publish(KernelEvent::CommandError {
                    command_kind: kind_name.to_string(),
                    error_kind: err.kind().to_string(),
                    message: err.to_string(),
                });
                return CommandResult::err(err);
            };

            let started = Instant::now();
            let result = handler.handle(&envelope).await;
            let duration = started.elapsed();

            if duration > self.slow_handler_threshold {
                tracing::warn!(kind = kind_name, ?duration, "slow command handler");
            }
            tracing::debug!(
                kind = kind_name,
                id = %envelope.id,
                source = ?envelope.source,
                success = result.success,
                ?duration,
                "command processed"
            );
            self.bus.publish(KernelEvent::CommandLog {
                command_kind: kind_name.to_string(),
                success: result.success,
                duration_us: duration.as_micros() as u64,
            });
            if !result.success {
                if let Some(err) = &result.error {
                    self.bus.publish(KernelEvent::CommandError {
                        command_kind: kind_name.to_string(),
                        error_kind: err.kind().to_string(),
                        message: err.to_string(),
                    });
                }
            }
            result
        }
        .instrument(span)
        .await;

        self.processed_count.fetch_add(1, Ordering::SeqCst);
        if !result.success {
            self.error_count.fetch_add(1, Ordering::SeqCst);
        }

        for event in &result.events {
            self.bus.publish(event.clone());
        }

        for follow_up in &result.follow_up {
            if let Err(err) = self.submit(follow_up.clone()) {
                tracing::warn!(kind = follow_up.kind.name(), %err, "dropping follow-up command, queue full");
            }
        }

        if let Some(responder) = responder {
            let _ = responder.send(result);
        }
    }
}

impl CommandSubmitter for CommandProcessor {
    fn submit(&self, envelope: CommandEnvelope) -> Result<(), KernelError> {
        CommandProcessor::submit(self, envelope)
    }
}
