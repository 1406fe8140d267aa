//! `HeadlessProcess` (§4.G) — one spawned child whose stdout is a
//! line-delimited JSON event stream, wrapped into the contract the rest
//! of the system depends on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kernel_parser::EventParser;
use kernel_types::{OutputEvent, ProcessStatus, SessionRef};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

const EVENT_BUFFER: usize = 256;
const ERROR_BUFFER: usize = 64;

/// Contract for one spawned child (§4.G): cold event/error streams,
/// status/session snapshots, cooperative cancellation, idempotent wait.
pub struct HeadlessProcess {
    status: std::sync::Mutex<ProcessStatus>,
    session_ref: std::sync::Mutex<Option<SessionRef>>,
    child: Mutex<Option<Child>>,
    cancel: CancellationToken,
    exited: Notify,
    exited_flag: AtomicBool,
    events_rx: Mutex<Option<mpsc::Receiver<OutputEvent>>>,
    errors_rx: Mutex<Option<mpsc::Receiver<String>>>,
}

impl HeadlessProcess {
    /// Spawn `child`, wiring its stdout through `parser` into the events
    /// stream and its stderr into the errors stream. `on_session_ref` is
    /// invoked at most once, the first time a parsed event carries a
    /// session identifier. `on_terminal` is invoked exactly once, when
    /// the vendor's turn-terminal `result` event (or process exit without
    /// one) is observed.
    pub fn spawn(
        mut child: Child,
        parser: Arc<dyn EventParser>,
        on_session_ref: impl FnOnce(SessionRef) + Send + 'static,
        on_terminal: impl FnOnce(Option<OutputEvent>) + Send + 'static,
    ) -> Arc<Self> {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (errors_tx, errors_rx) = mpsc::channel(ERROR_BUFFER);

        let this = Arc::new(Self {
            status: std::sync::Mutex::new(ProcessStatus::Starting),
            session_ref: std::sync::Mutex::new(None),
            child: Mutex::new(Some(child)),
            cancel: CancellationToken::new(),
            exited: Notify::new(),
            exited_flag: AtomicBool::new(false),
            events_rx: Mutex::new(Some(events_rx)),
            errors_rx: Mutex::new(Some(errors_rx)),
        });

        if let Some(stdout) = stdout {
            let this = this.clone();
            let parser = parser.clone();
            let errors_tx = errors_tx.clone();
            let mut on_session_ref = Some(on_session_ref);
            let mut on_terminal = Some(on_terminal);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                let mut terminal_seen = false;
                loop {
                    tokio::select! {
                        biased;
                        _ = this.cancel.cancelled() => break,
                        line = lines.next_line() => {
                            match line {
                                Ok(Some(raw)) => {
                                    match parser.parse_event(raw.as_bytes()) {
                                        Ok(event) => {
                                            if let Some(session) = parser.extract_session_ref(&event) {
                                                if this.session_ref.lock().unwrap().is_none() {
                                                    *this.session_ref.lock().unwrap() = Some(SessionRef::new(session.clone()));
                                                    *this.status.lock().unwrap() = ProcessStatus::Ready;
                                                    if let Some(cb) = on_session_ref.take() {
                                                        cb(SessionRef::new(session));
                                                    }
                                                }
                                            }
                                            let is_terminal = event.is_terminal();
                                            let _ = events_tx.send(event.clone()).await;
                                            if is_terminal {
                                                terminal_seen = true;
                                                if let Some(cb) = on_terminal.take() {
                                                    cb(Some(event));
                                                }
                                            }
                                        }
                                        Err(err) => {
                                            tracing::warn!(%err, "unparseable vendor event line");
                                            let _ = errors_tx.send(err.to_string()).await;
                                        }
                                    }
                                }
                                Ok(None) => break,
                                Err(err) => {
                                    tracing::warn!(%err, "vendor stdout read error");
                                    let _ = errors_tx.send(err.to_string()).await;
                                    break;
                                }
                            }
                        }
                    }
                }
                if !terminal_seen {
                    if let Some(cb) = on_terminal.take() {
                        cb(None);
                    }
                }
            });
        }

        if let Some(stderr) = stderr {
            let errors_tx = errors_tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = errors_tx.send(line).await;
                }
            });
        }

        {
            let this = this.clone();
            tokio::spawn(async move {
                let outcome = {
                    let mut guard = this.child.lock().await;
                    match guard.as_mut() {
                        Some(child) => child.wait().await,
                        None => return,
                    }
                };
                if let Err(err) = outcome {
                    tracing::warn!(%err, "failed to wait on vendor child");
                }
                {
                    let mut status = this.status.lock().unwrap();
                    if !matches!(*status, ProcessStatus::Retired | ProcessStatus::Failed) {
                        *status = ProcessStatus::Failed;
                    }
                }
                this.exited_flag.store(true, Ordering::SeqCst);
                this.exited.notify_waiters();
            });
        }

        this
    }

    /// Cold stream of parsed events. Calling this more than once returns
    /// `None` after the first call; the stream is single-subscriber.
    pub fn events(&self) -> Option<ReceiverStream<OutputEvent>> {
        self.events_rx.try_lock().ok()?.take().map(ReceiverStream::new)
    }

    /// Stream of out-of-band transport/parse errors.
    pub fn errors(&self) -> Option<ReceiverStream<String>> {
        self.errors_rx.try_lock().ok()?.take().map(ReceiverStream::new)
    }

    /// Current lifecycle status snapshot.
    pub fn status(&self) -> ProcessStatus {
        *self.status.lock().unwrap()
    }

    /// Overwrite the status snapshot; called by the spawner when a
    /// handler-driven transition (e.g. `working`) happens outside the
    /// event loop.
    pub fn set_status(&self, status: ProcessStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Whether the child is still running.
    pub fn is_running(&self) -> bool {
        !self.exited_flag.load(Ordering::SeqCst)
    }

    /// The vendor session identifier, once captured.
    pub fn session_ref(&self) -> Option<SessionRef> {
        self.session_ref.lock().unwrap().clone()
    }

    /// Cooperative termination request: cancels the reader loop and kills
    /// the child.
    pub async fn cancel(&self) {
        self.cancel.cancel();
        if let Some(child) = self.child.lock().await.as_mut() {
            let _ = child.start_kill();
        }
    }

    /// Block until the child exits. Safe to call multiple times or
    /// concurrently.
    pub async fn wait(&self) {
        if self.exited_flag.load(Ordering::SeqCst) {
            return;
        }
        self.exited.notified().await;
    }
}
