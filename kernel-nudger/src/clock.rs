//! Injectable clock abstraction (§4.L) so the debounce timer can be
//! driven deterministically in tests instead of through real wall time.

use std::future::Future;
use std::time::Duration;

/// Operation-defined, not mechanism-defined: a clock knows how to produce
/// a sleep future of some associated type, and nothing else. This lets
/// [`TokioClock`] return a real `tokio::time::Sleep` while a test clock
/// returns something driven by an explicit `fire` call.
pub trait Clock: Send + Sync + 'static {
    /// The future type this clock's timers resolve as.
    type Sleep: Future<Output = ()> + Send;

    /// Arm a timer for `duration`.
    fn sleep(&self, duration: Duration) -> Self::Sleep;
}

/// Real-time clock backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    type Sleep = tokio::time::Sleep;

    fn sleep(&self, duration: Duration) -> Self::Sleep {
        tokio::time::sleep(duration)
    }
}

/// A clock for deterministic tests: `sleep` ignores its `duration`
/// argument and instead waits for an explicit [`ManualClock::fire_all`]
/// call, letting a test arm a debounce window and then choose exactly
/// when it elapses.
#[derive(Clone, Default)]
pub struct ManualClock {
    waiters: std::sync::Arc<tokio::sync::Mutex<Vec<tokio::sync::oneshot::Sender<()>>>>,
}

impl ManualClock {
    /// Create a manual clock with no pending timers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every timer currently waiting on this clock.
    pub async fn fire_all(&self) {
        let mut waiters = self.waiters.lock().await;
        for tx in waiters.drain(..) {
            let _ = tx.send(());
        }
    }
}

impl Clock for ManualClock {
    type Sleep = std::pin::Pin<Box<dyn Future<Output = ()> + Send>>;

    fn sleep(&self, _duration: Duration) -> Self::Sleep {
        let waiters = self.waiters.clone();
        Box::pin(async move {
            let (tx, rx) = tokio::sync::oneshot::channel();
            waiters.lock().await.push(tx);
            let _ = rx.await;
        })
    }
}
