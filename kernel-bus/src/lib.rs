//! Generic typed pub/sub broker (§4.A). Used for UI redraw hints and
//! best-effort observability, never for state transfer: publish never
//! blocks, and a slow subscriber only loses events, it never stalls a
//! handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Per-subscriber channel depth. A full buffer means the event is dropped
/// for that subscriber only; other subscribers are unaffected.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

struct Subscriber<T> {
    id: u64,
    tx: mpsc::Sender<T>,
}

struct BusState<T> {
    subscribers: Vec<Subscriber<T>>,
    closed: bool,
}

/// A bounded, non-blocking, multi-subscriber broker for payload type `T`.
///
/// Cloning a `Bus` shares the same underlying subscriber list — clone it
/// freely to hand a publish handle to every concurrent context that needs
/// one (handlers, supervisor event loops, the nudger).
pub struct Bus<T> {
    state: std::sync::Arc<Mutex<BusState<T>>>,
    next_id: std::sync::Arc<AtomicU64>,
    buffer: usize,
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            next_id: self.next_id.clone(),
            buffer: self.buffer,
        }
    }
}

impl<T> Default for Bus<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl<T> Bus<T>
where
    T: Clone + Send + 'static,
{
    /// Create a bus with the given per-subscriber buffer depth.
    pub fn new(buffer: usize) -> Self {
        Self {
            state: std::sync::Arc::new(Mutex::new(BusState {
                subscribers: Vec::new(),
                closed: false,
            })),
            next_id: std::sync::Arc::new(AtomicU64::new(0)),
            buffer,
        }
    }

    /// Allocate a buffered channel bound to `scope`. When `scope` is
    /// cancelled, the subscription is removed and the stream ends. If the
    /// bus is already closed, returns a stream that ends immediately.
    pub fn subscribe(&self, scope: CancellationToken) -> ReceiverStream<T> {
        let mut state = self.state.lock().expect("bus mutex poisoned");
        if state.closed {
            let (_tx, rx) = mpsc::channel(1);
            return ReceiverStream::new(rx);
        }
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        state.subscribers.push(Subscriber { id, tx });
        drop(state);

        let bus_state = self.state.clone();
        tokio::spawn(async move {
            scope.cancelled().await;
            let mut state = bus_state.lock().expect("bus mutex poisoned");
            state.subscribers.retain(|s| s.id != id);
        });

        ReceiverStream::new(rx)
    }

    /// Deliver `payload` to every current subscriber without blocking. A
    /// subscriber whose buffer is full, or whose receiver has dropped,
    /// silently loses this event.
    pub fn publish(&self, payload: T) {
        let state = self.state.lock().expect("bus mutex poisoned");
        if state.closed {
            return;
        }
        for sub in &state.subscribers {
            let _ = sub.tx.try_send(payload.clone());
        }
    }

    /// Idempotent. Closes every subscriber channel and makes future
    /// `subscribe` calls return a pre-closed stream.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("bus mutex poisoned");
        state.closed = true;
        state.subscribers.clear();
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().expect("bus mutex poisoned").closed
    }

    /// Current subscriber count, for telemetry.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().expect("bus mutex poisoned").subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let bus: Bus<u32> = Bus::new(4);
        let scope = CancellationToken::new();
        let mut a = bus.subscribe(scope.clone());
        let mut b = bus.subscribe(scope.clone());

        bus.publish(7);

        assert_eq!(a.next().await, Some(7));
        assert_eq!(b.next().await, Some(7));
    }

    #[tokio::test]
    async fn full_buffer_drops_silently_without_blocking() {
        let bus: Bus<u32> = Bus::new(1);
        let scope = CancellationToken::new();
        let mut sub = bus.subscribe(scope);

        bus.publish(1);
        bus.publish(2); // dropped, buffer already has one item pending

        assert_eq!(sub.next().await, Some(1));
    }

    #[tokio::test]
    async fn cancelling_scope_removes_subscription() {
        let bus: Bus<u32> = Bus::new(4);
        let scope = CancellationToken::new();
        let mut sub = bus.subscribe(scope.clone());
        scope.cancel();

        // give the cleanup task a chance to run
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        bus.publish(99);
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_future_subscribes() {
        let bus: Bus<u32> = Bus::new(4);
        bus.close();
        bus.close();
        assert!(bus.is_closed());

        let scope = CancellationToken::new();
        let mut sub = bus.subscribe(scope);
        assert_eq!(sub.next().await, None);
    }
}
