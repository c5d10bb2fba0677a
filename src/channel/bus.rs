//! # Message bus with teardown and one-shot waits.
//!
//! [`MessageBus`] is a thin wrapper around [`tokio::sync::broadcast`] that
//! adds the two things the worker channel needs on top of fan-out delivery:
//! a close signal that ends every consumer at once, and race-free one-shot
//! waits for correlating request/response round trips.
//!
//! ## Architecture
//! ```text
//! Publishers:                        Consumers:
//!   frame pump ──┐                 ┌──► attach(f)   (spawned listener task)
//!                ├────► MessageBus ┼──► attach(f)
//!   (tests)    ──┘   (broadcast)   └──► once(match) (one-shot future)
//!                          │
//!                        close() ───► every consumer ends
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks or awaits.
//! - **Eager one-shots**: `once()` subscribes before it returns, so a message
//!   published right after the call cannot be missed by the returned future.
//! - **Bulk teardown**: `close()` ends every attached listener and resolves
//!   every pending `once()` with [`WorkerError::ChannelClosed`]; receivers
//!   are dropped with their tasks, so teardown cannot leak subscriptions.
//! - **Lag handling**: slow consumers observe `RecvError::Lagged(n)`, log a
//!   warning, and skip the `n` oldest messages.

use std::future::Future;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// Broadcast channel for decoded worker messages.
///
/// Cheap to clone; all clones share the same ring buffer and close signal.
#[derive(Clone, Debug)]
pub struct MessageBus<T> {
    tx: broadcast::Sender<T>,
    closed: CancellationToken,
}

impl<T: Clone + Send + 'static> MessageBus<T> {
    /// Creates a new bus with the given ring-buffer capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<T>(capacity);
        Self {
            tx,
            closed: CancellationToken::new(),
        }
    }

    /// Publishes a message to all current consumers.
    ///
    /// If there are no consumers the message is dropped.
    pub fn publish(&self, msg: T) {
        let _ = self.tx.send(msg);
    }

    /// Creates a raw receiver observing subsequent messages.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Number of live receivers, attached listeners and pending one-shots
    /// included.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Ends every attached listener and pending one-shot wait.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// True once [`MessageBus::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Spawns a listener task invoking `on_msg` for every message until the
    /// subscription is detached or the bus closes.
    ///
    /// Dropping the returned [`BusSubscription`] detaches the listener.
    pub fn attach<F>(&self, mut on_msg: F) -> BusSubscription
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        let closed = self.closed.clone();
        let detached = CancellationToken::new();
        let guard = detached.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = closed.cancelled() => break,
                    _ = detached.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(msg) => on_msg(msg),
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "bus listener lagged");
                            continue;
                        }
                    }
                }
            }
        });

        BusSubscription {
            detach: guard,
            handle: Some(handle),
        }
    }

    /// Returns a future resolving with the first message for which `matcher`
    /// returns `Some`.
    ///
    /// The underlying receiver is created before this returns, so the wait
    /// can be armed before the message that answers it is provoked. The
    /// receiver is dropped when the future resolves, is dropped, or the bus
    /// closes; an abandoned wait cannot leak a subscription.
    pub fn once<U, F>(&self, matcher: F) -> impl Future<Output = Result<U, WorkerError>> + Send
    where
        F: Fn(&T) -> Option<U> + Send + 'static,
        U: Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        let closed = self.closed.clone();

        async move {
            loop {
                tokio::select! {
                    _ = closed.cancelled() => return Err(WorkerError::ChannelClosed),
                    msg = rx.recv() => match msg {
                        Ok(msg) => {
                            if let Some(out) = matcher(&msg) {
                                return Ok(out);
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(WorkerError::ChannelClosed);
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "one-shot wait lagged");
                            continue;
                        }
                    }
                }
            }
        }
    }
}

/// Handle to one attached bus listener.
///
/// The listener ends when this is dropped, when [`BusSubscription::detach`]
/// or [`BusSubscription::join`] is called, or when the bus closes.
pub struct BusSubscription {
    detach: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl BusSubscription {
    /// Signals the listener to stop without waiting for it.
    pub fn detach(&self) {
        self.detach.cancel();
    }

    /// Signals the listener to stop and waits for its task to finish.
    pub async fn join(mut self) {
        self.detach.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// True once the listener task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        self.detach.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::testutil::settle;

    #[tokio::test(start_paused = true)]
    async fn test_publish_reaches_every_listener() {
        let bus: MessageBus<String> = MessageBus::new(8);
        let seen_a = Arc::new(AtomicUsize::new(0));
        let seen_b = Arc::new(AtomicUsize::new(0));

        let a = seen_a.clone();
        let _sub_a = bus.attach(move |_msg| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let b = seen_b.clone();
        let _sub_b = bus.attach(move |_msg| {
            b.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish("one".to_string());
        bus.publish("two".to_string());
        settle().await;

        assert_eq!(seen_a.load(Ordering::SeqCst), 2);
        assert_eq!(seen_b.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_skips_non_matching_messages() {
        let bus: MessageBus<String> = MessageBus::new(8);
        let wait = bus.once(|msg: &String| msg.strip_prefix("hit:").map(str::to_string));

        bus.publish("miss".to_string());
        bus.publish("hit:payload".to_string());

        let got = wait.await.expect("matching message arrives");
        assert_eq!(got, "payload");
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_subscribes_before_returning() {
        let bus: MessageBus<String> = MessageBus::new(8);

        // Arm the wait, then publish before the future is ever polled.
        let wait = bus.once(|msg: &String| Some(msg.clone()));
        bus.publish("early".to_string());

        let got = wait.await.expect("armed wait sees earlier publish");
        assert_eq!(got, "early");
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_fails_once_closed() {
        let bus: MessageBus<String> = MessageBus::new(8);
        let wait = bus.once(|msg: &String| Some(msg.clone()));

        bus.close();

        let err = wait.await.expect_err("closed bus rejects the wait");
        assert_eq!(err.as_label(), "worker_channel_closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_detach_stops_delivery() {
        let bus: MessageBus<String> = MessageBus::new(8);
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        let sub = bus.attach(move |_msg| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish("a".to_string());
        settle().await;
        sub.join().await;

        bus.publish("b".to_string());
        settle().await;

        assert_eq!(seen.load(Ordering::SeqCst), 1, "no delivery after detach");
        assert_eq!(bus.receiver_count(), 0, "receiver released on detach");
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_releases_all_receivers() {
        let bus: MessageBus<String> = MessageBus::new(8);
        let _sub_a = bus.attach(|_msg| {});
        let _sub_b = bus.attach(|_msg| {});
        let wait = bus.once(|msg: &String| Some(msg.clone()));
        settle().await;
        assert_eq!(bus.receiver_count(), 3);

        bus.close();
        let _ = wait.await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(bus.is_closed());
        assert_eq!(bus.receiver_count(), 0, "teardown drops every receiver");
    }
}
