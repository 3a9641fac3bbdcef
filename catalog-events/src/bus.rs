//! Generic event bus over per-subscriber bounded queues.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::trace;

/// Capacity of each subscriber's queue. Events beyond this are dropped for
/// the lagging subscriber only.
const SUBSCRIBER_QUEUE_CAPACITY: usize = 100;

/// Identifier handed out per subscription, used to unsubscribe.
type SubscriberId = u64;

/// A live subscription: drain events through [`Subscription::recv`].
///
/// The queue closes when the subscription is removed from the bus; `recv`
/// then returns `None` once the buffered events are exhausted.
pub struct Subscription<T> {
    id: SubscriberId,
    rx: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    /// The id to pass to [`EventBus::unsubscribe`].
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Receives the next event, or `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Non-blocking receive, for tests and opportunistic draining.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// Typed in-process publish/subscribe.
///
/// `publish` takes a shared lock and performs a non-blocking send to every
/// registered queue; `subscribe`/`unsubscribe` take the exclusive lock. None
/// of the operations await, so the bus is usable from sync and async
/// contexts alike.
pub struct EventBus<T> {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<T>>>,
    next_id: AtomicU64,
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new subscriber and returns its queue.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .expect("bus lock poisoned")
            .insert(id, tx);
        Subscription { id, rx }
    }

    /// Deregisters a subscriber. Its queue closes; a consumer still holding
    /// the `Subscription` drains the buffered events and then sees `None`.
    /// Unknown ids are ignored, so unsubscribing twice is harmless.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers
            .write()
            .expect("bus lock poisoned")
            .remove(&id);
    }

    /// Broadcasts an event to every subscriber.
    ///
    /// Never blocks and never fails: full queues drop the event for that
    /// subscriber, closed queues are skipped.
    pub fn publish(&self, event: T) {
        let subscribers = self.subscribers.read().expect("bus lock poisoned");
        for (id, tx) in subscribers.iter() {
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event.clone()) {
                trace!(subscriber = *id, "subscriber queue full, dropping event");
            }
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("bus lock poisoned").len()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
