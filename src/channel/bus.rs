//! Fan-out listener registry.
//!
//! Models the host's `addEventListener`/`removeEventListener` pair: every
//! published item goes to every listener registered at publish time.
//! Listeners registered later never see it, which is exactly the window
//! the listen-before-send rule closes.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::trace;

use crate::identifiers::SubscriptionId;

// ============================================================================
// Types
// ============================================================================

/// Map of listener IDs to their delivery queues.
type ListenerMap<T> = FxHashMap<SubscriptionId, mpsc::UnboundedSender<T>>;

// ============================================================================
// Bus
// ============================================================================

/// Publish/subscribe fan-out of cloneable items.
///
/// Cloning a `Bus` yields another handle to the same listener set.
pub struct Bus<T> {
    listeners: Arc<Mutex<ListenerMap<T>>>,
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T> Default for Bus<T> {
    fn default() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }
}

impl<T: Clone + Send + 'static> Bus<T> {
    /// Creates an empty bus.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    ///
    /// The listener observes every item published after this call returns.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        let id = SubscriptionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().insert(id, tx);

        trace!(%id, "Listener registered");

        Subscription {
            id,
            rx,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Delivers `item` to every registered listener.
    ///
    /// Returns the number of listeners that received it.
    pub fn publish(&self, item: T) -> usize {
        let mut listeners = self.listeners.lock();
        listeners.retain(|_, tx| tx.send(item.clone()).is_ok());
        listeners.len()
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// A registered listener.
///
/// Dropping the subscription removes the listener.
pub struct Subscription<T> {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<T>,
    listeners: Weak<Mutex<ListenerMap<T>>>,
}

impl<T> Subscription<T> {
    /// Returns the listener ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next item.
    ///
    /// Returns `None` once the bus is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Returns a queued item without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().remove(&self.id);
            trace!(id = %self.id, "Listener removed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_listeners() {
        let bus = Bus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(7u32), 2);
        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[test]
    fn test_late_listener_misses_item() {
        let bus = Bus::new();
        assert_eq!(bus.publish("early"), 0);

        let mut late = bus.subscribe();
        assert_eq!(late.try_recv(), None);
    }

    #[test]
    fn test_drop_deregisters() {
        let bus: Bus<u8> = Bus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();
        assert_eq!(bus.listener_count(), 2);

        drop(first);
        assert_eq!(bus.listener_count(), 1);

        drop(second);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_bus() {
        let bus: Bus<u8> = Bus::new();
        let mut sub = bus.subscribe();
        bus.publish(1);
        drop(bus);

        assert_eq!(sub.try_recv(), Some(1));
        assert_eq!(sub.try_recv(), None);
    }
}
