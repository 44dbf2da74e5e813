//! Page-local broadcast channel.
//!
//! Mirrors `window.postMessage` + `addEventListener("message")`: every
//! same-page listener (page script and content script alike) receives
//! every posted message, and filtering is the subscriber's job.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::trace;

use super::bus::{Bus, Subscription};

// ============================================================================
// PageChannel
// ============================================================================

/// Broadcast channel shared by the page and its content scripts.
pub trait PageChannel: Send + Sync {
    /// Posts a message to every current listener.
    fn post(&self, message: Value);

    /// Registers a listener for subsequent messages.
    fn subscribe(&self) -> Subscription<Value>;
}

// ============================================================================
// PageBus
// ============================================================================

/// In-process [`PageChannel`] backed by a [`Bus`].
#[derive(Clone, Default)]
pub struct PageBus {
    bus: Bus<Value>,
}

impl PageBus {
    /// Creates an empty page channel.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.bus.listener_count()
    }
}

impl PageChannel for PageBus {
    fn post(&self, message: Value) {
        let delivered = self.bus.publish(message);
        trace!(delivered, "Posted page message");
    }

    fn subscribe(&self) -> Subscription<Value> {
        self.bus.subscribe()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[tokio::test]
    async fn test_poster_hears_itself() {
        let page = PageBus::new();
        let mut listener = page.subscribe();

        page.post(json!("page-script-satisfied"));
        assert_eq!(listener.recv().await, Some(json!("page-script-satisfied")));
    }

    #[test]
    fn test_listener_count_tracks_subscriptions() {
        let page = PageBus::new();
        assert_eq!(page.listener_count(), 0);

        let sub = page.subscribe();
        assert_eq!(page.listener_count(), 1);

        drop(sub);
        assert_eq!(page.listener_count(), 0);
    }
}
