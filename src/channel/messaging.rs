//! Extension messaging channel.
//!
//! Models `runtime.sendMessage` / `tabs.sendMessage` with their optional
//! reply callback, and `runtime.onMessage` / `runtime.onMessageExternal`
//! listeners.
//!
//! # Reply Semantics
//!
//! A message is handed to every listener at the endpoint as a
//! [`Delivery`]. The first listener to call [`Delivery::respond`] answers
//! the sender; later responses are ignored. If every listener drops the
//! delivery without answering, the sender's [`Reply`] resolves to `None`,
//! the host's `undefined`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::identifiers::TabId;

use super::bus::Subscription;

// ============================================================================
// Endpoint
// ============================================================================

/// Where an extension message is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Background `runtime.onMessage` (senders inside the extension).
    Runtime,
    /// Background `runtime.onMessageExternal` (web pages, Chromium only).
    External,
    /// Content scripts of one tab (`tabs.sendMessage`).
    Tab(TabId),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime => f.write_str("runtime"),
            Self::External => f.write_str("external"),
            Self::Tab(tab_id) => write!(f, "tab:{tab_id}"),
        }
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// A message as seen by one listener, with the sender's reply slot.
#[derive(Clone)]
pub struct Delivery {
    message: Value,
    reply: Arc<Mutex<Option<oneshot::Sender<Value>>>>,
}

impl Delivery {
    /// Creates a delivery and the reply future its sender awaits.
    #[must_use]
    pub fn new(message: Value) -> (Self, Reply) {
        let (tx, rx) = oneshot::channel();
        let delivery = Self {
            message,
            reply: Arc::new(Mutex::new(Some(tx))),
        };
        (delivery, Reply { rx: Some(rx) })
    }

    /// Returns the message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &Value {
        &self.message
    }

    /// Answers the sender.
    ///
    /// Returns `false` if another listener already answered or the sender
    /// stopped waiting.
    pub fn respond(&self, value: Value) -> bool {
        match self.reply.lock().take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .field("answered", &self.reply.lock().is_none())
            .finish()
    }
}

// ============================================================================
// Reply
// ============================================================================

/// The sender's view of a reply.
///
/// Resolves to `Some(value)` when a listener responds, or `None` when
/// nobody will.
#[must_use = "a reply does nothing unless awaited"]
#[derive(Debug)]
pub struct Reply {
    rx: Option<oneshot::Receiver<Value>>,
}

impl Reply {
    /// A reply that is already known to be empty.
    #[inline]
    pub fn none() -> Self {
        Self { rx: None }
    }
}

impl Future for Reply {
    type Output = Option<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.as_mut() {
            Some(rx) => Pin::new(rx).poll(cx).map(|result| result.ok()),
            None => Poll::Ready(None),
        }
    }
}

// ============================================================================
// ExtensionMessaging
// ============================================================================

/// Extension-internal messaging primitive.
///
/// `send` hands the message to the endpoint's listeners before it
/// returns; only the reply is asynchronous.
pub trait ExtensionMessaging: Send + Sync {
    /// Sends `message` to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unreachable`] if nobody listens at `endpoint`.
    fn send(&self, endpoint: Endpoint, message: Value) -> Result<Reply>;

    /// Registers a listener at `endpoint`.
    fn listen(&self, endpoint: Endpoint) -> Subscription<Delivery>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[tokio::test]
    async fn test_first_response_wins() {
        let (delivery, reply) = Delivery::new(json!("ping"));
        let other = delivery.clone();

        assert!(delivery.respond(json!(1)));
        assert!(!other.respond(json!(2)));
        assert_eq!(reply.await, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_dropped_delivery_resolves_none() {
        let (delivery, reply) = Delivery::new(json!("ping"));
        let clone = delivery.clone();
        drop(delivery);
        drop(clone);

        assert_eq!(reply.await, None);
    }

    #[tokio::test]
    async fn test_empty_reply() {
        assert_eq!(Reply::none().await, None);
    }

    #[test]
    fn test_endpoint_display() {
        let tab = TabId::new(3).expect("valid tab id");
        assert_eq!(Endpoint::Tab(tab).to_string(), "tab:3");
        assert_eq!(Endpoint::External.to_string(), "external");
    }
}
