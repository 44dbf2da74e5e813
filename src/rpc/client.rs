//! RPC client: addressed requests and reply correlation.
//!
//! Every variant follows the same rule: the listener that will observe
//! the reply is registered before the request goes out. Variants with a
//! native reply slot get that for free; the others subscribe first.
//!
//! | Client | Sends to | Reply arrives via |
//! |--------|----------|-------------------|
//! | `ChromiumBackgroundClient` | `Tab`, relay | `External` message from the page server |
//! | `FirefoxBackgroundClient` | `Tab`, relay | native reply (captured by the relay) |
//! | `ChromiumPageClient` | `External`, background server | native reply |
//! | `FirefoxPageClient` | page channel, relay | page post from the relay |
//!
//! # Correlation
//!
//! Replies are matched by receiver tag and procedure name. One call per
//! procedure name may be in flight per client; a second concurrent call
//! to the same name fails fast with [`Error::CallInFlight`] instead of
//! cross-resolving.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, error, trace};

use crate::channel::{Delivery, Subscription};
use crate::error::{Error, Result};
use crate::identifiers::ReceiverTag;
use crate::protocol::Envelope;

// ============================================================================
// RpcClient
// ============================================================================

/// Client role of one sandbox.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Tag requests are addressed to.
    fn target(&self) -> &ReceiverTag;

    /// Calls `procedure` with `args` and waits for its result.
    ///
    /// # Errors
    ///
    /// - [`Error::Procedure`] / [`Error::UnregisteredProcedure`] text if the
    ///   remote side rejected
    /// - [`Error::UndefinedReply`] if a relay hop answered with nothing
    /// - [`Error::CallInFlight`] if the same procedure is already pending
    /// - [`Error::CallTimeout`] if a timeout is configured and expires
    async fn call(&self, procedure: &str, args: Value) -> Result<Value>;
}

/// Typed calls on top of [`RpcClient`].
#[async_trait]
pub trait RpcClientExt: RpcClient {
    /// Calls `procedure` with serialized `args` and deserializes the result.
    async fn call_as<A, R>(&self, procedure: &str, args: &A) -> Result<R>
    where
        A: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send,
    {
        let args = serde_json::to_value(args)?;
        let value = self.call(procedure, args).await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl<C: RpcClient + ?Sized> RpcClientExt for C {}

// ============================================================================
// ClientCore
// ============================================================================

/// Addressing and bookkeeping shared by every client variant.
pub(crate) struct ClientCore {
    target: ReceiverTag,
    reply_to: ReceiverTag,
    capture: bool,
    call_timeout: Option<Duration>,
    in_flight: Mutex<FxHashSet<String>>,
}

impl ClientCore {
    pub(crate) fn new(
        target: ReceiverTag,
        reply_to: ReceiverTag,
        capture: bool,
        call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            target,
            reply_to,
            capture,
            call_timeout,
            in_flight: Mutex::new(FxHashSet::default()),
        }
    }

    #[inline]
    pub(crate) fn target(&self) -> &ReceiverTag {
        &self.target
    }

    #[inline]
    pub(crate) fn reply_to(&self) -> &ReceiverTag {
        &self.reply_to
    }

    /// Builds the request envelope for `procedure`.
    pub(crate) fn request(&self, procedure: &str, args: Value) -> Envelope {
        Envelope::request(self.target.clone(), procedure, args).with_capture(self.capture)
    }

    /// Runs one call: claims the procedure name, then drives `exchange`
    /// under the configured timeout.
    pub(crate) async fn run<F>(&self, procedure: &str, exchange: F) -> Result<Value>
    where
        F: Future<Output = Result<Value>>,
    {
        let _claim = self.claim(procedure)?;
        debug!(procedure, target = %self.target, "Calling");

        match self.call_timeout {
            Some(limit) => timeout(limit, exchange)
                .await
                .map_err(|_| Error::call_timeout(procedure, timeout_millis(limit)))?,
            None => exchange.await,
        }
    }

    fn claim(&self, procedure: &str) -> Result<InFlight<'_>> {
        if !self.in_flight.lock().insert(procedure.to_string()) {
            return Err(Error::call_in_flight(procedure));
        }
        Ok(InFlight {
            calls: &self.in_flight,
            procedure: procedure.to_string(),
        })
    }
}

/// Releases a claimed procedure name when the call ends or is dropped.
struct InFlight<'a> {
    calls: &'a Mutex<FxHashSet<String>>,
    procedure: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.calls.lock().remove(&self.procedure);
    }
}

/// Whole milliseconds in `limit`, saturating.
fn timeout_millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Reply Helpers
// ============================================================================

/// Anything a reply can arrive in.
pub(crate) trait Inbound {
    fn message(&self) -> &Value;
}

impl Inbound for Value {
    fn message(&self) -> &Value {
        self
    }
}

impl Inbound for Delivery {
    fn message(&self) -> &Value {
        Delivery::message(self)
    }
}

/// Waits on `replies` for the response envelope to `procedure` addressed
/// to `reply_to`.
///
/// The subscription is dropped by the caller, which deregisters it.
pub(crate) async fn await_envelope<T: Inbound>(
    replies: &mut Subscription<T>,
    reply_to: &ReceiverTag,
    procedure: &str,
) -> Result<Envelope> {
    while let Some(item) = replies.recv().await {
        match Envelope::addressed_to(item.message(), reply_to) {
            Some(response) if response.answers(procedure) => {
                trace!(procedure, %reply_to, "Response correlated");
                return Ok(response);
            }
            _ => continue,
        }
    }
    Err(Error::ChannelClosed)
}

/// Like [`await_envelope`], resolved into the call outcome.
pub(crate) async fn await_response<T: Inbound>(
    replies: &mut Subscription<T>,
    reply_to: &ReceiverTag,
    procedure: &str,
) -> Result<Value> {
    await_envelope(replies, reply_to, procedure)
        .await?
        .into_outcome()
}

/// Decodes a native reply.
///
/// An absent reply means no hop answered: a wiring defect.
pub(crate) fn decode_reply(procedure: &str, reply: Option<Value>) -> Result<Value> {
    let Some(value) = reply else {
        error!(procedure, "Undefined reply: no receiver answered this call");
        return Err(Error::undefined_reply(procedure));
    };

    Envelope::from_value(value)?.into_outcome()
}

// ============================================================================
// Tests
// ============================================================================
