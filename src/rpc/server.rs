//! RPC server: filters inbound envelopes and answers them.
//!
//! A server owns a [`ProcedureRegistry`] and binds it to one listening
//! mechanism. Each vendor × sandbox combination is a separate type; they
//! all implement [`RpcServer`].
//!
//! | Server | Listens on | Replies with |
//! |--------|------------|--------------|
//! | `ChromiumBackgroundServer` | `External` | native reply, to `web-page-client` |
//! | `FirefoxBackgroundServer` | `Runtime` | native reply, to `content-script-relay` |
//! | `ChromiumPageServer` | page channel | `External` message, to `background-client` |
//! | `FirefoxPageServer` | page channel | page post, to `content-script-relay` |
//!
//! Requests are served concurrently, one task each. A handler error
//! travels back to the caller as a failure envelope.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::channel::{Delivery, Subscription};
use crate::error::{Error, Result};
use crate::fault::FaultReporter;
use crate::identifiers::ReceiverTag;
use crate::protocol::Envelope;

use super::registry::{ProcedureFuture, ProcedureRegistry};

// ============================================================================
// RpcServer
// ============================================================================

/// Server role of one sandbox.
///
/// Procedures should be registered before [`RpcServer::listen`] is called.
pub trait RpcServer: Send + Sync {
    /// Tag this server answers to.
    fn receiver(&self) -> &ReceiverTag;

    /// The server's procedures.
    fn procedures(&self) -> &ProcedureRegistry;

    /// Starts serving.
    ///
    /// The listener is registered before this returns. Calling it again
    /// is a no-op; returns `false` in that case.
    fn listen(&self) -> bool;

    /// Returns `true` while the listener is installed.
    fn is_listening(&self) -> bool;

    /// Removes the listener.
    fn shutdown(&self);

    /// Returns `true` if `message` is a request addressed to this server.
    fn intake(&self, message: &Value) -> bool {
        Envelope::addressed_to(message, self.receiver()).is_some_and(|e| e.is_request())
    }

    /// Runs the procedure named by `envelope`.
    fn dispatch(&self, envelope: &Envelope) -> ProcedureFuture {
        self.procedures()
            .dispatch(&envelope.procedure_name, envelope.procedure_args.clone())
    }
}

// ============================================================================
// ServerCore
// ============================================================================

/// State shared by every server variant.
pub(crate) struct ServerCore {
    receiver: ReceiverTag,
    procedures: ProcedureRegistry,
    faults: FaultReporter,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ServerCore {
    pub(crate) fn new(
        receiver: ReceiverTag,
        procedures: ProcedureRegistry,
        faults: FaultReporter,
    ) -> Self {
        Self {
            receiver,
            procedures,
            faults,
            listener: Mutex::new(None),
        }
    }

    #[inline]
    pub(crate) fn receiver(&self) -> &ReceiverTag {
        &self.receiver
    }

    #[inline]
    pub(crate) fn procedures(&self) -> &ProcedureRegistry {
        &self.procedures
    }

    #[inline]
    pub(crate) fn faults(&self) -> &FaultReporter {
        &self.faults
    }

    /// Installs the listener task built by `spawn` unless one exists.
    pub(crate) fn start(&self, spawn: impl FnOnce() -> JoinHandle<()>) -> bool {
        let mut listener = self.listener.lock();
        if listener.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!(receiver = %self.receiver, "Server already listening");
            return false;
        }

        *listener = Some(spawn());
        info!(receiver = %self.receiver, "Server listening");
        true
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub(crate) fn shutdown(&self) {
        if let Some(task) = self.listener.lock().take() {
            task.abort();
            debug!(receiver = %self.receiver, "Server stopped");
        }
    }
}

impl Drop for ServerCore {
    fn drop(&mut self) {
        if let Some(task) = self.listener.get_mut().take() {
            task.abort();
        }
    }
}

// ============================================================================
// Serving Loops
// ============================================================================

/// Serves requests arriving as extension messages, answering through the
/// native reply slot.
pub(crate) async fn serve_deliveries(
    mut deliveries: Subscription<Delivery>,
    receiver: ReceiverTag,
    reply_to: ReceiverTag,
    procedures: ProcedureRegistry,
    faults: FaultReporter,
) {
    while let Some(delivery) = deliveries.recv().await {
        let Some(request) = accept(delivery.message(), &receiver) else {
            continue;
        };

        let procedures = procedures.clone();
        let reply_to = reply_to.clone();
        let faults = faults.clone();

        tokio::spawn(async move {
            let outcome = procedures
                .dispatch(&request.procedure_name, request.procedure_args.clone())
                .await;
            log_outcome(&request, &outcome);

            let response = request.reply(reply_to, &outcome);
            if !delivery.respond(response.to_value()) {
                faults.report(
                    "rpc-server",
                    Error::protocol(format!(
                        "Reply for '{}' could not be delivered",
                        request.procedure_name
                    )),
                );
            }
        });
    }

    debug!(%receiver, "Server listener closed");
}

/// Serves requests arriving on the page channel, answering through
/// `respond`.
pub(crate) async fn serve_page<F>(
    mut messages: Subscription<Value>,
    receiver: ReceiverTag,
    reply_to: ReceiverTag,
    procedures: ProcedureRegistry,
    respond: F,
) where
    F: Fn(Envelope) + Clone + Send + Sync + 'static,
{
    while let Some(message) = messages.recv().await {
        let Some(request) = accept(&message, &receiver) else {
            continue;
        };

        let procedures = procedures.clone();
        let reply_to = reply_to.clone();
        let respond = respond.clone();

        tokio::spawn(async move {
            let outcome = procedures
                .dispatch(&request.procedure_name, request.procedure_args.clone())
                .await;
            log_outcome(&request, &outcome);
            respond(request.reply(reply_to, &outcome));
        });
    }

    debug!(%receiver, "Server listener closed");
}

/// Keeps requests addressed to `receiver`.
fn accept(message: &Value, receiver: &ReceiverTag) -> Option<Envelope> {
    let envelope = Envelope::addressed_to(message, receiver)?;
    if envelope.is_response() {
        trace!(%receiver, procedure = %envelope.procedure_name, "Response ignored by server");
        return None;
    }

    debug!(%receiver, procedure = %envelope.procedure_name, "Request received");
    Some(envelope)
}

fn log_outcome(request: &Envelope, outcome: &Result<Value>) {
    match outcome {
        Ok(_) => debug!(procedure = %request.procedure_name, "Procedure resolved"),
        Err(e) => warn!(procedure = %request.procedure_name, error = %e, "Procedure rejected"),
    }
}
