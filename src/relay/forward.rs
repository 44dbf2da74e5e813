//! Forwarding loops run by the content-script relays.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::channel::{Delivery, Endpoint, ExtensionMessaging, PageChannel, Subscription};
use crate::error::Error;
use crate::fault::FaultReporter;
use crate::identifiers::ReceiverTag;
use crate::protocol::Envelope;
use crate::rpc::client::await_envelope;

// ============================================================================
// Constants
// ============================================================================

const COMPONENT: &str = "content-script-relay";

// ============================================================================
// Background → Page
// ============================================================================

/// Re-posts requests arriving from the background onto the page,
/// addressed to the page server.
///
/// When the request asks for capture, a page listener for the reply is
/// installed before the post, and the reply is fed back through the
/// delivery's reply slot. Captures still waiting are aborted with the loop.
pub(crate) async fn forward_to_page(
    mut deliveries: Subscription<Delivery>,
    page: Arc<dyn PageChannel>,
    faults: FaultReporter,
) {
    let mut captures = JoinSet::new();

    while let Some(delivery) = deliveries.recv().await {
        while captures.try_join_next().is_some() {}

        let Some(request) = relay_request(delivery.message()) else {
            continue;
        };

        let procedure = request.procedure_name.clone();
        let capture = request.capture_return_value;
        let forwarded = request.readdressed(ReceiverTag::WEB_PAGE_SERVER);

        if !capture {
            debug!(procedure = %procedure, "Forwarding to page");
            page.post(forwarded.to_value());
            continue;
        }

        let mut replies = page.subscribe();
        debug!(procedure = %procedure, "Forwarding to page, capturing reply");
        page.post(forwarded.to_value());

        let faults = faults.clone();
        captures.spawn(async move {
            match await_envelope(&mut replies, &ReceiverTag::CONTENT_SCRIPT_RELAY, &procedure).await {
                Ok(response) => {
                    let response = response.readdressed(ReceiverTag::BACKGROUND_CLIENT);
                    if !delivery.respond(response.to_value()) {
                        faults.report(
                            COMPONENT,
                            Error::protocol(format!(
                                "Background stopped waiting for '{procedure}'"
                            )),
                        );
                    }
                }
                Err(e) => {
                    faults.report(COMPONENT, e);
                }
            }
        });
    }

    debug!("Relay tab listener closed");
}

// ============================================================================
// Page → Background
// ============================================================================

/// Sends page requests to the background server and posts the replies
/// back to the page client.
///
/// An absent reply is a wiring defect: it is reported as a fault and
/// the page client receives a failure instead of waiting forever.
pub(crate) async fn forward_to_background(
    mut messages: Subscription<Value>,
    page: Arc<dyn PageChannel>,
    messaging: Arc<dyn ExtensionMessaging>,
    faults: FaultReporter,
) {
    let mut replies = JoinSet::new();

    while let Some(message) = messages.recv().await {
        while replies.try_join_next().is_some() {}

        let Some(request) = relay_request(&message) else {
            continue;
        };

        let procedure = request.procedure_name.clone();
        let forwarded = request.readdressed(ReceiverTag::BACKGROUND_SERVER);
        debug!(procedure = %procedure, "Forwarding to background");

        let reply = match messaging.send(Endpoint::Runtime, forwarded.to_value()) {
            Ok(reply) => reply,
            Err(e) => {
                let response = Envelope::failure(ReceiverTag::WEB_PAGE_CLIENT, &procedure, e.to_string());
                faults.report(COMPONENT, e);
                page.post(response.to_value());
                continue;
            }
        };

        let page = Arc::clone(&page);
        let faults = faults.clone();
        replies.spawn(async move {
            let response = match reply.await {
                Some(value) => match Envelope::from_value(value) {
                    Ok(response) => response.readdressed(ReceiverTag::WEB_PAGE_CLIENT),
                    Err(e) => {
                        let response =
                            Envelope::failure(ReceiverTag::WEB_PAGE_CLIENT, &procedure, e.to_string());
                        faults.report(COMPONENT, e);
                        response
                    }
                },
                None => {
                    let e = Error::undefined_reply(&procedure);
                    let response =
                        Envelope::failure(ReceiverTag::WEB_PAGE_CLIENT, &procedure, e.to_string());
                    faults.report(COMPONENT, e);
                    response
                }
            };

            page.post(response.to_value());
        });
    }

    debug!("Relay page listener closed");
}

/// Keeps requests addressed to the relay. Responses addressed to it are
/// picked up by capture listeners instead.
fn relay_request(message: &Value) -> Option<Envelope> {
    let envelope = Envelope::addressed_to(message, &ReceiverTag::CONTENT_SCRIPT_RELAY)?;
    if envelope.is_response() {
        trace!(procedure = %envelope.procedure_name, "Relay response left to capture listener");
        return None;
    }
    Some(envelope)
}
