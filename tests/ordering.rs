//! Listen-before-send against a zero-latency responder.
//!
//! The responder answers inside `post` itself, before the poster gets
//! control back. Only a listener registered before the post can see it.

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::{Value, json};
use webext_rpc::rpc::FirefoxPageClient;
use webext_rpc::{Envelope, PageBus, PageChannel, ReceiverTag, RpcClient, Subscription};

// ============================================================================
// ZeroLatencyResponder
// ============================================================================

/// Page channel whose relay answers every request synchronously.
#[derive(Clone, Default)]
struct ZeroLatencyResponder {
    bus: PageBus,
}

impl PageChannel for ZeroLatencyResponder {
    fn post(&self, message: Value) {
        let request = Envelope::addressed_to(&message, &ReceiverTag::CONTENT_SCRIPT_RELAY)
            .filter(|envelope| !envelope.is_response());
        self.bus.post(message);

        if let Some(request) = request {
            let response = Envelope::response(
                ReceiverTag::WEB_PAGE_CLIENT,
                &request.procedure_name,
                json!("pong"),
            );
            self.bus.post(response.to_value());
        }
    }

    fn subscribe(&self) -> Subscription<Value> {
        self.bus.subscribe()
    }
}

fn ping() -> Value {
    Envelope::request(ReceiverTag::CONTENT_SCRIPT_RELAY, "ping", Value::Null).to_value()
}

fn pong_count(subscription: &mut Subscription<Value>) -> usize {
    let mut count = 0;
    while let Some(message) = subscription.try_recv() {
        if Envelope::addressed_to(&message, &ReceiverTag::WEB_PAGE_CLIENT)
            .is_some_and(|e| e.answers("ping"))
        {
            count += 1;
        }
    }
    count
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn subscribing_after_the_send_misses_the_response() {
    let page = ZeroLatencyResponder::default();

    page.post(ping());
    let mut late = page.subscribe();

    assert_eq!(pong_count(&mut late), 0);
}

#[test]
fn subscribing_before_the_send_observes_the_response() {
    let page = ZeroLatencyResponder::default();

    let mut early = page.subscribe();
    page.post(ping());

    assert_eq!(pong_count(&mut early), 1);
}

#[tokio::test]
async fn client_call_resolves_against_zero_latency_responder() {
    common::init_tracing();

    let page = Arc::new(ZeroLatencyResponder::default());
    let client = FirefoxPageClient::new(page, None);

    let value = client.call("ping", Value::Null).await.expect("ping");
    assert_eq!(value, json!("pong"));
}
