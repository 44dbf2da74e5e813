//! End-to-end calls through the relay chain, both vendors.

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use common::Sandboxes;
use serde_json::json;
use webext_rpc::{
    Browser, Endpoint, Envelope, Error, ExtensionMessaging, PageChannel, ReceiverTag, RpcClient,
    RpcClientExt,
};

const BROWSERS: [Browser; 2] = [Browser::Chromium, Browser::Firefox];

/// Lets spawned listener tasks finish their current message.
async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Background → Page
// ============================================================================

#[tokio::test]
async fn detect_through_relay_returns_exact_string() {
    for browser in BROWSERS {
        let sandboxes = Sandboxes::ready(browser).await;

        let value = sandboxes
            .background
            .client()
            .call("detect", json!({}))
            .await
            .expect("detect");
        assert_eq!(value, json!("jQuery,Lodash"), "{browser}");
    }
}

#[tokio::test]
async fn sum_leaves_no_listener_behind() {
    for browser in BROWSERS {
        let sandboxes = Sandboxes::ready(browser).await;
        let host = &sandboxes.host;
        let page = host.page_channel();
        settle().await;

        let page_baseline = host.page_listener_count();
        let external_baseline = host.listener_count(Endpoint::External);

        let client = sandboxes.background.client();
        let sum: i64 = client
            .call_as("sum", &json!({ "a": 2, "b": 3 }))
            .await
            .expect("sum");
        assert_eq!(sum, 5, "{browser}");

        settle().await;
        assert_eq!(host.page_listener_count(), page_baseline, "{browser}");
        assert_eq!(
            host.listener_count(Endpoint::External),
            external_baseline,
            "{browser}"
        );

        // Count page server answers to a second call: exactly one.
        let mut page_observer = page.subscribe();
        let mut external_observer = host.listen(Endpoint::External);

        let sum = client
            .call("sum", json!({ "a": 10, "b": -4 }))
            .await
            .expect("sum");
        assert_eq!(sum, json!(6), "{browser}");
        settle().await;

        let reply_to = match browser {
            Browser::Chromium => ReceiverTag::BACKGROUND_CLIENT,
            Browser::Firefox => ReceiverTag::CONTENT_SCRIPT_RELAY,
        };
        let mut responses = 0;
        while let Some(message) = page_observer.try_recv() {
            if Envelope::addressed_to(&message, &reply_to).is_some_and(|e| e.answers("sum")) {
                responses += 1;
            }
        }
        while let Some(delivery) = external_observer.try_recv() {
            if Envelope::addressed_to(delivery.message(), &reply_to)
                .is_some_and(|e| e.answers("sum"))
            {
                responses += 1;
            }
        }
        assert_eq!(responses, 1, "{browser}");
    }
}

#[tokio::test]
async fn handler_error_rejects_caller() {
    for browser in BROWSERS {
        let sandboxes = Sandboxes::ready(browser).await;

        let err = sandboxes
            .background
            .client()
            .call("sum", json!("not an object"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Procedure { ref procedure, .. } if procedure == "sum"));
    }
}

#[tokio::test]
async fn unregistered_page_procedure_names_the_procedure() {
    for browser in BROWSERS {
        let sandboxes = Sandboxes::ready(browser).await;

        let err = sandboxes
            .background
            .client()
            .call("screenshot", json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("screenshot"), "{browser}: {err}");
    }
}

#[tokio::test]
async fn concurrent_distinct_procedures_resolve_independently() {
    for browser in BROWSERS {
        let sandboxes = Sandboxes::ready(browser).await;
        let client = sandboxes.background.client();

        let (detect, sum) = tokio::join!(
            client.call("detect", json!({})),
            client.call("sum", json!({ "a": 1, "b": 1 })),
        );
        assert_eq!(detect.expect("detect"), json!("jQuery,Lodash"));
        assert_eq!(sum.expect("sum"), json!(2));
    }
}

// ============================================================================
// Page → Background
// ============================================================================

#[tokio::test]
async fn page_calls_background() {
    for browser in BROWSERS {
        let sandboxes = Sandboxes::ready(browser).await;

        let version = sandboxes
            .page
            .client()
            .call("version", json!(null))
            .await
            .expect("version");
        assert_eq!(version, json!("1.0.0"), "{browser}");

        let err = sandboxes
            .page
            .client()
            .call("missing", json!(null))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"), "{browser}: {err}");
    }
}

#[tokio::test]
async fn firefox_page_call_without_background_listener_is_a_visible_fault() {
    let sandboxes = Sandboxes::ready(Browser::Firefox).await;
    let mut faults = sandboxes.content.faults().subscribe();

    sandboxes.background.server().shutdown();
    settle().await;

    let err = sandboxes
        .page
        .client()
        .call("version", json!(null))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("version") || err.to_string().contains("runtime"));

    let fault = faults.recv().await.expect("fault");
    assert_eq!(fault.component, "content-script-relay");
}

// ============================================================================
// Misc
// ============================================================================

#[tokio::test]
async fn call_timeout_applies_when_configured() {
    let host = webext_rpc::MemoryHost::new();
    let config = webext_rpc::RpcConfig::builder()
        .browser(Browser::Firefox)
        .call_timeout(Duration::from_millis(20))
        .build()
        .expect("config");

    let page = webext_rpc::PageContext::new(config, host.page_channel(), host.messaging())
        .expect("page context");

    // No relay in the tab: the request is posted and never answered.
    let err = page
        .client()
        .call("version", json!(null))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn factories_are_idempotent() {
    let sandboxes = Sandboxes::new(Browser::Firefox);

    let first = sandboxes.background.client();
    let second = sandboxes.background.client();
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    assert!(!sandboxes.background.server().listen());
    assert_eq!(sandboxes.host.listener_count(Endpoint::Runtime), 1);
}
