//! Content-script relays, one per vendor.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::channel::{Endpoint, ExtensionMessaging, PageChannel};
use crate::fault::FaultReporter;
use crate::identifiers::TabId;

use super::Relay;
use super::forward::{forward_to_background, forward_to_page};

// ============================================================================
// RelayCore
// ============================================================================

/// Channels and install guard shared by both relays.
struct RelayCore {
    page: Arc<dyn PageChannel>,
    messaging: Arc<dyn ExtensionMessaging>,
    tab_id: TabId,
    faults: FaultReporter,
    installed: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RelayCore {
    fn new(
        page: Arc<dyn PageChannel>,
        messaging: Arc<dyn ExtensionMessaging>,
        tab_id: TabId,
        faults: FaultReporter,
    ) -> Self {
        Self {
            page,
            messaging,
            tab_id,
            faults,
            installed: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Claims the one-time install. Returns `false` if already claimed.
    fn claim(&self) -> bool {
        if self.installed.swap(true, Ordering::AcqRel) {
            debug!(tab_id = %self.tab_id, "Relay already installed");
            return false;
        }
        true
    }

    fn install_tab_listener(&self) {
        let deliveries = self.messaging.listen(Endpoint::Tab(self.tab_id));
        let task = tokio::spawn(forward_to_page(
            deliveries,
            Arc::clone(&self.page),
            self.faults.clone(),
        ));
        self.tasks.lock().push(task);
    }

    fn install_page_listener(&self) {
        let messages = self.page.subscribe();
        let task = tokio::spawn(forward_to_background(
            messages,
            Arc::clone(&self.page),
            Arc::clone(&self.messaging),
            self.faults.clone(),
        ));
        self.tasks.lock().push(task);
    }

    fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }
}

impl Drop for RelayCore {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

// ============================================================================
// ChromiumRelay
// ============================================================================

/// Relay for Chromium: background → page only.
///
/// The page reaches the background directly, so page requests are never
/// forwarded.
pub struct ChromiumRelay {
    core: RelayCore,
}

impl ChromiumRelay {
    /// Creates an uninstalled relay for the content script of `tab_id`.
    #[must_use]
    pub fn new(
        page: Arc<dyn PageChannel>,
        messaging: Arc<dyn ExtensionMessaging>,
        tab_id: TabId,
        faults: FaultReporter,
    ) -> Self {
        Self {
            core: RelayCore::new(page, messaging, tab_id, faults),
        }
    }
}

impl Relay for ChromiumRelay {
    fn install(&self) -> bool {
        if !self.core.claim() {
            return false;
        }

        self.core.install_tab_listener();
        info!(tab_id = %self.core.tab_id, "Chromium relay installed");
        true
    }

    fn is_installed(&self) -> bool {
        self.core.is_installed()
    }
}

// ============================================================================
// FirefoxRelay
// ============================================================================

/// Relay for Firefox: both directions.
pub struct FirefoxRelay {
    core: RelayCore,
}

impl FirefoxRelay {
    /// Creates an uninstalled relay for the content script of `tab_id`.
    #[must_use]
    pub fn new(
        page: Arc<dyn PageChannel>,
        messaging: Arc<dyn ExtensionMessaging>,
        tab_id: TabId,
        faults: FaultReporter,
    ) -> Self {
        Self {
            core: RelayCore::new(page, messaging, tab_id, faults),
        }
    }
}

impl Relay for FirefoxRelay {
    fn install(&self) -> bool {
        if !self.core.claim() {
            return false;
        }

        self.core.install_tab_listener();
        self.core.install_page_listener();
        info!(tab_id = %self.core.tab_id, "Firefox relay installed");
        true
    }

    fn is_installed(&self) -> bool {
        self.core.is_installed()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};

    use crate::channel::MemoryHost;
    use crate::error::Error;
    use crate::identifiers::ReceiverTag;
    use crate::protocol::Envelope;

    fn firefox_relay(host: &Arc<MemoryHost>, faults: &FaultReporter) -> FirefoxRelay {
        FirefoxRelay::new(
            host.page_channel(),
            host.messaging(),
            host.active_tab(),
            faults.clone(),
        )
    }

    #[tokio::test]
    async fn test_install_is_idempotent() {
        let host = MemoryHost::new();
        let relay = firefox_relay(&host, &FaultReporter::new());

        assert!(relay.install());
        assert!(!relay.install());
        assert!(relay.is_installed());

        assert_eq!(host.listener_count(Endpoint::Tab(host.active_tab())), 1);
        assert_eq!(host.page_listener_count(), 1);
    }

    #[tokio::test]
    async fn test_chromium_relay_ignores_page_requests() {
        let host = MemoryHost::new();
        let relay = ChromiumRelay::new(
            host.page_channel(),
            host.messaging(),
            host.active_tab(),
            FaultReporter::new(),
        );
        relay.install();

        assert_eq!(host.page_listener_count(), 0);
        assert_eq!(relay.receiver(), &ReceiverTag::CONTENT_SCRIPT_RELAY);
    }

    #[tokio::test]
    async fn test_forward_to_page_readdresses() {
        let host = MemoryHost::new();
        let relay = firefox_relay(&host, &FaultReporter::new());
        relay.install();

        let page = host.page_channel();
        let mut observer = page.subscribe();

        let request = Envelope::request(ReceiverTag::CONTENT_SCRIPT_RELAY, "detect", json!({}));
        drop(
            host.messaging()
                .send(Endpoint::Tab(host.active_tab()), request.to_value())
                .expect("send"),
        );

        let forwarded = loop {
            let message = observer.recv().await.expect("page message");
            if let Some(envelope) = Envelope::addressed_to(&message, &ReceiverTag::WEB_PAGE_SERVER) {
                break envelope;
            }
        };
        assert_eq!(forwarded.procedure_name, "detect");
        assert!(forwarded.is_request());
    }

    #[tokio::test]
    async fn test_undefined_background_reply_is_reported() {
        let host = MemoryHost::new();
        let faults = FaultReporter::new();
        let mut reported = faults.subscribe();

        let relay = firefox_relay(&host, &faults);
        relay.install();

        // Background listener that never answers.
        let mut silent = host.listen(Endpoint::Runtime);

        let page = host.page_channel();
        let mut observer = page.subscribe();
        page.post(Envelope::request(ReceiverTag::CONTENT_SCRIPT_RELAY, "detect", Value::Null).to_value());

        drop(silent.recv().await);

        let fault = reported.recv().await.expect("fault");
        assert!(matches!(fault.error, Error::UndefinedReply { .. }));

        let failure = loop {
            let message = observer.recv().await.expect("page message");
            if let Some(envelope) = Envelope::addressed_to(&message, &ReceiverTag::WEB_PAGE_CLIENT) {
                break envelope;
            }
        };
        assert!(failure.into_outcome().is_err());
    }

    #[tokio::test]
    async fn test_dropping_relay_abandons_pending_captures() {
        let host = MemoryHost::new();
        let relay = firefox_relay(&host, &FaultReporter::new());
        relay.install();

        // No page server, so the capture listener waits.
        let request = Envelope::request(ReceiverTag::CONTENT_SCRIPT_RELAY, "detect", json!({}))
            .with_capture(true);
        let reply = host
            .messaging()
            .send(Endpoint::Tab(host.active_tab()), request.to_value())
            .expect("send");

        while host.page_listener_count() < 2 {
            tokio::task::yield_now().await;
        }

        drop(relay);

        let answer = tokio::time::timeout(std::time::Duration::from_secs(1), reply)
            .await
            .expect("reply settles");
        assert_eq!(answer, None);
        assert_eq!(host.page_listener_count(), 0);
    }
}
