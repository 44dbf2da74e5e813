//! Content-script middleware: relay plus injection request handling.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::channel::{Delivery, Endpoint, ExtensionMessaging, Subscription};
use crate::error::Error;
use crate::fault::FaultReporter;
use crate::identifiers::{ReceiverTag, TabId};
use crate::protocol::{
    Envelope, INJECT_PAGE_SCRIPT, InjectPageScript, InjectionOutcome, LifecycleSignal,
};
use crate::relay::Relay;

use super::injector::PageScriptInjector;

// ============================================================================
// Constants
// ============================================================================

const COMPONENT: &str = "content-script-middleware";

// ============================================================================
// ContentScriptMiddleware
// ============================================================================

/// Everything the content script runs.
///
/// Installing it installs the relay and a listener for `inject-page-script`
/// requests from the background.
pub struct ContentScriptMiddleware {
    relay: Arc<dyn Relay>,
    injector: Arc<PageScriptInjector>,
    messaging: Arc<dyn ExtensionMessaging>,
    tab_id: TabId,
    faults: FaultReporter,
    installed: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ContentScriptMiddleware {
    /// Creates an uninstalled middleware.
    #[must_use]
    pub fn new(
        relay: Arc<dyn Relay>,
        injector: Arc<PageScriptInjector>,
        messaging: Arc<dyn ExtensionMessaging>,
        tab_id: TabId,
        faults: FaultReporter,
    ) -> Self {
        Self {
            relay,
            injector,
            messaging,
            tab_id,
            faults,
            installed: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    /// Returns the page-script injector.
    #[inline]
    #[must_use]
    pub fn injector(&self) -> &Arc<PageScriptInjector> {
        &self.injector
    }

    /// Returns `true` once installed.
    #[inline]
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    /// Installs the middleware and announces it to the background.
    ///
    /// Listeners are installed on the first call only. Every call
    /// announces `content-script-middleware-satisfied`, so a background
    /// that loads the content script again still gets its signal.
    pub fn install(&self) -> bool {
        let first = !self.installed.swap(true, Ordering::AcqRel);

        if first {
            self.relay.install();

            let deliveries = self.messaging.listen(Endpoint::Tab(self.tab_id));
            *self.listener.lock() = Some(tokio::spawn(serve_injection_requests(
                deliveries,
                Arc::clone(&self.injector),
                self.faults.clone(),
            )));
            info!(tab_id = %self.tab_id, "Content-script middleware installed");
        } else {
            debug!(tab_id = %self.tab_id, "Content-script middleware already installed");
        }

        let signal = LifecycleSignal::ContentScriptMiddlewareSatisfied;
        match self.messaging.send(Endpoint::Runtime, signal.to_value()) {
            Ok(reply) => drop(reply),
            Err(e) => warn!(error = %e, %signal, "Signal not delivered"),
        }

        first
    }
}

impl Drop for ContentScriptMiddleware {
    fn drop(&mut self) {
        if let Some(task) = self.listener.get_mut().take() {
            task.abort();
        }
    }
}

// ============================================================================
// Request Loop
// ============================================================================

/// Serves `inject-page-script` requests. Every request is answered
/// through its reply slot, failures included.
async fn serve_injection_requests(
    mut deliveries: Subscription<Delivery>,
    injector: Arc<PageScriptInjector>,
    faults: FaultReporter,
) {
    // Dropped with the loop, which aborts injections still running.
    let mut injections = JoinSet::new();

    while let Some(delivery) = deliveries.recv().await {
        while injections.try_join_next().is_some() {}

        let Some(request) =
            Envelope::addressed_to(delivery.message(), &ReceiverTag::CONTENT_SCRIPT_MIDDLEWARE)
        else {
            continue;
        };

        if request.is_response() {
            continue;
        }

        if request.procedure_name != INJECT_PAGE_SCRIPT {
            let e = Error::unregistered_procedure(&request.procedure_name);
            reject(&delivery, &request.procedure_name, &e);
            faults.report(COMPONENT, e);
            continue;
        }

        let args: InjectPageScript = match serde_json::from_value(request.procedure_args) {
            Ok(args) => args,
            Err(e) => {
                let e = Error::from(e);
                reject(&delivery, INJECT_PAGE_SCRIPT, &e);
                faults.report(COMPONENT, e);
                continue;
            }
        };

        let injector = Arc::clone(&injector);
        let faults = faults.clone();
        injections.spawn(async move {
            let result = injector.inject(&args.file_name).await;
            let outcome = InjectionOutcome::from_result(&args.file_name, &result);
            if let Err(e) = result {
                faults.report(COMPONENT, e);
            }

            match outcome.to_envelope() {
                Ok(reply) => {
                    if !delivery.respond(reply.to_value()) {
                        debug!(file = %args.file_name, "Background stopped waiting for injection");
                    }
                }
                Err(e) => {
                    faults.report(COMPONENT, e);
                }
            }
        });
    }

    debug!("Middleware listener closed");
}

/// Answers a request that never reached the injector.
fn reject(delivery: &Delivery, procedure: &str, error: &Error) {
    let reply = Envelope::failure(ReceiverTag::BACKGROUND_CLIENT, procedure, error.to_string());
    if !delivery.respond(reply.to_value()) {
        debug!(procedure, "Background stopped waiting for rejection");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::channel::MemoryHost;
    use crate::relay::FirefoxRelay;

    fn middleware(host: &Arc<MemoryHost>, faults: &FaultReporter) -> ContentScriptMiddleware {
        let relay = Arc::new(FirefoxRelay::new(
            host.page_channel(),
            host.messaging(),
            host.active_tab(),
            faults.clone(),
        ));
        let injector = Arc::new(PageScriptInjector::new(
            host.page_channel(),
            host.messaging(),
            host.page_scripts(),
        ));
        ContentScriptMiddleware::new(
            relay,
            injector,
            host.messaging(),
            host.active_tab(),
            faults.clone(),
        )
    }

    #[tokio::test]
    async fn test_install_announces_every_time() {
        let host = MemoryHost::new();
        let middleware = middleware(&host, &FaultReporter::new());
        let mut background = host.listen(Endpoint::Runtime);

        assert!(middleware.install());
        assert!(!middleware.install());

        for _ in 0..2 {
            let delivery = background.recv().await.expect("signal");
            assert!(LifecycleSignal::ContentScriptMiddlewareSatisfied.matches(delivery.message()));
        }

        // Relay tab listener + middleware tab listener, installed once.
        assert_eq!(host.listener_count(Endpoint::Tab(host.active_tab())), 2);
    }

    #[tokio::test]
    async fn test_malformed_request_is_reported() {
        let host = MemoryHost::new();
        let faults = FaultReporter::new();
        let mut reported = faults.subscribe();

        let middleware = middleware(&host, &faults);
        middleware.install();

        let request = Envelope::request(
            ReceiverTag::CONTENT_SCRIPT_MIDDLEWARE,
            INJECT_PAGE_SCRIPT,
            json!({ "file": "/page.js" }),
        );
        let reply = host
            .messaging()
            .send(Endpoint::Tab(host.active_tab()), request.to_value())
            .expect("send");

        let fault = reported.recv().await.expect("fault");
        assert_eq!(fault.component, COMPONENT);
        assert!(matches!(fault.error, Error::Json(_)));
        assert_eq!(host.page_scripts().loads().len(), 0);

        let reply = Envelope::from_value(reply.await.expect("reply")).expect("envelope");
        assert!(reply.error.is_some());
    }

    #[tokio::test]
    async fn test_refused_load_is_answered() {
        let host = MemoryHost::new();
        let faults = FaultReporter::new();
        let middleware = middleware(&host, &faults);
        middleware.install();

        let args = serde_json::to_value(InjectPageScript {
            file_name: String::new(),
        })
        .expect("args");
        let request =
            Envelope::request(ReceiverTag::CONTENT_SCRIPT_MIDDLEWARE, INJECT_PAGE_SCRIPT, args);
        let reply = host
            .messaging()
            .send(Endpoint::Tab(host.active_tab()), request.to_value())
            .expect("send");

        let envelope = Envelope::from_value(reply.await.expect("reply")).expect("envelope");
        let outcome = InjectionOutcome::from_envelope(envelope).expect("outcome");
        assert!(matches!(outcome, InjectionOutcome::LoadFailed { .. }));
        assert_eq!(faults.recent().len(), 1);
    }
}
