//! Content-script context.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::channel::{ExtensionMessaging, PageChannel, ScriptLoader};
use crate::config::{Browser, RpcConfig};
use crate::fault::FaultReporter;
use crate::identifiers::TabId;
use crate::lifecycle::{ContentScriptMiddleware, InjectionState, PageScriptInjector};
use crate::relay::{ChromiumRelay, FirefoxRelay, Relay};

// ============================================================================
// ContentScriptContext
// ============================================================================

/// Everything the content script of one tab owns.
pub struct ContentScriptContext {
    config: RpcConfig,
    relay: Arc<dyn Relay>,
    middleware: ContentScriptMiddleware,
    faults: FaultReporter,
}

impl ContentScriptContext {
    /// Creates the context. Nothing is installed until [`Self::install`].
    #[must_use]
    pub fn new(
        config: RpcConfig,
        page: Arc<dyn PageChannel>,
        messaging: Arc<dyn ExtensionMessaging>,
        tab_id: TabId,
        page_scripts: Arc<dyn ScriptLoader>,
    ) -> Self {
        let faults = FaultReporter::new();

        let relay: Arc<dyn Relay> = match config.browser() {
            Browser::Chromium => Arc::new(ChromiumRelay::new(
                Arc::clone(&page),
                Arc::clone(&messaging),
                tab_id,
                faults.clone(),
            )),
            Browser::Firefox => Arc::new(FirefoxRelay::new(
                Arc::clone(&page),
                Arc::clone(&messaging),
                tab_id,
                faults.clone(),
            )),
        };

        let injector = Arc::new(PageScriptInjector::new(
            page,
            Arc::clone(&messaging),
            page_scripts,
        ));

        let middleware = ContentScriptMiddleware::new(
            Arc::clone(&relay),
            injector,
            messaging,
            tab_id,
            faults.clone(),
        );

        Self {
            config,
            relay,
            middleware,
            faults,
        }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Installs the relay and middleware; later calls only re-announce.
    pub fn install(&self) -> bool {
        self.middleware.install()
    }

    /// Returns the relay.
    #[inline]
    #[must_use]
    pub fn relay(&self) -> &Arc<dyn Relay> {
        &self.relay
    }

    /// Returns the page-script injection state.
    #[must_use]
    pub fn injection_state(&self) -> InjectionState {
        self.middleware.injector().state()
    }

    /// Faults raised by the relay and middleware.
    #[inline]
    #[must_use]
    pub fn faults(&self) -> &FaultReporter {
        &self.faults
    }
}
