//! Web-page context.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use crate::channel::{ExtensionMessaging, PageChannel};
use crate::config::{Browser, RpcConfig};
use crate::error::{Error, Result};
use crate::fault::FaultReporter;
use crate::identifiers::ExtensionId;
use crate::protocol::LifecycleSignal;
use crate::rpc::{
    ChromiumPageClient, ChromiumPageServer, FirefoxPageClient, FirefoxPageServer,
    ProcedureRegistry, RpcClient, RpcServer,
};

// ============================================================================
// PageContext
// ============================================================================

/// Everything the injected page script owns.
pub struct PageContext {
    config: RpcConfig,
    page: Arc<dyn PageChannel>,
    messaging: Arc<dyn ExtensionMessaging>,
    extension_id: Option<ExtensionId>,
    procedures: ProcedureRegistry,
    faults: FaultReporter,
    server: OnceLock<Arc<dyn RpcServer>>,
    client: OnceLock<Arc<dyn RpcClient>>,
    initialized: AtomicBool,
}

impl PageContext {
    /// Creates the page context.
    ///
    /// `messaging` is only used on Chromium, where the page talks to the
    /// background directly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on Chromium without an extension ID.
    pub fn new(
        config: RpcConfig,
        page: Arc<dyn PageChannel>,
        messaging: Arc<dyn ExtensionMessaging>,
    ) -> Result<Self> {
        let extension_id = config.extension_id().cloned();
        if config.browser().page_reaches_background_directly() && extension_id.is_none() {
            return Err(Error::config(
                "An extension ID is required for the page to reach the background directly",
            ));
        }

        Ok(Self {
            config,
            page,
            messaging,
            extension_id,
            procedures: ProcedureRegistry::new(),
            faults: FaultReporter::new(),
            server: OnceLock::new(),
            client: OnceLock::new(),
            initialized: AtomicBool::new(false),
        })
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Procedures served to the background.
    #[inline]
    #[must_use]
    pub fn procedures(&self) -> &ProcedureRegistry {
        &self.procedures
    }

    /// Faults raised by this context's listeners.
    #[inline]
    #[must_use]
    pub fn faults(&self) -> &FaultReporter {
        &self.faults
    }

    /// Returns the page server, creating it on first use.
    pub fn server(&self) -> Arc<dyn RpcServer> {
        let server = self.server.get_or_init(|| -> Arc<dyn RpcServer> {
            match self.config.browser() {
                Browser::Chromium => Arc::new(ChromiumPageServer::new(
                    Arc::clone(&self.page),
                    Arc::clone(&self.messaging),
                    self.procedures.clone(),
                    self.faults.clone(),
                )),
                Browser::Firefox => Arc::new(FirefoxPageServer::new(
                    Arc::clone(&self.page),
                    self.procedures.clone(),
                    self.faults.clone(),
                )),
            }
        });
        Arc::clone(server)
    }

    /// Returns the client calling the background, creating it on first use.
    pub fn client(&self) -> Arc<dyn RpcClient> {
        let client = self.client.get_or_init(|| -> Arc<dyn RpcClient> {
            let call_timeout = self.config.call_timeout();
            match &self.extension_id {
                Some(extension_id) if self.config.browser() == Browser::Chromium => {
                    Arc::new(ChromiumPageClient::new(
                        Arc::clone(&self.messaging),
                        extension_id.clone(),
                        call_timeout,
                    ))
                }
                _ => Arc::new(FirefoxPageClient::new(Arc::clone(&self.page), call_timeout)),
            }
        });
        Arc::clone(client)
    }

    /// Starts the page server and tells the content script the page
    /// script is ready.
    ///
    /// Register procedures before calling this.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyInitialized`] on every call after the first.
    pub fn satisfied(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            warn!("Page script initialized twice");
            return Err(Error::already_initialized("page script"));
        }

        self.server().listen();
        self.page.post(LifecycleSignal::PageScriptSatisfied.to_value());
        info!(procedures = self.procedures.len(), "Page script satisfied");
        Ok(())
    }

    /// Returns `true` once [`PageContext::satisfied`] has run.
    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

// ============================================================================
// Tests
// ============================================================================
